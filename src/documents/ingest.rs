//! Markdown document ingestion
//!
//! Walks an input directory and turns every markdown file into a `Document`.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

use super::models::Document;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input path is not a directory: {0}")]
    NotADirectory(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// A `#` followed by a letter starts a hashtag; `# Heading` does not
static HASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#([a-zA-Z][a-zA-Z0-9_/-]*)").unwrap());

/// Split a leading `---` block from the rest of the file.
///
/// Returns the raw YAML (if any) and the remaining body. The body is not
/// trimmed so callers can still compute line numbers.
pub fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let Some(after_open) = content.strip_prefix("---") else {
        return (None, content);
    };

    match after_open.find("\n---") {
        Some(close) => (Some(&after_open[..close]), &after_open[close + 4..]),
        None => (None, content),
    }
}

/// Frontmatter keys that shape prompts; any other key is ignored
#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    tags: Option<serde_yaml::Value>,
    #[serde(default)]
    id: Option<serde_yaml::Value>,
}

impl Frontmatter {
    fn parse(yaml: &str) -> Option<Self> {
        if yaml.trim().is_empty() {
            return Some(Self::default());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| log::warn!("Ignoring unparseable frontmatter: {}", e))
            .ok()
    }

    /// `tags:` as a YAML list, or as one string of comma separated tags
    fn tags(&self) -> Vec<String> {
        match &self.tags {
            Some(serde_yaml::Value::Sequence(items)) => items
                .iter()
                .filter_map(serde_yaml::Value::as_str)
                .filter_map(clean_tag)
                .collect(),
            Some(serde_yaml::Value::String(joined)) => joined.split(',').filter_map(clean_tag).collect(),
            _ => Vec::new(),
        }
    }

    /// Explicit document identity, which survives renames
    fn identity(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_yaml::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn clean_tag(tag: &str) -> Option<String> {
    let tag = tag.trim().trim_start_matches('#');
    (!tag.is_empty()).then(|| tag.to_string())
}

/// Hashtags written in the body, e.g. `#anki/deck/Medicine`
fn body_hashtags(body: &str) -> Vec<String> {
    HASHTAG_RE
        .captures_iter(body)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Identity derived from the path when the frontmatter names none
fn path_identity(relative_path: &Path) -> String {
    let key = relative_path.to_string_lossy().replace('\\', "/");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

fn is_hidden(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

fn is_markdown(path: &Path) -> bool {
    let extension = path.extension().map(|e| e.to_string_lossy().to_lowercase());
    matches!(extension.as_deref(), Some("md") | Some("markdown"))
}

/// Build a `Document` from file contents. Frontmatter tags come first,
/// followed by body hashtags not already present.
pub fn parse_document(
    content: String,
    relative_path: &Path,
    last_modified: DateTime<Utc>,
) -> Document {
    let (yaml, body) = split_frontmatter(&content);
    let frontmatter = yaml.and_then(Frontmatter::parse).unwrap_or_default();

    let mut tags = frontmatter.tags();
    for tag in body_hashtags(body) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let identity = frontmatter
        .identity()
        .unwrap_or_else(|| path_identity(relative_path));

    Document {
        identity,
        path: relative_path.to_path_buf(),
        content,
        tags,
        last_modified,
    }
}

/// Read a single markdown file
pub fn read_document(root: &Path, path: &Path) -> Result<Document> {
    let content = fs::read_to_string(path)?;
    let modified: DateTime<Utc> = fs::metadata(path)?.modified()?.into();
    let relative = path.strip_prefix(root).unwrap_or(path);

    Ok(parse_document(content, relative, modified))
}

/// Read every markdown file under `input_dir`, skipping hidden entries
pub fn read_documents(input_dir: &Path) -> Result<Vec<Document>> {
    if !input_dir.is_dir() {
        return Err(IngestError::NotADirectory(input_dir.display().to_string()));
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let relative = path.strip_prefix(input_dir).unwrap_or(path);

        if is_hidden(relative) || path.is_dir() || !is_markdown(path) {
            continue;
        }

        match read_document(input_dir, path) {
            Ok(document) => documents.push(document),
            Err(e) => log::warn!("Skipping unreadable document {:?}: {}", path, e),
        }
    }

    log::info!("Read {} documents from {:?}", documents.len(), input_dir);
    Ok(documents)
}
