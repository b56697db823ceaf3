use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ingest::split_frontmatter;

/// A markdown note read from the input directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Stable per-document id (frontmatter `id`, or derived from the relative path)
    pub identity: String,
    pub path: PathBuf,
    /// Full file contents, frontmatter included
    pub content: String,
    /// Frontmatter tags followed by inline `#tags`, deduplicated
    pub tags: Vec<String>,
    pub last_modified: DateTime<Utc>,
}

impl Document {
    /// Body without frontmatter, plus the number of lines that precede it
    pub fn body(&self) -> (&str, usize) {
        let (_, body) = split_frontmatter(&self.content);
        let prefix_len = self.content.len() - body.len();
        let offset = self.content[..prefix_len].matches('\n').count();
        (body, offset)
    }
}
