//! Prompt value types and their derived identities

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hashing::{hash_normalized, hash_str, normalize};
use crate::documents::Document;

/// Separator used when joining fields before normalization.
/// It is punctuation, so it never survives into the hashed string.
const FIELD_SEPARATOR: &str = "_";

/// Kind of prompt, selects the remote note type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptKind {
    /// Question and answer
    Qa,
    /// Fill-in-the-blank, `{hidden}` spans in a single text
    Cloze,
}

/// Where a prompt came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub document_id: String,
    pub path: PathBuf,
    pub last_modified: DateTime<Utc>,
    /// 1-based line of the prompt in the source file
    pub line_nr: usize,
}

/// An extracted prompt.
///
/// Identity is computed once at construction from the content fields and tags,
/// the same way for every kind and for both document-backed and standalone
/// prompts. The value is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    kind: PromptKind,
    content_fields: Vec<String>,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provenance: Option<Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rephrased_question: Option<String>,
    scheduling_id: u64,
    update_id: u64,
}

impl Prompt {
    pub fn new(
        kind: PromptKind,
        content_fields: Vec<String>,
        tags: Vec<String>,
        provenance: Option<Provenance>,
    ) -> Self {
        let content = content_fields.join(FIELD_SEPARATOR);
        let normalized_content = normalize(&content);

        let mut sorted_tags = tags.clone();
        sorted_tags.sort();
        let normalized_tags = normalize(&sorted_tags.join(FIELD_SEPARATOR));

        let scheduling_id = hash_normalized(&content);
        let update_id = hash_str(&format!("{}{}", normalized_content, normalized_tags));

        Self {
            kind,
            content_fields,
            tags,
            provenance,
            rephrased_question: None,
            scheduling_id,
            update_id,
        }
    }

    /// Standalone question/answer prompt
    pub fn qa(question: impl Into<String>, answer: impl Into<String>, tags: Vec<String>) -> Self {
        Self::new(PromptKind::Qa, vec![question.into(), answer.into()], tags, None)
    }

    /// Standalone cloze prompt
    pub fn cloze(text: impl Into<String>, tags: Vec<String>) -> Self {
        Self::new(PromptKind::Cloze, vec![text.into()], tags, None)
    }

    /// Question/answer prompt inheriting tags and provenance from a document
    pub fn qa_from_document(
        question: impl Into<String>,
        answer: impl Into<String>,
        document: &Document,
        line_nr: usize,
    ) -> Self {
        Self::new(
            PromptKind::Qa,
            vec![question.into(), answer.into()],
            document.tags.clone(),
            Some(Provenance::from_document(document, line_nr)),
        )
    }

    /// Cloze prompt inheriting tags and provenance from a document
    pub fn cloze_from_document(text: impl Into<String>, document: &Document, line_nr: usize) -> Self {
        Self::new(
            PromptKind::Cloze,
            vec![text.into()],
            document.tags.clone(),
            Some(Provenance::from_document(document, line_nr)),
        )
    }

    /// Copy of this prompt displaying `question` instead of the original.
    /// Identities are untouched.
    pub fn with_rephrased_question(&self, question: impl Into<String>) -> Self {
        Self {
            rephrased_question: Some(question.into()),
            ..self.clone()
        }
    }

    pub fn kind(&self) -> PromptKind {
        self.kind
    }

    pub fn content_fields(&self) -> &[String] {
        &self.content_fields
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn scheduling_id(&self) -> u64 {
        self.scheduling_id
    }

    pub fn update_id(&self) -> u64 {
        self.update_id
    }

    /// Original question of a QA prompt
    pub fn question(&self) -> Option<&str> {
        match self.kind {
            PromptKind::Qa => self.content_fields.first().map(String::as_str),
            PromptKind::Cloze => None,
        }
    }

    pub fn answer(&self) -> Option<&str> {
        match self.kind {
            PromptKind::Qa => self.content_fields.get(1).map(String::as_str),
            PromptKind::Cloze => None,
        }
    }

    /// Cloze text
    pub fn text(&self) -> Option<&str> {
        match self.kind {
            PromptKind::Cloze => self.content_fields.first().map(String::as_str),
            PromptKind::Qa => None,
        }
    }

    pub fn rephrased_question(&self) -> Option<&str> {
        self.rephrased_question.as_deref()
    }

    /// Question as it should be shown on the card
    pub fn display_question(&self) -> Option<&str> {
        self.rephrased_question().or_else(|| self.question())
    }
}

impl Provenance {
    pub fn from_document(document: &Document, line_nr: usize) -> Self {
        Self {
            document_id: document.identity.clone(),
            path: document.path.clone(),
            last_modified: document.last_modified,
            line_nr,
        }
    }
}
