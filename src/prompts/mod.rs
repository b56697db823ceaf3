//! Prompts and their stable identities
//!
//! This module provides:
//! - Content normalization and SHA-256 based identifiers
//! - The `Prompt` value type (QA and cloze, document-backed or standalone)

pub mod hashing;
pub mod models;

pub use hashing::{hash_normalized, hash_str, normalize};
pub use models::{Prompt, PromptKind, Provenance};
