//! Markdown documents that prompts are extracted from

pub mod ingest;
pub mod models;

pub use ingest::{read_documents, IngestError};
pub use models::Document;
