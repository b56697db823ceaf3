//! Sync flashcard prompts written in markdown notes into Anki.
//!
//! Documents are read from an input directory, prompts are extracted and given
//! content-derived identities, and each deck is reconciled against the Anki
//! collection through AnkiConnect.

pub mod anki;
pub mod config;
pub mod documents;
pub mod extraction;
pub mod pipeline;
pub mod prompts;
pub mod rephrase;
pub mod sync;

pub use config::{RunConfig, RunOptions, ValidationError};
pub use pipeline::{Pipeline, SyncError};
pub use prompts::Prompt;
pub use sync::{RunReport, SyncManager, SyncPolicy};
