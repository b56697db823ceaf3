//! AnkiConnect adapter: the remote collection behind a sync

pub mod client;
pub mod collection;
pub mod notes;

pub use client::{AnkiConnectClient, AnkiConnectError, DEFAULT_URL};
pub use collection::AnkiConnectCollection;
pub use notes::{NoteModel, CLOZE_MODEL, QA_MODEL};
