pub mod collection;
pub mod config;
pub mod deck;
pub mod plan;

mod manager;

pub use collection::{ApplyResult, CollectionError, DryRun, RemoteCollection};
pub use config::SyncPolicy;
pub use deck::{deck_for, group_by_deck, is_managed, same_deck};
pub use manager::{DeckOutcome, DeckReport, PlanSummary, RunReport, SyncManager};
pub use plan::{reconcile, DeletionCapExceeded, Reconciliation, RemoteCardRecord, SyncPlan};
