//! The remote side of a sync: anything that can list and change notes per deck

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::plan::{RemoteCardRecord, SyncPlan};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("Remote collection unavailable: {0}")]
    Unavailable(String),
    #[error("Remote collection error: {0}")]
    Remote(String),
}

/// What actually happened when a plan was applied. Counts only successful
/// operations; failures are listed in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ApplyResult {
    /// Some operations in the plan failed
    pub fn is_partial_failure(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Decks under `base_deck` (itself included) that this collection holds notes for
    async fn managed_decks(&self, base_deck: &str) -> Result<Vec<String>, CollectionError>;

    /// Current notes of a single deck, excluding its subdecks
    async fn list_records(&self, deck: &str) -> Result<Vec<RemoteCardRecord>, CollectionError>;

    /// Apply a plan. Must be safe to retry: adding an id that already exists
    /// updates it instead of creating a duplicate.
    async fn apply(&self, deck: &str, plan: &SyncPlan) -> Result<ApplyResult, CollectionError>;
}

/// Reads from the wrapped collection but only logs what `apply` would do
pub struct DryRun<C> {
    inner: C,
}

impl<C: RemoteCollection> DryRun<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: RemoteCollection> RemoteCollection for DryRun<C> {
    async fn managed_decks(&self, base_deck: &str) -> Result<Vec<String>, CollectionError> {
        self.inner.managed_decks(base_deck).await
    }

    async fn list_records(&self, deck: &str) -> Result<Vec<RemoteCardRecord>, CollectionError> {
        self.inner.list_records(deck).await
    }

    async fn apply(&self, deck: &str, plan: &SyncPlan) -> Result<ApplyResult, CollectionError> {
        log::info!(
            "[dry run] {}: would add {}, refresh {}, delete {}",
            deck,
            plan.to_add().len(),
            plan.to_refresh().len(),
            plan.to_delete().len()
        );
        for prompt in plan.to_add() {
            log::info!("[dry run]   + {} {:?}", prompt.scheduling_id(), prompt.content_fields());
        }
        for record in plan.to_delete() {
            log::info!("[dry run]   - {} (note {})", record.scheduling_id, record.handle);
        }
        Ok(ApplyResult::default())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;
    use crate::sync::deck::{is_managed, same_deck};

    /// Collection backed by a map of deck name to records. Like Anki, deck
    /// names are matched without regard to case.
    #[derive(Default)]
    pub struct InMemoryCollection {
        pub decks: Mutex<BTreeMap<String, Vec<RemoteCardRecord>>>,
        pub unavailable_decks: Vec<String>,
        pub managed_decks_error: Option<CollectionError>,
        pub apply_calls: Mutex<usize>,
        next_handle: Mutex<u64>,
    }

    /// Key under which `deck` is stored, keeping the first spelling
    fn stored_name(decks: &BTreeMap<String, Vec<RemoteCardRecord>>, deck: &str) -> String {
        decks
            .keys()
            .find(|name| same_deck(name, deck))
            .cloned()
            .unwrap_or_else(|| deck.to_string())
    }

    impl InMemoryCollection {
        pub fn with_records(deck: &str, records: Vec<RemoteCardRecord>) -> Self {
            let collection = Self::default();
            collection.decks.lock().unwrap().insert(deck.to_string(), records);
            collection
        }

        pub fn ids(&self, deck: &str) -> Vec<u64> {
            let decks = self.decks.lock().unwrap();
            let mut ids: Vec<u64> = decks
                .get(&stored_name(&decks, deck))
                .map(|records| records.iter().map(|r| r.scheduling_id).collect())
                .unwrap_or_default();
            ids.sort();
            ids
        }
    }

    #[async_trait]
    impl RemoteCollection for InMemoryCollection {
        async fn managed_decks(&self, base_deck: &str) -> Result<Vec<String>, CollectionError> {
            if let Some(error) = &self.managed_decks_error {
                return Err(error.clone());
            }
            let decks = self.decks.lock().unwrap();
            Ok(decks.keys().filter(|name| is_managed(base_deck, name)).cloned().collect())
        }

        async fn list_records(&self, deck: &str) -> Result<Vec<RemoteCardRecord>, CollectionError> {
            if self.unavailable_decks.iter().any(|d| d == deck) {
                return Err(CollectionError::Unavailable(format!("deck {} offline", deck)));
            }
            let decks = self.decks.lock().unwrap();
            Ok(decks.get(&stored_name(&decks, deck)).cloned().unwrap_or_default())
        }

        async fn apply(&self, deck: &str, plan: &SyncPlan) -> Result<ApplyResult, CollectionError> {
            *self.apply_calls.lock().unwrap() += 1;

            let mut decks = self.decks.lock().unwrap();
            let name = stored_name(&decks, deck);
            let records = decks.entry(name).or_default();
            let mut result = ApplyResult::default();

            for prompt in plan.to_add() {
                if let Some(existing) = records.iter_mut().find(|r| r.scheduling_id == prompt.scheduling_id()) {
                    existing.update_id = Some(prompt.update_id());
                    result.updated += 1;
                } else {
                    let mut handle = self.next_handle.lock().unwrap();
                    *handle += 1;
                    records.push(RemoteCardRecord {
                        scheduling_id: prompt.scheduling_id(),
                        handle: *handle,
                        update_id: Some(prompt.update_id()),
                    });
                    result.added += 1;
                }
            }

            for (prompt, record) in plan.to_refresh() {
                if let Some(existing) = records.iter_mut().find(|r| r.handle == record.handle) {
                    existing.update_id = Some(prompt.update_id());
                    result.updated += 1;
                }
            }

            let before = records.len();
            records.retain(|r| !plan.to_delete().contains(r));
            result.deleted = before - records.len();

            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::InMemoryCollection;
    use super::*;
    use crate::prompts::Prompt;
    use crate::sync::config::SyncPolicy;
    use crate::sync::plan::reconcile;

    #[tokio::test]
    async fn test_dry_run_never_changes_remote() {
        let collection = DryRun::new(InMemoryCollection::default());
        let local = vec![Prompt::qa("Q1", "A1", vec![])];

        let records = collection.list_records("Memium").await.unwrap();
        let result = reconcile("Memium", &local, &records, &SyncPolicy::default());
        let plan = result.plan().unwrap();

        let applied = collection.apply("Memium", plan).await.unwrap();

        assert_eq!(applied, ApplyResult::default());
        assert!(collection.list_records("Memium").await.unwrap().is_empty());
        assert_eq!(*collection.inner.apply_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_partial_failure() {
        let mut result = ApplyResult::default();
        assert!(!result.is_partial_failure());
        result.errors.push("addNote failed".to_string());
        assert!(result.is_partial_failure());
    }
}
