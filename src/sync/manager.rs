use std::collections::BTreeMap;
use std::time::Instant;

use futures_util::future::join_all;
use serde::Serialize;

use super::collection::{ApplyResult, CollectionError, RemoteCollection};
use super::config::SyncPolicy;
use super::deck::{group_by_deck, same_deck};
use super::plan::{reconcile, DeletionCapExceeded, Reconciliation, SyncPlan};
use crate::prompts::Prompt;

/// Sizes of a plan, kept for reporting after the plan is consumed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub to_add: usize,
    pub to_refresh: usize,
    pub to_delete: usize,
    pub refused_deletions: usize,
}

impl From<&SyncPlan> for PlanSummary {
    fn from(plan: &SyncPlan) -> Self {
        Self {
            to_add: plan.to_add().len(),
            to_refresh: plan.to_refresh().len(),
            to_delete: plan.to_delete().len(),
            refused_deletions: plan.refused_deletions().len(),
        }
    }
}

/// Terminal state of one deck in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeckOutcome {
    /// Nothing to add, refresh or remove
    Skipped,
    Applied {
        planned: PlanSummary,
        result: ApplyResult,
        /// Set when deletions were refused for this deck
        deletion_cap: Option<DeletionCapExceeded>,
    },
    /// Listing or applying failed; other decks are unaffected
    Failed { error: CollectionError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckReport {
    pub deck: String,
    pub outcome: DeckOutcome,
}

/// Per-deck outcomes of one sync run, in deck name order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub decks: Vec<DeckReport>,
    /// Remote decks under the base deck could not be listed, so decks with no
    /// local prompts left were not cleaned up this run
    pub managed_decks_error: Option<CollectionError>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn skipped(&self) -> usize {
        self.decks
            .iter()
            .filter(|d| matches!(d.outcome, DeckOutcome::Skipped))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.decks
            .iter()
            .filter(|d| matches!(d.outcome, DeckOutcome::Failed { .. }))
            .count()
    }

    /// Sum of all apply results
    pub fn totals(&self) -> ApplyResult {
        let mut totals = ApplyResult::default();
        for deck in &self.decks {
            if let DeckOutcome::Applied { result, .. } = &deck.outcome {
                totals.added += result.added;
                totals.updated += result.updated;
                totals.deleted += result.deleted;
                totals.errors.extend(result.errors.iter().cloned());
            }
        }
        totals
    }

    pub fn deletion_caps_exceeded(&self) -> Vec<&DeletionCapExceeded> {
        self.decks
            .iter()
            .filter_map(|d| match &d.outcome {
                DeckOutcome::Applied { deletion_cap, .. } => deletion_cap.as_ref(),
                _ => None,
            })
            .collect()
    }
}

/// Drives one sync run: group prompts into decks, snapshot the remote,
/// reconcile each deck and hand the plans to the collection.
pub struct SyncManager<C> {
    collection: C,
    base_deck: String,
    policy: SyncPolicy,
}

impl<C: RemoteCollection> SyncManager<C> {
    pub fn new(collection: C, base_deck: impl Into<String>, policy: SyncPolicy) -> Self {
        Self {
            collection,
            base_deck: base_deck.into(),
            policy,
        }
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// Sync every deck derived from `prompts`, plus remote decks under the
    /// base deck that no longer have local prompts.
    pub async fn sync(&self, prompts: &[Prompt]) -> RunReport {
        let start = Instant::now();

        let mut decks = group_by_deck(&self.base_deck, prompts);
        let managed_decks_error = self.add_remote_only_decks(&mut decks).await.err();

        log::info!("Syncing {} prompts across {} decks", prompts.len(), decks.len());

        // Snapshot every deck before diffing any of them
        let listings = join_all(decks.keys().map(|deck| self.collection.list_records(deck))).await;

        let mut reports = Vec::with_capacity(decks.len());
        for ((deck, local), listing) in decks.iter().zip(listings) {
            let outcome = match listing {
                Ok(remote) => {
                    let reconciliation = reconcile(deck, local, &remote, &self.policy);
                    self.apply(deck, reconciliation).await
                }
                Err(error) => {
                    log::error!("Unable to list notes in {}: {}", deck, error);
                    DeckOutcome::Failed { error }
                }
            };

            reports.push(DeckReport {
                deck: deck.clone(),
                outcome,
            });
        }

        RunReport {
            decks: reports,
            managed_decks_error,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn add_remote_only_decks(
        &self,
        decks: &mut BTreeMap<String, Vec<Prompt>>,
    ) -> Result<(), CollectionError> {
        let remote_decks = self.collection.managed_decks(&self.base_deck).await.map_err(|e| {
            log::error!("Unable to list remote decks under {}: {}", self.base_deck, e);
            e
        })?;

        for deck in remote_decks {
            if !decks.keys().any(|local| same_deck(local, &deck)) {
                log::info!("Deck {} has no local prompts left", deck);
                decks.insert(deck, Vec::new());
            }
        }
        Ok(())
    }

    async fn apply(&self, deck: &str, reconciliation: Reconciliation) -> DeckOutcome {
        let plan = match reconciliation {
            Reconciliation::Skipped => {
                log::info!("Skipped {}: no notes added or removed", deck);
                return DeckOutcome::Skipped;
            }
            Reconciliation::Planned(plan) => plan,
        };

        let planned = PlanSummary::from(&plan);
        log::info!(
            "Syncing deck {}: {} to add, {} to refresh, {} to delete",
            deck,
            planned.to_add,
            planned.to_refresh,
            planned.to_delete
        );

        let deletion_cap = plan.deletion_cap_error();
        if let Some(exceeded) = &deletion_cap {
            log::warn!("{}", exceeded);
        }

        match self.collection.apply(deck, &plan).await {
            Ok(result) => {
                for error in &result.errors {
                    log::error!("{}: {}", deck, error);
                }
                log::info!(
                    "{}: added {}, updated {}, deleted {}",
                    deck,
                    result.added,
                    result.updated,
                    result.deleted
                );
                DeckOutcome::Applied {
                    planned,
                    result,
                    deletion_cap,
                }
            }
            Err(error) => {
                log::error!("Unable to sync {}: {}", deck, error);
                DeckOutcome::Failed { error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::collection::testing::InMemoryCollection;
    use crate::sync::collection::DryRun;
    use crate::sync::plan::RemoteCardRecord;

    fn policy(cap: usize) -> SyncPolicy {
        SyncPolicy {
            max_deletions_per_run: cap,
            push_all: false,
        }
    }

    fn orphan(scheduling_id: u64) -> RemoteCardRecord {
        RemoteCardRecord {
            scheduling_id,
            handle: scheduling_id,
            update_id: None,
        }
    }

    fn prompts() -> Vec<Prompt> {
        vec![
            Prompt::qa("Q1", "A1", vec![]),
            Prompt::qa("Q2", "A2", vec!["anki/deck/Medicine".to_string()]),
        ]
    }

    #[tokio::test]
    async fn test_first_run_applies_second_run_skips() {
        let manager = SyncManager::new(InMemoryCollection::default(), "Memium", policy(50));
        let prompts = prompts();

        let first = manager.sync(&prompts).await;
        assert_eq!(first.decks.len(), 2);
        assert_eq!(first.totals().added, 2);
        assert_eq!(first.skipped(), 0);

        let second = manager.sync(&prompts).await;
        assert_eq!(second.skipped(), 2);
        assert_eq!(second.totals(), ApplyResult::default());
        assert_eq!(manager.collection().ids("Memium"), vec![4471983557]);
        assert_eq!(manager.collection().ids("Memium::Medicine"), vec![6066457094]);
    }

    #[tokio::test]
    async fn test_tag_edit_refreshes_then_settles() {
        let manager = SyncManager::new(InMemoryCollection::default(), "Memium", policy(50));
        manager.sync(&[Prompt::qa("Q1", "A1", vec!["old".to_string()])]).await;

        let edited = [Prompt::qa("Q1", "A1", vec!["new".to_string()])];
        let refresh = manager.sync(&edited).await;
        assert_eq!(refresh.totals().updated, 1);
        assert_eq!(refresh.totals().added, 0);
        assert_eq!(refresh.totals().deleted, 0);

        let settled = manager.sync(&edited).await;
        assert_eq!(settled.skipped(), 1);
    }

    #[tokio::test]
    async fn test_deletion_cap_is_per_deck() {
        let collection = InMemoryCollection::with_records("Memium", vec![orphan(1), orphan(2), orphan(3)]);
        collection
            .decks
            .lock()
            .unwrap()
            .insert("Memium::Medicine".to_string(), vec![orphan(4)]);
        let manager = SyncManager::new(collection, "Memium", policy(2));

        let report = manager.sync(&[Prompt::qa("Q1", "A1", vec![])]).await;

        let caps = report.deletion_caps_exceeded();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].deck, "Memium");

        // Additions still went through in the capped deck
        assert_eq!(manager.collection().ids("Memium"), vec![1, 2, 3, 4471983557]);
        // The remote-only subdeck was within the cap and got cleaned up
        assert!(manager.collection().ids("Memium::Medicine").is_empty());
        assert_eq!(report.totals().deleted, 1);
    }

    #[tokio::test]
    async fn test_unavailable_deck_does_not_stop_others() {
        let mut collection = InMemoryCollection::default();
        collection.unavailable_decks = vec!["Memium::Medicine".to_string()];
        let manager = SyncManager::new(collection, "Memium", policy(50));

        let report = manager.sync(&prompts()).await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.totals().added, 1);
        let failed = report
            .decks
            .iter()
            .find(|d| matches!(d.outcome, DeckOutcome::Failed { .. }))
            .unwrap();
        assert_eq!(failed.deck, "Memium::Medicine");
    }

    #[tokio::test]
    async fn test_dry_run_reports_plan_without_changes() {
        let manager = SyncManager::new(DryRun::new(InMemoryCollection::default()), "Memium", policy(50));

        let report = manager.sync(&prompts()).await;

        assert_eq!(report.decks.len(), 2);
        for deck in &report.decks {
            match &deck.outcome {
                DeckOutcome::Applied { planned, result, .. } => {
                    assert_eq!(planned.to_add, 1);
                    assert_eq!(result, &ApplyResult::default());
                }
                other => panic!("unexpected outcome {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_push_all_updates_in_place() {
        let push_all = SyncManager::new(
            InMemoryCollection::default(),
            "Memium",
            SyncPolicy {
                max_deletions_per_run: 50,
                push_all: true,
            },
        );
        push_all.sync(&prompts()).await;
        let report = push_all.sync(&prompts()).await;

        assert_eq!(report.skipped(), 0);
        assert_eq!(report.totals().updated, 2);
        assert_eq!(report.totals().added, 0);
        assert_eq!(push_all.collection().ids("Memium"), vec![4471983557]);
    }

    #[tokio::test]
    async fn test_deck_tags_differing_in_case_share_one_deck() {
        let manager = SyncManager::new(InMemoryCollection::default(), "Memium", policy(50));
        let prompts = [
            Prompt::qa("Q1", "A1", vec!["anki/deck/Medicine".to_string()]),
            Prompt::qa("Q2", "A2", vec!["anki/deck/medicine".to_string()]),
        ];

        let first = manager.sync(&prompts).await;
        assert_eq!(first.decks.len(), 1);
        assert_eq!(first.totals().added, 2);

        for _ in 0..2 {
            let again = manager.sync(&prompts).await;
            assert_eq!(again.skipped(), again.decks.len());
            assert_eq!(again.totals().deleted, 0);
        }
        assert_eq!(manager.collection().ids("Memium::MEDICINE").len(), 2);
    }

    #[tokio::test]
    async fn test_remote_deck_spelled_differently_is_not_orphaned() {
        let q1 = Prompt::qa("Q1", "A1", vec!["anki/deck/Medicine".to_string()]);
        let existing = RemoteCardRecord {
            scheduling_id: q1.scheduling_id(),
            handle: 1,
            update_id: Some(q1.update_id()),
        };
        let collection = InMemoryCollection::with_records("memium::medicine", vec![existing]);
        let manager = SyncManager::new(collection, "Memium", policy(50));

        let report = manager.sync(&[q1]).await;

        assert_eq!(report.decks.len(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(manager.collection().ids("Memium::Medicine"), vec![existing.scheduling_id]);
    }

    #[tokio::test]
    async fn test_unlisted_remote_decks_are_reported() {
        let mut collection = InMemoryCollection::with_records("Memium::Retired", vec![orphan(7)]);
        collection.managed_decks_error = Some(CollectionError::Remote("deckNames failed".to_string()));
        let manager = SyncManager::new(collection, "Memium", policy(50));

        let report = manager.sync(&prompts()).await;

        assert_eq!(
            report.managed_decks_error,
            Some(CollectionError::Remote("deckNames failed".to_string()))
        );
        // Local decks still sync; the remote-only deck is left alone
        assert_eq!(report.totals().added, 2);
        assert_eq!(manager.collection().ids("Memium::Retired"), vec![7]);
    }
}
