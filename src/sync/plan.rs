//! Reconciliation of a local prompt set against a remote deck.
//!
//! `reconcile` is pure: it reads one deck's local prompts and one snapshot of
//! the remote records and decides what should change. Applying the result is
//! up to a `RemoteCollection`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::SyncPolicy;
use crate::prompts::Prompt;

/// A note as it exists in the remote collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCardRecord {
    /// Scheduling id stored on the remote note
    pub scheduling_id: u64,
    /// Remote-internal handle (Anki note id), only used for update/delete calls
    pub handle: u64,
    /// Update id the remote note was last rendered from, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_id: Option<u64>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Refusing to delete {candidates} notes from {deck}: more than the cap of {cap} per run")]
pub struct DeletionCapExceeded {
    pub deck: String,
    pub candidates: usize,
    pub cap: usize,
}

/// Changes planned for one deck. Built once by `reconcile`, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    deck: String,
    to_add: Vec<Prompt>,
    to_refresh: Vec<(Prompt, RemoteCardRecord)>,
    to_delete: Vec<RemoteCardRecord>,
    refused_deletions: Vec<RemoteCardRecord>,
    exceeds_deletion_cap: bool,
    deletion_cap: usize,
}

impl SyncPlan {
    pub fn deck(&self) -> &str {
        &self.deck
    }

    /// Prompts to push. An add for an id the remote already has must update in place.
    pub fn to_add(&self) -> &[Prompt] {
        &self.to_add
    }

    /// Prompts present on both sides whose rendered content is stale
    pub fn to_refresh(&self) -> &[(Prompt, RemoteCardRecord)] {
        &self.to_refresh
    }

    pub fn to_delete(&self) -> &[RemoteCardRecord] {
        &self.to_delete
    }

    /// Deletion candidates withheld because the cap was exceeded
    pub fn refused_deletions(&self) -> &[RemoteCardRecord] {
        &self.refused_deletions
    }

    pub fn exceeds_deletion_cap(&self) -> bool {
        self.exceeds_deletion_cap
    }

    pub fn deletion_cap_error(&self) -> Option<DeletionCapExceeded> {
        self.exceeds_deletion_cap.then(|| DeletionCapExceeded {
            deck: self.deck.clone(),
            candidates: self.refused_deletions.len(),
            cap: self.deletion_cap,
        })
    }
}

/// Outcome of diffing one deck
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Local and remote ids already match
    Skipped,
    Planned(SyncPlan),
}

impl Reconciliation {
    pub fn plan(&self) -> Option<&SyncPlan> {
        match self {
            Reconciliation::Skipped => None,
            Reconciliation::Planned(plan) => Some(plan),
        }
    }
}

/// Diff one deck's local prompts against its remote records
pub fn reconcile(
    deck: &str,
    local: &[Prompt],
    remote: &[RemoteCardRecord],
    policy: &SyncPolicy,
) -> Reconciliation {
    let local_ids: HashSet<u64> = local.iter().map(Prompt::scheduling_id).collect();
    let remote_ids: HashSet<u64> = remote.iter().map(|r| r.scheduling_id).collect();

    let added_ids: HashSet<u64> = local_ids.difference(&remote_ids).copied().collect();
    let removed_ids: HashSet<u64> = remote_ids.difference(&local_ids).copied().collect();

    let stale = if policy.push_all {
        Vec::new()
    } else {
        stale_pairs(local, remote)
    };

    let force_push = policy.push_all && !local.is_empty();
    if added_ids.is_empty() && removed_ids.is_empty() && stale.is_empty() && !force_push {
        return Reconciliation::Skipped;
    }

    let to_add = unique_by_id(local.iter().filter(|p| policy.push_all || added_ids.contains(&p.scheduling_id())));

    let candidates: Vec<RemoteCardRecord> = remote
        .iter()
        .filter(|r| removed_ids.contains(&r.scheduling_id))
        .copied()
        .collect();

    let exceeds_deletion_cap = candidates.len() > policy.max_deletions_per_run;
    let (to_delete, refused_deletions) = if exceeds_deletion_cap {
        (Vec::new(), candidates)
    } else {
        (candidates, Vec::new())
    };

    Reconciliation::Planned(SyncPlan {
        deck: deck.to_string(),
        to_add,
        to_refresh: stale,
        to_delete,
        refused_deletions,
        exceeds_deletion_cap,
        deletion_cap: policy.max_deletions_per_run,
    })
}

/// Local prompts whose remote counterpart was rendered from a different update id
fn stale_pairs(local: &[Prompt], remote: &[RemoteCardRecord]) -> Vec<(Prompt, RemoteCardRecord)> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();

    for prompt in local {
        if !seen.insert(prompt.scheduling_id()) {
            continue;
        }
        let outdated = remote.iter().find(|r| {
            r.scheduling_id == prompt.scheduling_id()
                && r.update_id.is_some_and(|id| id != prompt.update_id())
        });
        if let Some(record) = outdated {
            pairs.push((prompt.clone(), *record));
        }
    }

    pairs
}

/// Keep the first prompt for each scheduling id, in input order
fn unique_by_id<'a>(prompts: impl Iterator<Item = &'a Prompt>) -> Vec<Prompt> {
    let mut seen = HashSet::new();
    prompts
        .filter(|p| seen.insert(p.scheduling_id()))
        .cloned()
        .collect()
}
