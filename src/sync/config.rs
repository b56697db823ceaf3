use serde::{Deserialize, Serialize};

use crate::config::ValidationError;

pub const DEFAULT_MAX_DELETIONS_PER_RUN: usize = 50;

/// Policy flags for one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPolicy {
    /// Deletions above this count are refused for a deck
    pub max_deletions_per_run: usize,
    /// Push every local prompt, not just the diff
    pub push_all: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            max_deletions_per_run: DEFAULT_MAX_DELETIONS_PER_RUN,
            push_all: false,
        }
    }
}

impl SyncPolicy {
    /// Build a policy from a user-supplied cap, rejecting negative values
    pub fn new(max_deletions_per_run: i64, push_all: bool) -> Result<Self, ValidationError> {
        let max_deletions_per_run = usize::try_from(max_deletions_per_run)
            .map_err(|_| ValidationError::NegativeDeletionCap(max_deletions_per_run))?;

        Ok(Self {
            max_deletions_per_run,
            push_all,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = SyncPolicy::default();
        assert_eq!(policy.max_deletions_per_run, 50);
        assert!(!policy.push_all);
    }

    #[test]
    fn test_negative_cap_rejected() {
        assert!(matches!(
            SyncPolicy::new(-1, false),
            Err(ValidationError::NegativeDeletionCap(-1))
        ));
        assert_eq!(SyncPolicy::new(0, true).unwrap().max_deletions_per_run, 0);
    }
}
