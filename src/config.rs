//! Validated run configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::SyncPolicy;

/// Directory inside the input dir holding caches and logs
pub const STATE_DIR: &str = ".memium";

pub const DEFAULT_DECK_NAME: &str = "Memium";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("max deletions per run must not be negative, got {0}")]
    NegativeDeletionCap(i64),

    #[error("rephrase_if_younger_than_days and rephrase_cache_days must both be set or both be unset")]
    RephraseOptionsMismatch,

    #[error("{option} must be positive, got {value}")]
    NotPositive { option: &'static str, value: i64 },

    #[error("Input path is not a directory: {0}")]
    InputNotADirectory(PathBuf),

    #[error("Deck name must not be empty")]
    EmptyDeckName,
}

/// Options as given on the command line, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub input_dir: PathBuf,
    pub watch_seconds: Option<u64>,
    pub deck_name: String,
    pub max_deletions_per_run: i64,
    pub push_all: bool,
    pub dry_run: bool,
    pub skip_sync: bool,
    pub rephrase_if_younger_than_days: Option<i64>,
    pub rephrase_cache_days: Option<i64>,
    pub anki_connect_url: String,
    pub max_wait_seconds: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            watch_seconds: None,
            deck_name: DEFAULT_DECK_NAME.to_string(),
            max_deletions_per_run: crate::sync::config::DEFAULT_MAX_DELETIONS_PER_RUN as i64,
            push_all: false,
            dry_run: false,
            skip_sync: false,
            rephrase_if_younger_than_days: None,
            rephrase_cache_days: None,
            anki_connect_url: crate::anki::DEFAULT_URL.to_string(),
            max_wait_seconds: 60,
        }
    }
}

/// When to rephrase and how long to keep rephrasings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RephraseSettings {
    /// Only prompts from documents modified within this many days are rephrased
    pub max_age_days: u32,
    /// Cached rephrasings are reused for this many days
    pub cache_days: u32,
}

impl RephraseSettings {
    pub fn max_age(&self) -> ChronoDuration {
        ChronoDuration::days(i64::from(self.max_age_days))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.cache_days) * 86_400)
    }
}

/// Everything one run needs, checked up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub base_deck: String,
    pub policy: SyncPolicy,
    pub dry_run: bool,
    pub skip_sync: bool,
    pub watch: Option<Duration>,
    pub rephrase: Option<RephraseSettings>,
    pub anki_connect_url: String,
    pub max_wait: Duration,
}

fn positive_days(option: &'static str, value: i64) -> Result<u32, ValidationError> {
    if value <= 0 {
        return Err(ValidationError::NotPositive { option, value });
    }
    u32::try_from(value).map_err(|_| ValidationError::NotPositive { option, value })
}

impl RunConfig {
    pub fn from_options(options: RunOptions) -> Result<Self, ValidationError> {
        let policy = SyncPolicy::new(options.max_deletions_per_run, options.push_all)?;

        let rephrase = match (options.rephrase_if_younger_than_days, options.rephrase_cache_days) {
            (None, None) => None,
            (Some(max_age), Some(cache)) => Some(RephraseSettings {
                max_age_days: positive_days("rephrase_if_younger_than_days", max_age)?,
                cache_days: positive_days("rephrase_cache_days", cache)?,
            }),
            _ => return Err(ValidationError::RephraseOptionsMismatch),
        };

        if options.deck_name.trim().is_empty() {
            return Err(ValidationError::EmptyDeckName);
        }

        if !options.input_dir.is_dir() {
            return Err(ValidationError::InputNotADirectory(options.input_dir));
        }

        let watch = match options.watch_seconds {
            Some(0) => {
                return Err(ValidationError::NotPositive {
                    option: "watch_seconds",
                    value: 0,
                })
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        Ok(Self {
            input_dir: options.input_dir,
            base_deck: options.deck_name,
            policy,
            dry_run: options.dry_run,
            skip_sync: options.skip_sync,
            watch,
            rephrase,
            anki_connect_url: options.anki_connect_url,
            max_wait: Duration::from_secs(options.max_wait_seconds),
        })
    }

    /// `<input_dir>/.memium`
    pub fn state_dir(&self) -> PathBuf {
        state_dir(&self.input_dir)
    }
}

pub fn state_dir(input_dir: &Path) -> PathBuf {
    input_dir.join(STATE_DIR)
}
