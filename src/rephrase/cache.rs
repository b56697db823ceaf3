//! Persistent store of rephrased questions, bucketed by time

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::RephraseError;

pub const CACHE_FILE: &str = "rephrase_cache.json";

/// Bump to invalidate every cached rephrasing
pub const CACHE_VERSION: &str = "2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub question: String,
    pub rephrased: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    version: String,
    entries: BTreeMap<String, CacheEntry>,
}

/// Rephrasings keyed by question, answer and the TTL bucket they were made in.
/// Entries from earlier buckets are never read again and are dropped on save.
pub struct RephraseCache {
    path: PathBuf,
    ttl: Duration,
    entries: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

impl RephraseCache {
    /// Open the cache at `path`. A missing file yields an empty cache;
    /// an unreadable one is logged and replaced.
    pub fn load(path: impl Into<PathBuf>, ttl: Duration) -> Result<Self, RephraseError> {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CacheFile>(&content) {
                Ok(file) if file.version == CACHE_VERSION => file.entries,
                Ok(file) => {
                    log::info!("Discarding rephrase cache version {}", file.version);
                    BTreeMap::new()
                }
                Err(e) => {
                    log::warn!("Ignoring corrupt rephrase cache at {:?}: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        log::debug!("Loaded {} cached rephrasings from {:?}", entries.len(), path);

        Ok(Self {
            path,
            ttl,
            entries,
            dirty: false,
        })
    }

    /// In-memory cache that is never written to disk
    pub fn ephemeral(ttl: Duration) -> Self {
        Self {
            path: PathBuf::new(),
            ttl,
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the TTL bucket containing `now`
    pub fn epoch(&self, now: DateTime<Utc>) -> i64 {
        let ttl = self.ttl.as_secs().max(1) as i64;
        now.timestamp().div_euclid(ttl)
    }

    fn key(&self, question: &str, answer: &str, now: DateTime<Utc>) -> String {
        let epoch = self.epoch(now).to_string();
        let mut hasher = Sha256::new();
        for part in [question, answer, epoch.as_str(), CACHE_VERSION] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, question: &str, answer: &str, now: DateTime<Utc>) -> Option<&str> {
        self.entries
            .get(&self.key(question, answer, now))
            .map(|entry| entry.rephrased.as_str())
    }

    pub fn insert(&mut self, question: &str, answer: &str, rephrased: String, now: DateTime<Utc>) {
        let key = self.key(question, answer, now);
        self.entries.insert(
            key,
            CacheEntry {
                question: question.to_string(),
                rephrased,
                created_at: now,
            },
        );
        self.dirty = true;
    }

    /// Write the cache back, keeping only entries from the current bucket
    pub fn save(&mut self, now: DateTime<Utc>) -> Result<(), RephraseError> {
        if self.path.as_os_str().is_empty() || !self.dirty {
            return Ok(());
        }

        let current = self.epoch(now);
        let ttl = self.ttl.as_secs().max(1) as i64;
        self.entries
            .retain(|_, entry| entry.created_at.timestamp().div_euclid(ttl) == current);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = CacheFile {
            version: CACHE_VERSION.to_string(),
            entries: self.entries.clone(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        self.dirty = false;

        log::debug!("Saved {} rephrasings to {:?}", self.entries.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(86_400);

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_hit_within_epoch() {
        let mut cache = RephraseCache::ephemeral(DAY);
        cache.insert("Q", "A", "Rephrased".to_string(), at(10));

        assert_eq!(cache.get("Q", "A", at(86_399)), Some("Rephrased"));
        assert_eq!(cache.get("Q", "other answer", at(10)), None);
    }

    #[test]
    fn test_miss_after_epoch_rolls_over() {
        let mut cache = RephraseCache::ephemeral(DAY);
        cache.insert("Q", "A", "Rephrased".to_string(), at(10));

        assert_eq!(cache.epoch(at(86_399)), 0);
        assert_eq!(cache.epoch(at(86_400)), 1);
        assert_eq!(cache.get("Q", "A", at(86_400)), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".memium").join(CACHE_FILE);

        let mut cache = RephraseCache::load(&path, DAY).unwrap();
        assert!(cache.is_empty());
        cache.insert("Q", "A", "Rephrased".to_string(), at(100));
        cache.save(at(200)).unwrap();

        let reloaded = RephraseCache::load(&path, DAY).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("Q", "A", at(300)), Some("Rephrased"));
    }

    #[test]
    fn test_save_drops_expired_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CACHE_FILE);

        let mut cache = RephraseCache::load(&path, DAY).unwrap();
        cache.insert("Old", "A", "Old rephrasing".to_string(), at(10));
        cache.insert("New", "A", "New rephrasing".to_string(), at(90_000));
        cache.save(at(90_000)).unwrap();

        let reloaded = RephraseCache::load(&path, DAY).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("New", "A", at(90_001)), Some("New rephrasing"));
    }

    #[test]
    fn test_corrupt_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CACHE_FILE);
        fs::write(&path, "{ not json").unwrap();

        let cache = RephraseCache::load(&path, DAY).unwrap();
        assert!(cache.is_empty());
    }
}
