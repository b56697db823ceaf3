//! One full pass: read documents, extract prompts, optionally rephrase, sync

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::RunConfig;
use crate::documents::{read_documents, IngestError};
use crate::extraction::extract_all;
use crate::prompts::Prompt;
use crate::rephrase::cache::CACHE_FILE;
use crate::rephrase::{rephrase_prompts, RephraseCache, RephraseError, Rephraser};
use crate::sync::{RemoteCollection, RunReport, SyncManager};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to read documents: {0}")]
    Ingest(#[from] IngestError),
    #[error("Rephrasing failed: {0}")]
    Rephrase(#[from] RephraseError),
}

pub struct Pipeline<C> {
    config: RunConfig,
    manager: SyncManager<C>,
    rephraser: Option<Box<dyn Rephraser>>,
}

impl<C: RemoteCollection> Pipeline<C> {
    pub fn new(config: RunConfig, collection: C) -> Self {
        let manager = SyncManager::new(collection, config.base_deck.clone(), config.policy);
        Self {
            config,
            manager,
            rephraser: None,
        }
    }

    /// Rephrase recent questions through `rephraser` when the config asks for it
    pub fn with_rephraser(mut self, rephraser: Box<dyn Rephraser>) -> Self {
        self.rephraser = Some(rephraser);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn manager(&self) -> &SyncManager<C> {
        &self.manager
    }

    /// Prompts from the input directory, rephrased if configured
    pub async fn collect_prompts(&self, now: DateTime<Utc>) -> Result<Vec<Prompt>, SyncError> {
        let documents = read_documents(&self.config.input_dir)?;
        let prompts = extract_all(&documents);

        let (settings, rephraser) = match (&self.config.rephrase, &self.rephraser) {
            (Some(settings), Some(rephraser)) => (settings, rephraser),
            (Some(_), None) => {
                log::warn!("Rephrasing is configured but no rephraser is available");
                return Ok(prompts);
            }
            _ => return Ok(prompts),
        };

        let cache_path = self.config.state_dir().join(CACHE_FILE);
        let mut cache = RephraseCache::load(cache_path, settings.cache_ttl())?;
        let prompts = rephrase_prompts(prompts, rephraser.as_ref(), &mut cache, settings, now).await;

        if let Err(e) = cache.save(now) {
            log::warn!("Could not save rephrase cache to {:?}: {}", cache.path(), e);
        }

        Ok(prompts)
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunReport, SyncError> {
        let prompts = self.collect_prompts(now).await?;
        Ok(self.manager.sync(&prompts).await)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::config::RunOptions;
    use crate::sync::collection::testing::InMemoryCollection;

    const SAMPLE: &str = "---
tags: [anki/deck/Geography]
---
Q. What is the capital of France?
A. Paris

Q. What is the capital of Norway?
A. Oslo

{Mitochondria} is the powerhouse of the cell.
";

    struct Prefixing;

    #[async_trait]
    impl Rephraser for Prefixing {
        async fn rephrase(&self, question: &str, _answer: &str) -> Result<String, RephraseError> {
            Ok(format!("Quick: {}", question))
        }
    }

    fn config(dir: &TempDir, options: RunOptions) -> RunConfig {
        RunConfig::from_options(RunOptions {
            input_dir: dir.path().to_path_buf(),
            ..options
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_sample_directory_syncs_into_deck() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sample.md"), SAMPLE).unwrap();

        let pipeline = Pipeline::new(config(&dir, RunOptions::default()), InMemoryCollection::default());
        let report = pipeline.run_once(Utc::now()).await.unwrap();

        assert_eq!(report.totals().added, 3);
        assert_eq!(
            pipeline.manager().collection().ids("Memium::Geography"),
            vec![660417571, 4397103585, 4444771840]
        );

        let again = pipeline.run_once(Utc::now()).await.unwrap();
        assert_eq!(again.skipped(), 1);
    }

    #[tokio::test]
    async fn test_rephrasing_writes_cache_and_keeps_ids() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("sample.md"), SAMPLE).unwrap();
        let options = RunOptions {
            rephrase_if_younger_than_days: Some(7),
            rephrase_cache_days: Some(1),
            ..RunOptions::default()
        };

        let pipeline = Pipeline::new(config(&dir, options), InMemoryCollection::default())
            .with_rephraser(Box::new(Prefixing));
        let prompts = pipeline.collect_prompts(Utc::now()).await.unwrap();

        let rephrased: Vec<&str> = prompts.iter().filter_map(|p| p.rephrased_question()).collect();
        assert_eq!(
            rephrased,
            vec!["Quick: What is the capital of France?", "Quick: What is the capital of Norway?"]
        );
        assert!(prompts.iter().any(|p| p.scheduling_id() == 4397103585));
        assert!(dir.path().join(".memium").join(CACHE_FILE).exists());
    }

    #[tokio::test]
    async fn test_missing_input_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config(&dir, RunOptions::default()), InMemoryCollection::default());
        drop(dir);

        assert!(matches!(pipeline.run_once(Utc::now()).await, Err(SyncError::Ingest(_))));
    }
}
