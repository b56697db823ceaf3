use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;

use memium_lib::anki::{AnkiConnectClient, AnkiConnectCollection};
use memium_lib::config::{RunConfig, RunOptions};
use memium_lib::rephrase::AnthropicRephraser;
use memium_lib::sync::{DryRun, RemoteCollection};
use memium_lib::Pipeline;

use crate::render::terminal;
use crate::OutputFormat;

/// Validated configuration plus how to present results
pub struct App {
    pub config: RunConfig,
    pub format: OutputFormat,
    pub use_color: bool,
}

impl App {
    pub fn new(options: RunOptions, format: OutputFormat, use_color: bool) -> Result<Self> {
        let config = RunConfig::from_options(options).context("Invalid configuration")?;
        Ok(Self {
            config,
            format,
            use_color,
        })
    }

    pub async fn run(self) -> Result<()> {
        log::info!("Starting memium {}", env!("CARGO_PKG_VERSION"));

        if self.config.skip_sync {
            log::info!("Skipping sync");
            return Ok(());
        }

        let client = AnkiConnectClient::new(&self.config.anki_connect_url)
            .context("Failed to create AnkiConnect client")?;
        let collection = AnkiConnectCollection::connect(client, self.config.max_wait)
            .await
            .context("AnkiConnect is not available")?;

        if self.config.dry_run {
            self.run_with(DryRun::new(collection)).await
        } else {
            self.run_with(collection).await
        }
    }

    async fn run_with<C: RemoteCollection>(&self, collection: C) -> Result<()> {
        let mut pipeline = Pipeline::new(self.config.clone(), collection);
        if self.config.rephrase.is_some() {
            let rephraser = AnthropicRephraser::from_env().context("Rephrasing needs an API key")?;
            pipeline = pipeline.with_rephraser(Box::new(rephraser));
        }

        loop {
            let start = Instant::now();
            let report = pipeline.run_once(Utc::now()).await.context("Sync failed")?;
            self.print(&report)?;

            let Some(interval) = self.config.watch else {
                return Ok(());
            };

            log::info!(
                "Sync complete in {}s, sleeping for {}s",
                start.elapsed().as_secs(),
                interval.as_secs()
            );
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Interrupted, stopping");
                    return Ok(());
                }
            }
        }
    }

    fn print(&self, report: &memium_lib::RunReport) -> Result<()> {
        match self.format {
            OutputFormat::Plain => println!("{}", terminal::render_report(report, self.use_color)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&terminal::report_json(report))?),
        }
        Ok(())
    }
}
