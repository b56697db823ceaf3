mod app;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;

use memium_lib::config::{RunOptions, DEFAULT_DECK_NAME};

#[derive(Parser)]
#[command(name = "memium", about = "Sync prompts from markdown notes into Anki", version)]
struct Cli {
    /// Where to extract prompts from
    #[arg(long)]
    input_dir: PathBuf,

    /// Keep running, updating the Anki deck every N seconds
    #[arg(long)]
    watch_seconds: Option<u64>,

    /// Anki path to deck, e.g. 'Parent deck::Child deck'
    #[arg(long, default_value = DEFAULT_DECK_NAME)]
    deck_name: String,

    /// Maximum number of cards to delete per deck and run
    #[arg(long, default_value_t = 50, allow_negative_numbers = true)]
    max_deletions_per_run: i64,

    /// Push all prompts, not just the diff. Does not change scheduling or delete anything extra.
    #[arg(long)]
    push_all: bool,

    /// Don't update Anki, just log what would happen
    #[arg(long)]
    dry_run: bool,

    /// Skip all syncing
    #[arg(long)]
    skip_sync: bool,

    /// Rephrase prompts whose documents were modified within the last N days
    #[arg(long, allow_negative_numbers = true)]
    rephrase_if_younger_than_days: Option<i64>,

    /// Cache rephrased prompts for N days
    #[arg(long, allow_negative_numbers = true)]
    rephrase_cache_days: Option<i64>,

    /// AnkiConnect endpoint
    #[arg(long, default_value = memium_lib::anki::DEFAULT_URL)]
    anki_connect_url: String,

    /// How long to wait for AnkiConnect to come online
    #[arg(long, default_value_t = 60)]
    max_wait_seconds: u64,

    /// Report format
    #[arg(long, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            input_dir: self.input_dir.clone(),
            watch_seconds: self.watch_seconds,
            deck_name: self.deck_name.clone(),
            max_deletions_per_run: self.max_deletions_per_run,
            push_all: self.push_all,
            dry_run: self.dry_run,
            skip_sync: self.skip_sync,
            rephrase_if_younger_than_days: self.rephrase_if_younger_than_days,
            rephrase_cache_days: self.rephrase_cache_days,
            anki_connect_url: self.anki_connect_url.clone(),
            max_wait_seconds: self.max_wait_seconds,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();

    let app = app::App::new(cli.run_options(), cli.format.clone(), use_color)?;
    app.run().await
}
