use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{AnkiConnectClient, AnkiConnectError};
use super::notes::{self, NoteModel, CLOZE_MODEL, QA_MODEL};
use crate::prompts::Prompt;
use crate::sync::deck::is_managed;
use crate::sync::{ApplyResult, CollectionError, RemoteCardRecord, RemoteCollection, SyncPlan};

impl From<AnkiConnectError> for CollectionError {
    fn from(e: AnkiConnectError) -> Self {
        if e.is_connection_error() {
            CollectionError::Unavailable(e.to_string())
        } else {
            CollectionError::Remote(e.to_string())
        }
    }
}

/// Seconds between liveness checks while waiting for Anki to start
const WAIT_INTERVAL_SECS: u64 = 5;

/// Liveness checks that fit in `max_wait`, at least one
fn wait_attempts(max_wait: Duration) -> u32 {
    (max_wait.as_secs() / WAIT_INTERVAL_SECS) as u32 + 1
}

/// A live Anki collection reached through AnkiConnect
pub struct AnkiConnectCollection {
    client: AnkiConnectClient,
    wait_attempts: u32,
}

impl AnkiConnectCollection {
    /// Wait up to `max_wait` for AnkiConnect, then make sure both note types
    /// exist and are current. The same wait applies when the connection drops
    /// during a run.
    pub async fn connect(client: AnkiConnectClient, max_wait: Duration) -> Result<Self, AnkiConnectError> {
        let collection = Self {
            client,
            wait_attempts: wait_attempts(max_wait),
        };
        collection.reconnect().await?;
        collection.ensure_models().await?;
        Ok(collection)
    }

    async fn reconnect(&self) -> Result<u32, AnkiConnectError> {
        self.client
            .wait_until_live(Duration::from_secs(WAIT_INTERVAL_SECS), self.wait_attempts)
            .await
    }

    async fn ensure_models(&self) -> Result<(), AnkiConnectError> {
        let existing = self.client.model_names().await?;

        for model in [&QA_MODEL, &CLOZE_MODEL] {
            if existing.iter().any(|name| name == model.name) {
                log::debug!("Updating templates and styling of {}", model.name);
                self.client.update_model_templates(model.update_templates_params()).await?;
                self.client.update_model_styling(model.update_styling_params()).await?;
            } else {
                log::info!("Creating note type {}", model.name);
                self.client.create_model(model.create_params()).await?;
            }
        }

        Ok(())
    }

    async fn fetch_records(&self, deck: &str) -> Result<Vec<RemoteCardRecord>, AnkiConnectError> {
        let ids = self.client.find_notes(&notes::deck_query(deck)).await?;
        let infos = self.client.notes_info(&ids).await?;

        let mut records = Vec::with_capacity(infos.len());
        for info in &infos {
            match notes::record_from_note(info) {
                Some(record) => records.push(record),
                None => log::debug!("Ignoring note {} in {}: no {} field", info.note_id, deck, notes::UUID_FIELD),
            }
        }

        Ok(records)
    }

    async fn apply_once(&self, deck: &str, plan: &SyncPlan) -> Result<ApplyResult, AnkiConnectError> {
        let mut result = ApplyResult::default();

        // Re-read the deck so a retried add updates instead of duplicating
        let existing: HashMap<u64, u64> = if plan.to_add().is_empty() {
            HashMap::new()
        } else {
            self.client.create_deck(deck).await?;
            self.fetch_records(deck)
                .await?
                .into_iter()
                .map(|r| (r.scheduling_id, r.handle))
                .collect()
        };

        for write in plan_writes(&existing, plan) {
            let outcome = match write {
                NoteWrite::Add(prompt) => self
                    .client
                    .add_note(&notes::new_note(deck, prompt))
                    .await
                    .map(|_| Written::Added),
                NoteWrite::Update { handle, prompt } => self
                    .client
                    .update_note_fields(handle, &notes::note_fields(prompt))
                    .await
                    .map(|()| Written::Updated),
            };
            tally(&mut result, write.label(), outcome)?;
        }

        let handles: Vec<u64> = plan.to_delete().iter().map(|r| r.handle).collect();
        let outcome = self
            .client
            .delete_notes(&handles)
            .await
            .map(|()| Written::Deleted(handles.len()));
        tally(&mut result, format!("delete {} notes", handles.len()), outcome)?;

        Ok(result)
    }
}

#[async_trait]
impl RemoteCollection for AnkiConnectCollection {
    async fn managed_decks(&self, base_deck: &str) -> Result<Vec<String>, CollectionError> {
        let names = retry_after_reconnect(
            move || self.client.deck_names(),
            move || self.reconnect(),
        )
        .await?;
        Ok(names.into_iter().filter(|name| is_managed(base_deck, name)).collect())
    }

    async fn list_records(&self, deck: &str) -> Result<Vec<RemoteCardRecord>, CollectionError> {
        let records = retry_after_reconnect(
            move || self.fetch_records(deck),
            move || self.reconnect(),
        )
        .await?;
        Ok(records)
    }

    async fn apply(&self, deck: &str, plan: &SyncPlan) -> Result<ApplyResult, CollectionError> {
        let result = retry_after_reconnect(
            move || self.apply_once(deck, plan),
            move || self.reconnect(),
        )
        .await?;
        Ok(result)
    }
}

/// Run `op`; if AnkiConnect went away, wait for it with `reconnect` and run
/// `op` one more time.
async fn retry_after_reconnect<T, Op, OpFut, Wait, WaitFut>(
    mut op: Op,
    reconnect: Wait,
) -> Result<T, AnkiConnectError>
where
    Op: FnMut() -> OpFut,
    OpFut: Future<Output = Result<T, AnkiConnectError>>,
    Wait: FnOnce() -> WaitFut,
    WaitFut: Future<Output = Result<u32, AnkiConnectError>>,
{
    match op().await {
        Err(e) if e.is_connection_error() => {
            log::warn!("Lost connection to AnkiConnect ({}), waiting for it to come back", e);
            reconnect().await?;
            op().await
        }
        outcome => outcome,
    }
}

/// A single note write made while applying a plan
#[derive(Debug, Clone, Copy, PartialEq)]
enum NoteWrite<'a> {
    Add(&'a Prompt),
    Update { handle: u64, prompt: &'a Prompt },
}

impl NoteWrite<'_> {
    fn label(&self) -> String {
        let prompt = match self {
            NoteWrite::Add(prompt) | NoteWrite::Update { prompt, .. } => prompt,
        };
        format!("{} {}", NoteModel::for_kind(prompt.kind()).name, prompt.scheduling_id())
    }
}

/// Writes for the adds and refreshes of `plan`. Adds whose id is already in
/// `existing` (scheduling id to note id) become updates of that note.
fn plan_writes<'a>(existing: &HashMap<u64, u64>, plan: &'a SyncPlan) -> Vec<NoteWrite<'a>> {
    let adds = plan.to_add().iter().map(|prompt| match existing.get(&prompt.scheduling_id()) {
        Some(&handle) => NoteWrite::Update { handle, prompt },
        None => NoteWrite::Add(prompt),
    });
    let refreshes = plan.to_refresh().iter().map(|(prompt, record)| NoteWrite::Update {
        handle: record.handle,
        prompt,
    });

    adds.chain(refreshes).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Written {
    Added,
    Updated,
    Deleted(usize),
}

/// Count one write into `result`. Failed writes are recorded and the apply
/// continues, except for a lost connection which aborts the whole apply.
fn tally(
    result: &mut ApplyResult,
    label: String,
    outcome: Result<Written, AnkiConnectError>,
) -> Result<(), AnkiConnectError> {
    match outcome {
        Ok(Written::Added) => result.added += 1,
        Ok(Written::Updated) => result.updated += 1,
        Ok(Written::Deleted(count)) => result.deleted += count,
        Err(e) if e.is_connection_error() => return Err(e),
        Err(e) => result.errors.push(format!("{}: {}", label, e)),
    }
    Ok(())
}
