use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// AnkiConnect API version spoken by this client
pub const API_VERSION: u32 = 6;

pub const DEFAULT_URL: &str = "http://localhost:8765";

#[derive(Error, Debug)]
pub enum AnkiConnectError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("AnkiConnect {action} failed: {message}")]
    Api { action: String, message: String },
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("AnkiConnect at {url} did not answer after {attempts} attempts")]
    Unavailable { url: String, attempts: u32 },
}

impl AnkiConnectError {
    /// The add-on could not be reached at all, as opposed to refusing a request
    pub fn is_connection_error(&self) -> bool {
        match self {
            AnkiConnectError::Http(e) => e.is_connect() || e.is_timeout(),
            AnkiConnectError::Unavailable { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnkiConnectError>;

#[derive(Debug, Serialize)]
struct Request<'a> {
    action: &'a str,
    version: u32,
    #[serde(skip_serializing_if = "Value::is_null")]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteField {
    pub value: String,
    pub order: u32,
}

/// A note as returned by `notesInfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub note_id: u64,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, NoteField>,
}

impl NoteInfo {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|f| f.value.as_str())
    }
}

/// A note to create with `addNote`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub deck_name: String,
    pub model_name: String,
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

/// JSON-over-HTTP client for the AnkiConnect add-on
pub struct AnkiConnectClient {
    client: Client,
    url: String,
}

impl AnkiConnectClient {
    pub fn new(url: &str) -> Result<Self> {
        let url = url.trim_end_matches('/').to_string();

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AnkiConnectError::InvalidUrl(url));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, action: &str, params: Value) -> Result<T> {
        let body = Request {
            action,
            version: API_VERSION,
            params,
        };

        log::debug!("AnkiConnect {}", action);
        let response: Response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        decode_response(action, response)
    }

    /// Version of the add-on; doubles as a liveness check
    pub async fn version(&self) -> Result<u32> {
        self.request("version", Value::Null).await
    }

    /// Poll `version` until AnkiConnect answers, sleeping `wait` between tries
    pub async fn wait_until_live(&self, wait: Duration, max_attempts: u32) -> Result<u32> {
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.version().await {
                Ok(version) => {
                    log::info!("AnkiConnect is online. Version: {}", version);
                    return Ok(version);
                }
                Err(e) => {
                    log::warn!(
                        "AnkiConnect attempt {} of {} failed, retrying in {}s: {}",
                        attempt,
                        max_attempts,
                        wait.as_secs(),
                        e
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        Err(AnkiConnectError::Unavailable {
            url: self.url.clone(),
            attempts: max_attempts,
        })
    }

    pub async fn deck_names(&self) -> Result<Vec<String>> {
        self.request("deckNames", Value::Null).await
    }

    /// Create a deck and its parents. A no-op for existing decks.
    pub async fn create_deck(&self, deck: &str) -> Result<u64> {
        self.request("createDeck", json!({ "deck": deck })).await
    }

    pub async fn model_names(&self) -> Result<Vec<String>> {
        self.request("modelNames", Value::Null).await
    }

    pub async fn create_model(&self, params: Value) -> Result<Value> {
        self.request("createModel", params).await
    }

    pub async fn update_model_templates(&self, params: Value) -> Result<()> {
        self.request("updateModelTemplates", params).await
    }

    pub async fn update_model_styling(&self, params: Value) -> Result<()> {
        self.request("updateModelStyling", params).await
    }

    pub async fn find_notes(&self, query: &str) -> Result<Vec<u64>> {
        self.request("findNotes", json!({ "query": query })).await
    }

    pub async fn notes_info(&self, note_ids: &[u64]) -> Result<Vec<NoteInfo>> {
        if note_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.request("notesInfo", json!({ "notes": note_ids })).await
    }

    pub async fn add_note(&self, note: &NewNote) -> Result<u64> {
        let mut params = serde_json::to_value(note)?;
        // Uniqueness is tracked through the UUID field, not the first field
        params["options"] = json!({ "allowDuplicate": true });
        self.request("addNote", json!({ "note": params })).await
    }

    pub async fn update_note_fields(&self, note_id: u64, fields: &BTreeMap<String, String>) -> Result<()> {
        self.request(
            "updateNoteFields",
            json!({ "note": { "id": note_id, "fields": fields } }),
        )
        .await
    }

    pub async fn delete_notes(&self, note_ids: &[u64]) -> Result<()> {
        if note_ids.is_empty() {
            return Ok(());
        }
        self.request("deleteNotes", json!({ "notes": note_ids })).await
    }
}

fn decode_response<T: DeserializeOwned>(action: &str, response: Response) -> Result<T> {
    if let Some(message) = response.error {
        return Err(AnkiConnectError::Api {
            action: action.to_string(),
            message,
        });
    }

    Ok(serde_json::from_value(response.result)?)
}
