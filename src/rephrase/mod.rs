//! Optional rewording of recently edited questions before they are synced.
//!
//! Only the displayed question changes. Identities are computed from the
//! original text, so rephrasing never moves a card's scheduling.

pub mod cache;
pub mod client;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use cache::RephraseCache;
pub use client::{AnthropicRephraser, Rephraser};

use crate::config::RephraseSettings;
use crate::prompts::{Prompt, PromptKind};

#[derive(Error, Debug)]
pub enum RephraseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Empty response from language model")]
    EmptyResponse,
    #[error("Environment variable {0} is not set")]
    MissingApiKey(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A QA prompt from a document modified after `now - max_age`
fn should_rephrase(prompt: &Prompt, settings: &RephraseSettings, now: DateTime<Utc>) -> bool {
    if prompt.kind() != PromptKind::Qa {
        return false;
    }
    match prompt.provenance() {
        Some(provenance) => provenance.last_modified > now - settings.max_age(),
        None => false,
    }
}

/// Rephrase eligible prompts, consulting `cache` first.
///
/// Prompts keep their input order. A failed call is logged and the prompt is
/// kept unchanged.
pub async fn rephrase_prompts(
    prompts: Vec<Prompt>,
    rephraser: &dyn Rephraser,
    cache: &mut RephraseCache,
    settings: &RephraseSettings,
    now: DateTime<Utc>,
) -> Vec<Prompt> {
    let eligible = prompts
        .iter()
        .filter(|p| should_rephrase(p, settings, now))
        .count();
    log::info!("Found {} prompts to rephrase", eligible);

    let mut done = 0;
    let mut out = Vec::with_capacity(prompts.len());

    for prompt in prompts {
        if !should_rephrase(&prompt, settings, now) {
            out.push(prompt);
            continue;
        }

        let (question, answer) = match (prompt.question(), prompt.answer()) {
            (Some(q), Some(a)) => (q.to_string(), a.to_string()),
            _ => {
                out.push(prompt);
                continue;
            }
        };

        let rephrased = match cache.get(&question, &answer, now) {
            Some(hit) => Some(hit.to_string()),
            None => match rephraser.rephrase(&question, &answer).await {
                Ok(text) => {
                    cache.insert(&question, &answer, text.clone(), now);
                    Some(text)
                }
                Err(e) => {
                    log::warn!("Could not rephrase {:?}, keeping original: {}", question, e);
                    None
                }
            },
        };

        done += 1;
        log::debug!("Rephrased {} of {}", done, eligible);

        out.push(match rephrased {
            Some(text) => prompt.with_rephrased_question(text),
            None => prompt,
        });
    }

    out
}
