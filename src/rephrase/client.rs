use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::RephraseError;

pub const API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const API_VERSION: &str = "2023-06-01";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const MODEL: &str = "claude-3-5-sonnet-20241022";
const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;

/// Something that can reword a question without changing its meaning
#[async_trait]
pub trait Rephraser: Send + Sync {
    async fn rephrase(&self, question: &str, answer: &str) -> Result<String, RephraseError>;
}

/// Instruction sent along with every question
pub fn build_prompt(question: &str) -> String {
    format!(
        "<prompt>Rephrase the question. Make it brief, without changing the meaning. \
         Any term surrounded by _, like _this_, must stay surrounded by _ and not be rephrased. \
         When reasonable, put these terms in the start of the sentence.</prompt>\n\
         <question>{}</question>\n\
         <prompt>Provide only the rephrased question with no additional text or explanation.</prompt>",
        question
    )
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

/// First text block of a response, trimmed
fn response_text(response: MessagesResponse) -> Result<String, RephraseError> {
    response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .map(|block| block.text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(RephraseError::EmptyResponse)
}

/// Rephraser backed by the Anthropic Messages API
pub struct AnthropicRephraser {
    client: Client,
    api_key: String,
    url: String,
}

impl AnthropicRephraser {
    pub fn new(api_key: impl Into<String>) -> Result<Self, RephraseError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            url: API_URL.to_string(),
        })
    }

    /// Read the API key from `ANTHROPIC_API_KEY`
    pub fn from_env() -> Result<Self, RephraseError> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| RephraseError::MissingApiKey(API_KEY_ENV))?;
        Self::new(key)
    }
}

#[async_trait]
impl Rephraser for AnthropicRephraser {
    async fn rephrase(&self, question: &str, _answer: &str) -> Result<String, RephraseError> {
        let body = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            messages: vec![Message {
                role: "user",
                content: build_prompt(question),
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RephraseError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let rephrased = response_text(response.json().await?)?;
        log::info!("Rephrased {:?} as {:?}", question, rephrased);
        Ok(rephrased)
    }
}
