//! Text completion over an OpenAI-compatible chat API

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::chat::Message;
use crate::{Error, Result};

/// Default completion API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// Default completion model
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Turns an ordered message list into a single reply
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Request one completion
    ///
    /// # Errors
    ///
    /// Returns error if the call fails or the response carries no reply
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Completion client for `/chat/completions` endpoints (`DeepSeek`, `OpenAI`, ...)
#[derive(Debug)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiCompatClient {
    /// Create a client for the given API base URL
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(base_url: &str, api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("completion API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    /// Model identifier sent with each request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("completion request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("completion API error {status}: {body}")));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("malformed completion response: {e}")))?;

        extract_reply(body)
    }
}

/// Pull the first choice's text out of a completion response
fn extract_reply(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Upstream("completion response had no content".to_string()))
}
