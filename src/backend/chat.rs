//! OpenAI-compatible chat-completions client.
//!
//! Used for cloud OCR (DeepSeek) with an image part, and for cloud
//! translation (OpenAI) with plain text messages.

use crate::backend::ollama::check_status;
use crate::error::BackendError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user message carrying an image followed by an instruction.
    pub fn user_with_image(image_data_uri: String, text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_data_uri,
                    },
                },
                ContentPart::Text { text: text.into() },
            ]),
        }
    }
}

/// Either a plain string or a list of typed parts.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client bound to one endpoint and API key.
#[derive(Clone)]
pub struct ChatClient {
    url: String,
    api_key: String,
    client: Client,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ChatClient {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send the request and return the first choice's content.
    ///
    /// A missing choice or null content is [`BackendError::Malformed`]; an
    /// empty string is returned as-is for the caller to judge.
    pub async fn complete(
        &self,
        request: &ChatRequest<'_>,
        timeout_secs: u64,
    ) -> Result<String, BackendError> {
        debug!(
            "POST {} model={} messages={} max_tokens={}",
            self.url,
            request.model,
            request.messages.len(),
            request.max_tokens
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(timeout_secs))
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&self.url, timeout_secs, e))?;

        let body: ChatResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::from_reqwest(&self.url, timeout_secs, e))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::Malformed {
                detail: "response has no choices[0].message.content".into(),
            })
    }
}
