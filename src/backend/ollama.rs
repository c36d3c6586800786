//! Ollama REST client.

use crate::error::BackendError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Body of `POST /api/generate`.
#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// Sampling options forwarded to the model.
#[derive(Debug, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Reply of `POST /api/generate` with `stream: false`.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done_reason: Option<String>,
}

/// Reply of `POST /api/show`; only the fields we look at.
#[derive(Debug, Default, Deserialize)]
pub struct ModelDetails {
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl ModelDetails {
    pub fn supports_vision(&self) -> bool {
        self.capabilities.iter().any(|c| c == "vision")
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
}

/// Client for one Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /api/generate`, non-streaming.
    pub async fn generate(
        &self,
        request: &GenerateRequest<'_>,
        timeout_secs: u64,
    ) -> Result<GenerateResponse, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(
            "POST {} model={} images={} prompt_len={}",
            url,
            request.model,
            request.images.len(),
            request.prompt.len()
        );

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(timeout_secs))
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&url, timeout_secs, e))?;

        let response = check_status(response).await?;
        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| BackendError::from_reqwest(&url, timeout_secs, e))
    }

    /// `GET /api/tags`: names of locally installed models.
    pub async fn list_models(&self, timeout_secs: u64) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&url, timeout_secs, e))?;

        let tags: TagsResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::from_reqwest(&url, timeout_secs, e))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// `POST /api/show`: model metadata including capabilities.
    pub async fn show_model(
        &self,
        model: &str,
        timeout_secs: u64,
    ) -> Result<ModelDetails, BackendError> {
        let url = format!("{}/api/show", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(timeout_secs))
            .json(&serde_json::json!({ "name": model, "model": model }))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&url, timeout_secs, e))?;

        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::from_reqwest(&url, timeout_secs, e))
    }
}

/// Turn a non-success status into [`BackendError::Status`] carrying the body.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body: truncate(&body, 500),
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

/// Does an installed model name match the configured one?
///
/// `llama3.2-vision` matches `llama3.2-vision:latest`, mirroring how the
/// Ollama CLI resolves untagged names.
pub fn model_is_installed(installed: &[String], wanted: &str) -> bool {
    installed.iter().any(|name| name.contains(wanted))
}
