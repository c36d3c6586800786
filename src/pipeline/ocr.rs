//! OCR of rasterised pages with a vision-language model.
//!
//! One backend is chosen at startup from [`OcrMode`] and used for the whole
//! run. There is no retry: a failed page is recorded and the run moves on.

use crate::backend::chat::{ChatClient, ChatMessage, ChatRequest};
use crate::backend::ollama::{model_is_installed, GenerateOptions, GenerateRequest, OllamaClient};
use crate::config::{OcrMode, OptimizerConfig};
use crate::error::{BackendError, OcrError, OptimizerError};
use crate::pipeline::cleanup::clean_ocr_text;
use crate::pipeline::image::{png_data_uri, to_base64};
use crate::prompts::{CLOUD_OCR_PROMPT, LOCAL_OCR_PROMPT};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A vision model that turns a page image into text.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Short name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Check the backend is usable before the run starts.
    async fn verify(&self) -> Result<(), OptimizerError>;

    /// Cleaned text of the image at `image_path`.
    async fn extract_text(&self, image_path: &Path) -> Result<String, OcrError>;
}

async fn read_image(image_path: &Path) -> Result<Vec<u8>, OcrError> {
    tokio::fs::read(image_path)
        .await
        .map_err(|e| OcrError::ImageRead {
            path: image_path.to_path_buf(),
            source: e,
        })
}

/// Construct the backend for `config.ocr_mode`.
pub fn build_ocr_backend(config: &OptimizerConfig) -> Arc<dyn OcrBackend> {
    match config.ocr_mode {
        OcrMode::Local => Arc::new(LocalOcr::from_config(config)),
        OcrMode::Cloud => Arc::new(CloudOcr::from_config(config)),
    }
}

// ── Local (Ollama) ───────────────────────────────────────────────────────────

/// OCR through a vision model served by Ollama.
pub struct LocalOcr {
    client: OllamaClient,
    model: String,
    temperature: f32,
    num_ctx: u32,
    num_predict: u32,
    timeout_secs: u64,
    startup_check_timeout_secs: u64,
}

impl LocalOcr {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            client: OllamaClient::new(config.ollama_url.clone()),
            model: config.ocr_model.clone(),
            temperature: config.ocr_temperature,
            num_ctx: config.ocr_context_tokens,
            num_predict: config.ocr_max_tokens,
            timeout_secs: config.local_ocr_timeout_secs,
            startup_check_timeout_secs: config.startup_check_timeout_secs,
        }
    }
}

#[async_trait]
impl OcrBackend for LocalOcr {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn verify(&self) -> Result<(), OptimizerError> {
        let installed = self
            .client
            .list_models(self.startup_check_timeout_secs)
            .await
            .map_err(|e| OptimizerError::BackendUnavailable {
                backend: "Ollama".into(),
                url: self.client.base_url().to_string(),
                detail: format!("{e}. Start it with: ollama serve"),
            })?;

        if !model_is_installed(&installed, &self.model) {
            warn!(
                "Model '{}' is not installed (available: {}). Pull it with: ollama pull {}",
                self.model,
                if installed.is_empty() {
                    "none".to_string()
                } else {
                    installed.join(", ")
                },
                self.model
            );
        }

        match self.client.show_model(&self.model, self.startup_check_timeout_secs).await {
            Ok(details) if !details.supports_vision() => warn!(
                "Model '{}' does not report the 'vision' capability; OCR may return nothing",
                self.model
            ),
            Ok(_) => debug!("Model '{}' supports vision", self.model),
            Err(e) => warn!("Could not inspect model '{}': {}", self.model, e),
        }

        info!("Ollama reachable at {} (model {})", self.client.base_url(), self.model);
        Ok(())
    }

    async fn extract_text(&self, image_path: &Path) -> Result<String, OcrError> {
        let bytes = read_image(image_path).await?;
        debug!("OCR {} ({} bytes) via {}", image_path.display(), bytes.len(), self.model);

        let request = GenerateRequest {
            model: &self.model,
            prompt: LOCAL_OCR_PROMPT,
            images: vec![to_base64(&bytes)],
            stream: false,
            options: Some(GenerateOptions {
                temperature: self.temperature,
                num_ctx: Some(self.num_ctx),
                num_predict: Some(self.num_predict),
            }),
        };

        let response = self
            .client
            .generate(&request, self.timeout_secs)
            .await
            .map_err(|source| OcrError::Backend {
                backend: self.name(),
                source,
            })?;

        let text = clean_ocr_text(&response.response);
        if text.is_empty() {
            return Err(OcrError::EmptyResponse {
                backend: self.name(),
                done_reason: response.done_reason.unwrap_or_else(|| "unknown".into()),
            });
        }
        Ok(text)
    }
}

// ── Cloud (chat completions) ─────────────────────────────────────────────────

/// OCR through a hosted chat-completions model (DeepSeek by default).
pub struct CloudOcr {
    client: Option<ChatClient>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl CloudOcr {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        let client = config
            .cloud_ocr_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|key| ChatClient::new(config.cloud_ocr_url.clone(), key));
        Self {
            client,
            model: config.cloud_ocr_model.clone(),
            temperature: config.ocr_temperature,
            max_tokens: config.cloud_ocr_max_tokens,
            timeout_secs: config.cloud_ocr_timeout_secs,
        }
    }
}

#[async_trait]
impl OcrBackend for CloudOcr {
    fn name(&self) -> &'static str {
        "cloud"
    }

    async fn verify(&self) -> Result<(), OptimizerError> {
        match &self.client {
            Some(c) => {
                info!("Cloud OCR configured at {} (model {})", c.url(), self.model);
                Ok(())
            }
            None => Err(OptimizerError::MissingApiKey {
                backend: "DeepSeek".into(),
                hint: "Set DEEPSEEK_API_KEY or switch to local mode (USE_LOCAL_MODEL=true).".into(),
            }),
        }
    }

    async fn extract_text(&self, image_path: &Path) -> Result<String, OcrError> {
        let client = self.client.as_ref().ok_or_else(|| OcrError::Backend {
            backend: self.name(),
            source: BackendError::Unreachable {
                url: String::new(),
                detail: "no API key configured".into(),
            },
        })?;

        let bytes = read_image(image_path).await?;
        debug!("Cloud OCR {} ({} bytes)", image_path.display(), bytes.len());

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::user_with_image(
                png_data_uri(&bytes),
                CLOUD_OCR_PROMPT,
            )],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let content = client
            .complete(&request, self.timeout_secs)
            .await
            .map_err(|source| OcrError::Backend {
                backend: self.name(),
                source,
            })?;

        let text = clean_ocr_text(&content);
        if text.is_empty() {
            return Err(OcrError::EmptyResponse {
                backend: self.name(),
                done_reason: "unknown".into(),
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cloud_without_key_fails_verification() {
        let config = OptimizerConfig::builder()
            .ocr_mode(OcrMode::Cloud)
            .build()
            .unwrap();
        let backend = build_ocr_backend(&config);
        assert_eq!(backend.name(), "cloud");
        let err = backend.verify().await.unwrap_err();
        assert!(matches!(err, OptimizerError::MissingApiKey { .. }));
    }

    #[tokio::test]
    async fn blank_key_counts_as_missing() {
        let config = OptimizerConfig::builder()
            .ocr_mode(OcrMode::Cloud)
            .cloud_ocr_api_key("   ")
            .build()
            .unwrap();
        assert!(CloudOcr::from_config(&config).verify().await.is_err());
    }

    #[tokio::test]
    async fn cloud_without_key_refuses_pages() {
        let config = OptimizerConfig::builder()
            .ocr_mode(OcrMode::Cloud)
            .build()
            .unwrap();
        let err = CloudOcr::from_config(&config)
            .extract_text(Path::new("/nonexistent/page_1.png"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OcrError::Backend {
                backend: "cloud",
                source: BackendError::Unreachable { .. }
            }
        ));
    }

    #[tokio::test]
    async fn cloud_with_key_verifies_offline() {
        let config = OptimizerConfig::builder()
            .ocr_mode(OcrMode::Cloud)
            .cloud_ocr_api_key("sk-test")
            .build()
            .unwrap();
        assert!(CloudOcr::from_config(&config).verify().await.is_ok());
    }

    #[tokio::test]
    async fn missing_image_is_reported() {
        let config = OptimizerConfig::default();
        let backend = LocalOcr::from_config(&config);
        let err = backend
            .extract_text(Path::new("/nonexistent/page_1.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::ImageRead { .. }));
    }

    #[test]
    fn local_is_default() {
        let backend = build_ocr_backend(&OptimizerConfig::default());
        assert_eq!(backend.name(), "ollama");
    }
}
