//! Configuration types for a PDF optimisation run.
//!
//! Every knob lives in [`OptimizerConfig`], built once (usually by the CLI
//! from flags and environment variables) and then handed by reference to each
//! component's constructor. Nothing reads the environment after that point, so
//! two runs with the same config behave the same way.
//!
//! Built via [`OptimizerConfig::builder()`]; the builder clamps obviously
//! out-of-range values and [`OptimizerConfigBuilder::build`] rejects the rest.

use crate::error::OptimizerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// Default vision model used for local OCR.
pub const DEFAULT_OCR_MODEL: &str = "llama3.2-vision:latest";
/// Default text model used for local translation.
pub const DEFAULT_TRANSLATION_MODEL: &str = "llama3.2:latest";
/// Cloud OCR endpoint (DeepSeek, OpenAI-compatible chat completions).
pub const DEFAULT_CLOUD_OCR_URL: &str = "https://api.deepseek.com/chat/completions";
/// Cloud OCR model.
pub const DEFAULT_CLOUD_OCR_MODEL: &str = "deepseek-chat";
/// Cloud translation endpoint.
pub const DEFAULT_CLOUD_TRANSLATION_URL: &str = "https://api.openai.com/v1/chat/completions";
/// Cloud translation model.
pub const DEFAULT_CLOUD_TRANSLATION_MODEL: &str = "gpt-4o-mini";

/// Largest accepted input document: 50 MB.
pub const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
/// Page images above this size are re-encoded before upload: 25 MB.
pub const MAX_IMAGE_BYTES: u64 = 25 * 1024 * 1024;
/// Extensions accepted as input.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "PDF"];

/// Which OCR backend serves the run. Chosen once, never switched mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrMode {
    /// Locally hosted Ollama vision model.
    #[default]
    Local,
    /// Cloud chat-completions API with a bearer token.
    Cloud,
}

impl fmt::Display for OcrMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrMode::Local => f.write_str("local"),
            OcrMode::Cloud => f.write_str("cloud"),
        }
    }
}

/// Configuration for a PDF optimisation run.
///
/// # Example
/// ```rust
/// use pdf_optimizer::{OcrMode, OptimizerConfig};
///
/// let config = OptimizerConfig::builder()
///     .ocr_mode(OcrMode::Local)
///     .ocr_model("llava:13b")
///     .dpi(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Clone)]
pub struct OptimizerConfig {
    /// OCR backend selection. Default: [`OcrMode::Local`].
    pub ocr_mode: OcrMode,

    /// Base URL of the Ollama server, without trailing slash.
    pub ollama_url: String,

    /// Vision model used for local OCR.
    pub ocr_model: String,

    /// Bearer token for the cloud OCR endpoint.
    pub cloud_ocr_api_key: Option<String>,

    /// Cloud OCR chat-completions URL.
    pub cloud_ocr_url: String,

    /// Cloud OCR model.
    pub cloud_ocr_model: String,

    /// Model used for local (fallback) translation.
    pub translation_model: String,

    /// Try the cloud translator before the local one. Default: false.
    ///
    /// Ignored, with a warning, when no `cloud_translation_api_key` is set.
    pub use_cloud_translation: bool,

    /// Bearer token for the cloud translation endpoint.
    pub cloud_translation_api_key: Option<String>,

    /// Cloud translation chat-completions URL.
    pub cloud_translation_url: String,

    /// Cloud translation model.
    pub cloud_translation_model: String,

    /// Rasterisation DPI. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Upscale, grayscale and contrast-boost page images before OCR. Default: false.
    pub enhance_images: bool,

    /// Upscale factor applied when `enhance_images` is set. Range: 1.0–4.0. Default: 1.5.
    pub image_scale_factor: f32,

    /// Page images above this many bytes are re-encoded. Default: 25 MB.
    pub max_image_bytes: u64,

    /// Inputs above this many bytes are rejected. Default: 50 MB.
    pub max_file_size: u64,

    /// Timeout for one local OCR call. Default: 600 s (local inference is slow).
    pub local_ocr_timeout_secs: u64,

    /// Timeout for one cloud OCR call. Default: 120 s.
    pub cloud_ocr_timeout_secs: u64,

    /// Timeout for one translation call on either backend. Default: 120 s.
    pub translation_timeout_secs: u64,

    /// Timeout for the startup reachability check (`/api/tags`). Default: 5 s.
    pub startup_check_timeout_secs: u64,

    /// Sampling temperature for OCR calls. Default: 0.1.
    pub ocr_temperature: f32,

    /// Sampling temperature for translation calls. Default: 0.3.
    pub translation_temperature: f32,

    /// Context window requested from Ollama for OCR. Default: 8192.
    pub ocr_context_tokens: u32,

    /// Maximum tokens generated per OCR call on Ollama. Default: 4096.
    pub ocr_max_tokens: u32,

    /// Maximum tokens generated per OCR call on the cloud API. Default: 8000.
    pub cloud_ocr_max_tokens: u32,

    /// Maximum tokens generated per translation call. Default: 4000.
    pub translation_max_tokens: u32,

    /// Where per-page progress files go. `None` keeps them inside the
    /// run-scoped temp directory, which is removed when the run ends.
    pub progress_dir: Option<PathBuf>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            ocr_mode: OcrMode::default(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ocr_model: DEFAULT_OCR_MODEL.to_string(),
            cloud_ocr_api_key: None,
            cloud_ocr_url: DEFAULT_CLOUD_OCR_URL.to_string(),
            cloud_ocr_model: DEFAULT_CLOUD_OCR_MODEL.to_string(),
            translation_model: DEFAULT_TRANSLATION_MODEL.to_string(),
            use_cloud_translation: false,
            cloud_translation_api_key: None,
            cloud_translation_url: DEFAULT_CLOUD_TRANSLATION_URL.to_string(),
            cloud_translation_model: DEFAULT_CLOUD_TRANSLATION_MODEL.to_string(),
            dpi: 200,
            enhance_images: false,
            image_scale_factor: 1.5,
            max_image_bytes: MAX_IMAGE_BYTES,
            max_file_size: MAX_FILE_SIZE,
            local_ocr_timeout_secs: 600,
            cloud_ocr_timeout_secs: 120,
            translation_timeout_secs: 120,
            startup_check_timeout_secs: 5,
            ocr_temperature: 0.1,
            translation_temperature: 0.3,
            ocr_context_tokens: 8192,
            ocr_max_tokens: 4096,
            cloud_ocr_max_tokens: 8000,
            translation_max_tokens: 4000,
            progress_dir: None,
        }
    }
}

fn redact(key: &Option<String>) -> &'static str {
    match key {
        Some(k) if !k.is_empty() => "<set>",
        _ => "<unset>",
    }
}

impl fmt::Debug for OptimizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizerConfig")
            .field("ocr_mode", &self.ocr_mode)
            .field("ollama_url", &self.ollama_url)
            .field("ocr_model", &self.ocr_model)
            .field("cloud_ocr_api_key", &redact(&self.cloud_ocr_api_key))
            .field("cloud_ocr_model", &self.cloud_ocr_model)
            .field("translation_model", &self.translation_model)
            .field("use_cloud_translation", &self.use_cloud_translation)
            .field(
                "cloud_translation_api_key",
                &redact(&self.cloud_translation_api_key),
            )
            .field("cloud_translation_model", &self.cloud_translation_model)
            .field("dpi", &self.dpi)
            .field("enhance_images", &self.enhance_images)
            .field("image_scale_factor", &self.image_scale_factor)
            .field("progress_dir", &self.progress_dir)
            .finish()
    }
}

impl OptimizerConfig {
    /// Create a new builder for `OptimizerConfig`.
    pub fn builder() -> OptimizerConfigBuilder {
        OptimizerConfigBuilder {
            config: Self::default(),
        }
    }

    /// One-line description of the OCR mode, shown by the shell at startup.
    pub fn mode_description(&self) -> String {
        match self.ocr_mode {
            OcrMode::Local => format!("Local mode (Ollama) - model: {}", self.ocr_model),
            OcrMode::Cloud => format!("Cloud mode - model: {}", self.cloud_ocr_model),
        }
    }

    /// The cloud translation key, if translation through the cloud is both
    /// requested and possible.
    pub fn cloud_translation_key(&self) -> Option<&str> {
        if !self.use_cloud_translation {
            return None;
        }
        self.cloud_translation_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Builder for [`OptimizerConfig`].
#[derive(Debug)]
pub struct OptimizerConfigBuilder {
    config: OptimizerConfig,
}

impl OptimizerConfigBuilder {
    pub fn ocr_mode(mut self, mode: OcrMode) -> Self {
        self.config.ocr_mode = mode;
        self
    }

    pub fn ollama_url(mut self, url: impl Into<String>) -> Self {
        self.config.ollama_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn cloud_ocr_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.cloud_ocr_api_key = Some(key.into());
        self
    }

    pub fn cloud_ocr_url(mut self, url: impl Into<String>) -> Self {
        self.config.cloud_ocr_url = url.into();
        self
    }

    pub fn cloud_ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.cloud_ocr_model = model.into();
        self
    }

    pub fn translation_model(mut self, model: impl Into<String>) -> Self {
        self.config.translation_model = model.into();
        self
    }

    pub fn use_cloud_translation(mut self, v: bool) -> Self {
        self.config.use_cloud_translation = v;
        self
    }

    pub fn cloud_translation_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.cloud_translation_api_key = Some(key.into());
        self
    }

    pub fn cloud_translation_url(mut self, url: impl Into<String>) -> Self {
        self.config.cloud_translation_url = url.into();
        self
    }

    pub fn cloud_translation_model(mut self, model: impl Into<String>) -> Self {
        self.config.cloud_translation_model = model.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn enhance_images(mut self, v: bool) -> Self {
        self.config.enhance_images = v;
        self
    }

    pub fn image_scale_factor(mut self, factor: f32) -> Self {
        self.config.image_scale_factor = factor;
        self
    }

    pub fn max_image_bytes(mut self, bytes: u64) -> Self {
        self.config.max_image_bytes = bytes;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn local_ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.local_ocr_timeout_secs = secs;
        self
    }

    pub fn cloud_ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.cloud_ocr_timeout_secs = secs;
        self
    }

    pub fn translation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.translation_timeout_secs = secs;
        self
    }

    pub fn startup_check_timeout_secs(mut self, secs: u64) -> Self {
        self.config.startup_check_timeout_secs = secs;
        self
    }

    pub fn progress_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.progress_dir = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OptimizerConfig, OptimizerError> {
        let c = &self.config;
        if !(72..=600).contains(&c.dpi) {
            return Err(OptimizerError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if !(1.0..=4.0).contains(&c.image_scale_factor) {
            return Err(OptimizerError::InvalidConfig(format!(
                "Image scale factor must be 1.0–4.0, got {}",
                c.image_scale_factor
            )));
        }
        if c.ollama_url.trim().is_empty() {
            return Err(OptimizerError::InvalidConfig(
                "Ollama URL must not be empty".into(),
            ));
        }
        let timeouts = [
            c.local_ocr_timeout_secs,
            c.cloud_ocr_timeout_secs,
            c.translation_timeout_secs,
            c.startup_check_timeout_secs,
        ];
        if timeouts.contains(&0) {
            return Err(OptimizerError::InvalidConfig(
                "Timeouts must be at least 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
