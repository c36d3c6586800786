//! Translation of page texts into Spanish.
//!
//! [`Translator`] walks an ordered list of [`TranslationBackend`]s and takes
//! the first answer that is non-empty and differs from the input. When every
//! backend fails, or they all hand the text back unchanged, the original text
//! is returned as-is: translation never fails a run.

use crate::backend::chat::{ChatClient, ChatMessage, ChatRequest};
use crate::backend::ollama::{GenerateOptions, GenerateRequest, OllamaClient};
use crate::config::OptimizerConfig;
use crate::error::TranslationError;
use crate::prompts::{local_translation_prompt, translation_user_prompt, TRANSLATION_SYSTEM_PROMPT};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One way of translating text.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(&self, text: &str) -> Result<String, TranslationError>;
}

// ── Cloud ────────────────────────────────────────────────────────────────────

/// Chat-completions translation (OpenAI by default).
pub struct CloudTranslation {
    client: ChatClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl CloudTranslation {
    pub fn new(config: &OptimizerConfig, api_key: &str) -> Self {
        Self {
            client: ChatClient::new(config.cloud_translation_url.clone(), api_key),
            model: config.cloud_translation_model.clone(),
            temperature: config.translation_temperature,
            max_tokens: config.translation_max_tokens,
            timeout_secs: config.translation_timeout_secs,
        }
    }
}

#[async_trait]
impl TranslationBackend for CloudTranslation {
    fn name(&self) -> &'static str {
        "cloud"
    }

    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::system(TRANSLATION_SYSTEM_PROMPT),
                ChatMessage::user(translation_user_prompt(text)),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        self.client
            .complete(&request, self.timeout_secs)
            .await
            .map_err(|source| TranslationError::Backend {
                backend: self.name(),
                source,
            })
    }
}

// ── Local ────────────────────────────────────────────────────────────────────

/// Text-only generation on the local Ollama server.
pub struct LocalTranslation {
    client: OllamaClient,
    model: String,
    temperature: f32,
    num_predict: u32,
    timeout_secs: u64,
}

impl LocalTranslation {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            client: OllamaClient::new(config.ollama_url.clone()),
            model: config.translation_model.clone(),
            temperature: config.translation_temperature,
            num_predict: config.translation_max_tokens,
            timeout_secs: config.translation_timeout_secs,
        }
    }
}

#[async_trait]
impl TranslationBackend for LocalTranslation {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        let prompt = local_translation_prompt(text);
        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            images: Vec::new(),
            stream: false,
            options: Some(GenerateOptions {
                temperature: self.temperature,
                num_ctx: None,
                num_predict: Some(self.num_predict),
            }),
        };
        self.client
            .generate(&request, self.timeout_secs)
            .await
            .map(|r| r.response)
            .map_err(|source| TranslationError::Backend {
                backend: self.name(),
                source,
            })
    }
}

// ── Translator ───────────────────────────────────────────────────────────────

/// Ordered fallback over translation backends.
#[derive(Clone)]
pub struct Translator {
    backends: Vec<Arc<dyn TranslationBackend>>,
}

impl Translator {
    pub fn new(backends: Vec<Arc<dyn TranslationBackend>>) -> Self {
        Self { backends }
    }

    /// `[cloud (if enabled and keyed), local]`.
    pub fn from_config(config: &OptimizerConfig) -> Self {
        let mut backends: Vec<Arc<dyn TranslationBackend>> = Vec::new();

        match config.cloud_translation_key() {
            Some(key) => backends.push(Arc::new(CloudTranslation::new(config, key))),
            None if config.use_cloud_translation => {
                warn!("Cloud translation requested but OPENAI_API_KEY is not set; using local model only")
            }
            None => {}
        }
        backends.push(Arc::new(LocalTranslation::from_config(config)));

        Self::new(backends)
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Translate `text`, falling back through the backends. Never fails.
    pub async fn translate(&self, text: &str, page: Option<usize>) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let label = page.map(|p| format!("page {p}")).unwrap_or_else(|| "text".into());
        debug!(
            "Translating {} ({} chars, likely Spanish: {})",
            label,
            text.chars().count(),
            is_likely_spanish(text)
        );

        for backend in &self.backends {
            match accept(backend.name(), text, backend.translate(text).await) {
                Ok(translated) => {
                    info!("Translated {} with {}", label, backend.name());
                    return translated;
                }
                Err(e) => warn!("Translation of {} via {} rejected: {}", label, backend.name(), e),
            }
        }

        debug!("No backend changed {}; keeping original", label);
        text.to_string()
    }
}

fn accept(
    backend: &'static str,
    input: &str,
    result: Result<String, TranslationError>,
) -> Result<String, TranslationError> {
    let out = result?;
    let out = out.trim();
    if out.is_empty() {
        return Err(TranslationError::Empty { backend });
    }
    if out == input.trim() {
        return Err(TranslationError::Unchanged { backend });
    }
    Ok(out.to_string())
}

// ── Language heuristic ───────────────────────────────────────────────────────

/// Matched as substrings, so inflections like "demás" also count.
const SPANISH_EXCLUSIVE: &[&str] = &[
    "señor", "año", "años", "niño", "sí", "qué", "cuál", "también", "más", "está", "están",
    "según", "además", "después", "través", "país", "había", "habían",
];

const SPANISH_COMMON: &[&str] = &[
    "el", "la", "de", "que", "y", "en", "un", "una", "los", "las", "del", "al", "con", "por",
    "para", "su", "sus", "este", "esta", "ese", "esa", "pero", "como", "todo", "todos", "si",
    "cuando", "donde", "muy", "sin", "sobre", "entre", "hasta", "desde",
];

const ENGLISH_WORDS: &[&str] = &[
    "the", "and", "or", "is", "are", "was", "were", "have", "has", "been", "this", "that", "with",
    "from", "they", "their", "there", "invoice", "date", "number", "amount", "total", "product",
    "service", "thank", "you", "your", "our", "business", "company",
];

const SPANISH_CHARS: &[char] = &['á', 'é', 'í', 'ó', 'ú', 'ñ', 'ü', '¿', '¡'];

/// Lexical guess at whether `text` is already Spanish.
///
/// Looks at the first 50 non-blank lines and at most 200 words. Fewer than
/// five words is never Spanish. Advisory only: it is logged, never used to
/// skip translation.
pub fn is_likely_spanish(text: &str) -> bool {
    let sample = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(50)
        .collect::<Vec<_>>()
        .join(" ");
    let lower = sample.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().take(200).collect();
    if words.len() < 5 {
        return false;
    }

    let exclusive = words
        .iter()
        .filter(|w| SPANISH_EXCLUSIVE.iter().any(|e| w.contains(e)))
        .count();
    if exclusive > 0 || sample.contains(SPANISH_CHARS) {
        return true;
    }

    let total = words.len() as f32;
    let english = words.iter().filter(|w| ENGLISH_WORDS.contains(w)).count();
    if english as f32 > total * 0.2 {
        return false;
    }

    let common = words.iter().filter(|w| SPANISH_COMMON.contains(w)).count();
    common as f32 > total * 0.3 && english < common
}
