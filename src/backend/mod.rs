//! HTTP clients for the two model-serving protocols the pipeline speaks.
//!
//! * [`ollama`]: a locally hosted Ollama server (`/api/generate`,
//!   `/api/tags`, `/api/show`).
//! * [`chat`]: any OpenAI-compatible chat-completions endpoint with bearer
//!   authentication.
//!
//! Both are thin: they build the request body, apply the per-call timeout and
//! map transport failures to [`crate::error::BackendError`]. Prompting and
//! fallback policy live in [`crate::pipeline::ocr`] and
//! [`crate::pipeline::translate`].

pub mod chat;
pub mod ollama;
