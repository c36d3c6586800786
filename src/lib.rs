//! # pdf-optimizer
//!
//! Turn scanned or mixed-content PDFs into a compact, text-only PDF,
//! optionally translated into Spanish.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate path, magic bytes, extension, size
//!  ├─ 2. Text layer read embedded text per page (pdfium, spawn_blocking)
//!  ├─ 3. Render     rasterise pages to PNG at the configured DPI
//!  ├─ 4. OCR        pages without text → vision model (Ollama or cloud)
//!  ├─ 5. Translate  optional: cloud → local → passthrough
//!  └─ 6. Assemble   A4 Helvetica layout → new PDF + consolidated text files
//! ```
//!
//! A page whose OCR fails does not abort the run: its text becomes an
//! `[ERROR: ...]` marker and its number is listed in
//! [`ProcessingResult::failed_pages`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_optimizer::{NoopProgress, OptimizerConfig, OutputPaths, PdfOptimizer};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OptimizerConfig::default(); // local Ollama, 200 DPI
//!     let optimizer = PdfOptimizer::connect(config).await?;
//!
//!     let input = Path::new("scan.pdf");
//!     let paths = OutputPaths::for_input(input, None);
//!     let result = optimizer
//!         .optimize(input, &paths, false, Arc::new(NoopProgress))
//!         .await?;
//!
//!     eprintln!(
//!         "{} pages, {} failed, {:.1}% smaller",
//!         result.pages_processed,
//!         result.failed_pages.len(),
//!         result.compression_ratio
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-optimizer` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-optimizer = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod optimize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OcrMode, OptimizerConfig, OptimizerConfigBuilder};
pub use error::{BackendError, OcrError, OptimizerError, PageError, TranslationError};
pub use optimize::PdfOptimizer;
pub use output::{compression_ratio, OutputPaths, PageRecord, PageState, ProcessingResult};
pub use pipeline::ocr::OcrBackend;
pub use pipeline::pdf::PdfEngine;
pub use pipeline::translate::{TranslationBackend, Translator};
pub use progress::{
    NoopProgress, Progress, ProgressEstimate, ProgressEvent, ProgressSink, SharedProgress, Stage,
};
