//! Pipeline stages for PDF optimisation.
//!
//! Each submodule implements one step; [`crate::optimize`] chains them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf::read_text_layer ──▶ pdf::rasterize ──▶ ocr ──▶ translate ──▶ assemble ──▶ pdf::write_document
//! (checks)   (text + page count)     (image, PNGs)     (VLM)   (optional)    (layout)     (pdfium)
//! ```
//!
//! 1. [`input`]: reject missing, unreadable, non-PDF or oversized inputs
//! 2. [`engine`]: find and bind the pdfium shared library
//! 3. [`pdf`]: the [`pdf::PdfEngine`] seam: text layer, rendering, writing;
//!    all calls run in `spawn_blocking`
//! 4. [`text`]: per-page embedded text
//! 5. [`image`]: enhancement, PNG size ceiling, base64
//! 6. [`ocr`]: vision-model OCR (Ollama or chat completions), no retry
//! 7. [`cleanup`]: deterministic fixes for model output quirks
//! 8. [`translate`]: ordered fallback translation into Spanish
//! 9. [`assemble`]: pure A4 layout with Helvetica metrics

pub mod assemble;
pub mod cleanup;
pub mod engine;
pub mod image;
pub mod input;
pub mod ocr;
pub mod pdf;
pub mod text;
pub mod translate;
