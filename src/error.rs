//! Error types for the pdf-optimizer library.
//!
//! The taxonomy follows the blast radius of each failure:
//!
//! * [`OptimizerError`] is **fatal**: the run cannot start or cannot finish
//!   (missing input, unreadable PDF, backend unreachable in the configured
//!   mode, output not writable). Returned as `Err` from
//!   [`crate::optimize::PdfOptimizer::optimize`].
//!
//! * [`PageError`] is **non-fatal**: one page could not be OCR'd. Stored on
//!   the page's [`crate::output::PageRecord`]; the page index is listed in
//!   [`crate::output::ProcessingResult::failed_pages`] and the run continues.
//!
//! * [`OcrError`] / [`TranslationError`]: what a single backend call
//!   reports. OCR errors are turned into a [`PageError`] by the orchestrator;
//!   translation errors never leave the translator (it degrades to returning
//!   the original text).
//!
//! * [`BackendError`]: the shared HTTP layer underneath both clients.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-optimizer library.
#[derive(Debug, Error)]
pub enum OptimizerError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The file name does not carry one of the supported extensions.
    #[error("Unsupported file extension for '{path}' (expected one of: {expected})")]
    UnsupportedExtension { path: PathBuf, expected: String },

    /// The input is bigger than the configured maximum.
    #[error("'{path}' is {size} bytes, above the {limit} byte limit")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
The page rasteriser needs a pdfium shared library. Either:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n\
  • Unpack pdfium next to the binary (./pdfium/lib or ./pdfium/bin).\n\
  • Install libpdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Backend errors ────────────────────────────────────────────────────
    /// A backend required by the configured mode cannot be reached.
    #[error("Cannot connect to {backend} at {url}: {detail}")]
    BackendUnavailable {
        backend: String,
        url: String,
        detail: String,
    },

    /// A cloud backend was selected but no credential is configured.
    #[error("{backend} API key is not configured.\n{hint}")]
    MissingApiKey { backend: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write one of the output files.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored on [`crate::output::PageRecord`] when OCR of that page fails.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// No rasterised image exists for the page.
    #[error("Page {page}: no rendered image available")]
    MissingImage { page: usize },

    /// The OCR backend returned an error.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The OCR backend did not answer in time.
    #[error("Page {page}: OCR timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// Map an OCR failure onto the page it happened on.
    pub fn from_ocr(page: usize, err: &OcrError) -> Self {
        match err {
            OcrError::Backend {
                source: BackendError::Timeout { secs, .. },
                ..
            } => PageError::Timeout {
                page,
                secs: *secs,
            },
            other => PageError::OcrFailed {
                page,
                detail: other.to_string(),
            },
        }
    }

    /// 1-based index of the failed page.
    pub fn page(&self) -> usize {
        match self {
            PageError::MissingImage { page }
            | PageError::OcrFailed { page, .. }
            | PageError::Timeout { page, .. } => *page,
        }
    }
}

/// Failure of the shared HTTP layer.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, TLS failure, ...
    #[error("cannot reach {url}: {detail}")]
    Unreachable { url: String, detail: String },

    /// The request exceeded its timeout.
    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded into the expected shape.
    #[error("malformed response: {detail}")]
    Malformed { detail: String },
}

impl BackendError {
    /// Classify a `reqwest` failure.
    pub fn from_reqwest(url: &str, secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout {
                url: url.to_string(),
                secs,
            }
        } else if err.is_decode() {
            BackendError::Malformed {
                detail: err.to_string(),
            }
        } else {
            BackendError::Unreachable {
                url: url.to_string(),
                detail: err.to_string(),
            }
        }
    }
}

/// Errors from a single OCR call.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The page image could not be read from disk.
    #[error("cannot read page image '{path}': {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transport or protocol failure.
    #[error("{backend}: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: BackendError,
    },

    /// The model answered but produced no text.
    #[error("{backend} returned an empty response (done_reason: {done_reason})")]
    EmptyResponse {
        backend: &'static str,
        done_reason: String,
    },
}

/// Errors from a single translation strategy. Never surfaced to callers of
/// [`crate::pipeline::translate::Translator`].
#[derive(Debug, Error)]
pub enum TranslationError {
    /// Transport or protocol failure.
    #[error("{backend}: {source}")]
    Backend {
        backend: &'static str,
        #[source]
        source: BackendError,
    },

    /// The model answered with nothing.
    #[error("{backend} returned an empty translation")]
    Empty { backend: &'static str },

    /// The model echoed its input back.
    #[error("{backend} returned the text unchanged")]
    Unchanged { backend: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_too_large_display() {
        let e = OptimizerError::FileTooLarge {
            path: PathBuf::from("big.pdf"),
            size: 60,
            limit: 50,
        };
        let msg = e.to_string();
        assert!(msg.contains("big.pdf"), "got: {msg}");
        assert!(msg.contains("50 byte limit"), "got: {msg}");
    }

    #[test]
    fn backend_unavailable_display() {
        let e = OptimizerError::BackendUnavailable {
            backend: "Ollama".into(),
            url: "http://localhost:11434".into(),
            detail: "connection refused".into(),
        };
        assert!(e.to_string().contains("localhost:11434"));
        assert!(e.to_string().contains("connection refused"));
    }

    #[test]
    fn timeout_maps_to_page_timeout() {
        let err = OcrError::Backend {
            backend: "ollama",
            source: BackendError::Timeout {
                url: "http://localhost:11434/api/generate".into(),
                secs: 600,
            },
        };
        assert_eq!(
            PageError::from_ocr(3, &err),
            PageError::Timeout { page: 3, secs: 600 }
        );
    }

    #[test]
    fn other_ocr_errors_map_to_ocr_failed() {
        let err = OcrError::EmptyResponse {
            backend: "ollama",
            done_reason: "length".into(),
        };
        let page = PageError::from_ocr(2, &err);
        assert_eq!(page.page(), 2);
        assert!(page.to_string().contains("done_reason: length"));
    }
}
