//! Direct text extraction from a page's embedded text layer.

use pdfium_render::prelude::*;
use tracing::debug;

/// Embedded text of one page, trimmed.
///
/// `None` for pages without a usable text layer (scans, image-only pages) and
/// for pages whose text layer pdfium cannot read; such pages go to OCR.
pub fn extract_page_text(page: &PdfPage<'_>) -> Option<String> {
    match page.text() {
        Ok(text) => normalise_layer_text(&text.all()),
        Err(e) => {
            debug!("Text layer unreadable: {:?}", e);
            None
        }
    }
}

/// Trim and discard whitespace-only text.
pub fn normalise_layer_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
