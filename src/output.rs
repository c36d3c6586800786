//! Records produced by a run: per-page state, output locations and the
//! final summary.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Build the text recorded for a page that could not be processed.
pub fn error_marker(detail: &str) -> String {
    format!("[ERROR: {detail}]")
}

/// Lifecycle of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageState {
    #[default]
    Pending,
    /// Embedded text was found; no OCR needed.
    TextExtracted,
    /// No embedded text; waiting for OCR.
    OcrPending,
    OcrComplete,
    OcrFailed,
    Translated,
}

/// One unit of work.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-based page number.
    pub index: usize,
    pub direct_text: Option<String>,
    pub image_path: Option<PathBuf>,
    pub ocr_text: Option<String>,
    pub translated_text: Option<String>,
    pub error: Option<PageError>,
    pub state: PageState,
}

impl PageRecord {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Text as extracted (direct or OCR), or the error marker.
    pub fn text(&self) -> String {
        if let Some(err) = &self.error {
            return error_marker(&err.to_string());
        }
        self.direct_text
            .as_deref()
            .or(self.ocr_text.as_deref())
            .unwrap_or_default()
            .to_string()
    }

    /// Translated text when present, otherwise [`Self::text`].
    pub fn final_text(&self) -> String {
        match &self.translated_text {
            Some(t) => t.clone(),
            None => self.text(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Where the outputs of a run go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    /// `<name>_optimizado.pdf`
    pub pdf: PathBuf,
    /// `<name>_texto_completo.txt`
    pub text: PathBuf,
    /// `<name>_texto_ES.txt`, written only when translation changed something.
    pub translated_text: PathBuf,
}

impl OutputPaths {
    /// Derive output names from the input file stem. Outputs land next to
    /// the input unless `out_dir` is given.
    pub fn for_input(input: &Path, out_dir: Option<&Path>) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let dir = match out_dir {
            Some(d) => d.to_path_buf(),
            None => input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        Self {
            pdf: dir.join(format!("{stem}_optimizado.pdf")),
            text: dir.join(format!("{stem}_texto_completo.txt")),
            translated_text: dir.join(format!("{stem}_texto_ES.txt")),
        }
    }
}

/// `(1 - optimized / original) * 100`, or 0 for an empty original.
pub fn compression_ratio(original_size: u64, optimized_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (1.0 - optimized_size as f64 / original_size as f64) * 100.0
}

const SEPARATOR_WIDTH: usize = 70;

/// Contents of the per-page progress file `page_N.txt`.
pub fn progress_file_contents(page: &PageRecord) -> String {
    format!("=== PÁGINA {} ===\n\n{}\n", page.index, page.text())
}

/// Consolidated text of all pages, each under a `PÁGINA N` banner.
///
/// With `translated` the banners read `PÁGINA N (ESPAÑOL)` and each page
/// contributes [`PageRecord::final_text`] instead of [`PageRecord::text`].
pub fn consolidated_text(pages: &[PageRecord], translated: bool) -> String {
    let rule = "=".repeat(SEPARATOR_WIDTH);
    let mut out = String::new();
    for page in pages {
        let (banner, body) = if translated {
            (format!("PÁGINA {} (ESPAÑOL)", page.index), page.final_text())
        } else {
            (format!("PÁGINA {}", page.index), page.text())
        };
        out.push_str(&format!("{rule}\n{banner}\n{rule}\n\n{body}\n\n"));
    }
    out
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub original_size: u64,
    pub optimized_size: u64,
    /// Percent saved; negative when the output is larger than the input.
    pub compression_ratio: f64,
    /// Always the document's page count.
    pub pages_processed: usize,
    /// 1-based indices of pages whose text is an error marker.
    pub failed_pages: Vec<usize>,
    /// Pages served from the embedded text layer.
    pub direct_pages: usize,
    /// Pages that went through OCR successfully.
    pub ocr_pages: usize,
    /// Extraction method label; always `"hybrid"` (direct text with OCR fallback).
    pub method: String,
    pub translated: bool,
    pub output_pdf: PathBuf,
    pub text_file: PathBuf,
    pub translated_text_file: Option<PathBuf>,
    /// Set only when progress files outlive the run.
    pub progress_dir: Option<PathBuf>,
    pub pages: Vec<PageRecord>,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub translation_duration_ms: u64,
}

impl ProcessingResult {
    /// No page failed.
    pub fn is_complete_success(&self) -> bool {
        self.failed_pages.is_empty()
    }

    /// Every page failed.
    pub fn is_total_failure(&self) -> bool {
        self.pages_processed > 0 && self.failed_pages.len() == self.pages_processed
    }
}
