//! PDF engine: everything that touches the pdfium library.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a synchronous C++ library. Every engine call is CPU-bound and
//! may take seconds on large documents, so the async wrappers at the bottom
//! of this module move each call onto tokio's blocking pool instead of
//! stalling a runtime worker.
//!
//! The [`PdfEngine`] trait is the seam between the orchestrator and pdfium;
//! tests substitute an in-memory engine.

use crate::error::OptimizerError;
use crate::pipeline::assemble::{DocumentLayout, FontStyle};
use crate::pipeline::engine::bind_pdfium;
use crate::pipeline::image::{pixels_for, prepare, save_png, RasterSettings};
use crate::pipeline::text::extract_page_text;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Read, render and write PDFs.
pub trait PdfEngine: Send + Sync {
    /// Embedded text of every page; the length is the page count.
    fn read_text_layer(&self, pdf: &Path) -> Result<Vec<Option<String>>, OptimizerError>;

    /// Render every page to `out_dir/page_N.png` (N 1-based), calling
    /// `on_page(done, total)` after each page.
    fn rasterize(
        &self,
        pdf: &Path,
        out_dir: &Path,
        settings: &RasterSettings,
        on_page: &dyn Fn(usize, usize),
    ) -> Result<Vec<PathBuf>, OptimizerError>;

    /// Write `layout` as a new PDF at `out`, replacing it atomically.
    fn write_document(&self, layout: &DocumentLayout, out: &Path) -> Result<(), OptimizerError>;
}

/// [`PdfEngine`] backed by a bound pdfium library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    /// Locate and bind pdfium (see [`crate::pipeline::engine`]).
    pub fn new() -> Result<Self, OptimizerError> {
        Ok(Self {
            pdfium: bind_pdfium()?,
        })
    }

    fn open<'a>(&'a self, pdf: &Path) -> Result<PdfDocument<'a>, OptimizerError> {
        self.pdfium
            .load_pdf_from_file(pdf, None)
            .map_err(|e| OptimizerError::CorruptPdf {
                path: pdf.to_path_buf(),
                detail: format!("{:?}", e),
            })
    }
}

fn page_file_name(index: usize) -> String {
    format!("page_{index}.png")
}

impl PdfEngine for PdfiumEngine {
    fn read_text_layer(&self, pdf: &Path) -> Result<Vec<Option<String>>, OptimizerError> {
        let document = self.open(pdf)?;
        let texts: Vec<Option<String>> = document
            .pages()
            .iter()
            .map(|page| extract_page_text(&page))
            .collect();
        info!(
            "PDF loaded: {} pages, {} with embedded text",
            texts.len(),
            texts.iter().filter(|t| t.is_some()).count()
        );
        Ok(texts)
    }

    fn rasterize(
        &self,
        pdf: &Path,
        out_dir: &Path,
        settings: &RasterSettings,
        on_page: &dyn Fn(usize, usize),
    ) -> Result<Vec<PathBuf>, OptimizerError> {
        let document = self.open(pdf)?;
        let pages = document.pages();
        let total = pages.len() as usize;
        let mut out = Vec::with_capacity(total);

        for (idx, page) in pages.iter().enumerate() {
            let number = idx + 1;
            let width_px = pixels_for(page.width().value, settings.dpi);
            let height_px = pixels_for(page.height().value, settings.dpi);
            let render_config = PdfRenderConfig::new()
                .set_target_width(width_px as i32)
                .set_maximum_height(height_px as i32);

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                OptimizerError::RasterisationFailed {
                    page: number,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = prepare(bitmap.as_image(), settings);
            let path = out_dir.join(page_file_name(number));
            let bytes = save_png(&image, &path, settings.max_image_bytes)?;
            debug!(
                "Rendered page {} → {}x{} px, {} bytes",
                number,
                image.width(),
                image.height(),
                bytes
            );

            out.push(path);
            on_page(number, total);
        }

        Ok(out)
    }

    fn write_document(&self, layout: &DocumentLayout, out: &Path) -> Result<(), OptimizerError> {
        let pdf_err = |e: PdfiumError| OptimizerError::Internal(format!("PDF assembly: {:?}", e));

        let mut document = self.pdfium.create_new_pdf().map_err(pdf_err)?;
        let regular = document.fonts_mut().helvetica();
        let bold = document.fonts_mut().helvetica_bold();

        for layout_page in &layout.pages {
            let mut page = document
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::a4())
                .map_err(pdf_err)?;

            for line in &layout_page.lines {
                let font = match line.style {
                    FontStyle::Regular => regular,
                    FontStyle::Bold => bold,
                };
                page.objects_mut()
                    .create_text_object(
                        PdfPoints::from_mm(line.x_mm),
                        PdfPoints::from_mm(layout.height_mm - line.baseline_mm),
                        &line.text,
                        font,
                        PdfPoints::new(line.size_pt),
                    )
                    .map_err(pdf_err)?;
            }
        }

        let dir = out
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
            OptimizerError::OutputWriteFailed {
                path: out.to_path_buf(),
                source: e,
            }
        })?;
        document.save_to_file(tmp.path()).map_err(pdf_err)?;
        tmp.persist(out)
            .map_err(|e| OptimizerError::OutputWriteFailed {
                path: out.to_path_buf(),
                source: e.error,
            })?;

        info!(
            "Wrote {} ({} pages, {} lines)",
            out.display(),
            layout.pages.len(),
            layout.line_count()
        );
        Ok(())
    }
}

// ── Async wrappers ───────────────────────────────────────────────────────────

fn join_error(what: &str, e: tokio::task::JoinError) -> OptimizerError {
    OptimizerError::Internal(format!("{what} task panicked: {e}"))
}

pub async fn read_text_layer(
    engine: Arc<dyn PdfEngine>,
    pdf: PathBuf,
) -> Result<Vec<Option<String>>, OptimizerError> {
    tokio::task::spawn_blocking(move || engine.read_text_layer(&pdf))
        .await
        .map_err(|e| join_error("Text layer", e))?
}

pub async fn rasterize(
    engine: Arc<dyn PdfEngine>,
    pdf: PathBuf,
    out_dir: PathBuf,
    settings: RasterSettings,
    on_page: Box<dyn Fn(usize, usize) + Send>,
) -> Result<Vec<PathBuf>, OptimizerError> {
    tokio::task::spawn_blocking(move || engine.rasterize(&pdf, &out_dir, &settings, &*on_page))
        .await
        .map_err(|e| join_error("Render", e))?
}

pub async fn write_document(
    engine: Arc<dyn PdfEngine>,
    layout: DocumentLayout,
    out: PathBuf,
) -> Result<(), OptimizerError> {
    tokio::task::spawn_blocking(move || engine.write_document(&layout, &out))
        .await
        .map_err(|e| join_error("PDF write", e))?
}
