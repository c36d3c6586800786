//! The run orchestrator.
//!
//! [`PdfOptimizer::optimize`] drives one document through
//! `extracting → processing → translating? → saving → complete`.
//! Only setup failures are fatal; a page whose OCR fails is recorded with an
//! error marker and the run carries on with the next page.

use crate::config::{OptimizerConfig, SUPPORTED_EXTENSIONS};
use crate::error::{OptimizerError, PageError};
use crate::output::{
    compression_ratio, consolidated_text, progress_file_contents, OutputPaths, PageRecord,
    PageState, ProcessingResult,
};
use crate::pipeline::assemble::layout_document;
use crate::pipeline::image::RasterSettings;
use crate::pipeline::input::validate_input;
use crate::pipeline::ocr::{build_ocr_backend, OcrBackend};
use crate::pipeline::pdf::{self, PdfEngine, PdfiumEngine};
use crate::pipeline::translate::Translator;
use crate::progress::{ProgressEvent, SharedProgress};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extraction method reported in [`ProcessingResult::method`].
pub const METHOD_HYBRID: &str = "hybrid";

/// A configured pipeline, ready to process documents.
pub struct PdfOptimizer {
    config: OptimizerConfig,
    engine: Arc<dyn PdfEngine>,
    ocr: Arc<dyn OcrBackend>,
    translator: Translator,
}

impl PdfOptimizer {
    /// Bind pdfium, build the OCR backend for the configured mode and verify
    /// it, and set up the translator.
    pub async fn connect(config: OptimizerConfig) -> Result<Self, OptimizerError> {
        let engine: Arc<dyn PdfEngine> = Arc::new(PdfiumEngine::new()?);
        let ocr = build_ocr_backend(&config);
        ocr.verify().await?;
        let translator = Translator::from_config(&config);
        info!(
            "{}; translation via {}",
            config.mode_description(),
            translator.backend_names().join(" → ")
        );
        Ok(Self::from_parts(config, engine, ocr, translator))
    }

    /// Assemble from explicit parts. No verification is performed.
    pub fn from_parts(
        config: OptimizerConfig,
        engine: Arc<dyn PdfEngine>,
        ocr: Arc<dyn OcrBackend>,
        translator: Translator,
    ) -> Self {
        Self {
            config,
            engine,
            ocr,
            translator,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn raster_settings(&self) -> RasterSettings {
        RasterSettings {
            dpi: self.config.dpi,
            enhance: self.config.enhance_images,
            scale_factor: self.config.image_scale_factor,
            max_image_bytes: self.config.max_image_bytes,
        }
    }

    /// Process `input` and write the outputs named by `paths`.
    pub async fn optimize(
        &self,
        input: &Path,
        paths: &OutputPaths,
        translate: bool,
        progress: SharedProgress,
    ) -> Result<ProcessingResult, OptimizerError> {
        let total_start = Instant::now();
        info!("Optimizing {}", input.display());

        // ── Step 1: Validate input ───────────────────────────────────────────
        let validated = validate_input(input, SUPPORTED_EXTENSIONS, self.config.max_file_size)?;

        // ── Step 2: Run directory ────────────────────────────────────────────
        let run_dir = tempfile::Builder::new()
            .prefix("pdf-optimizer-")
            .tempdir()
            .map_err(|e| OptimizerError::Internal(format!("cannot create run directory: {e}")))?;
        let progress_dir = self
            .config
            .progress_dir
            .clone()
            .unwrap_or_else(|| run_dir.path().join("progress"));
        create_dir(&progress_dir).await?;
        debug!(
            "Run directory {}, progress files in {}",
            run_dir.path().display(),
            progress_dir.display()
        );

        // ── Step 3: Text layer and page count ────────────────────────────────
        let direct_texts =
            pdf::read_text_layer(self.engine.clone(), validated.path.clone()).await?;
        let total = direct_texts.len();

        // ── Step 4: Rasterise ────────────────────────────────────────────────
        progress.emit(ProgressEvent::extracting(0, total, "Extracting page images"));
        let render_start = Instant::now();
        let sink = progress.clone();
        let images = pdf::rasterize(
            self.engine.clone(),
            validated.path.clone(),
            run_dir.path().to_path_buf(),
            self.raster_settings(),
            Box::new(move |done, total| {
                sink.emit(ProgressEvent::extracting(
                    done,
                    total,
                    format!("Rendered page {done}/{total}"),
                ))
            }),
        )
        .await?;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        info!("Rendered {} pages in {}ms", images.len(), render_duration_ms);

        // ── Step 5: Per-page text ────────────────────────────────────────────
        let mut pages = Vec::with_capacity(total);
        let mut ocr_duration_ms = 0u64;

        for (idx, direct) in direct_texts.into_iter().enumerate() {
            let number = idx + 1;
            progress.emit(ProgressEvent::processing(
                idx,
                total,
                format!("Processing page {number}/{total}"),
            ));

            let mut page = PageRecord::new(number);
            page.image_path = images.get(idx).cloned();

            match direct {
                Some(text) => {
                    info!("Page {}: embedded text ({} chars)", number, text.chars().count());
                    page.direct_text = Some(text);
                    page.state = PageState::TextExtracted;
                }
                None => {
                    page.state = PageState::OcrPending;
                    let ocr_start = Instant::now();
                    self.ocr_page(&mut page).await;
                    ocr_duration_ms += ocr_start.elapsed().as_millis() as u64;
                }
            }

            write_text(
                &progress_dir.join(format!("page_{number}.txt")),
                &progress_file_contents(&page),
            )
            .await?;
            pages.push(page);
        }

        // ── Step 6: Translate ────────────────────────────────────────────────
        let translation_start = Instant::now();
        let mut translated_any = false;
        if translate {
            for (idx, page) in pages.iter_mut().enumerate() {
                progress.emit(ProgressEvent::translating(
                    idx,
                    total,
                    format!("Translating page {}/{}", page.index, total),
                ));
                if page.is_failed() {
                    continue;
                }
                let original = page.text();
                let translated = self.translator.translate(&original, Some(page.index)).await;
                if translated != original {
                    page.translated_text = Some(translated);
                    page.state = PageState::Translated;
                    translated_any = true;
                }
            }
        }
        let translation_duration_ms = if translate {
            translation_start.elapsed().as_millis() as u64
        } else {
            0
        };

        // ── Step 7: Save ─────────────────────────────────────────────────────
        progress.emit(ProgressEvent::saving(0, 1, "Saving optimized PDF"));
        if let Some(parent) = paths.pdf.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir(parent).await?;
        }

        // A translated run drops the title even when every page came back
        // unchanged; the Spanish text file needs at least one changed page.
        let texts: Vec<String> = pages
            .iter()
            .map(|p| if translate { p.final_text() } else { p.text() })
            .collect();
        let layout = layout_document(&texts, translate);
        pdf::write_document(self.engine.clone(), layout, paths.pdf.clone()).await?;

        write_text(&paths.text, &consolidated_text(&pages, false)).await?;
        let translated_text_file = if translated_any {
            write_text(&paths.translated_text, &consolidated_text(&pages, true)).await?;
            Some(paths.translated_text.clone())
        } else {
            None
        };
        progress.emit(ProgressEvent::saving(1, 1, "Saved optimized PDF"));

        // ── Step 8: Statistics ───────────────────────────────────────────────
        let optimized_size = tokio::fs::metadata(&paths.pdf)
            .await
            .map(|m| m.len())
            .map_err(|e| OptimizerError::OutputWriteFailed {
                path: paths.pdf.clone(),
                source: e,
            })?;

        let failed_pages: Vec<usize> = pages
            .iter()
            .filter_map(|p| p.error.as_ref().map(PageError::page))
            .collect();
        let direct_pages = pages.iter().filter(|p| p.direct_text.is_some()).count();
        let ocr_pages = pages
            .iter()
            .filter(|p| p.ocr_text.is_some() && !p.is_failed())
            .count();

        let result = ProcessingResult {
            original_size: validated.size,
            optimized_size,
            compression_ratio: compression_ratio(validated.size, optimized_size),
            pages_processed: total,
            failed_pages,
            direct_pages,
            ocr_pages,
            method: METHOD_HYBRID.to_string(),
            translated: translate,
            output_pdf: paths.pdf.clone(),
            text_file: paths.text.clone(),
            translated_text_file,
            progress_dir: self.config.progress_dir.clone(),
            pages,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            render_duration_ms,
            ocr_duration_ms,
            translation_duration_ms,
        };

        info!(
            "Done: {} pages ({} direct, {} OCR, {} failed), {} → {} bytes ({:.1}%) in {}ms",
            result.pages_processed,
            result.direct_pages,
            result.ocr_pages,
            result.failed_pages.len(),
            result.original_size,
            result.optimized_size,
            result.compression_ratio,
            result.total_duration_ms
        );

        // ── Step 9: Complete ─────────────────────────────────────────────────
        progress.emit(ProgressEvent::complete("Optimization complete"));
        Ok(result)
    }

    /// OCR one page in place. Failures are recorded on the page.
    async fn ocr_page(&self, page: &mut PageRecord) {
        let Some(image) = page.image_path.clone() else {
            warn!("Page {}: no rendered image", page.index);
            page.error = Some(PageError::MissingImage { page: page.index });
            page.state = PageState::OcrFailed;
            return;
        };

        info!("Page {}: OCR via {}", page.index, self.ocr.name());
        match self.ocr.extract_text(&image).await {
            Ok(text) => {
                debug!("Page {}: OCR returned {} chars", page.index, text.chars().count());
                page.ocr_text = Some(text);
                page.state = PageState::OcrComplete;
            }
            Err(e) => {
                warn!("Page {}: OCR failed: {}", page.index, e);
                page.error = Some(PageError::from_ocr(page.index, &e));
                page.state = PageState::OcrFailed;
            }
        }
    }
}

async fn create_dir(dir: &Path) -> Result<(), OptimizerError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| OptimizerError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

async fn write_text(path: &Path, contents: &str) -> Result<(), OptimizerError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| OptimizerError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
