//! End-to-end tests against a real pdfium library and, for the OCR test, a
//! live Ollama server.
//!
//! Gated behind the `E2E_ENABLED` environment variable so they do not run
//! in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture
//!
//! The OCR test also needs `test_cases/scanned.pdf` (a PDF without a text
//! layer) and `ollama serve` with a vision model pulled.

use pdf_optimizer::pipeline::assemble::{layout_document, TITLE};
use pdf_optimizer::pipeline::image::RasterSettings;
use pdf_optimizer::pipeline::ocr::build_ocr_backend;
use pdf_optimizer::pipeline::pdf::PdfiumEngine;
use pdf_optimizer::{
    NoopProgress, OptimizerConfig, OutputPaths, PageState, PdfEngine, PdfOptimizer, Translator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        e2e_skip_unless_enabled!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Write a small text PDF with pdfium itself.
fn write_fixture(engine: &PdfiumEngine, path: &Path, texts: &[&str]) {
    let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
    let layout = layout_document(&texts, false);
    engine
        .write_document(&layout, path)
        .expect("fixture PDF should be written");
}

// ── Engine tests (pdfium only) ───────────────────────────────────────────────

#[test]
fn written_pdf_reads_back_as_text() {
    e2e_skip_unless_enabled!();
    let engine = PdfiumEngine::new().expect("pdfium should bind");
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("fixture.pdf");

    write_fixture(&engine, &pdf, &["Hola mundo", "Segunda sección con acentos"]);

    let texts = engine.read_text_layer(&pdf).unwrap();
    assert!(!texts.is_empty());
    let first = texts[0].as_deref().expect("page 1 should carry text");
    assert!(first.contains(TITLE), "got: {first}");
    assert!(first.contains("Hola mundo"), "got: {first}");
    assert!(first.contains("sección"), "got: {first}");
}

#[test]
fn long_text_flows_onto_more_pages() {
    e2e_skip_unless_enabled!();
    let engine = PdfiumEngine::new().expect("pdfium should bind");
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("long.pdf");

    let body: Vec<String> = (1..=120).map(|i| format!("Línea número {i}")).collect();
    write_fixture(&engine, &pdf, &[&body.join("\n")]);

    let texts = engine.read_text_layer(&pdf).unwrap();
    assert!(texts.len() >= 2, "expected overflow, got {} pages", texts.len());
    assert!(texts.last().unwrap().as_deref().unwrap().contains("Línea número 120"));
}

#[test]
fn pages_render_to_png_files() {
    e2e_skip_unless_enabled!();
    let engine = PdfiumEngine::new().expect("pdfium should bind");
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("render.pdf");
    write_fixture(&engine, &pdf, &["Imagen de prueba"]);

    let settings = RasterSettings {
        dpi: 100,
        enhance: true,
        scale_factor: 1.5,
        max_image_bytes: 25 * 1024 * 1024,
    };
    let images = engine
        .rasterize(&pdf, dir.path(), &settings, &|done: usize, total: usize| {
            println!("rendered {done}/{total}")
        })
        .unwrap();

    assert_eq!(images.len(), 1);
    assert!(images[0].ends_with("page_1.png"));
    let img = image::open(&images[0]).expect("valid PNG");
    // A4 width at 100 DPI is ~827 px, then scaled by 1.5.
    assert!(img.width() > 1100, "width {}", img.width());
}

// ── Full runs ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_pdf_is_optimized_without_ocr() {
    e2e_skip_unless_enabled!();
    let engine = Arc::new(PdfiumEngine::new().expect("pdfium should bind"));
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("contrato.pdf");
    write_fixture(&engine, &input, &["Cláusula primera", "Cláusula segunda"]);

    let config = OptimizerConfig::default();
    let ocr = build_ocr_backend(&config);
    let optimizer = PdfOptimizer::from_parts(config, engine, ocr, Translator::new(vec![]));
    let paths = OutputPaths::for_input(&input, None);

    let result = optimizer
        .optimize(&input, &paths, false, Arc::new(NoopProgress))
        .await
        .expect("optimize should succeed");

    assert!(result.is_complete_success());
    assert_eq!(result.ocr_pages, 0);
    assert!(result
        .pages
        .iter()
        .all(|p| p.state == PageState::TextExtracted));
    assert!(paths.pdf.exists());
    let text = std::fs::read_to_string(&paths.text).unwrap();
    assert!(text.contains("Cláusula segunda"));
    println!(
        "{} → {} bytes ({:.1}%)",
        result.original_size, result.optimized_size, result.compression_ratio
    );
}

#[tokio::test]
async fn scanned_pdf_goes_through_local_ocr() {
    let input = e2e_skip_unless_ready!(test_cases_dir().join("scanned.pdf"));
    let dir = tempfile::tempdir().unwrap();

    let optimizer = PdfOptimizer::connect(OptimizerConfig::default())
        .await
        .expect("pdfium and Ollama should be available");
    let paths = OutputPaths::for_input(&input, Some(dir.path()));

    let result = optimizer
        .optimize(&input, &paths, false, Arc::new(NoopProgress))
        .await
        .expect("optimize should succeed");

    println!(
        "{} pages, {} OCR, failed {:?}",
        result.pages_processed, result.ocr_pages, result.failed_pages
    );
    assert!(result.ocr_pages > 0);
    assert!(!result.is_total_failure());
    let text = std::fs::read_to_string(&paths.text).unwrap();
    assert!(!text.trim().is_empty());
}
