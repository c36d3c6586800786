//! CLI binary for pdf-optimizer.
//!
//! A thin shell over the library: maps flags and environment variables to
//! `OptimizerConfig`, runs the optimisation on a background task, and draws
//! a progress bar from the events it sends back.

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_optimizer::backend::ollama::OllamaClient;
use pdf_optimizer::config::{
    DEFAULT_CLOUD_TRANSLATION_MODEL, DEFAULT_OCR_MODEL, DEFAULT_OLLAMA_URL,
    DEFAULT_TRANSLATION_MODEL,
};
use pdf_optimizer::pipeline::ocr::build_ocr_backend;
use pdf_optimizer::{
    OcrMode, OptimizerConfig, OutputPaths, PdfOptimizer, ProcessingResult, ProgressEstimate,
    ProgressEvent, SharedProgress,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Local OCR with Ollama (default)
  pdf-optimizer escaneo.pdf

  # Translate the result into Spanish
  pdf-optimizer --translate contract.pdf

  # Cloud OCR
  USE_LOCAL_MODEL=false DEEPSEEK_API_KEY=sk-... pdf-optimizer scan.pdf

  # Keep per-page progress files and print the result as JSON
  pdf-optimizer --progress-dir ./progreso --json scan.pdf > result.json

  # Check that the OCR backend is reachable and list local models
  pdf-optimizer --check

OUTPUTS (next to the input, or in --output-dir):
  <name>_optimizado.pdf        re-assembled text PDF
  <name>_texto_completo.txt    extracted text, one banner per page
  <name>_texto_ES.txt          Spanish text (only when translation changed something)

ENVIRONMENT VARIABLES (also read from .env):
  USE_LOCAL_MODEL          true = Ollama OCR, false = cloud OCR
  OLLAMA_URL               Ollama base URL
  OLLAMA_MODEL             Vision model for local OCR
  DEEPSEEK_API_KEY         Key for cloud OCR
  TRANSLATION_MODEL        Local translation model
  USE_OPENAI_TRANSLATION   Try the cloud translator first
  OPENAI_API_KEY           Key for cloud translation
  OPENAI_MODEL             Cloud translation model
  AUTO_TRANSLATE           Translate without --translate
  IMAGE_DPI                Rendering DPI (72–600)
  ENHANCE_IMAGE_QUALITY    Upscale + grayscale + contrast before OCR
  IMAGE_SCALE_FACTOR       Upscale factor (1.0–4.0)
  PDFIUM_LIB_PATH          Path to libpdfium (file or directory)
"#;

/// Optimise scanned PDFs with vision-model OCR and optional Spanish translation.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-optimizer",
    version,
    about = "Optimise scanned PDFs with vision-model OCR and optional Spanish translation",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to optimise.
    #[arg(required_unless_present = "check")]
    input: Option<PathBuf>,

    /// Write outputs here instead of next to the input.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Use the local Ollama server for OCR (false = cloud).
    #[arg(long, env = "USE_LOCAL_MODEL", default_value_t = true,
          value_parser = BoolishValueParser::new(), num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    use_local_model: bool,

    /// Ollama base URL.
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Vision model for local OCR.
    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_OCR_MODEL)]
    ollama_model: String,

    /// API key for cloud OCR.
    #[arg(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    deepseek_api_key: Option<String>,

    /// Local model used for translation.
    #[arg(long, env = "TRANSLATION_MODEL", default_value = DEFAULT_TRANSLATION_MODEL)]
    translation_model: String,

    /// Try the cloud translator before the local one.
    #[arg(long, env = "USE_OPENAI_TRANSLATION", default_value_t = false,
          value_parser = BoolishValueParser::new(), num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    use_openai_translation: bool,

    /// API key for cloud translation.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Cloud translation model.
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_CLOUD_TRANSLATION_MODEL)]
    openai_model: String,

    /// Translate extracted text into Spanish.
    #[arg(short, long, env = "AUTO_TRANSLATE", default_value_t = false,
          value_parser = BoolishValueParser::new(), num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    translate: bool,

    /// Rendering DPI (72–600).
    #[arg(long, env = "IMAGE_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Upscale, grayscale and contrast-boost page images before OCR.
    #[arg(long, env = "ENHANCE_IMAGE_QUALITY", default_value_t = false,
          value_parser = BoolishValueParser::new(), num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    enhance: bool,

    /// Upscale factor used with --enhance (1.0–4.0).
    #[arg(long, env = "IMAGE_SCALE_FACTOR", default_value_t = 1.5)]
    scale_factor: f32,

    /// Keep per-page progress files in this directory.
    #[arg(long)]
    progress_dir: Option<PathBuf>,

    /// Verify the OCR backend, list local models, and exit.
    #[arg(long)]
    check: bool,

    /// Print the ProcessingResult as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn build_config(cli: &Cli) -> Result<OptimizerConfig> {
    let mut builder = OptimizerConfig::builder()
        .ocr_mode(if cli.use_local_model {
            OcrMode::Local
        } else {
            OcrMode::Cloud
        })
        .ollama_url(&cli.ollama_url)
        .ocr_model(&cli.ollama_model)
        .translation_model(&cli.translation_model)
        .use_cloud_translation(cli.use_openai_translation)
        .cloud_translation_model(&cli.openai_model)
        .dpi(cli.dpi)
        .enhance_images(cli.enhance)
        .image_scale_factor(cli.scale_factor);

    if let Some(ref key) = cli.deepseek_api_key {
        builder = builder.cloud_ocr_api_key(key);
    }
    if let Some(ref key) = cli.openai_api_key {
        builder = builder.cloud_translation_api_key(key);
    }
    if let Some(ref dir) = cli.progress_dir {
        builder = builder.progress_dir(dir);
    }

    builder.build().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar is the user-facing feedback; library INFO logs would
    // tear it, so they are hidden unless --verbose.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    if !cli.quiet {
        eprintln!("{} {}", cyan("◆"), bold(&config.mode_description()));
    }

    if cli.check {
        return run_check(&config).await;
    }

    let Some(input) = cli.input.clone() else {
        bail!("No input PDF given");
    };

    let optimizer = PdfOptimizer::connect(config)
        .await
        .context("Failed to initialise the optimizer")?;
    let paths = OutputPaths::for_input(&input, cli.output_dir.as_deref());

    // ── Run on a background task, draw progress in the foreground ────────
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    let sink: SharedProgress = Arc::new(tx);
    let translate = cli.translate;
    let task_input = input.clone();
    let task_paths = paths.clone();
    let mut handle = tokio::spawn(async move {
        optimizer
            .optimize(&task_input, &task_paths, translate, sink)
            .await
    });

    let bar = if show_progress {
        make_bar()
    } else {
        ProgressBar::hidden()
    };
    let mut estimate = ProgressEstimate::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let joined = loop {
        tokio::select! {
            res = &mut handle => break res,
            Some(event) = rx.recv() => {
                estimate.apply(&event);
                draw(&bar, &estimate);
            }
            _ = ticker.tick() => {
                estimate.tick();
                draw(&bar, &estimate);
            }
            _ = &mut ctrl_c => {
                handle.abort();
                // Wait for the task to drop so its run directory is removed.
                let _ = handle.await;
                bar.abandon_with_message("cancelled");
                eprintln!("{} Cancelled", red("✘"));
                std::process::exit(130);
            }
        }
    };

    let result = match joined.context("Optimization task panicked")? {
        Ok(result) => {
            bar.finish_and_clear();
            result
        }
        Err(e) => {
            bar.abandon();
            return Err(e).with_context(|| format!("Failed to optimize {}", input.display()));
        }
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
    } else if !cli.quiet {
        print_summary(&result);
    }

    if result.is_total_failure() {
        bail!("All {} pages failed", result.pages_processed);
    }
    Ok(())
}

fn make_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}  {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ")
    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
    bar.set_style(style);
    bar.set_prefix("Optimizing");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn draw(bar: &ProgressBar, estimate: &ProgressEstimate) {
    bar.set_position(estimate.percent().round() as u64);
    bar.set_message(estimate.status().to_string());
}

fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB {
        format!("{:.2} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

fn print_summary(result: &ProcessingResult) {
    let total = result.pages_processed;
    let failed = result.failed_pages.len();

    if result.is_complete_success() {
        eprintln!(
            "{} {} pages processed successfully",
            green("✔"),
            bold(&total.to_string())
        );
    } else if result.is_total_failure() {
        eprintln!("{} All {} pages failed", red("✘"), bold(&total.to_string()));
    } else {
        let list = result
            .failed_pages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!(
            "{} {}/{} pages processed  ({} failed: {})",
            cyan("⚠"),
            bold(&(total - failed).to_string()),
            total,
            red(&failed.to_string()),
            red(&list),
        );
    }

    eprintln!(
        "  {}",
        dim(&format!(
            "{} direct text · {} OCR · {:.1}s",
            result.direct_pages,
            result.ocr_pages,
            result.total_duration_ms as f64 / 1000.0
        ))
    );
    eprintln!(
        "  Size: {} → {}  ({:.1}% reduction)",
        human_size(result.original_size),
        human_size(result.optimized_size),
        result.compression_ratio
    );
    eprintln!("  PDF:  {}", result.output_pdf.display());
    eprintln!("  Text: {}", result.text_file.display());
    if let Some(ref p) = result.translated_text_file {
        eprintln!("  ES:   {}", p.display());
    }
    if let Some(ref p) = result.progress_dir {
        eprintln!("  Progress files: {}", p.display());
    }
}

async fn run_check(config: &OptimizerConfig) -> Result<()> {
    let backend = build_ocr_backend(config);
    backend
        .verify()
        .await
        .with_context(|| format!("{} OCR backend is not usable", backend.name()))?;
    eprintln!("{} {} OCR backend ready", green("✔"), backend.name());

    let client = OllamaClient::new(config.ollama_url.clone());
    match client.list_models(config.startup_check_timeout_secs).await {
        Ok(models) if models.is_empty() => {
            eprintln!("  {}", dim("No local models installed"));
        }
        Ok(models) => {
            eprintln!("  Local models at {}:", client.base_url());
            for m in models {
                eprintln!("    {m}");
            }
        }
        Err(e) => {
            eprintln!("  {} {}", cyan("⚠"), dim(&format!("Ollama not reachable: {e}")));
        }
    }
    Ok(())
}
