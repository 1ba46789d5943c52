//! CLI binary for dispatch2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExportConfig`, loads the input and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use dispatch2pdf::pipeline::input::{resolve_input, ResolvedInput};
use dispatch2pdf::progress::ProgressCallback;
use dispatch2pdf::{
    preview_store, DirectorySink, DispatchError, DispatchSession, ExportConfig, ExportOutput,
    ExportProgressCallback, Exporter, Locale, PageSize, PdfiumAssembler, PdfiumSurface,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live "page i of n" bar plus one log line
/// per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-step wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_export_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Laying out sheets…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] page {pos:>3} of {len}  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Exporting");
        self.skipped.store(0, Ordering::SeqCst);
    }

    fn elapsed_secs(&self, step: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&step))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, total: usize) {
        self.activate_bar(total);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Exporting {total} pages…"))
        ));
    }

    fn on_page_start(&self, current: usize, _total: usize, block: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(current, Instant::now());
        }
        self.bar.set_position(current.saturating_sub(1) as u64);
        self.bar.set_message(block.to_string());
    }

    fn on_page_complete(&self, current: usize, total: usize) {
        let secs = self.elapsed_secs(current);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            current,
            total,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.set_position(current as u64);
    }

    fn on_page_skipped(&self, current: usize, total: usize, reason: &str) {
        self.elapsed_secs(current);
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            cyan("–"),
            current,
            total,
            dim(reason),
        ));
        self.bar.set_position(current as u64);
    }

    fn on_export_complete(&self, total: usize, written: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped.load(Ordering::SeqCst);
        if skipped == 0 {
            eprintln!("{} {} pages exported", green("✔"), bold(&written.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages exported  ({} skipped)",
                cyan("⚠"),
                bold(&written.to_string()),
                total,
                skipped,
            );
        }
    }

    fn on_export_failed(&self, error: &str) {
        self.bar.abandon();
        self.bar.println(format!("{} {}", red("✘"), red(error)));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Paginated PDF (summary + one sheet per store) into ./out
  dispatch2pdf dispatch.xlsx -o out

  # One JPEG per store
  dispatch2pdf dispatch.xlsx --mode images -o out/images

  # Both, with Chinese labels and a CJK font
  dispatch2pdf dispatch.xlsx --mode both --locale zh --font /usr/share/fonts/NotoSansCJK.ttf

  # Pasted lines from the clipboard
  pbpaste | dispatch2pdf - --text

  # Show what was recognised, without exporting
  dispatch2pdf --inspect-only dispatch.xlsx
  dispatch2pdf --inspect-only --json dispatch.xlsx > stores.json

  # Render a single store sheet to PNG
  dispatch2pdf dispatch.xlsx --preview P0010001 -o preview

INPUT COLUMNS (first sheet, first row is a header):
  A POS code   B Store name   C Fixture type   D Level   E Point   F Fixture
  G Gender     H Width        I Height         J Bleed W K Bleed H L Material
  M Quantity   N Artwork ID   O Process

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  DISPATCH2PDF_*          Fallback for every flag, e.g. DISPATCH2PDF_BRAND
  RUST_LOG                Override the log filter
"#;

/// Render dispatch spreadsheets as printable per-store order sheets.
#[derive(Parser, Debug)]
#[command(
    name = "dispatch2pdf",
    version,
    about = "Render dispatch spreadsheets as per-store order sheets (PDF or JPEG)",
    long_about = "Read a fixture dispatch list (.xlsx/.xls/.ods, or pasted comma-separated \
lines), group it by store, lay out one order sheet per store plus a summary index, and \
export a paginated PDF or one JPEG per store.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Spreadsheet or text file, or `-` for stdin.
    input: String,

    /// Directory for exported files.
    #[arg(short, long, env = "DISPATCH2PDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// What to export.
    #[arg(long, env = "DISPATCH2PDF_MODE", value_enum, default_value = "pdf")]
    mode: ModeArg,

    /// Treat the input as pasted comma-separated text regardless of its type.
    #[arg(long, env = "DISPATCH2PDF_TEXT")]
    text: bool,

    /// Rasterisation scale (0.5–4.0).
    #[arg(long, env = "DISPATCH2PDF_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// JPEG quality (1–100).
    #[arg(long, env = "DISPATCH2PDF_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Pause before capturing each store sheet, in milliseconds.
    #[arg(long, env = "DISPATCH2PDF_SETTLE_MS", default_value_t = 200)]
    settle_ms: u64,

    /// Output page size: a4, letter, or WIDTHxHEIGHT in mm.
    #[arg(long, env = "DISPATCH2PDF_PAGE_SIZE", default_value = "a4")]
    page_size: String,

    /// Brand prefix for titles and file names.
    #[arg(long, env = "DISPATCH2PDF_BRAND", default_value = "Adidas")]
    brand: String,

    /// Language of the printed labels.
    #[arg(long, env = "DISPATCH2PDF_LOCALE", value_enum, default_value = "en")]
    locale: LocaleArg,

    /// TrueType font for sheet text (needed for CJK store names).
    #[arg(long, env = "DISPATCH2PDF_FONT")]
    font: Option<PathBuf>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "DISPATCH2PDF_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Refuse inputs with more stores than this.
    #[arg(long, env = "DISPATCH2PDF_MAX_STORES")]
    max_stores: Option<usize>,

    /// Also write the vector layout (all sheets, not rasterised) for printing.
    #[arg(long, env = "DISPATCH2PDF_SAVE_LAYOUT")]
    save_layout: bool,

    /// Render one store sheet to PNG instead of exporting.
    #[arg(long, value_name = "POS_CODE")]
    preview: Option<String>,

    /// Print the recognised stores only, no export.
    #[arg(long)]
    inspect_only: bool,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, env = "DISPATCH2PDF_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DISPATCH2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DISPATCH2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DISPATCH2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    Pdf,
    Images,
    Both,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LocaleArg {
    En,
    Zh,
}

impl From<LocaleArg> for Locale {
    fn from(v: LocaleArg) -> Self {
        match v {
            LocaleArg::En => Locale::En,
            LocaleArg::Zh => Locale::Zh,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the progress bar for the terminal.
    let exporting = !cli.inspect_only && cli.preview.is_none();
    let show_progress = exporting && !cli.quiet && !cli.no_progress && !cli.json;
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

    // ── Load input ───────────────────────────────────────────────────────
    let resolved = resolve_input(&cli.input).await.map_err(notice)?;
    let mut session = DispatchSession::new();
    let loaded = match &resolved {
        ResolvedInput::Workbook { name, bytes } if cli.text => {
            session.load_text(name, &String::from_utf8_lossy(bytes))
        }
        other => session.load(other),
    };
    let count = loaded.map_err(notice)?;

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {} stores recognised in {}",
            cyan("◆"),
            bold(&count.to_string()),
            resolved.name()
        );
    }

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(session.orders())
                    .context("Failed to serialise store orders")?
            );
        } else {
            for (i, order) in session.orders().iter().enumerate() {
                println!(
                    "{:>3}  {:<10}  {:<28}  {:>3} items  {:>5} pcs  {}",
                    i + 1,
                    order.pos_code,
                    order.pos_name,
                    order.items.len(),
                    order.total_quantity(),
                    dim(&format!("{} / {}", order.level, order.fixture_type)),
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Preview mode ─────────────────────────────────────────────────────
    if let Some(ref code) = cli.preview {
        let path = cli.output_dir.join(format!("{}_{}_preview.png", config.brand, code));
        let path = preview_store(session.orders(), code, &path, &config)
            .await
            .map_err(notice)?;
        if !cli.quiet {
            eprintln!("{} preview → {}", green("✔"), bold(&path.display().to_string()));
        }
        return Ok(());
    }

    // ── Export ───────────────────────────────────────────────────────────
    let surface = PdfiumSurface::build(session.orders(), &config)
        .await
        .map_err(notice)?;

    if cli.save_layout {
        tokio::fs::create_dir_all(&cli.output_dir)
            .await
            .with_context(|| format!("Failed to create {:?}", cli.output_dir))?;
        let path = cli
            .output_dir
            .join(format!("{}_print_layout.pdf", config.brand));
        surface.save_layout(&path).await.map_err(notice)?;
        if !cli.quiet && !cli.json {
            eprintln!("{} layout → {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    let exporter = Exporter::new(surface, config.clone());
    let mut outputs: Vec<ExportOutput> = Vec::new();

    if matches!(cli.mode, ModeArg::Pdf | ModeArg::Both) {
        let mut assembler =
            PdfiumAssembler::new(config.page_size.size_points(), config.pdfium_lib_path.clone());
        let out = exporter
            .export_paginated(session.orders(), &mut assembler, &cli.output_dir)
            .await
            .map_err(notice)?;
        outputs.push(out);
    }

    if matches!(cli.mode, ModeArg::Images | ModeArg::Both) {
        let sink = DirectorySink::new(&cli.output_dir);
        let out = exporter
            .export_images(session.orders(), &sink)
            .await
            .map_err(notice)?;
        outputs.push(out);
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&outputs).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        for out in &outputs {
            let artifact = match out.artifacts.as_slice() {
                [one] => one.display().to_string(),
                many => format!("{} files in {}", many.len(), cli.output_dir.display()),
            };
            eprintln!(
                "{}  {}/{} pages  {}ms  →  {}",
                if out.stats.skipped_pages == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                out.stats.written_pages,
                out.stats.total_steps,
                out.stats.total_duration_ms,
                bold(&artifact),
            );
        }
    }

    Ok(())
}

/// Print the short user notice, keep the full error for the exit report.
fn notice(e: DispatchError) -> anyhow::Error {
    eprintln!("{} {}", red("✘"), e.user_notice());
    anyhow::Error::new(e)
}

/// Map CLI args to `ExportConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .scale(cli.scale)
        .jpeg_quality(cli.quality)
        .settle_delay_ms(cli.settle_ms)
        .page_size(parse_page_size(&cli.page_size)?)
        .brand(cli.brand.clone())
        .locale(cli.locale.into());

    if let Some(ref font) = cli.font {
        builder = builder.font_path(font);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(max) = cli.max_stores {
        builder = builder.max_stores(max);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `--page-size`: `a4`, `letter`, or `WIDTHxHEIGHT` in millimetres.
fn parse_page_size(s: &str) -> Result<PageSize> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "a4" => return Ok(PageSize::A4),
        "letter" => return Ok(PageSize::Letter),
        _ => {}
    }

    let (w, h) = s
        .split_once('x')
        .with_context(|| format!("Invalid page size '{s}': expected a4, letter or WxH in mm"))?;
    let width_mm: f32 = w.trim().parse().context("Invalid page width")?;
    let height_mm: f32 = h.trim().parse().context("Invalid page height")?;
    if width_mm <= 0.0 || height_mm <= 0.0 {
        anyhow::bail!("Page size must be positive (got {width_mm}x{height_mm})");
    }
    Ok(PageSize::Custom {
        width_mm,
        height_mm,
    })
}
