//! # dispatch2pdf
//!
//! Turn a marketing-fixture dispatch spreadsheet into printable per-store
//! order sheets, exported as one paginated PDF or one JPEG per store.
//!
//! ## Why rasterise?
//!
//! Dispatch sheets get printed, photographed and forwarded over chat apps.
//! A JPEG page looks the same everywhere, with no font substitution and no
//! viewer quirks. The sheets are laid out once as a vector PDF with pdfium,
//! then each page is rasterised and re-assembled.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .xlsx / pasted text
//!  │
//!  ├─ 1. Input    resolve a file or stdin, sniff spreadsheet vs. text
//!  ├─ 2. Parse    calamine / csv rows → grouped StoreOrders
//!  ├─ 3. Layout   summary + one sheet per store (pdfium, spawn_blocking)
//!  ├─ 4. Capture  rasterise each sheet at 2×, JPEG q90
//!  └─ 5. Output   paginated PDF, or one JPEG per store
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dispatch2pdf::{export_pdf, DispatchSession, ExportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("dispatch.xlsx")?;
//!     let mut session = DispatchSession::new();
//!     session.load_workbook("dispatch.xlsx", &bytes)?;
//!
//!     let config = ExportConfig::default();
//!     let output = export_pdf(session.orders(), "out", &config).await?;
//!     println!("{}", output.artifacts[0].display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `dispatch2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ```toml
//! dispatch2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder, Locale, PageSize};
pub use error::{DispatchError, PageError, EXPORT_FAILED_NOTICE, NO_DATA_NOTICE};
pub use export::{
    export_images_to_dir, export_pdf, image_file_name, paginated_file_name, preview_store,
    Exporter,
};
pub use model::{OrderItem, StoreOrder};
pub use output::{ExportMode, ExportOutput, ExportStats, PageOutcome, PageTarget};
pub use pipeline::assemble::{PageAssembler, PdfiumAssembler};
pub use pipeline::delimited::parse_delimited;
pub use pipeline::encode::EncodedImage;
pub use pipeline::group::{GroupingNormalizer, GroupingPolicy};
pub use pipeline::render::PdfiumSurface;
pub use pipeline::sink::{DirectorySink, ImageSink};
pub use pipeline::surface::{BlockKey, CaptureGuard, RasterOptions, RenderSurface};
pub use pipeline::tabular::parse_workbook;
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressSnapshot};
pub use session::DispatchSession;
