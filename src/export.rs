//! Export entry points: capture rendered sheets into a PDF or per-store JPEGs.
//!
//! ## Why one page at a time?
//!
//! A sheet rasterised at 2× is several megapixels. Capturing, encoding and
//! handing off each page before touching the next keeps at most one raw
//! raster alive, and gives the progress indicator a steady "page i of n".
//!
//! ## Exit paths
//!
//! Two guards own the shared state for the duration of an export: a
//! [`CaptureGuard`] holds the surface in capturing mode and an in-flight
//! guard marks the exporter busy. Both release on every exit path, so a
//! failed export never leaves the surface stuck or the exporter locked.

use crate::config::ExportConfig;
use crate::error::{DispatchError, PageError};
use crate::model::StoreOrder;
use crate::output::{ExportMode, ExportOutput, ExportStats, PageOutcome, PageTarget};
use crate::pipeline::assemble::{PageAssembler, PdfiumAssembler};
use crate::pipeline::encode::{encode_jpeg, encode_png, EncodedImage};
use crate::pipeline::layout::SheetLabels;
use crate::pipeline::render::PdfiumSurface;
use crate::pipeline::sink::{DirectorySink, ImageSink};
use crate::pipeline::surface::{BlockKey, CaptureGuard, RasterOptions, RenderSurface};
use crate::progress::{ProgressSnapshot, ProgressState};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

// ── File names ───────────────────────────────────────────────────────────────

/// `<brand>_<label>_<YYYY-MM-DD>.pdf`
pub fn paginated_file_name(brand: &str, label: &str, date: NaiveDate) -> String {
    format!("{}_{}_{}.pdf", brand, label, date.format("%Y-%m-%d"))
}

/// `<brand>_<code>_<name>.jpg`, with path-unsafe characters replaced by `_`.
pub fn image_file_name(brand: &str, pos_code: &str, pos_name: &str) -> String {
    format!(
        "{}_{}_{}.jpg",
        sanitize_file_component(brand),
        sanitize_file_component(pos_code),
        sanitize_file_component(pos_name)
    )
}

/// Replace characters that are unsafe in file names on any common platform.
pub fn sanitize_file_component(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

// ── Exporter ─────────────────────────────────────────────────────────────────

/// Drives exports against a render surface.
///
/// One export at a time: a second call while one is running fails with
/// [`DispatchError::ExportInProgress`].
pub struct Exporter<S: RenderSurface> {
    surface: S,
    config: ExportConfig,
    progress: ProgressState,
    in_flight: AtomicBool,
}

/// Marks the exporter busy; clears the flag and the progress state on drop.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    progress: &'a ProgressState,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool, progress: &'a ProgressState) -> Result<Self, DispatchError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| DispatchError::ExportInProgress)?;
        Ok(Self { flag, progress })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.progress.reset();
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// One captured page.
struct Capture {
    image: EncodedImage,
    raster_ms: u64,
}

impl<S: RenderSurface> Exporter<S> {
    pub fn new(surface: S, config: ExportConfig) -> Self {
        Self {
            surface,
            config,
            progress: ProgressState::default(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Current "page i of n"; inactive `0 / 0` when idle.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Export the summary plus every store sheet as one paginated document.
    ///
    /// Progress runs over `1 + orders.len()` steps. Stores whose block is
    /// missing are skipped and recorded in the output; they never become
    /// blank pages. The document is saved into `output_dir` as
    /// [`paginated_file_name`].
    pub async fn export_paginated(
        &self,
        orders: &[StoreOrder],
        assembler: &mut dyn PageAssembler,
        output_dir: &Path,
    ) -> Result<ExportOutput, DispatchError> {
        self.check_orders(orders)?;
        let _busy = InFlight::acquire(&self.in_flight, &self.progress)?;

        let result = self.run_paginated(orders, assembler, output_dir).await;
        self.finish(result)
    }

    /// Export every store sheet as its own JPEG. No summary page.
    pub async fn export_images(
        &self,
        orders: &[StoreOrder],
        sink: &dyn ImageSink,
    ) -> Result<ExportOutput, DispatchError> {
        self.check_orders(orders)?;
        let _busy = InFlight::acquire(&self.in_flight, &self.progress)?;

        let result = self.run_images(orders, sink).await;
        self.finish(result)
    }

    /// Rasterise one block outside capturing mode and return it as PNG.
    pub async fn preview(&self, key: &BlockKey) -> Result<EncodedImage, DispatchError> {
        if !self.surface.locate(key) {
            return Err(DispatchError::RasterisationFailed {
                block: key.id(),
                detail: "block not found".into(),
            });
        }
        let image = self
            .surface
            .rasterize(key, &RasterOptions::at_scale(self.config.scale))
            .await?;
        encode_png(&image).map_err(|e| DispatchError::EncodeFailed {
            block: key.id(),
            detail: e.to_string(),
        })
    }

    fn check_orders(&self, orders: &[StoreOrder]) -> Result<(), DispatchError> {
        if orders.is_empty() {
            return Err(DispatchError::NoRecordsRecognized {
                source_name: "export".into(),
            });
        }
        if let Some(max) = self.config.max_stores {
            if orders.len() > max {
                return Err(DispatchError::TooManyStores {
                    count: orders.len(),
                    max,
                });
            }
        }
        Ok(())
    }

    fn finish(
        &self,
        result: Result<ExportOutput, DispatchError>,
    ) -> Result<ExportOutput, DispatchError> {
        match &result {
            Ok(out) => {
                info!(
                    "Export complete: {}/{} pages written, {} skipped, {}ms",
                    out.stats.written_pages,
                    out.stats.total_steps,
                    out.stats.skipped_pages,
                    out.stats.total_duration_ms
                );
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_export_complete(out.stats.total_steps, out.stats.written_pages);
                }
            }
            Err(e) => {
                error!("Export aborted: {}", e);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_export_failed(&e.to_string());
                }
            }
        }
        result
    }

    async fn run_paginated(
        &self,
        orders: &[StoreOrder],
        assembler: &mut dyn PageAssembler,
        output_dir: &Path,
    ) -> Result<ExportOutput, DispatchError> {
        let start = Instant::now();
        let total = 1 + orders.len();
        self.begin(total);
        let _capturing = CaptureGuard::new(&self.surface);

        let keys = std::iter::once(BlockKey::Summary)
            .chain(orders.iter().map(|o| BlockKey::store(o.pos_code.clone())));

        let mut pages = Vec::with_capacity(total);
        let mut raster_ms = 0;

        for (i, key) in keys.enumerate() {
            let step = i + 1;
            // The summary renders with the sheets; only store blocks need to settle.
            let settle = key != BlockKey::Summary;
            self.step_started(step, total, &key);

            let outcome = match self.capture(&key, settle).await? {
                Some(capture) => {
                    raster_ms += capture.raster_ms;
                    assembler.add_page(capture.image);
                    self.step_completed(step, total);
                    PageOutcome {
                        step,
                        block: key.id(),
                        written: Some(PageTarget::DocumentPage(assembler.page_count())),
                        error: None,
                    }
                }
                None => self.step_skipped(step, total, &key),
            };
            pages.push(outcome);
        }

        let date = chrono::Utc::now().date_naive();
        let labels = SheetLabels::for_locale(self.config.locale);
        let path = output_dir.join(paginated_file_name(&self.config.brand, labels.file_label, date));

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| DispatchError::OutputWriteFailed {
                path: output_dir.to_path_buf(),
                source: e,
            })?;
        let written = assembler.page_count();
        assembler.save(&path).await?;

        Ok(ExportOutput {
            mode: ExportMode::Paginated,
            artifacts: vec![path],
            stats: stats(&pages, written, start, raster_ms),
            pages,
        })
    }

    async fn run_images(
        &self,
        orders: &[StoreOrder],
        sink: &dyn ImageSink,
    ) -> Result<ExportOutput, DispatchError> {
        let start = Instant::now();
        let total = orders.len();
        self.begin(total);
        let _capturing = CaptureGuard::new(&self.surface);

        let mut pages = Vec::with_capacity(total);
        let mut artifacts = Vec::new();
        let mut raster_ms = 0;

        for (i, order) in orders.iter().enumerate() {
            let step = i + 1;
            let key = BlockKey::store(order.pos_code.clone());
            self.step_started(step, total, &key);

            let outcome = match self.capture(&key, true).await? {
                Some(capture) => {
                    raster_ms += capture.raster_ms;
                    let name = image_file_name(&self.config.brand, &order.pos_code, &order.pos_name);
                    let path = sink.deliver(&name, capture.image).await?;
                    artifacts.push(path.clone());
                    self.step_completed(step, total);
                    PageOutcome {
                        step,
                        block: key.id(),
                        written: Some(PageTarget::Image(path)),
                        error: None,
                    }
                }
                None => self.step_skipped(step, total, &key),
            };
            pages.push(outcome);
        }

        let written = artifacts.len();
        Ok(ExportOutput {
            mode: ExportMode::Images,
            artifacts,
            stats: stats(&pages, written, start, raster_ms),
            pages,
        })
    }

    /// Locate, settle, rasterise and encode one block. `None` if it is missing.
    async fn capture(&self, key: &BlockKey, settle: bool) -> Result<Option<Capture>, DispatchError> {
        if !self.surface.locate(key) {
            return Ok(None);
        }

        if settle && self.config.settle_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        }

        let raster_start = Instant::now();
        let raster = self
            .surface
            .rasterize(key, &RasterOptions::at_scale(self.config.scale))
            .await?;
        let raster_ms = raster_start.elapsed().as_millis() as u64;

        let image = encode_jpeg(&raster, self.config.jpeg_quality).map_err(|e| {
            DispatchError::EncodeFailed {
                block: key.id(),
                detail: e.to_string(),
            }
        })?;
        debug!("Captured {} in {}ms", key, raster_ms);

        Ok(Some(Capture { image, raster_ms }))
    }

    fn begin(&self, total: usize) {
        self.progress.begin(total);
        info!("Exporting {} pages", total);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_export_start(total);
        }
    }

    fn step_started(&self, step: usize, total: usize, key: &BlockKey) {
        self.progress.advance(step);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_start(step, total, &key.id());
        }
    }

    fn step_completed(&self, step: usize, total: usize) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_complete(step, total);
        }
    }

    fn step_skipped(&self, step: usize, total: usize, key: &BlockKey) -> PageOutcome {
        let err = PageError::BlockNotFound {
            page: step,
            block: key.id(),
        };
        warn!("{}", err);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_page_skipped(step, total, &err.to_string());
        }
        PageOutcome {
            step,
            block: key.id(),
            written: None,
            error: Some(err),
        }
    }
}

fn stats(pages: &[PageOutcome], written: usize, start: Instant, raster_ms: u64) -> ExportStats {
    ExportStats {
        total_steps: pages.len(),
        written_pages: written,
        skipped_pages: pages.iter().filter(|p| p.error.is_some()).count(),
        total_duration_ms: start.elapsed().as_millis() as u64,
        raster_duration_ms: raster_ms,
    }
}

// ── Convenience entry points ────────────────────────────────────────────────

/// Lay out `orders` with pdfium and export them as one PDF into `output_dir`.
pub async fn export_pdf(
    orders: &[StoreOrder],
    output_dir: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<ExportOutput, DispatchError> {
    let exporter = Exporter::new(PdfiumSurface::build(orders, config).await?, config.clone());
    let mut assembler = PdfiumAssembler::new(
        config.page_size.size_points(),
        config.pdfium_lib_path.clone(),
    );
    exporter
        .export_paginated(orders, &mut assembler, output_dir.as_ref())
        .await
}

/// Lay out `orders` with pdfium and write one JPEG per store into `output_dir`.
pub async fn export_images_to_dir(
    orders: &[StoreOrder],
    output_dir: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<ExportOutput, DispatchError> {
    let exporter = Exporter::new(PdfiumSurface::build(orders, config).await?, config.clone());
    let sink = DirectorySink::new(output_dir.as_ref());
    exporter.export_images(orders, &sink).await
}

/// Render a single store sheet to a PNG file for inspection.
pub async fn preview_store(
    orders: &[StoreOrder],
    pos_code: &str,
    output_path: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<PathBuf, DispatchError> {
    let exporter = Exporter::new(PdfiumSurface::build(orders, config).await?, config.clone());
    let png = exporter.preview(&BlockKey::store(pos_code)).await?;

    let path = output_path.as_ref().to_path_buf();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DispatchError::OutputWriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::write(&path, &png.data)
        .await
        .map_err(|e| DispatchError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginated_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(
            paginated_file_name("Adidas", "Dispatch", date),
            "Adidas_Dispatch_2026-03-07.pdf"
        );
        assert_eq!(
            paginated_file_name("Adidas", "配货汇总", date),
            "Adidas_配货汇总_2026-03-07.pdf"
        );
    }

    #[test]
    fn image_name_replaces_unsafe_characters() {
        assert_eq!(
            image_file_name("Adidas", "P001", "Mall / East: 2F"),
            "Adidas_P001_Mall _ East_ 2F.jpg"
        );
        assert_eq!(image_file_name("Adidas", "P002", "上海店"), "Adidas_P002_上海店.jpg");
    }

    #[test]
    fn in_flight_guard_rejects_reentry_and_resets() {
        let flag = AtomicBool::new(false);
        let progress = ProgressState::default();
        {
            let _g = InFlight::acquire(&flag, &progress).unwrap();
            progress.begin(3);
            assert!(matches!(
                InFlight::acquire(&flag, &progress),
                Err(DispatchError::ExportInProgress)
            ));
        }
        assert!(!flag.load(Ordering::SeqCst));
        assert!(!progress.snapshot().active);
        assert!(InFlight::acquire(&flag, &progress).is_ok());
    }
}
