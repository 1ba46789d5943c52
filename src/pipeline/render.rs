//! pdfium-backed render surface: lay the sheets out once, rasterise on demand.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async code. Every pdfium call here
//! runs inside `tokio::task::spawn_blocking` and binds its own `Pdfium`
//! handle, so no pdfium object ever crosses an `.await`.
//!
//! ## Why keep the layout as bytes?
//!
//! A `PdfDocument` borrows the `Pdfium` that opened it and cannot be moved
//! between threads. The surface therefore stores the laid-out document as
//! PDF bytes and reopens it for each rasterisation. Reopening a few hundred
//! kilobytes costs far less than the rasterisation itself.

use crate::config::ExportConfig;
use crate::error::DispatchError;
use crate::model::StoreOrder;
use crate::pipeline::layout::{layout_document, LayoutOptions, SheetLabels};
use crate::pipeline::surface::{BlockKey, RasterOptions, RenderSurface};
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

// ── Binding ──────────────────────────────────────────────────────────────────

/// Bind to a pdfium library.
///
/// Tried in order: the explicit `lib_path`, `PDFIUM_LIB_PATH`, the working
/// directory, then the system library search path. Either path may name the
/// library file itself or the directory that contains it.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, DispatchError> {
    let mut attempts = Vec::new();

    let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
    let candidates = lib_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(env_path)
        .chain(std::iter::once(PathBuf::from("./")));

    for candidate in candidates {
        let file = if candidate.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&candidate)
        } else {
            candidate.clone()
        };
        match Pdfium::bind_to_library(&file) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", file.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {:?}", file.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(DispatchError::PdfiumBindingFailed(attempts.join("; ")))
        }
    }
}

// ── Surface ──────────────────────────────────────────────────────────────────

/// Store sheets laid out as a pdfium document, one page per block.
pub struct PdfiumSurface {
    layout: Arc<Vec<u8>>,
    blocks: HashMap<BlockKey, u16>,
    lib_path: Option<PathBuf>,
    capturing: AtomicBool,
}

impl PdfiumSurface {
    /// Lay out the summary and every store sheet.
    pub async fn build(
        orders: &[StoreOrder],
        config: &ExportConfig,
    ) -> Result<Self, DispatchError> {
        if orders.len() >= u16::MAX as usize {
            return Err(DispatchError::TooManyStores {
                count: orders.len(),
                max: u16::MAX as usize - 1,
            });
        }

        let options = LayoutOptions {
            page_size: config.page_size.size_points(),
            brand: config.brand.clone(),
            labels: SheetLabels::for_locale(config.locale),
            font_path: config.font_path.clone(),
            date: chrono::Utc::now().date_naive(),
        };
        let lib_path = config.pdfium_lib_path.clone();
        let owned = orders.to_vec();
        let bind_path = lib_path.clone();

        let layout = tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium(bind_path.as_deref())?;
            layout_document(&pdfium, &owned, &options)
        })
        .await
        .map_err(|e| DispatchError::Internal(format!("Layout task panicked: {}", e)))??;

        let mut blocks = HashMap::with_capacity(orders.len() + 1);
        blocks.insert(BlockKey::Summary, 0);
        for (i, order) in orders.iter().enumerate() {
            // Duplicate codes cannot come out of the grouping step; keep the first.
            blocks
                .entry(BlockKey::store(order.pos_code.clone()))
                .or_insert(i as u16 + 1);
        }

        info!(
            "Laid out {} store sheets ({} KB)",
            orders.len(),
            layout.len() / 1024
        );

        Ok(Self {
            layout: Arc::new(layout),
            blocks,
            lib_path,
            capturing: AtomicBool::new(false),
        })
    }

    /// Number of addressable blocks, summary included.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The laid-out sheets as a vector PDF.
    pub fn layout_bytes(&self) -> &[u8] {
        &self.layout
    }

    /// Write the vector layout as-is, for direct printing.
    pub async fn save_layout(&self, path: &Path) -> Result<(), DispatchError> {
        tokio::fs::write(path, self.layout.as_slice())
            .await
            .map_err(|e| DispatchError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        info!("Wrote printable layout → {}", path.display());
        Ok(())
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderSurface for PdfiumSurface {
    fn locate(&self, key: &BlockKey) -> bool {
        self.blocks.contains_key(key)
    }

    async fn rasterize(
        &self,
        key: &BlockKey,
        options: &RasterOptions,
    ) -> Result<DynamicImage, DispatchError> {
        let index = *self
            .blocks
            .get(key)
            .ok_or_else(|| DispatchError::RasterisationFailed {
                block: key.id(),
                detail: "block is not on the surface".into(),
            })?;

        let layout = Arc::clone(&self.layout);
        let lib_path = self.lib_path.clone();
        let options = *options;
        let capturing = self.is_capturing();
        let block = key.id();

        tokio::task::spawn_blocking(move || {
            rasterize_blocking(&layout, lib_path.as_deref(), index, &options, capturing)
                .map_err(|detail| DispatchError::RasterisationFailed { block, detail })
        })
        .await
        .map_err(|e| DispatchError::Internal(format!("Render task panicked: {}", e)))?
    }

    fn set_capturing(&self, capturing: bool) {
        self.capturing.store(capturing, Ordering::SeqCst);
    }
}

/// Blocking implementation of block rasterisation.
fn rasterize_blocking(
    layout: &[u8],
    lib_path: Option<&Path>,
    index: u16,
    options: &RasterOptions,
    capturing: bool,
) -> Result<DynamicImage, String> {
    let pdfium = bind_pdfium(lib_path).map_err(|e| e.to_string())?;
    let document = pdfium
        .load_pdf_from_byte_slice(layout, None)
        .map_err(|e| format!("{:?}", e))?;

    let page = document
        .pages()
        .get(index)
        .map_err(|e| format!("{:?}", e))?;

    let [r, g, b] = options.background;
    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(options.scale)
        .set_clear_color(PdfColor::new(r, g, b, 255))
        .render_annotations(!capturing)
        .render_form_data(!capturing);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| format!("{:?}", e))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered block {} → {}x{} px",
        index,
        image.width(),
        image.height()
    );
    Ok(image)
}
