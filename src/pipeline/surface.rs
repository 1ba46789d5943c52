//! The seam between the exporter and whatever holds the rendered sheets.
//!
//! The exporter never touches pdfium directly. It asks a [`RenderSurface`]
//! whether a block exists and for a raster of it, so the export loop can be
//! driven against an in-memory fake in tests.

use crate::error::DispatchError;
use async_trait::async_trait;
use image::DynamicImage;
use std::fmt;

/// Identifies one rendered block on the surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKey {
    /// The summary index page.
    Summary,
    /// The order sheet of the store with this code.
    Store(String),
}

impl BlockKey {
    pub fn store(code: impl Into<String>) -> Self {
        BlockKey::Store(code.into())
    }

    /// Stable identifier, e.g. `summary-page` or `order-page-P001`.
    pub fn id(&self) -> String {
        match self {
            BlockKey::Summary => "summary-page".to_string(),
            BlockKey::Store(code) => format!("order-page-{code}"),
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// How a block should be rasterised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterOptions {
    /// Pixels per point.
    pub scale: f32,
    /// Background the block is flattened onto, RGB.
    pub background: [u8; 3],
}

impl RasterOptions {
    pub fn at_scale(scale: f32) -> Self {
        Self {
            scale,
            background: [255, 255, 255],
        }
    }
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self::at_scale(2.0)
    }
}

/// Something the exporter can capture blocks from.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Whether the block is present and can be rasterised.
    fn locate(&self, key: &BlockKey) -> bool;

    /// Rasterise a located block.
    async fn rasterize(
        &self,
        key: &BlockKey,
        options: &RasterOptions,
    ) -> Result<DynamicImage, DispatchError>;

    /// Toggle capturing mode. While set, preview-only decoration is hidden.
    fn set_capturing(&self, capturing: bool);
}

/// Holds a surface in capturing mode for as long as it lives.
pub struct CaptureGuard<'a, S: RenderSurface + ?Sized> {
    surface: &'a S,
}

impl<'a, S: RenderSurface + ?Sized> CaptureGuard<'a, S> {
    pub fn new(surface: &'a S) -> Self {
        surface.set_capturing(true);
        Self { surface }
    }
}

impl<S: RenderSurface + ?Sized> Drop for CaptureGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.set_capturing(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Flag(AtomicBool);

    #[async_trait]
    impl RenderSurface for Flag {
        fn locate(&self, _key: &BlockKey) -> bool {
            true
        }
        async fn rasterize(
            &self,
            _key: &BlockKey,
            _options: &RasterOptions,
        ) -> Result<DynamicImage, DispatchError> {
            Ok(DynamicImage::new_rgb8(1, 1))
        }
        fn set_capturing(&self, capturing: bool) {
            self.0.store(capturing, Ordering::SeqCst);
        }
    }

    #[test]
    fn block_ids() {
        assert_eq!(BlockKey::Summary.id(), "summary-page");
        assert_eq!(BlockKey::store("P001").id(), "order-page-P001");
        assert_eq!(BlockKey::store("P001").to_string(), "order-page-P001");
    }

    #[test]
    fn guard_releases_on_drop() {
        let surface = Flag::default();
        {
            let _guard = CaptureGuard::new(&surface);
            assert!(surface.0.load(Ordering::SeqCst));
        }
        assert!(!surface.0.load(Ordering::SeqCst));
    }

    #[test]
    fn guard_releases_on_unwind() {
        let surface = Flag::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = CaptureGuard::new(&surface);
            panic!("rasteriser blew up");
        }));
        assert!(result.is_err());
        assert!(!surface.0.load(Ordering::SeqCst));
    }

    #[test]
    fn trait_object_rasterises() {
        let surface: Box<dyn RenderSurface> = Box::new(Flag::default());
        assert!(surface.locate(&BlockKey::Summary));
        let img = tokio_test::block_on(surface.rasterize(&BlockKey::Summary, &RasterOptions::default()))
            .unwrap();
        assert_eq!((img.width(), img.height()), (1, 1));
    }

    #[test]
    fn default_raster_is_white_at_2x() {
        let o = RasterOptions::default();
        assert_eq!(o.scale, 2.0);
        assert_eq!(o.background, [255, 255, 255]);
    }
}
