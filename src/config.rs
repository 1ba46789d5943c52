//! Configuration types for rendering and exporting dispatch sheets.
//!
//! All export behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. Setters clamp to sane ranges; [`ExportConfigBuilder::build`]
//! rejects the combinations a clamp cannot fix.

use crate::error::DispatchError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const POINTS_PER_MM: f32 = 72.0 / 25.4;

/// Configuration for laying out, rasterising and exporting store sheets.
///
/// # Example
/// ```rust
/// use dispatch2pdf::{ExportConfig, Locale};
///
/// let config = ExportConfig::builder()
///     .scale(2.0)
///     .jpeg_quality(90)
///     .brand("Adidas")
///     .locale(Locale::Zh)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Rasterisation scale relative to the sheet's point size. Range: 0.5–4.0. Default: 2.0.
    ///
    /// At 2.0 an A4 sheet rasterises to roughly 1190 × 1684 px, enough for
    /// 8 pt table text to stay legible when printed.
    pub scale: f32,

    /// JPEG quality for every exported raster. Range: 1–100. Default: 90.
    pub jpeg_quality: u8,

    /// Pause before rasterising each store block, in milliseconds. Default: 200.
    pub settle_delay_ms: u64,

    /// Output page size for the paginated document. Default: A4.
    pub page_size: PageSize,

    /// Brand prefix used in sheet titles and file names. Default: "Adidas".
    pub brand: String,

    /// Language of the printed labels. Default: English.
    pub locale: Locale,

    /// TrueType font used for sheet text. Required for CJK store names.
    pub font_path: Option<PathBuf>,

    /// Explicit pdfium library (file or directory).
    /// Falls back to `PDFIUM_LIB_PATH`, the working directory, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Refuse to export more stores than this. Default: no limit.
    pub max_stores: Option<usize>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scale: 2.0,
            jpeg_quality: 90,
            settle_delay_ms: 200,
            page_size: PageSize::default(),
            brand: "Adidas".to_string(),
            locale: Locale::default(),
            font_path: None,
            pdfium_lib_path: None,
            max_stores: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("scale", &self.scale)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("page_size", &self.page_size)
            .field("brand", &self.brand)
            .field("locale", &self.locale)
            .field("font_path", &self.font_path)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("max_stores", &self.max_stores)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExportProgressCallback>"),
            )
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExportConfig`].
#[derive(Debug)]
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl ExportConfigBuilder {
    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale.clamp(0.5, 4.0);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.config.brand = brand.into();
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.config.locale = locale;
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn max_stores(mut self, n: usize) -> Self {
        self.config.max_stores = Some(n);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, DispatchError> {
        let c = &self.config;
        if c.brand.trim().is_empty() {
            return Err(DispatchError::InvalidConfig(
                "Brand prefix must not be empty".into(),
            ));
        }
        if c.brand.contains(['/', '\\']) {
            return Err(DispatchError::InvalidConfig(format!(
                "Brand prefix '{}' must not contain path separators",
                c.brand
            )));
        }
        if let PageSize::Custom { width_mm, height_mm } = c.page_size {
            if !(width_mm > 0.0 && height_mm > 0.0) {
                return Err(DispatchError::InvalidConfig(format!(
                    "Page size must be positive, got {width_mm}×{height_mm} mm"
                )));
            }
        }
        if c.max_stores == Some(0) {
            return Err(DispatchError::InvalidConfig(
                "max_stores must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output page size of the paginated document.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// 210 × 297 mm. (default)
    #[default]
    A4,
    /// 8.5 × 11 in.
    Letter,
    /// Any portrait size in millimetres.
    Custom { width_mm: f32, height_mm: f32 },
}

impl PageSize {
    pub fn size_mm(&self) -> (f32, f32) {
        match *self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Custom {
                width_mm,
                height_mm,
            } => (width_mm, height_mm),
        }
    }

    /// Width and height in PDF points (1/72 in).
    pub fn size_points(&self) -> (f32, f32) {
        let (w, h) = self.size_mm();
        (w * POINTS_PER_MM, h * POINTS_PER_MM)
    }
}

/// Language of the printed sheet labels and the summary file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    /// English labels. (default)
    #[default]
    En,
    /// Simplified Chinese labels; pair with a CJK `font_path`.
    Zh,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExportConfig::default();
        assert_eq!(c.scale, 2.0);
        assert_eq!(c.jpeg_quality, 90);
        assert_eq!(c.settle_delay_ms, 200);
        assert_eq!(c.page_size, PageSize::A4);
        assert_eq!(c.locale, Locale::En);
        assert!(c.max_stores.is_none());
    }

    #[test]
    fn builder_clamps() {
        let c = ExportConfig::builder()
            .scale(10.0)
            .jpeg_quality(0)
            .build()
            .unwrap();
        assert_eq!(c.scale, 4.0);
        assert_eq!(c.jpeg_quality, 1);
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(ExportConfig::builder().brand("  ").build().is_err());
        assert!(ExportConfig::builder().brand("a/b").build().is_err());
        assert!(ExportConfig::builder().max_stores(0).build().is_err());
        assert!(ExportConfig::builder()
            .page_size(PageSize::Custom {
                width_mm: 0.0,
                height_mm: 100.0
            })
            .build()
            .is_err());
    }

    #[test]
    fn a4_in_points() {
        let (w, h) = PageSize::A4.size_points();
        assert!((w - 595.28).abs() < 0.01, "w = {w}");
        assert!((h - 841.89).abs() < 0.01, "h = {h}");
    }

    #[test]
    fn debug_hides_callback() {
        let s = format!("{:?}", ExportConfig::default());
        assert!(s.contains("ExportConfig"));
        assert!(s.contains("progress_callback"));
    }
}
