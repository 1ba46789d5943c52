//! Image encoding: `DynamicImage` → JPEG (or PNG for previews).
//!
//! Exported sheets are JPEG because they end up either embedded in a
//! multi-page PDF or sent around as standalone files, where size matters
//! more than losslessness. The raster is flattened to RGB first: sheets are
//! rendered onto an opaque background, and JPEG has no alpha channel.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// An encoded raster plus its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// Decode back into pixels.
    pub fn decode(&self) -> Result<DynamicImage, image::ImageError> {
        image::load_from_memory(&self.data)
    }

    /// Height over width, used to size the image on a page.
    pub fn aspect_ratio(&self) -> f32 {
        if self.width == 0 {
            return 1.0;
        }
        self.height as f32 / self.width as f32
    }
}

/// Encode a rasterised sheet as JPEG at `quality` (1–100).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<EncodedImage, image::ImageError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;

    debug!(
        "Encoded {}x{} raster → {} bytes JPEG (q={})",
        rgb.width(),
        rgb.height(),
        buf.len(),
        quality
    );

    Ok(EncodedImage {
        data: buf,
        width: rgb.width(),
        height: rgb.height(),
    })
}

/// Encode a raster as lossless PNG.
pub fn encode_png(img: &DynamicImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(EncodedImage {
        data: buf,
        width: img.width(),
        height: img.height(),
    })
}
