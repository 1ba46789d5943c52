//! Paginated output: one JPEG per page of a new PDF document.

use crate::error::DispatchError;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::render::bind_pdfium;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Collects page images and writes them out as one document.
#[async_trait]
pub trait PageAssembler: Send {
    /// Append one page holding `image`.
    fn add_page(&mut self, image: EncodedImage);

    /// Pages added so far.
    fn page_count(&self) -> usize;

    /// Write the document to `path`.
    async fn save(&mut self, path: &Path) -> Result<(), DispatchError>;
}

/// Builds the document with pdfium at a fixed page size.
///
/// Each image spans the page width with its aspect ratio kept, anchored at
/// the top. An image taller than the page is the exception: it is shrunk to
/// the page height and centred horizontally, so it no longer spans the full
/// width. Nothing is clipped. See [`image_placement`].
pub struct PdfiumAssembler {
    page_size: (f32, f32),
    lib_path: Option<PathBuf>,
    pages: Vec<EncodedImage>,
}

impl PdfiumAssembler {
    /// `page_size` is width × height in points.
    pub fn new(page_size: (f32, f32), lib_path: Option<PathBuf>) -> Self {
        Self {
            page_size,
            lib_path,
            pages: Vec::new(),
        }
    }
}

#[async_trait]
impl PageAssembler for PdfiumAssembler {
    fn add_page(&mut self, image: EncodedImage) {
        self.pages.push(image);
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    async fn save(&mut self, path: &Path) -> Result<(), DispatchError> {
        let pages = std::mem::take(&mut self.pages);
        let count = pages.len();
        let page_size = self.page_size;
        let lib_path = self.lib_path.clone();
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            assemble_blocking(&pages, page_size, lib_path.as_deref(), &target)
        })
        .await
        .map_err(|e| DispatchError::Internal(format!("Save task panicked: {}", e)))??;

        info!("Saved {} pages → {}", count, path.display());
        Ok(())
    }
}

/// Where an image of the given aspect ratio lands on a page.
///
/// Returns `(x, y, width, height)` in points with a bottom-left origin.
/// Full page width unless that would overflow the page height, in which case
/// the height is capped and the narrower image is centred.
pub fn image_placement(aspect: f32, page_size: (f32, f32)) -> (f32, f32, f32, f32) {
    let (page_w, page_h) = page_size;
    let mut w = page_w;
    let mut h = page_w * aspect;
    if h > page_h {
        h = page_h;
        w = page_h / aspect;
    }
    ((page_w - w) / 2.0, page_h - h, w, h)
}

fn assemble_blocking(
    pages: &[EncodedImage],
    page_size: (f32, f32),
    lib_path: Option<&Path>,
    path: &Path,
) -> Result<(), DispatchError> {
    let save_failed = |detail: String| DispatchError::SaveFailed {
        path: path.to_path_buf(),
        detail,
    };

    let pdfium = bind_pdfium(lib_path)?;
    let mut document = pdfium
        .create_new_pdf()
        .map_err(|e| save_failed(format!("{:?}", e)))?;

    for (i, encoded) in pages.iter().enumerate() {
        let image = encoded.decode().map_err(|e| DispatchError::EncodeFailed {
            block: format!("page {}", i + 1),
            detail: e.to_string(),
        })?;

        let (x, y, w, h) = image_placement(encoded.aspect_ratio(), page_size);

        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(
                PdfPoints::new(page_size.0),
                PdfPoints::new(page_size.1),
            ))
            .map_err(|e| save_failed(format!("{:?}", e)))?;

        page.objects_mut()
            .create_image_object(
                PdfPoints::new(x),
                PdfPoints::new(y),
                &image,
                Some(PdfPoints::new(w)),
                Some(PdfPoints::new(h)),
            )
            .map_err(|e| save_failed(format!("{:?}", e)))?;

        debug!("Placed page {} at {:.0}x{:.0} pt", i + 1, w, h);
    }

    document
        .save_to_file(path)
        .map_err(|e| save_failed(format!("{:?}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const A4: (f32, f32) = (595.28, 841.89);

    #[test]
    fn wide_image_spans_page_width_at_top() {
        let (x, y, w, h) = image_placement(0.5, A4);
        assert_eq!(x, 0.0);
        assert_eq!(w, A4.0);
        assert!((h - A4.0 * 0.5).abs() < 0.01);
        assert!((y + h - A4.1).abs() < 0.01);
    }

    #[test]
    fn tall_image_is_shrunk_to_fit() {
        let (x, y, w, h) = image_placement(3.0, A4);
        assert!((h - A4.1).abs() < 0.01);
        assert!(w < A4.0);
        assert!((x - (A4.0 - w) / 2.0).abs() < 0.01);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn page_count_tracks_additions() {
        let mut asm = PdfiumAssembler::new(A4, None);
        assert_eq!(asm.page_count(), 0);
        asm.add_page(EncodedImage {
            data: vec![],
            width: 1,
            height: 1,
        });
        assert_eq!(asm.page_count(), 1);
    }
}
