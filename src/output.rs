//! Result types returned by the export entry points.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which artifact an export produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportMode {
    /// One multi-page document, summary page first.
    Paginated,
    /// One JPEG per store, no summary.
    Images,
}

/// Outcome of one export step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-indexed step number (the progress "current" value).
    pub step: usize,
    /// Block identifier, e.g. `summary-page` or `order-page-P001`.
    pub block: String,
    /// Where the page went: a page number in the document, or an image path.
    pub written: Option<PageTarget>,
    /// Why the page is absent, when it is.
    pub error: Option<PageError>,
}

/// Destination of a successfully exported page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageTarget {
    /// 1-indexed page inside the paginated document.
    DocumentPage(usize),
    /// Standalone image file.
    Image(PathBuf),
}

/// Aggregate numbers for one export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportStats {
    /// Steps attempted (the progress total).
    pub total_steps: usize,
    /// Pages that reached the output.
    pub written_pages: usize,
    /// Pages omitted because their block was missing.
    pub skipped_pages: usize,
    pub total_duration_ms: u64,
    /// Time spent inside the rasteriser.
    pub raster_duration_ms: u64,
}

/// Everything an export produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOutput {
    pub mode: ExportMode,
    /// Files written: the single document, or one image per store.
    pub artifacts: Vec<PathBuf>,
    pub pages: Vec<PageOutcome>,
    pub stats: ExportStats,
}

impl ExportOutput {
    /// Steps that were skipped, in order.
    pub fn skipped(&self) -> impl Iterator<Item = &PageOutcome> {
        self.pages.iter().filter(|p| p.error.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_skips() {
        let out = ExportOutput {
            mode: ExportMode::Paginated,
            artifacts: vec![PathBuf::from("out/Adidas_Dispatch_2026-10-16.pdf")],
            pages: vec![
                PageOutcome {
                    step: 1,
                    block: "summary-page".into(),
                    written: Some(PageTarget::DocumentPage(1)),
                    error: None,
                },
                PageOutcome {
                    step: 2,
                    block: "order-page-P001".into(),
                    written: None,
                    error: Some(PageError::BlockNotFound {
                        page: 2,
                        block: "order-page-P001".into(),
                    }),
                },
            ],
            stats: ExportStats {
                total_steps: 2,
                written_pages: 1,
                skipped_pages: 1,
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&out).unwrap();
        let back: ExportOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, out);
        assert_eq!(back.skipped().count(), 1);
    }
}
