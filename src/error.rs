//! Error types for the dispatch2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DispatchError`] is **fatal**: the load or export cannot proceed
//!   (unreadable workbook, nothing recognised, rasteriser crashed, output not
//!   writable). Returned as `Err(DispatchError)` from the public entry points.
//!
//! * [`PageError`] is **non-fatal**: a single page could not be produced
//!   (its rendered block is missing) but the export carries on. Stored in
//!   [`crate::output::PageOutcome`] so callers can see which pages were
//!   omitted.

use std::path::PathBuf;
use thiserror::Error;

/// Notice shown when an input produced no store orders.
pub const NO_DATA_NOTICE: &str =
    "No valid dispatch data was recognised. Check that the sheet layout matches the expected columns.";

/// Notice shown when an export was aborted.
pub const EXPORT_FAILED_NOTICE: &str =
    "Export failed. Try exporting fewer stores at a time.";

/// All fatal errors returned by the dispatch2pdf library.
#[derive(Debug, Error)]
pub enum DispatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input is neither a spreadsheet nor UTF-8 text.
    #[error("Unsupported input '{path}': {reason}")]
    UnsupportedInput { path: PathBuf, reason: String },

    /// The bytes could not be decoded as a workbook.
    #[error("Spreadsheet could not be read: {detail}")]
    WorkbookUnreadable { detail: String },

    /// The workbook decoded but contains no sheets.
    #[error("Spreadsheet contains no sheets")]
    NoSheets,

    /// Parsing finished without producing a single store order.
    #[error("No store orders recognised in '{source_name}'")]
    NoRecordsRecognized { source_name: String },

    /// More stores than the configured cap.
    #[error("{count} stores exceed the configured limit of {max}\nRaise --max-stores or split the input.")]
    TooManyStores { count: usize, max: usize },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Another export is still running on the same exporter.
    #[error("An export is already in progress")]
    ExportInProgress,

    /// The rasteriser failed on a block that was located.
    #[error("Rasterisation failed for '{block}': {detail}")]
    RasterisationFailed { block: String, detail: String },

    /// A raster could not be encoded or decoded.
    #[error("Image encoding failed for '{block}': {detail}")]
    EncodeFailed { block: String, detail: String },

    /// The sheet layout document could not be built.
    #[error("Sheet layout failed: {0}")]
    LayoutFailed(String),

    /// The paginated document could not be assembled or saved.
    #[error("Failed to save document '{path}': {detail}")]
    SaveFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n\
  • Pass --pdfium-lib /path/to/libpdfium.\n\
  • Place libpdfium next to the executable's working directory.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// True for errors raised while reading or recognising input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DispatchError::FileNotFound { .. }
                | DispatchError::PermissionDenied { .. }
                | DispatchError::UnsupportedInput { .. }
                | DispatchError::WorkbookUnreadable { .. }
                | DispatchError::NoSheets
                | DispatchError::NoRecordsRecognized { .. }
        )
    }

    /// The short, user-facing notice for this error.
    ///
    /// Input problems collapse to "no data recognised"; everything that
    /// happens once an export has started collapses to a generic export
    /// failure. Configuration and re-entry errors keep their own message.
    pub fn user_notice(&self) -> String {
        match self {
            DispatchError::FileNotFound { .. }
            | DispatchError::PermissionDenied { .. }
            | DispatchError::UnsupportedInput { .. } => self.to_string(),
            e if e.is_input_error() => NO_DATA_NOTICE.to_string(),
            DispatchError::InvalidConfig(_)
            | DispatchError::TooManyStores { .. }
            | DispatchError::ExportInProgress
            | DispatchError::PdfiumBindingFailed(_) => self.to_string(),
            _ => EXPORT_FAILED_NOTICE.to_string(),
        }
    }
}

/// A non-fatal error for a single export page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The rendered block for this page could not be located.
    #[error("Page {page}: rendered block '{block}' not found")]
    BlockNotFound { page: usize, block: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_stores_display() {
        let e = DispatchError::TooManyStores { count: 120, max: 100 };
        let msg = e.to_string();
        assert!(msg.contains("120"), "got: {msg}");
        assert!(msg.contains("100"), "got: {msg}");
    }

    #[test]
    fn rasterisation_failure_maps_to_generic_notice() {
        let e = DispatchError::RasterisationFailed {
            block: "order-page-P001".into(),
            detail: "bitmap allocation failed".into(),
        };
        assert_eq!(e.user_notice(), EXPORT_FAILED_NOTICE);
        assert!(!e.is_input_error());
    }

    #[test]
    fn empty_input_maps_to_no_data_notice() {
        let e = DispatchError::NoRecordsRecognized {
            source_name: "orders.xlsx".into(),
        };
        assert!(e.is_input_error());
        assert_eq!(e.user_notice(), NO_DATA_NOTICE);

        let e = DispatchError::WorkbookUnreadable {
            detail: "invalid zip header".into(),
        };
        assert_eq!(e.user_notice(), NO_DATA_NOTICE);
    }

    #[test]
    fn file_not_found_keeps_path_in_notice() {
        let e = DispatchError::FileNotFound {
            path: PathBuf::from("/tmp/missing.xlsx"),
        };
        assert!(e.user_notice().contains("missing.xlsx"));
    }

    #[test]
    fn block_not_found_display() {
        let e = PageError::BlockNotFound {
            page: 3,
            block: "order-page-P002".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 3"));
        assert!(msg.contains("order-page-P002"));
    }
}
