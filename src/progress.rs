//! Progress reporting for exports: a callback trait plus an observable state.
//!
//! Inject an [`Arc<dyn ExportProgressCallback>`] via
//! [`crate::config::ExportConfigBuilder::progress_callback`] to receive events
//! as each page is produced. Pollers (a UI thread, a status endpoint) can
//! instead read [`ProgressState::snapshot`] from the running exporter.
//!
//! # Example
//!
//! ```rust
//! use dispatch2pdf::{ExportConfig, ExportProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ExportProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, current: usize, total: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {current} of {total}");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//! let config = ExportConfig::builder()
//!     .progress_callback(cb as Arc<dyn ExportProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Called by the export pipeline as it processes each page.
///
/// Pages are produced strictly in order, one at a time, but the callback may
/// be invoked from a Tokio worker thread, hence `Send + Sync`. All methods
/// default to no-ops.
pub trait ExportProgressCallback: Send + Sync {
    /// Called once before the first page.
    ///
    /// # Arguments
    /// * `total`: pages that will be attempted (summary included)
    fn on_export_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before a page is located and rasterised.
    ///
    /// # Arguments
    /// * `current`: 1-indexed page step
    /// * `total`: total steps
    /// * `block`: the block being captured, e.g. `order-page-P001`
    fn on_page_start(&self, current: usize, total: usize, block: &str) {
        let _ = (current, total, block);
    }

    /// Called after a page was rasterised and handed to the output.
    fn on_page_complete(&self, current: usize, total: usize) {
        let _ = (current, total);
    }

    /// Called when a page was omitted because its block was missing.
    fn on_page_skipped(&self, current: usize, total: usize, reason: &str) {
        let _ = (current, total, reason);
    }

    /// Called once after every page was attempted and the output was written.
    ///
    /// # Arguments
    /// * `total`: total steps
    /// * `written`: pages that made it into the output
    fn on_export_complete(&self, total: usize, written: usize) {
        let _ = (total, written);
    }

    /// Called once when the export aborts.
    fn on_export_failed(&self, error: &str) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExportProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExportConfig`].
pub type ProgressCallback = Arc<dyn ExportProgressCallback>;

/// Live "page i of n" state of the running export.
///
/// Owned by the exporter. Reset to inactive `0 / 0` whenever an export ends,
/// however it ends.
#[derive(Debug, Default)]
pub struct ProgressState {
    active: AtomicBool,
    current: AtomicUsize,
    total: AtomicUsize,
}

impl ProgressState {
    pub(crate) fn begin(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.current.store(0, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
    }

    pub(crate) fn advance(&self, current: usize) {
        self.current.store(current, Ordering::SeqCst);
    }

    pub(crate) fn reset(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.current.store(0, Ordering::SeqCst);
        self.total.store(0, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            active: self.active.load(Ordering::SeqCst),
            current: self.current.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time copy of a [`ProgressState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressSnapshot {
    pub active: bool,
    pub current: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    /// Completion as a whole percentage; 0 when nothing is running.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current.min(self.total) * 100) / self.total) as u8
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} of {}", self.current, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_export_start(4);
        cb.on_page_start(1, 4, "summary-page");
        cb.on_page_complete(1, 4);
        cb.on_page_skipped(2, 4, "missing");
        cb.on_export_complete(4, 3);
        cb.on_export_failed("boom");
    }

    #[test]
    fn state_lifecycle() {
        let state = ProgressState::default();
        assert_eq!(state.snapshot(), ProgressSnapshot::default());

        state.begin(4);
        state.advance(1);
        let snap = state.snapshot();
        assert!(snap.active);
        assert_eq!(snap.to_string(), "page 1 of 4");
        assert_eq!(snap.percent(), 25);

        state.reset();
        let snap = state.snapshot();
        assert!(!snap.active);
        assert_eq!((snap.current, snap.total), (0, 0));
        assert_eq!(snap.percent(), 0);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ExportProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_export_start(10);
        cb.on_page_complete(1, 10);
    }
}
