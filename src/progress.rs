//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline converts each SVG.
//!
//! Files are converted concurrently, so `on_file_start`, `on_file_complete`
//! and `on_file_error` may be called from several worker threads at once and
//! in completion order, not input order.
//!
//! # Example
//!
//! ```rust
//! use svgpdf_merge::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, index: usize, total: usize, pdf_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total} done (#{index}: {pdf_len} bytes)");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each file.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based input position.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any file is converted.
    fn on_conversion_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a worker picks up a file.
    fn on_file_start(&self, index: usize, total_files: usize, path: &Path) {
        let _ = (index, total_files, path);
    }

    /// Called when a file converted successfully.
    ///
    /// `pdf_len` is the byte length of the produced PDF fragment.
    fn on_file_complete(&self, index: usize, total_files: usize, pdf_len: usize) {
        let _ = (index, total_files, pdf_len);
    }

    /// Called when a file failed to convert. The run will fail once every
    /// started file has finished.
    fn on_file_error(&self, index: usize, total_files: usize, error: &str) {
        let _ = (index, total_files, error);
    }

    /// Called once after every file has been attempted.
    fn on_conversion_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
