//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks each page.
//!
//! Callers can forward events to a channel, a terminal progress bar or a log
//! without the library knowing how the host application communicates. The
//! trait is `Send + Sync` because extraction runs on a blocking worker thread.
//!
//! # Example
//!
//! ```rust
//! use pdftext2md::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     pages: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, blocks: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} blocks", page_num, total_pages, blocks);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     pages: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::ImageEncodingError;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. When several documents are converted concurrently
/// with [`crate::stream::convert_stream`], one callback may receive events
/// from different threads at once.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first page is extracted.
    ///
    /// # Arguments
    /// * `total_pages` — number of pages that will be processed
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before the objects of a page are walked.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages selected for conversion
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been turned into blocks.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages selected for conversion
    /// * `blocks`      — number of text blocks found on the page
    fn on_page_complete(&self, page_num: usize, total_pages: usize, blocks: usize) {
        let _ = (page_num, total_pages, blocks);
    }

    /// Called for every image dropped because it could not be encoded.
    fn on_image_skipped(&self, error: &ImageEncodingError) {
        let _ = error;
    }

    /// Called once after formatting finishes.
    ///
    /// # Arguments
    /// * `total_pages` — pages processed
    /// * `images`      — images returned or embedded
    fn on_conversion_complete(&self, total_pages: usize, images: usize) {
        let _ = (total_pages, images);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        blocks: AtomicUsize,
        skipped: AtomicUsize,
        started_total: AtomicUsize,
        completed_images: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, blocks: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.blocks.fetch_add(blocks, Ordering::SeqCst);
        }

        fn on_image_skipped(&self, _error: &ImageEncodingError) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total_pages: usize, images: usize) {
            self.completed_images.store(images, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 42);
        cb.on_image_skipped(&ImageEncodingError::EmptyPayload { index: 0, page: 1 });
        cb.on_conversion_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_conversion_start(2);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 2);

        tracker.on_page_start(1, 2);
        tracker.on_page_complete(1, 2, 7);
        tracker.on_page_start(2, 2);
        tracker.on_page_complete(2, 2, 3);
        tracker.on_image_skipped(&ImageEncodingError::UnknownFormat { index: 1, page: 2 });
        tracker.on_conversion_complete(2, 5);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.blocks.load(Ordering::SeqCst), 10);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completed_images.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(10);
        cb.on_page_start(1, 10);
        cb.on_page_complete(1, 10, 12);
    }
}
