//! Observer trait for pipeline lifecycle events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::ConversionConfigBuilder::observer`] or
//! [`crate::controller::PipelineController::with_observer`] to drive a
//! progress indicator: it is shown on [`PipelineObserver::on_conversion_start`]
//! and hidden on either completion event.
//!
//! # Example
//!
//! ```rust
//! use edgequake_convert::{FormatKey, PipelineObserver};
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! struct Spinner {
//!     visible: AtomicBool,
//! }
//!
//! impl PipelineObserver for Spinner {
//!     fn on_conversion_start(&self, _format: &str, _source: &str) {
//!         self.visible.store(true, Ordering::SeqCst);
//!     }
//!     fn on_conversion_complete(&self, _format: FormatKey, _bytes: usize) {
//!         self.visible.store(false, Ordering::SeqCst);
//!     }
//!     fn on_conversion_error(&self, _message: &str) {
//!         self.visible.store(false, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::format::FormatKey;
use std::sync::Arc;

/// Called by the pipeline controller as a request moves through its states.
///
/// Implementations must be `Send + Sync`; the controller may be shared across
/// tasks. All methods have default no-op implementations.
pub trait PipelineObserver: Send + Sync {
    /// The pipeline entered Running.
    ///
    /// # Arguments
    /// * `format`: the raw format key of the request
    /// * `source`: file name of the source
    fn on_conversion_start(&self, format: &str, source: &str) {
        let _ = (format, source);
    }

    /// The pipeline entered Succeeded.
    ///
    /// # Arguments
    /// * `format`: the conversion that ran
    /// * `bytes`: size of the produced artifact
    fn on_conversion_complete(&self, format: FormatKey, bytes: usize) {
        let _ = (format, bytes);
    }

    /// The pipeline entered Failed. `message` is the user-facing reason.
    fn on_conversion_error(&self, message: &str) {
        let _ = message;
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressObserver = Arc<dyn PipelineObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PipelineObserver for CountingObserver {
        fn on_conversion_start(&self, _format: &str, _source: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _format: FormatKey, _bytes: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_error(&self, _message: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_conversion_start("pdf2jpg", "a.pdf");
        o.on_conversion_complete(FormatKey::PdfToJpg, 10);
        o.on_conversion_error("boom");
    }

    #[test]
    fn counting_observer_receives_events() {
        let o = CountingObserver::default();
        o.on_conversion_start("pdf2word", "a.pdf");
        o.on_conversion_complete(FormatKey::PdfToWord, 12);
        o.on_conversion_start("word2pdf", "b.docx");
        o.on_conversion_error("bad docx");
        assert_eq!(o.starts.load(Ordering::SeqCst), 2);
        assert_eq!(o.completes.load(Ordering::SeqCst), 1);
        assert_eq!(o.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: ProgressObserver = Arc::new(NoopObserver);
        o.on_conversion_start("mp4tomp3", "clip.mp4");
    }
}
