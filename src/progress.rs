//! Progress-callback trait for per-block conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::RenderConfigBuilder::progress_callback`] to receive
//! events as each diagram block is rendered.
//!
//! # Why a callback object instead of a global logger?
//!
//! The sink travels inside the config, so two conversions in one process
//! can report to two different places. The library still logs through
//! `tracing`; the callback is for hosts that want structured per-block
//! events (a progress bar, a job record) without parsing log lines.
//!
//! # Example
//!
//! ```rust
//! use mdsketch::{ConversionProgressCallback, RenderConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_block_complete(&self, index: usize, total: usize, _path: &std::path::Path) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("diagram {}/{} done", index + 1, total);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = RenderConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the conversion pass as it processes each diagram block.
///
/// Blocks are rendered strictly in order, so calls never overlap within one
/// conversion. The trait is still `Send + Sync` because the config that
/// carries it may be shared across tasks. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after extraction, before any block is rendered.
    fn on_conversion_start(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// Called just before a block is handed to the rendering engine.
    ///
    /// # Arguments
    /// * `index`: zero-based sequence index
    /// * `total`: number of blocks in the document
    fn on_block_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a block's final image has been written.
    fn on_block_complete(&self, index: usize, total: usize, path: &Path) {
        let _ = (index, total, path);
    }

    /// Called when a block failed and will be absent from the output.
    fn on_block_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called when a block rendered with reduced fidelity, e.g. the vector
    /// library fallback dropping HTML label text.
    fn on_degraded(&self, index: usize, message: &str) {
        let _ = (index, message);
    }

    /// Called once after every block has been attempted.
    fn on_conversion_complete(&self, total_blocks: usize, success_count: usize) {
        let _ = (total_blocks, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RenderConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        degraded: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_block_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_block_complete(&self, _index: usize, _total: usize, _path: &Path) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_block_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_degraded(&self, _index: usize, _message: &str) {
            self.degraded.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total: usize, success_count: usize) {
            self.succeeded.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(2);
        cb.on_block_start(0, 2);
        cb.on_block_complete(0, 2, Path::new("/tmp/a__mmd_0.png"));
        cb.on_block_error(1, 2, "engine failed");
        cb.on_degraded(0, "foreignObject text dropped");
        cb.on_conversion_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_block_start(0, 2);
        tracker.on_block_complete(0, 2, Path::new("x.png"));
        tracker.on_block_start(1, 2);
        tracker.on_block_error(1, 2, "timeout");
        tracker.on_degraded(0, "fallback");
        tracker.on_conversion_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.degraded.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(3);
        cb.on_block_start(0, 3);
    }
}
