//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ProcessOptionsBuilder::progress_callback`] to receive
//! events as the pipeline moves through its phases and writes images. The
//! CLI uses it to drive its spinner and the `[Stats]` lines.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2md::{ConversionProgressCallback, ImageReference, ProcessOptions};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_image_saved(&self, image: &ImageReference) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("saved {}", image.filename);
//!     }
//! }
//!
//! let options = ProcessOptions::builder()
//!     .progress_callback(Arc::new(CountingCallback { saved: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::backend::ConversionStatus;
use crate::document::ImageKind;
use crate::output::ImageReference;
use crate::stats::{Phase, PhaseSample};
use std::sync::Arc;

/// Called by the pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive from whichever thread awaits the
/// pipeline future, so implementations must be `Send + Sync`.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, before any work.
    ///
    /// # Arguments
    /// * `initial_memory`: RSS in bytes when stats are collected
    fn on_run_start(&self, initial_memory: Option<u64>) {
        let _ = initial_memory;
    }

    fn on_phase_start(&self, phase: Phase) {
        let _ = phase;
    }

    /// Called when a phase ends, with its timing and memory sample.
    fn on_phase_complete(&self, sample: &PhaseSample) {
        let _ = sample;
    }

    /// Called when conversion did not fully succeed but produced pages.
    fn on_degraded_result(&self, status: ConversionStatus, page_count: usize) {
        let _ = (status, page_count);
    }

    fn on_image_saved(&self, image: &ImageReference) {
        let _ = image;
    }

    /// Called when a table or picture has no image to write.
    ///
    /// # Arguments
    /// * `kind`: table or picture
    /// * `item_index`: index of the element in reading order
    fn on_image_skipped(&self, kind: ImageKind, item_index: usize) {
        let _ = (kind, item_index);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProcessOptions`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        phases: Mutex<Vec<Phase>>,
        saved: AtomicUsize,
        skipped: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_phase_complete(&self, sample: &PhaseSample) {
            self.phases.lock().unwrap().push(sample.phase);
        }

        fn on_image_saved(&self, _image: &ImageReference) {
            self.saved.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_skipped(&self, _kind: ImageKind, _item_index: usize) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn sample(phase: Phase) -> PhaseSample {
        PhaseSample {
            phase,
            elapsed_secs: 0.1,
            memory: None,
            memory_delta: None,
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(Some(1024));
        cb.on_phase_start(Phase::Conversion);
        cb.on_phase_complete(&sample(Phase::Conversion));
        cb.on_degraded_result(ConversionStatus::PartialSuccess, 2);
        cb.on_image_skipped(ImageKind::Picture, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_phase_complete(&sample(Phase::Initialization));
        tracker.on_phase_complete(&sample(Phase::Conversion));
        tracker.on_image_skipped(ImageKind::Table, 1);

        assert_eq!(
            *tracker.phases.lock().unwrap(),
            vec![Phase::Initialization, Phase::Conversion]
        );
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.saved.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_phase_start(Phase::Export);
    }
}
