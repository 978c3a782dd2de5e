use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{AssessmentError, Result};

/// Cooperative cancellation flag shared between a run and its caller.
///
/// Long stages check the token at per-class / per-threshold task boundaries;
/// once triggered, the observing stage aborts with
/// [`AssessmentError::Cancelled`] and all in-flight results for the run are
/// discarded. Recovery is recomputation from the inputs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Bail out of `stage` if cancellation was requested.
    pub fn guard(&self, stage: &'static str) -> Result<()> {
        if self.is_cancelled() {
            Err(AssessmentError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}
