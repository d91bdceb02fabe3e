// Batch-wide consecutive-failure breaker
// Aborts a batch once a run of per-file failures reaches the threshold

use crate::errors::TransferError;
use tracing::{error, warn};

/// Consecutive terminal failures that abort a batch
pub const CONSECUTIVE_FAILURE_THRESHOLD: u32 = 3;

/// Message of the batch-aborting error
pub const ABORT_MESSAGE: &str = "Three files failed in a row. Aborting.";

/// Tracks consecutive per-file failures within one batch
#[derive(Debug, Clone)]
pub struct ConsecutiveFailureBreaker {
    name: String,
    threshold: u32,
    consecutive_failures: u32,
}

impl ConsecutiveFailureBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_threshold(name, CONSECUTIVE_FAILURE_THRESHOLD)
    }

    pub fn with_threshold(name: impl Into<String>, threshold: u32) -> Self {
        Self {
            name: name.into(),
            threshold: threshold.max(1),
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// A file succeeded; the run is broken
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// A file failed terminally. Returns the batch-aborting error when the
    /// run reaches the threshold.
    pub fn record_failure(&mut self) -> Result<(), TransferError> {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            error!(
                batch = %self.name,
                consecutive_failures = self.consecutive_failures,
                "Consecutive failure threshold reached, aborting batch"
            );
            return Err(TransferError::protocol(ABORT_MESSAGE));
        }
        warn!(
            batch = %self.name,
            consecutive_failures = self.consecutive_failures,
            threshold = self.threshold,
            "File failed"
        );
        Ok(())
    }
}
