// Per-file retry policy
// Bounded, immediate retry of a single-file operation

use crate::errors::TransferError;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of attempts per file
pub const MAX_ATTEMPTS: u32 = 3;

/// Outcome of running an operation under a retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Failed { error: TransferError, attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } => *attempts,
            RetryOutcome::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn into_result(self) -> Result<T, TransferError> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::Failed { error, .. } => Err(error),
        }
    }
}

/// Retries the same operation up to `max_attempts` times
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom attempt count (at least one) and fixed pause between attempts
    pub fn with_config(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation`, passing the 1-based attempt number, until it succeeds
    /// or the attempt budget is spent. The last error is returned.
    pub fn attempt<T, F>(&self, target: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Result<T, TransferError>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => {
                    debug!(target_path = %target, attempt, "Attempt succeeded");
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) if attempt >= self.max_attempts => {
                    warn!(
                        target_path = %target,
                        attempt,
                        kind = %error.kind,
                        error = %error,
                        "Attempts exhausted"
                    );
                    return RetryOutcome::Failed {
                        error,
                        attempts: attempt,
                    };
                }
                Err(error) => {
                    debug!(
                        target_path = %target,
                        attempt,
                        kind = %error.kind,
                        error = %error,
                        "Attempt failed, retrying"
                    );
                    if !self.delay.is_zero() {
                        std::thread::sleep(self.delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
