use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::{InvoiceOcrError, Result};

/// Bounds on how often, and how patiently, an extraction is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    /// Unit of the linear backoff; attempt `n` is followed by `n × base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay inserted after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        self.base_delay
            .saturating_mul(u32::try_from(attempt).unwrap_or(u32::MAX))
    }
}

/// Attempt bookkeeping for one retried operation.
///
/// Every error is treated as retryable. Once the policy's attempts are used
/// up, the last error is wrapped in [`InvoiceOcrError::RetriesExhausted`].
///
/// ```
/// use invoice_ocr::{InvoiceOcrError, RetryController, RetryPolicy};
/// use std::time::Duration;
///
/// # async fn example() -> invoice_ocr::Result<u32> {
/// let mut retry = RetryController::new(RetryPolicy::new(3, Duration::from_millis(10)));
/// loop {
///     let attempt = retry.begin_attempt();
///     let outcome: invoice_ocr::Result<u32> = if attempt < 2 {
///         Err(InvoiceOcrError::EmptyExtraction)
///     } else {
///         Ok(7)
///     };
///     match outcome {
///         Ok(value) => return Ok(retry.succeeded(value)),
///         Err(err) => retry.failed(err).await?,
///     }
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct RetryController {
    policy: RetryPolicy,
    attempt: usize,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Start the next attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> usize {
        self.attempt += 1;
        info!(
            attempt = self.attempt,
            total_attempts = self.policy.max_attempts,
            "Extraction attempt"
        );
        self.attempt
    }

    pub fn attempts(&self) -> usize {
        self.attempt
    }

    /// Record success for the current attempt.
    pub fn succeeded<T>(&self, value: T) -> T {
        if self.attempt > 1 {
            info!(
                attempts_used = self.attempt,
                "Extraction succeeded after {} retries",
                self.attempt - 1
            );
        } else {
            debug!("Extraction succeeded on first attempt");
        }
        value
    }

    /// Record a failed attempt.
    ///
    /// Sleeps for the backoff delay and returns `Ok(())` when another attempt
    /// is allowed, otherwise returns the terminal error.
    pub async fn failed(&mut self, err: InvoiceOcrError) -> Result<()> {
        if self.attempt >= self.policy.max_attempts {
            error!(
                attempts = self.attempt,
                error = %err,
                "Extraction failed after maximum retry attempts"
            );
            return Err(InvoiceOcrError::RetriesExhausted {
                attempts: self.attempt,
                source: Box::new(err),
            });
        }

        let delay = self.policy.delay_for(self.attempt);
        warn!(
            attempt = self.attempt,
            error = %err,
            ?delay,
            "Extraction attempt failed, retrying"
        );
        sleep(delay).await;
        Ok(())
    }
}
