//! Retry manager for transient outbound failures with exponential backoff

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::RetryableError;

/// Retry manager with exponential backoff support
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    /// Create a new RetryManager with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// A manager that never retries
    pub fn disabled() -> Self {
        Self::new(RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        })
    }

    /// Execute an async operation with retry logic
    ///
    /// The operation is retried up to `max_retries` times while it returns a
    /// retryable error, sleeping for an exponentially increasing backoff
    /// between attempts. The last error is returned once retries run out.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    if attempt >= self.config.max_retries {
                        if self.config.max_retries > 0 {
                            warn!(
                                attempts = attempt + 1,
                                max_retries = self.config.max_retries,
                                error = %err,
                                "Max retries exhausted"
                            );
                        }
                        return Err(err);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    debug!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        backoff_ms = backoff.as_millis(),
                        error = %err,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Backoff before the retry following `attempt`
    ///
    /// `initial_backoff_ms * multiplier^attempt`, capped at `max_backoff_ms`,
    /// scaled to 50-100% when jitter is enabled.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.initial_backoff_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.config.max_backoff_ms as f64);

        let delay = if self.config.jitter {
            let jitter = rand::thread_rng().gen_range(0.5..1.0);
            capped * jitter
        } else {
            capped
        };

        Duration::from_millis(delay as u64)
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
