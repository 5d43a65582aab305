//! Retry utilities with exponential backoff for resilient provider calls.

use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Upper bound for a single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given (1-based) failed attempt
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powf(attempt.saturating_sub(1) as f64);
        Duration::try_from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
            .unwrap_or(self.max_delay)
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded
    RateLimit,
    /// Server error (5xx)
    ServerError(u16),
    /// Attempt exceeded its time budget
    Timeout,
}

impl TransientError {
    /// Classify a SourceError; `None` means the error is permanent
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::RateLimit => Some(TransientError::RateLimit),
            SourceError::Network(_) => Some(TransientError::Network),
            SourceError::Status { status, .. } if *status == 429 => {
                Some(TransientError::RateLimit)
            }
            SourceError::Status { status, .. } if *status >= 500 => {
                Some(TransientError::ServerError(*status))
            }
            _ => None,
        }
    }
}

/// Execute an async operation with retry logic
///
/// Transient failures are retried with bounded exponential backoff until
/// `max_attempts` is reached; permanent failures (missing credentials, parse
/// errors, 4xx responses) are returned immediately.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut attempts = 0;
    let mut operation = operation;

    loop {
        attempts += 1;

        let error = match timeout(config.attempt_timeout, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Ok(Err(error)) => error,
            Err(_) => SourceError::Network("Operation timed out".to_string()),
        };

        let Some(transient) = TransientError::from_source_error(&error) else {
            return Err(error);
        };

        if attempts >= config.max_attempts {
            tracing::warn!("Operation failed after {} attempts: {}", attempts, error);
            return Err(error);
        }

        let delay = config.backoff_for(attempts);
        tracing::debug!(
            "Transient error on attempt {}: {:?}, retrying in {:?}",
            attempts,
            transient,
            delay
        );
        sleep(delay).await;
    }
}

/// Retry configuration for public metadata APIs
pub fn api_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 4,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(16),
        backoff_multiplier: 2.0,
        attempt_timeout: Duration::from_secs(30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(RetryConfig::default(), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_failures() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(4), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    let count = *call_count.borrow();
                    if count < 3 {
                        Err(SourceError::Status {
                            status: 503,
                            message: "unavailable".to_string(),
                        })
                    } else {
                        Ok("success")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_returns_last_error() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), SourceError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(3), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(SourceError::Network("connection reset".to_string()))
                }
            })
        }
        .await;

        assert!(matches!(result, Err(SourceError::Network(_))));
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_missing_credentials_not_retried() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), SourceError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(5), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(SourceError::MissingCredentials("ELSEVIER_API_KEY".to_string()))
                }
            })
        }
        .await;

        assert!(matches!(result, Err(SourceError::MissingCredentials(_))));
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_times_out_and_retries() {
        let call_count = Rc::new(RefCell::new(0));
        let config = RetryConfig {
            attempt_timeout: Duration::from_secs(1),
            ..fast_config(2)
        };

        let result = {
            let call_count = call_count.clone();
            with_retry(config, move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    if *call_count.borrow() == 1 {
                        sleep(Duration::from_secs(3600)).await;
                    }
                    Ok(7)
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(*call_count.borrow(), 2);
    }

    #[test]
    fn test_transient_error_detection() {
        assert_eq!(
            TransientError::from_source_error(&SourceError::RateLimit),
            Some(TransientError::RateLimit)
        );
        assert_eq!(
            TransientError::from_source_error(&SourceError::Status {
                status: 429,
                message: String::new()
            }),
            Some(TransientError::RateLimit)
        );
        assert_eq!(
            TransientError::from_source_error(&SourceError::Status {
                status: 502,
                message: String::new()
            }),
            Some(TransientError::ServerError(502))
        );
        assert!(TransientError::from_source_error(&SourceError::Status {
            status: 404,
            message: String::new()
        })
        .is_none());
        assert!(
            TransientError::from_source_error(&SourceError::Parse("invalid json".to_string()))
                .is_none()
        );
    }

    #[test]
    fn test_backoff_is_bounded() {
        let config = fast_config(10);
        assert_eq!(config.backoff_for(1), Duration::from_millis(10));
        assert_eq!(config.backoff_for(2), Duration::from_millis(20));
        assert_eq!(config.backoff_for(8), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_with_negative_multiplier_falls_back_to_max_delay() {
        let config = RetryConfig {
            backoff_multiplier: -2.0,
            ..fast_config(4)
        };
        assert_eq!(config.backoff_for(2), Duration::from_millis(100));
    }
}
