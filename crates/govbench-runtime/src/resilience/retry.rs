//! Constant-delay retry around one unit of work.

use backon::{ConstantBuilder, Retryable};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;

use govbench_core::ExtractError;

use crate::providers::ProviderError;

/// Why a single attempt failed.
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("No JSON found in model response")]
    NoJson,

    #[error("Malformed JSON in model response: {0}")]
    Malformed(String),
}

impl From<ExtractError> for AttemptError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::NoJson => AttemptError::NoJson,
            ExtractError::Parse(e) => AttemptError::Malformed(e.to_string()),
        }
    }
}

/// Permanent failure after the policy gave up.
#[derive(Error, Debug)]
pub enum RetryError {
    #[error("Gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: AttemptError },
}

/// How many times to try, and how long to wait in between.
///
/// The wait is an async timer, so only the task being retried is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Preset for the scenario and governance stages.
    pub fn generation() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    /// Preset for the evaluation stage, which never retries.
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// `label` identifies the work item in log lines.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.max_attempts.max(1);

        let backoff = ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times((max_attempts - 1) as usize);

        let result = (|| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let fut = op();
            async move {
                let outcome = fut.await;
                if let Err(e) = &outcome {
                    tracing::warn!(item = label, attempt, max_attempts, error = %e, "Attempt failed");
                }
                outcome
            }
        })
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .notify(|_: &AttemptError, delay: Duration| {
            tracing::debug!(item = label, ?delay, "Retrying after delay");
        })
        .await;

        result.map_err(|last| RetryError::Exhausted {
            attempts: attempts.load(Ordering::SeqCst),
            last,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::generation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let result = RetryPolicy::generation()
            .run("item-1", || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(AttemptError::NoJson),
                    1 => Err(AttemptError::EmptyResponse),
                    _ => Ok(42),
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reports_attempts_and_last_error() {
        let calls = AtomicUsize::new(0);

        let err = RetryPolicy::generation()
            .run("item-2", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AttemptError::Malformed(format!("attempt {}", n + 1)))
            })
            .await
            .unwrap_err();

        let RetryError::Exhausted { attempts, last } = err;
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(last.to_string().contains("attempt 3"));
    }

    #[tokio::test]
    async fn test_single_attempt_never_retries() {
        let calls = AtomicUsize::new(0);

        let result = RetryPolicy::single_attempt()
            .run("item-3", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AttemptError::NoJson)
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_extract_error_mapping() {
        assert!(matches!(AttemptError::from(ExtractError::NoJson), AttemptError::NoJson));
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(
            AttemptError::from(ExtractError::Parse(parse)),
            AttemptError::Malformed(_)
        ));
    }
}
