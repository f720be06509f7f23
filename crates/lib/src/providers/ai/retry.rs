//! # Retry Decorator
//!
//! Wraps any `LanguageModel` with an exponential backoff policy. Transient
//! failures (timeouts, 429, 5xx) are retried until the elapsed-time cap is
//! reached; rate limits are never treated as fatal before that cap.
//! Non-transient errors propagate immediately.

use super::{LanguageModel, LmUsage};
use crate::errors::LmError;
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Retry policy for one provider.
///
/// The defaults give the sequence 10s, 20s, 40s, 80s, 120s, ... within a
/// five-minute elapsed cap, which guarantees at least five attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(10),
            multiplier: 2.0,
            max_interval: Duration::from_secs(120),
            max_elapsed: Duration::from_secs(300),
        }
    }
}

/// A `LanguageModel` decorator that retries transient failures.
#[derive(Clone, Debug)]
pub struct RetryingLm {
    inner: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
}

impl RetryingLm {
    pub fn new(inner: Arc<dyn LanguageModel>) -> Self {
        Self {
            inner,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(inner: Arc<dyn LanguageModel>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LanguageModel for RetryingLm {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LmError> {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.policy.initial_interval)
            .with_multiplier(self.policy.multiplier)
            .with_max_interval(self.policy.max_interval)
            .with_max_elapsed_time(Some(self.policy.max_elapsed))
            .with_randomization_factor(0.0)
            .build();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let error = match self.inner.complete(system_prompt, user_prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            match backoff.next_backoff() {
                Some(wait) => {
                    warn!(
                        attempt = attempts,
                        wait_ms = wait.as_millis() as u64,
                        rate_limited = error.is_rate_limit(),
                        "Transient model error, backing off: {error}"
                    );
                    tokio::time::sleep(wait).await;
                }
                None => {
                    return Err(LmError::RetriesExhausted(format!(
                        "gave up after {attempts} attempts: {error}"
                    )));
                }
            }
        }
    }

    fn usage(&self) -> LmUsage {
        self.inner.usage()
    }

    fn reset_usage(&self) {
        self.inner.reset_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone)]
    struct FlakyLm {
        failures: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LanguageModel for FlakyLm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LmError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                Err(LmError::RateLimited("slow down".into()))
            } else {
                Ok("ok".to_string())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_consecutive_rate_limits() {
        let lm = RetryingLm::new(Arc::new(FlakyLm {
            failures: Arc::new(AtomicU32::new(4)),
        }));
        let result = lm.complete("s", "u").await.unwrap();
        assert_eq!(result, "ok");
    }

    #[tokio::test]
    async fn non_transient_errors_fail_fast() {
        #[derive(Debug, Clone)]
        struct BadRequestLm;

        #[async_trait]
        impl LanguageModel for BadRequestLm {
            async fn complete(&self, _system: &str, _user: &str) -> Result<String, LmError> {
                Err(LmError::Api {
                    status: 400,
                    body: "bad request".into(),
                })
            }
        }

        let lm = RetryingLm::new(Arc::new(BadRequestLm));
        let error = lm.complete("s", "u").await.unwrap_err();
        assert!(matches!(error, LmError::Api { status: 400, .. }));
    }
}
