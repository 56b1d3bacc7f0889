//! Timeout and retry layer for capability calls
//!
//! Each attempt runs under the policy's per-call timeout. Transient failures
//! (timeouts, transport errors, rate limiting) are retried with capped
//! exponential backoff; refusals return immediately. Exhausted retries
//! surface as [`GameError::CapabilityExhausted`].

use crate::config::RetryPolicy;
use crate::error::{Capability, CapabilityError, GameError};
use crate::health::HealthMonitor;
use std::future::Future;
use std::time::Duration;

/// Retry executor shared by the three components
#[derive(Debug, Clone, Default)]
pub struct RetryLayer {
    policy: RetryPolicy,
    health: HealthMonitor,
}

impl RetryLayer {
    /// Create layer reporting into `health`
    #[inline]
    #[must_use]
    pub fn new(policy: RetryPolicy, health: HealthMonitor) -> Self {
        Self { policy, health }
    }

    /// Policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Health monitor calls report into
    #[inline]
    #[must_use]
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Run `call` until it succeeds, refuses, or the policy is exhausted
    ///
    /// # Errors
    /// - `CapabilityRefused` on content-policy or malformed responses
    /// - `CapabilityExhausted` when every attempt failed transiently
    pub async fn call<T, F, Fut>(&self, capability: Capability, mut call: F) -> Result<T, GameError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.policy.call_timeout(), call()).await {
                Ok(result) => result,
                Err(_) => Err(CapabilityError::Timeout),
            };

            let error = match outcome {
                Ok(value) => {
                    self.health.record_success(capability);
                    return Ok(value);
                }
                Err(error) => error,
            };

            self.health.record_failure(capability, &error);
            let hint = retry_after_hint(&error);
            let failure = GameError::from_capability(capability, error, self.policy.call_timeout_ms);

            if !failure.is_retryable() {
                tracing::warn!(%capability, attempt, error = %failure, "capability refused request");
                return Err(failure);
            }

            if attempt >= max_attempts {
                tracing::error!(%capability, attempts = attempt, error = %failure, "capability retries exhausted");
                return Err(GameError::CapabilityExhausted {
                    capability,
                    attempts: attempt,
                    last_error: failure.to_string(),
                });
            }

            let delay = self.delay_before_retry(attempt, hint);
            tracing::warn!(
                %capability,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %failure,
                "capability call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn delay_before_retry(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let backoff = self.policy.backoff(attempt);
        match hint {
            Some(hint) => hint.min(self.policy.max_delay()).max(backoff),
            None => backoff,
        }
    }
}

fn retry_after_hint(error: &CapabilityError) -> Option<Duration> {
    match error {
        CapabilityError::RateLimited {
            retry_after_secs: Some(secs),
        } => Some(Duration::from_secs(*secs)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn layer(max_attempts: u32) -> RetryLayer {
        RetryLayer::new(
            RetryPolicy {
                max_attempts,
                base_delay_ms: 10,
                max_delay_ms: 40,
                call_timeout_ms: 1_000,
            },
            HealthMonitor::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let layer = layer(3);
        let calls = Arc::new(AtomicU32::new(0));

        let result = layer
            .call(Capability::VisionScoring, || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CapabilityError::Transport("reset".into()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(layer.health().is_reachable(Capability::VisionScoring));
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_exhaust_into_typed_error() {
        let layer = layer(3);
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = layer
            .call(Capability::TextGeneration, || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::pending()
            })
            .await;

        assert!(matches!(
            result,
            Err(GameError::CapabilityExhausted {
                capability: Capability::TextGeneration,
                attempts: 3,
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!layer.health().is_reachable(Capability::TextGeneration));
    }

    #[tokio::test(start_paused = true)]
    async fn refusals_are_not_retried() {
        let layer = layer(3);
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = layer
            .call(Capability::ImageGeneration, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CapabilityError::ContentPolicy("blocked".into())) }
            })
            .await;

        assert!(matches!(result, Err(GameError::CapabilityRefused { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_hint_is_capped() {
        let layer = layer(2);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = layer
            .call(Capability::VisionScoring, || async {
                Err(CapabilityError::RateLimited {
                    retry_after_secs: Some(3_600),
                })
            })
            .await;

        assert!(matches!(result, Err(GameError::CapabilityExhausted { attempts: 2, .. })));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn delay_prefers_larger_of_hint_and_backoff() {
        let layer = layer(3);
        assert_eq!(layer.delay_before_retry(1, None), Duration::from_millis(10));
        assert_eq!(
            layer.delay_before_retry(1, Some(Duration::from_millis(25))),
            Duration::from_millis(25)
        );
        assert_eq!(
            layer.delay_before_retry(1, Some(Duration::from_secs(9))),
            Duration::from_millis(40)
        );
    }
}
