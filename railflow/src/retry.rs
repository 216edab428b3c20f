//! Retry driver with exponential backoff and optional jitter.
//!
//! [`retry_pipeline`] repeats construction and execution of a pipeline
//! through a caller-supplied factory, so every attempt starts from fresh
//! state. Success returns immediately; a failure on the final attempt is
//! wrapped as `RetryExhausted` with the last error chained as the cause,
//! and no delay follows it.

use crate::errors::FlowError;
use crate::outcome::Outcome;
use crate::pipeline::Pipeline;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Observer invoked before each inter-attempt delay with the attempt
/// number (1-based) and the failure that triggered the retry.
pub type OnRetry = Arc<dyn Fn(u32, &FlowError) + Send + Sync>;

/// Jitter applied on top of the computed backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JitterStrategy {
    /// No jitter; delays follow the backoff formula exactly.
    #[default]
    None,
    /// Random from 0 to the computed delay.
    Full,
    /// Half fixed, half random.
    Equal,
}

/// Configuration for retry behavior.
#[derive(Clone)]
pub struct RetryConfig {
    /// Attempt cap, including the first attempt. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Delay ceiling.
    pub max_delay: Duration,
    /// Growth factor between attempts.
    pub backoff_multiplier: f64,
    /// Jitter strategy.
    pub jitter: JitterStrategy,
    on_retry: Option<OnRetry>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            jitter: JitterStrategy::None,
            on_retry: None,
        }
    }
}

impl RetryConfig {
    /// Creates a config with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the attempt cap.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the first inter-attempt delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the delay ceiling.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff growth factor.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the retry observer.
    #[must_use]
    pub fn with_on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &FlowError) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Computes the delay after the given failed attempt (1-based):
    /// `min(base × multiplier^(attempt-1), max)`, then jitter.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as f64;
        let max = self.max_delay.as_millis() as f64;
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let capped = (base * self.backoff_multiplier.powi(exponent)).min(max).max(0.0);

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => rand::thread_rng().gen_range(0.0..=capped),
            JitterStrategy::Equal => {
                let half = capped / 2.0;
                half + rand::thread_rng().gen_range(0.0..=half)
            }
        };

        Duration::from_millis(jittered.round() as u64)
    }
}

impl std::fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("has_on_retry", &self.on_retry.is_some())
            .finish()
    }
}

/// Builds and executes a fresh pipeline per attempt until one succeeds
/// or the attempt cap is reached.
pub async fn retry_pipeline<T, F>(factory: F, config: RetryConfig) -> Outcome<T>
where
    T: Clone + Send + 'static,
    F: Fn() -> Pipeline<T>,
{
    if config.max_attempts < 1 {
        return Err(
            FlowError::validation("max_attempts must be at least 1")
                .with_context("max_attempts", serde_json::json!(config.max_attempts)),
        );
    }

    let mut attempt = 1_u32;
    loop {
        match factory().execute().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= config.max_attempts {
                    return Err(FlowError::retry_exhausted(config.max_attempts, error));
                }
                if let Some(on_retry) = &config.on_retry {
                    on_retry(attempt, &error);
                }
                let delay = config.delay_for_attempt(attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "retrying pipeline"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
