// src/retry.rs
//! Retry policy for backend calls.
//!
//! Exponential backoff with jitter. Only `StoreError::Transient` is retried;
//! every other failure is returned on first sight. The caller's
//! cancellation token is honoured before each attempt and during backoff.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::constants::{
    DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS,
    ENV_INITIAL_BACKOFF_MS, ENV_MAX_ATTEMPTS, ENV_MAX_BACKOFF_MS,
};
use crate::error::{Result, StoreError};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per call, the first one included (at least 1).
    pub max_attempts: u32,
    /// Backoff before the second attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Ceiling for a single backoff, in milliseconds.
    pub max_backoff_ms: u64,
    /// Add up to 25% random jitter to each backoff.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single attempt, no retries.
    pub fn disabled() -> Self {
        Self::default().with_max_attempts(1)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_backoff_ms(mut self, initial_backoff_ms: u64) -> Self {
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Defaults overlaid with `BUCKETWALK_MAX_ATTEMPTS`,
    /// `BUCKETWALK_INITIAL_BACKOFF_MS` and `BUCKETWALK_MAX_BACKOFF_MS`.
    pub fn from_env() -> Self {
        fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }

        Self::default()
            .with_max_attempts(env_or(ENV_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS))
            .with_initial_backoff_ms(env_or(ENV_INITIAL_BACKOFF_MS, DEFAULT_INITIAL_BACKOFF_MS))
            .with_max_backoff_ms(env_or(ENV_MAX_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS))
    }

    /// Backoff to sleep after the failed attempt number `attempt` (0-based).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base_ms = self
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped_ms = base_ms.min(self.max_backoff_ms);

        let final_ms = if self.jitter {
            let jitter_range = capped_ms / 4;
            let jitter = rand::rng().random_range(0..=jitter_range);
            capped_ms.saturating_add(jitter).min(self.max_backoff_ms)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms)
    }
}

/// Run `op` until it succeeds, fails terminally, runs out of attempts or
/// the token is cancelled.
///
/// Exhaustion returns the last `Transient` error unchanged.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation: &str,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_transient() {
            if matches!(err, StoreError::Malformed(_)) {
                error!(operation, error = %err, "backend returned a malformed response");
            }
            return Err(err);
        }

        attempt += 1;
        if attempt >= max_attempts {
            warn!(
                operation,
                attempts = attempt,
                error = %err,
                "retries exhausted"
            );
            return Err(err);
        }

        let backoff = config.backoff_duration(attempt - 1);
        warn!(
            operation,
            attempt,
            error = %err,
            backoff_ms = backoff.as_millis() as u64,
            "transient error, backing off"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig::new().with_initial_backoff_ms(1).with_jitter(false)
    }

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_backoff_ms, 100);
        assert_eq!(config.max_backoff_ms, 10_000);
        assert!(config.jitter);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryConfig::new().with_max_attempts(0).max_attempts, 1);
        assert_eq!(RetryConfig::disabled().max_attempts, 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig::new()
            .with_initial_backoff_ms(1000)
            .with_max_backoff_ms(2000)
            .with_jitter(false);

        assert_eq!(config.backoff_duration(0), Duration::from_millis(1000));
        assert_eq!(config.backoff_duration(1), Duration::from_millis(2000));
        assert_eq!(config.backoff_duration(9), Duration::from_millis(2000));
        assert_eq!(config.backoff_duration(200), Duration::from_millis(2000));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let config = RetryConfig::new().with_initial_backoff_ms(400);
        for _ in 0..50 {
            let ms = config.backoff_duration(0).as_millis();
            assert!((400..=500).contains(&ms), "jittered backoff out of range: {}", ms);
        }
    }

    #[test]
    fn test_jitter_never_exceeds_max_backoff() {
        let config = RetryConfig::new()
            .with_initial_backoff_ms(1000)
            .with_max_backoff_ms(1000);
        for attempt in 0..5 {
            assert!(config.backoff_duration(attempt) <= Duration::from_millis(1000));
        }
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let token = CancellationToken::new();

        let result = with_retry(&fast(), "list", &token, || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Transient("connection reset".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_transient() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let token = CancellationToken::new();

        let result: Result<()> = with_retry(&fast(), "list", &token, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Transient("503".into())) }
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let token = CancellationToken::new();

        let result: Result<()> = with_retry(&fast(), "get", &token, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::NotFound("k".into())) }
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<()> = with_retry(&fast(), "list", &token, || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let config = RetryConfig::new()
            .with_initial_backoff_ms(60_000)
            .with_max_backoff_ms(60_000)
            .with_jitter(false);
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<()> = with_retry(&config, "list", &token, || async {
            Err(StoreError::Transient("timeout".into()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
