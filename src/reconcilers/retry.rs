// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff.
//!
//! Two policies live here:
//!
//! - The requeue policy for transient reconciliation failures, tracked per
//!   object key by [`BackoffTracker`]: 1s, doubling, capped at 5 minutes,
//!   with ±10% jitter. The attempt counter resets on the first success.
//! - In-place retries of idempotent Kubernetes reads ([`retry_api_call`]) on
//!   rate limiting (429), server errors (5xx) and transport failures.

use crate::constants::{ERROR_BACKOFF_INITIAL_SECS, ERROR_BACKOFF_MAX_SECS};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Initial interval between retries of a read (100ms)
const READ_INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries of a read (5 seconds)
const READ_MAX_INTERVAL_SECS: u64 = 5;

/// Maximum total time spent retrying a read (30 seconds)
const READ_MAX_ELAPSED_TIME_SECS: u64 = 30;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Interval of the first retry
    pub initial_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
        }
    }

    /// Interval before the given retry attempt (1-based), without jitter.
    #[must_use]
    pub fn interval_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_interval.as_secs_f64() {
            return self.max_interval;
        }
        Duration::from_secs_f64(secs)
    }

    /// Interval before the given retry attempt, with jitter applied.
    #[must_use]
    pub fn next_backoff(&self, attempt: u32) -> Duration {
        self.apply_jitter(self.interval_for_attempt(attempt))
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Requeue policy for transient reconciliation failures.
///
/// # Retry Schedule
///
/// 1. 1s
/// 2. 2s
/// 3. 4s
/// 4. 8s
/// 5. 16s
/// 6. 32s
/// 7. 64s
/// 8. 128s
/// 9. 256s
/// 10. 300s (capped), and every 300s after that
///
/// There is no maximum number of attempts.
#[must_use]
pub fn reconcile_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_secs(ERROR_BACKOFF_INITIAL_SECS),
        Duration::from_secs(ERROR_BACKOFF_MAX_SECS),
        None,
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Backoff configuration for retrying idempotent Kubernetes reads in place.
#[must_use]
pub fn read_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(READ_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(READ_MAX_INTERVAL_SECS),
        Some(Duration::from_secs(READ_MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Per-key failure counter driving the requeue delay of transient failures.
///
/// The controller runtime never reconciles the same key concurrently, so the
/// lock is only contended across different keys.
pub struct BackoffTracker {
    policy: ExponentialBackoff,
    attempts: Mutex<HashMap<String, u32>>,
}

impl BackoffTracker {
    #[must_use]
    pub fn new(policy: ExponentialBackoff) -> Self {
        Self {
            policy,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying.
    pub fn next_delay(&self, key: &str) -> Duration {
        let attempt = {
            let mut attempts = self
                .attempts
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let counter = attempts.entry(key.to_string()).or_insert(0);
            *counter = counter.saturating_add(1);
            *counter
        };
        self.policy.next_backoff(attempt)
    }

    /// Forget the failures recorded for `key`.
    pub fn reset(&self, key: &str) {
        self.attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }

    /// Number of consecutive failures recorded for `key`.
    #[must_use]
    pub fn attempts(&self, key: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

impl Default for BackoffTracker {
    fn default() -> Self {
        Self::new(reconcile_backoff())
    }
}

/// Retry an idempotent Kubernetes API call with exponential backoff.
///
/// Automatically retries on transient errors (HTTP 429, 5xx, transport) and
/// fails immediately on everything else, returning the last error.
///
/// # Errors
///
/// Returns the error of the last attempt when it is not retryable or when the
/// read backoff is exhausted.
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, kube::Error>>,
{
    let backoff = read_backoff();
    let start_time = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    return Err(e);
                }

                let exhausted = backoff
                    .max_elapsed_time
                    .is_some_and(|max| start_time.elapsed() >= max);
                if exhausted {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Max retry time exceeded, giving up"
                    );
                    return Err(e);
                }

                let duration = backoff.next_backoff(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    retry_after = ?duration,
                    error = %e,
                    "Retryable Kubernetes API error, will retry"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

/// Determine if a Kubernetes error is retryable in place.
///
/// # Retryable Errors
///
/// - **HTTP 429** (Too Many Requests) - Rate limiting
/// - **HTTP 5xx** (Server Errors) - Temporary API server issues
/// - **Service Errors** - Network/connection issues
///
/// Conflicts (409) are not retried here: they require a fresh read and are
/// handed back to the controller queue instead.
pub(crate) fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == 429 || (api_err.code >= 500 && api_err.code < 600)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
