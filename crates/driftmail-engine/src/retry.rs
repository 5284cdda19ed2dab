//! Retry policies for workflow steps.
//!
//! The workflow itself defines no per-step backoff; the engine applies its
//! default policy (exponential backoff with jitter) to every transient step
//! failure by rescheduling the run's wake time.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy configuration for step execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// No retry — fail immediately on error.
    None,

    /// Exponential backoff with optional jitter.
    Exponential {
        initial_interval_ms: u64,
        /// Caps exponential growth.
        max_interval_ms: u64,
        multiplier: f64,
        max_attempts: u32,
        /// Random jitter to prevent thundering herd.
        use_jitter: bool,
    },

    /// Fixed interval retries.
    Fixed { interval_ms: u64, max_attempts: u32 },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Exponential backoff with sensible defaults: 1s initial, 1h cap,
    /// doubling, 5 attempts, jitter on.
    pub fn exponential() -> Self {
        Self::Exponential {
            initial_interval_ms: 1000,
            max_interval_ms: 3_600_000,
            multiplier: 2.0,
            max_attempts: 5,
            use_jitter: true,
        }
    }

    /// Fixed interval retry.
    pub fn fixed_with(interval_ms: u64, max_attempts: u32) -> Self {
        Self::Fixed {
            interval_ms,
            max_attempts,
        }
    }

    /// Compute when the next retry should happen given that `attempt`
    /// failures have occurred so far. Returns `None` once attempts are
    /// exhausted.
    pub fn next_retry_at(&self, attempt: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            RetryPolicy::None => None,

            RetryPolicy::Fixed {
                interval_ms,
                max_attempts,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                Some(now + Duration::milliseconds(*interval_ms as i64))
            }

            RetryPolicy::Exponential {
                initial_interval_ms,
                max_interval_ms,
                multiplier,
                max_attempts,
                use_jitter,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                let exp = multiplier.powi(attempt.saturating_sub(1) as i32);
                let mut delay_ms = (*initial_interval_ms as f64 * exp) as u64;
                delay_ms = delay_ms.min(*max_interval_ms);
                if *use_jitter {
                    // +/- 20% keeps retries from lining up across runs.
                    let factor = rand::thread_rng().gen_range(0.8..1.2);
                    delay_ms = (delay_ms as f64 * factor) as u64;
                }
                Some(now + Duration::milliseconds(delay_ms as i64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-08-01T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn none_never_retries() {
        assert_eq!(RetryPolicy::None.next_retry_at(1, now()), None);
    }

    #[test]
    fn fixed_retries_until_exhausted() {
        let policy = RetryPolicy::fixed_with(1000, 3);
        let t = now();
        assert_eq!(policy.next_retry_at(1, t), Some(t + Duration::seconds(1)));
        assert_eq!(policy.next_retry_at(2, t), Some(t + Duration::seconds(1)));
        assert_eq!(policy.next_retry_at(3, t), None);
    }

    #[test]
    fn exponential_grows_and_caps() {
        let policy = RetryPolicy::Exponential {
            initial_interval_ms: 1000,
            max_interval_ms: 4000,
            multiplier: 2.0,
            max_attempts: 10,
            use_jitter: false,
        };
        let t = now();
        assert_eq!(policy.next_retry_at(1, t), Some(t + Duration::seconds(1)));
        assert_eq!(policy.next_retry_at(2, t), Some(t + Duration::seconds(2)));
        assert_eq!(policy.next_retry_at(3, t), Some(t + Duration::seconds(4)));
        // Capped at max_interval_ms.
        assert_eq!(policy.next_retry_at(4, t), Some(t + Duration::seconds(4)));
        assert_eq!(policy.next_retry_at(10, t), None);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::Exponential {
            initial_interval_ms: 10_000,
            max_interval_ms: 3_600_000,
            multiplier: 2.0,
            max_attempts: 5,
            use_jitter: true,
        };
        let t = now();
        for _ in 0..50 {
            let at = policy.next_retry_at(1, t).unwrap();
            let delay = (at - t).num_milliseconds();
            assert!((8000..12_000).contains(&delay), "delay {delay} out of range");
        }
    }
}
