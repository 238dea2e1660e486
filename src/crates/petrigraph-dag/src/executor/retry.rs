//! Per-node retry policy with exponential backoff.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration. Attempts count toward `max_attempts`
/// inclusive: a policy of 3 means one initial try plus at most two
/// retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Randomize delays by up to 25% to avoid retry stampedes.
    #[serde(default)]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_initial_delay_ms(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn should_retry(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_attempts
    }

    /// Delay to wait after the given failed attempt (1-indexed):
    /// `min(initial * multiplier^(attempt-1), max)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);
        let final_ms = if self.jitter {
            use rand::Rng;
            let factor = rand::thread_rng().gen_range(0.0..0.25);
            capped * (1.0 + factor)
        } else {
            capped
        };
        Duration::from_millis(final_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy::new(5)
            .with_initial_delay_ms(100)
            .with_backoff_multiplier(2.0)
            .with_max_delay_ms(350);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
        assert_eq!(policy.delay_after(4), Duration::from_millis(350));
    }

    #[test]
    fn attempts_count_inclusively() {
        let policy = RetryPolicy::new(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let policy = RetryPolicy::new(2)
            .with_initial_delay_ms(1_000)
            .with_jitter(true);
        for _ in 0..32 {
            let delay = policy.delay_after(1).as_millis() as u64;
            assert!((1_000..=1_250).contains(&delay));
        }
    }

    #[test]
    fn parses_from_camel_case_metadata() {
        let policy: RetryPolicy = serde_json::from_value(serde_json::json!({
            "maxAttempts": 3,
            "initialDelayMs": 1,
            "backoffMultiplier": 2.0,
            "maxDelayMs": 10
        }))
        .unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay_ms, 1);
    }
}
