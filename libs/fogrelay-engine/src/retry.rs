use std::time::Duration;

use serde::Deserialize;

/// Delay growth between downstream attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Constant,
    Exponential,
}

/// Opt-in retry of failed downstream calls.
///
/// The default makes a single attempt. Only connection, timeout and status
/// failures are retried; bad payloads and bad responses never are.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff")]
    pub backoff: Backoff,
}

fn default_max_attempts() -> u32 {
    1
}
fn default_initial_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    5000
}
fn default_backoff() -> Backoff {
    Backoff::Exponential
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: default_backoff(),
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Attempts actually allowed; a configured zero still makes one call.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn is_enabled(&self) -> bool {
        self.attempts() > 1
    }

    /// Pause after the `failed`-th failed attempt (1-based).
    pub fn delay_after(&self, failed: u32) -> Duration {
        let initial = Duration::from_millis(self.initial_delay_ms);
        let base = match self.backoff {
            Backoff::Constant => initial,
            Backoff::Exponential => {
                initial.saturating_mul(2_u32.saturating_pow(failed.saturating_sub(1)))
            }
        };
        base.min(Duration::from_millis(self.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_single_attempt() {
        let p = RetryPolicy::default();
        assert_eq!(p.attempts(), 1);
        assert!(!p.is_enabled());
        assert_eq!(RetryPolicy::no_retry().with_attempts(0).attempts(), 1);
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let p = RetryPolicy::no_retry().with_attempts(6).with_delay(Duration::from_millis(100));
        assert_eq!(p.delay_after(1), Duration::from_millis(100));
        assert_eq!(p.delay_after(2), Duration::from_millis(200));
        assert_eq!(p.delay_after(3), Duration::from_millis(400));
        assert_eq!(p.delay_after(40), Duration::from_millis(5000));
    }

    #[test]
    fn constant_backoff() {
        let p = RetryPolicy::no_retry()
            .with_delay(Duration::from_millis(30))
            .with_backoff(Backoff::Constant);
        assert_eq!(p.delay_after(1), p.delay_after(4));
    }

    #[test]
    fn parses_partial_table() {
        let p: RetryPolicy = toml::from_str("max_attempts = 3\nbackoff = \"constant\"").unwrap();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.backoff, Backoff::Constant);
        assert_eq!(p.initial_delay_ms, 100);
    }
}
