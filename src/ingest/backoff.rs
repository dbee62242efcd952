use async_trait::async_trait;
use std::time::Duration;

/// Total attempts per page, including the first try
pub const MAX_ATTEMPTS: u32 = 5;

/// Something that can wait
///
/// Production code uses [`TokioSleeper`]; tests swap in a recorder so retry
/// schedules can be checked without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Attempt counter with a doubling delay: 1s, 2s, 4s, 8s, ...
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: u64,
    max_delay: u64,
    max_attempts: u32,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: u64, max: u64, attempts: u32) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max,
            max_attempts: attempts,
            current_attempt: 0,
        }
    }

    /// Schedule used for upstream page fetches
    pub fn for_fetch() -> Self {
        Self::new(1, 16, MAX_ATTEMPTS)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Attempts consumed so far
    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    /// Record a failed attempt and return how long to wait before the next
    ///
    /// Returns `None` once the failed attempt was the last one allowed; the
    /// caller then gives up without sleeping.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.current_attempt += 1;
        if self.current_attempt >= self.max_attempts {
            return None;
        }

        let exponent = self.current_attempt - 1;
        let delay = std::cmp::min(
            self.initial_delay.saturating_mul(2_u64.saturating_pow(exponent)),
            self.max_delay,
        );
        Some(Duration::from_secs(delay))
    }
}
