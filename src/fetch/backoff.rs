use std::time::Duration;
use tokio::time::sleep;

/// Per-page retry schedule: `initial * 2^attempt`, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, retries: u32) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt, or `None` once retries are used up.
    ///
    /// A server supplied `hint` (retry-after) wins over the computed delay
    /// but is still capped at `max`.
    pub fn next_delay(&mut self, hint: Option<Duration>) -> Option<Duration> {
        if self.current_attempt >= self.max_retries {
            return None;
        }

        let computed = self
            .initial_delay
            .saturating_mul(2_u32.saturating_pow(self.current_attempt));
        self.current_attempt += 1;
        Some(hint.unwrap_or(computed).min(self.max_delay))
    }

    pub async fn sleep(&mut self, hint: Option<Duration>) -> Result<(), MaxRetriesExceeded> {
        let delay = self.next_delay(hint).ok_or(MaxRetriesExceeded)?;

        log::warn!(
            "⏳ Retry attempt {} of {} in {}ms",
            self.current_attempt,
            self.max_retries,
            delay.as_millis()
        );

        sleep(delay).await;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
