use std::time::Duration;

/// Exponential restart delay: base, doubling, capped.
///
/// The error counter lives for the whole session and resets on any
/// successful recognition.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    errors: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            errors: 0,
        }
    }

    /// Record one more error and return the delay before the next restart
    pub fn next_delay(&mut self) -> Duration {
        self.errors = self.errors.saturating_add(1);
        let factor = 1u32.checked_shl(self.errors - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    pub fn reset(&mut self) {
        self.errors = 0;
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10))
    }
}
