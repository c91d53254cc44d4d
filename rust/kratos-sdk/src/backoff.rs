//! Exponential backoff between engine attempts and receipt polls
//!
//! Delays start at `min`, double on every step and are clamped to `max`.
//! Jitter, when enabled, adds up to a quarter of the current delay and never
//! pushes the result above `max`.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    current: Option<Duration>,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            current: None,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Next delay; the first call returns `min`
    pub fn next_delay(&mut self) -> Duration {
        let base = match self.current {
            None => self.min,
            Some(previous) => previous.saturating_mul(2).min(self.max),
        };
        self.current = Some(base);

        if !self.jitter {
            return base;
        }
        let quarter = base.as_millis() as u64 / 4;
        if quarter == 0 {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0..=quarter);
        (base + Duration::from_millis(extra)).min(self.max)
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
