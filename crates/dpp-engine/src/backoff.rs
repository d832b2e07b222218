use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Exponential backoff state carried between retries.
///
/// Delay for attempt `n` (1-based) is `base * multiplier^(n-1)`, capped at
/// `max`, then spread by up to `±jitter` of itself.
#[derive(Clone, Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before retry number `attempt`, without touching the state.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let raw = self.config.base_ms as f64 * self.config.multiplier.max(1.0).powi(exponent);
        let capped = raw.min(self.config.max_ms as f64);

        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let jittered = if jitter > 0.0 && capped > 0.0 {
            let spread = capped * jitter;
            capped + rand::thread_rng().gen_range(-spread..=spread)
        } else {
            capped
        };
        Duration::from_millis(jittered.max(0.0).round() as u64)
    }

    /// Register a failure and return how long to wait.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.delay_for(self.attempt)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive failures since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(base_ms: u64, max_ms: u64) -> Backoff {
        Backoff::new(BackoffConfig {
            base_ms,
            max_ms,
            multiplier: 2.0,
            jitter: 0.0,
        })
    }

    #[test]
    fn doubles_until_capped() {
        let mut b = exact(100, 1_000);
        let delays: Vec<u64> = (0..6).map(|_| b.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
        assert_eq!(b.attempts(), 6);
    }

    #[test]
    fn reset_starts_over() {
        let mut b = exact(10, 1_000);
        b.next_delay();
        b.next_delay();
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn jitter_stays_within_spread() {
        let b = Backoff::new(BackoffConfig {
            base_ms: 1_000,
            max_ms: 1_000,
            multiplier: 2.0,
            jitter: 0.2,
        });
        for _ in 0..100 {
            let d = b.delay_for(3).as_millis();
            assert!((800..=1_200).contains(&d), "delay {d} out of range");
        }
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let b = exact(500, 30_000);
        assert_eq!(b.delay_for(u32::MAX), Duration::from_millis(30_000));
    }
}
