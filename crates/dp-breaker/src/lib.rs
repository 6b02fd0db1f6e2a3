//! Sliding-window circuit breaker over lock-command emissions.
//!
//! Only `SOFT_LOCKED`/`HARD_LOCKED` transitions consume budget; admin-driven
//! lock states (`SUSPENDED`, `STOLEN_LOCKED`) do not, since they don't carry
//! fleet-wide storm risk.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub max_locks_in_window: usize,
    pub window_seconds: i64,
    pub cooldown_seconds: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_locks_in_window: 50,
            window_seconds: 300,
            cooldown_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
}

/// Lock-rate protection for the fleet. One instance is a process-wide
/// singleton behind the same critical section as the Repository.
pub struct CircuitBreaker {
    config: BreakerConfig,
    timestamps: Vec<DateTime<Utc>>,
    tripped_at: Option<DateTime<Utc>>,
    state: BreakerState,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            timestamps: Vec::new(),
            tripped_at: None,
            state: BreakerState::Closed,
        }
    }

    /// Whether a lock-producing transition may proceed right now.
    pub fn allow_lock(&mut self, now: DateTime<Utc>) -> bool {
        self.maybe_auto_reset(now);
        self.state == BreakerState::Closed
    }

    /// Records a lock-producing transition and trips the breaker if this
    /// push brings the windowed count to the threshold. The threshold is
    /// inclusive: the Nth lock trips the breaker but is itself recorded.
    pub fn record_lock(&mut self, now: DateTime<Utc>) {
        self.timestamps.push(now);
        self.prune(now);
        if self.timestamps.len() >= self.config.max_locks_in_window {
            self.state = BreakerState::Open;
            self.tripped_at = Some(now);
        }
    }

    pub fn reset(&mut self) {
        self.timestamps.clear();
        self.tripped_at = None;
        self.state = BreakerState::Closed;
    }

    /// Auto-clears an open breaker once `cooldown_seconds` have elapsed
    /// past the trip. `cooldown_seconds == 0` disables auto-reset.
    fn maybe_auto_reset(&mut self, now: DateTime<Utc>) {
        if self.state != BreakerState::Open || self.config.cooldown_seconds <= 0 {
            return;
        }
        if let Some(tripped_at) = self.tripped_at {
            if now - tripped_at > Duration::seconds(self.config.cooldown_seconds) {
                self.reset();
            }
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(self.config.window_seconds);
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    pub fn current_count(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::seconds(self.config.window_seconds);
        self.timestamps.iter().filter(|ts| **ts > cutoff).count()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max: usize, window: i64, cooldown: i64) -> BreakerConfig {
        BreakerConfig {
            max_locks_in_window: max,
            window_seconds: window,
            cooldown_seconds: cooldown,
        }
    }

    #[test]
    fn trips_on_nth_lock_inclusive() {
        let mut breaker = CircuitBreaker::new(cfg(3, 300, 600));
        let t0 = Utc::now();
        assert!(breaker.allow_lock(t0));
        breaker.record_lock(t0);
        assert!(breaker.allow_lock(t0));
        breaker.record_lock(t0);
        assert!(breaker.allow_lock(t0));
        breaker.record_lock(t0);
        // third lock trips it, but is itself recorded.
        assert_eq!(breaker.current_count(t0), 3);
        assert!(!breaker.allow_lock(t0));
    }

    #[test]
    fn window_expiry_drops_old_timestamps() {
        let mut breaker = CircuitBreaker::new(cfg(2, 10, 600));
        let t0 = Utc::now();
        breaker.record_lock(t0);
        let t1 = t0 + Duration::seconds(20);
        assert_eq!(breaker.current_count(t1), 0);
        assert!(breaker.allow_lock(t1));
    }

    #[test]
    fn cooldown_auto_resets_open_breaker() {
        let mut breaker = CircuitBreaker::new(cfg(1, 300, 60));
        let t0 = Utc::now();
        breaker.record_lock(t0);
        assert!(!breaker.allow_lock(t0));

        let t1 = t0 + Duration::seconds(61);
        assert!(breaker.allow_lock(t1));
    }

    #[test]
    fn zero_cooldown_disables_auto_reset() {
        let mut breaker = CircuitBreaker::new(cfg(1, 300, 0));
        let t0 = Utc::now();
        breaker.record_lock(t0);
        let t1 = t0 + Duration::seconds(100_000);
        assert!(!breaker.allow_lock(t1));
    }

    #[test]
    fn manual_reset_clears_state() {
        let mut breaker = CircuitBreaker::new(cfg(1, 300, 600));
        let t0 = Utc::now();
        breaker.record_lock(t0);
        assert!(!breaker.allow_lock(t0));
        breaker.reset();
        assert!(breaker.allow_lock(t0));
    }
}
