#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Per-source sliding-window admission control for report submissions.
//!
//! The [`RateLimiter`] trait is the seam the ingestion service depends on.
//! [`SlidingWindowLimiter`] is the single-process implementation: it keeps
//! the admitted timestamps for each source key in memory, so limits reset
//! on restart. A horizontally scaled deployment would implement the trait
//! over a shared store instead.
//!
//! Admission checks never block on I/O.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Number of admission checks between opportunistic sweeps of idle windows.
const SWEEP_INTERVAL: u32 = 1024;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed and has been counted.
    Allowed,
    /// The source has exhausted its window.
    Denied {
        /// How long until the oldest counted request leaves the window.
        retry_after: Duration,
    },
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Admission control keyed by request source.
pub trait RateLimiter: Send + Sync {
    /// Checks whether a write from `key` may proceed, counting it if so.
    fn admit(&self, key: &str) -> Decision;
}

/// Limit on admitted requests per source within a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum admitted requests per window.
    pub max_requests: usize,
    /// Length of the trailing window.
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    /// Three submissions per source per hour.
    fn default() -> Self {
        Self {
            max_requests: 3,
            window: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Default)]
struct State {
    windows: BTreeMap<String, VecDeque<Instant>>,
    checks_since_sweep: u32,
}

/// In-memory sliding-window limiter.
///
/// All windows live behind one `Mutex`, so concurrent attempts from the
/// same source are serialized and cannot be undercounted. Denied attempts
/// are not recorded and do not extend the window.
pub struct SlidingWindowLimiter {
    policy: RateLimitPolicy,
    state: Mutex<State>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(State::default()),
        }
    }

    /// Admission check against an explicit clock reading.
    pub fn admit_at(&self, key: &str, now: Instant) -> Decision {
        let mut state = self.lock();

        state.checks_since_sweep += 1;
        if state.checks_since_sweep >= SWEEP_INTERVAL {
            state.checks_since_sweep = 0;
            self.sweep_locked(&mut state, now);
        }

        let window = state.windows.entry(key.to_string()).or_default();
        self.expire(window, now);

        if window.len() < self.policy.max_requests {
            window.push_back(now);
            return Decision::Allowed;
        }

        let retry_after = window.front().map_or(self.policy.window, |oldest| {
            self.policy
                .window
                .saturating_sub(now.saturating_duration_since(*oldest))
        });

        log::debug!(
            "Rate limit reached for {key}: {} requests in window, retry after {}s",
            window.len(),
            retry_after.as_secs()
        );

        Decision::Denied { retry_after }
    }

    /// Evicts windows whose timestamps have all expired by `now`.
    ///
    /// [`Self::admit_at`] also runs this every `SWEEP_INTERVAL` checks.
    pub fn sweep_at(&self, now: Instant) {
        let mut state = self.lock();
        self.sweep_locked(&mut state, now);
    }

    #[cfg(test)]
    fn tracked_sources(&self) -> usize {
        self.lock().windows.len()
    }

    fn sweep_locked(&self, state: &mut State, now: Instant) {
        let before = state.windows.len();
        state.windows.retain(|_, window| {
            self.expire(window, now);
            !window.is_empty()
        });
        let evicted = before - state.windows.len();
        if evicted > 0 {
            log::debug!("Evicted {evicted} expired rate limit windows");
        }
    }

    fn expire(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while window
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.policy.window)
        {
            window.pop_front();
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // The state is a plain map of timestamps; a panic mid-update cannot
        // leave it structurally invalid.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn admit(&self, key: &str) -> Decision {
        self.admit_at(key, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn allows_three_then_denies_fourth() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();

        for i in 0..3 {
            let now = t0 + Duration::from_secs(i * 60);
            assert_eq!(limiter.admit_at("10.0.0.1", now), Decision::Allowed);
        }

        let fourth = limiter.admit_at("10.0.0.1", t0 + Duration::from_secs(600));
        assert_eq!(
            fourth,
            Decision::Denied {
                retry_after: HOUR - Duration::from_secs(600)
            }
        );
    }

    #[test]
    fn window_slides_from_oldest_admission() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();

        limiter.admit_at("a", t0);
        limiter.admit_at("a", t0 + Duration::from_secs(1800));
        limiter.admit_at("a", t0 + Duration::from_secs(1900));
        assert!(!limiter.admit_at("a", t0 + Duration::from_secs(3599)).is_allowed());

        // First admission has aged out; one slot frees up.
        assert!(limiter.admit_at("a", t0 + HOUR).is_allowed());
        assert!(!limiter.admit_at("a", t0 + HOUR + Duration::from_secs(1)).is_allowed());
    }

    #[test]
    fn denied_attempts_do_not_extend_window() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();

        for _ in 0..3 {
            limiter.admit_at("a", t0);
        }
        for minute in 1..50 {
            let now = t0 + Duration::from_secs(minute * 60);
            assert!(!limiter.admit_at("a", now).is_allowed());
        }

        assert!(limiter.admit_at("a", t0 + HOUR).is_allowed());
    }

    #[test]
    fn sources_are_independent() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(limiter.admit_at("a", t0).is_allowed());
        }
        assert!(!limiter.admit_at("a", t0).is_allowed());
        assert!(limiter.admit_at("b", t0).is_allowed());
    }

    #[test]
    fn zero_budget_denies_everything() {
        let limiter = SlidingWindowLimiter::new(RateLimitPolicy {
            max_requests: 0,
            window: Duration::from_secs(10),
        });
        assert_eq!(
            limiter.admit_at("a", Instant::now()),
            Decision::Denied {
                retry_after: Duration::from_secs(10)
            }
        );
    }

    #[test]
    fn sweep_evicts_expired_windows() {
        let limiter = SlidingWindowLimiter::default();
        let t0 = Instant::now();

        limiter.admit_at("a", t0);
        limiter.admit_at("b", t0 + Duration::from_secs(1800));
        assert_eq!(limiter.tracked_sources(), 2);

        limiter.sweep_at(t0 + HOUR);
        assert_eq!(limiter.tracked_sources(), 1);

        limiter.sweep_at(t0 + HOUR + Duration::from_secs(1800));
        assert_eq!(limiter.tracked_sources(), 0);
    }

    #[test]
    fn concurrent_attempts_from_one_source_are_not_undercounted() {
        let limiter = Arc::new(SlidingWindowLimiter::default());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.admit("198.51.100.7").is_allowed())
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();

        assert_eq!(allowed, 3);
    }
}
