use std::time::Duration;

use super::{invalid, window_start, Decision, Strategy};
use crate::error::CryptoResult;

/// Sliding window approximation.
///
/// Keeps counts for the current and previous aligned windows and weights
/// the previous one by the part of it still covered by a window ending now:
/// `previous * (1 - elapsed / window) + current`. A call is allowed while
/// that estimate is below `limit`.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    limit: u32,
    window: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingWindowState {
    window_start: Duration,
    previous: u32,
    current: u32,
}

impl SlidingWindow {
    pub fn new(limit: u32, window: Duration) -> CryptoResult<Self> {
        if limit == 0 {
            return Err(invalid("limit", "at least 1", "0"));
        }
        if window.is_zero() {
            return Err(invalid("window", "a positive window", "0"));
        }
        Ok(Self { limit, window })
    }

    fn roll(&self, state: &mut SlidingWindowState, now: Duration) {
        let current = window_start(now, self.window);
        if current == state.window_start {
            return;
        }
        if current == state.window_start + self.window {
            state.previous = state.current;
        } else if current > state.window_start {
            state.previous = 0;
        } else {
            return;
        }
        state.current = 0;
        state.window_start = current;
    }

    fn elapsed_fraction(&self, state: &SlidingWindowState, now: Duration) -> f64 {
        let elapsed = now.saturating_sub(state.window_start);
        (elapsed.as_secs_f64() / self.window.as_secs_f64()).min(1.0)
    }

    /// Time until the weighted count drops below the limit, absent new calls
    fn wait_time(&self, state: &SlidingWindowState, now: Duration) -> Duration {
        let limit = self.limit as f64;
        let window = self.window.as_secs_f64();
        let current = state.current as f64;

        let ready_at = if current >= limit {
            // Only possible once this window becomes the previous one and
            // decays enough: current * (1 - f) < limit in the next window.
            let fraction = 1.0 - limit / current;
            state.window_start.as_secs_f64() + window + window * fraction
        } else {
            let previous = state.previous as f64;
            let fraction = 1.0 - (limit - current) / previous;
            state.window_start.as_secs_f64() + window * fraction
        };

        let wait = ready_at - now.as_secs_f64();
        if wait.is_finite() && wait > 0.0 {
            // Round up so that retrying at exactly `now + wait` succeeds.
            Duration::from_secs_f64(wait) + Duration::from_micros(1)
        } else {
            Duration::from_nanos(1)
        }
    }
}

impl Strategy for SlidingWindow {
    type State = SlidingWindowState;

    fn initial_state(&self, now: Duration) -> SlidingWindowState {
        SlidingWindowState {
            window_start: window_start(now, self.window),
            previous: 0,
            current: 0,
        }
    }

    fn acquire(&self, state: &mut SlidingWindowState, now: Duration) -> Decision {
        self.roll(state, now);

        let fraction = self.elapsed_fraction(state, now);
        let weighted = state.previous as f64 * (1.0 - fraction) + state.current as f64;

        if weighted < self.limit as f64 {
            state.current += 1;
            let remaining = (self.limit as f64 - weighted - 1.0).max(0.0).floor() as u32;
            Decision::allow(remaining)
        } else {
            Decision::deny(self.wait_time(state, now))
        }
    }

    fn is_at_rest(&self, state: &SlidingWindowState, now: Duration) -> bool {
        now >= state.window_start + self.window * 2
    }
}
