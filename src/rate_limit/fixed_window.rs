use std::time::Duration;

use super::{invalid, window_start, Decision, Strategy};
use crate::error::CryptoResult;

/// Fixed window counter.
///
/// Windows are aligned to multiples of `window` since the Unix epoch, so every
/// identity's windows roll over at the same wall-clock instants.
#[derive(Debug, Clone)]
pub struct FixedWindow {
    limit: u32,
    window: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindowState {
    window_start: Duration,
    count: u32,
}

impl FixedWindow {
    pub fn new(limit: u32, window: Duration) -> CryptoResult<Self> {
        if limit == 0 {
            return Err(invalid("limit", "at least 1", "0"));
        }
        if window.is_zero() {
            return Err(invalid("window", "a positive window", "0"));
        }
        Ok(Self { limit, window })
    }
}

impl Strategy for FixedWindow {
    type State = FixedWindowState;

    fn initial_state(&self, now: Duration) -> FixedWindowState {
        FixedWindowState {
            window_start: window_start(now, self.window),
            count: 0,
        }
    }

    fn acquire(&self, state: &mut FixedWindowState, now: Duration) -> Decision {
        let current = window_start(now, self.window);
        if current > state.window_start {
            state.window_start = current;
            state.count = 0;
        }

        if state.count < self.limit {
            state.count += 1;
            Decision::allow(self.limit - state.count)
        } else {
            let rollover = state.window_start + self.window;
            Decision::deny(rollover.saturating_sub(now))
        }
    }

    fn is_at_rest(&self, state: &FixedWindowState, now: Duration) -> bool {
        now >= state.window_start + self.window
    }
}
