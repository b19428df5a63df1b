use std::time::Duration;

use super::{invalid, Decision, Strategy};
use crate::error::CryptoResult;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;
/// Longest refill interval: one token per ~146 years
const MAX_INTERVAL_NANOS: u64 = u64::MAX / 4;

/// Token bucket with continuous refill.
///
/// Tracked as a theoretical arrival time rather than a fractional token
/// count: each token takes `interval = 1 / rate` to refill, and a full
/// bucket corresponds to `tat <= now`. A call is allowed while
/// `tat - now <= (burst - 1) * interval` and then pushes `tat` forward by one
/// interval. This is exactly a bucket of `burst` tokens refilled at `rate`,
/// but integer arithmetic keeps "wait one interval, get one token" exact.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    burst: u32,
    interval_nanos: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucketState {
    /// Nanoseconds since the epoch at which the bucket will be full again
    tat_nanos: u64,
}

impl TokenBucket {
    pub fn new(burst: u32, rate_per_second: f64) -> CryptoResult<Self> {
        if burst == 0 {
            return Err(invalid("burst", "at least 1", "0"));
        }
        let interval_nanos = refill_interval_nanos("rate_per_second", rate_per_second)?;
        Ok(Self {
            burst,
            interval_nanos,
        })
    }

    /// Time to refill one token
    pub fn refill_interval(&self) -> Duration {
        Duration::from_nanos(self.interval_nanos)
    }

    /// Tokens currently in the bucket
    pub fn tokens(&self, state: &TokenBucketState, now: Duration) -> u32 {
        let now = now.as_nanos() as u64;
        let full_at = state.tat_nanos;
        let deficit = full_at.saturating_sub(now);
        let missing = deficit / self.interval_nanos + u64::from(deficit % self.interval_nanos != 0);
        (self.burst as u64).saturating_sub(missing) as u32
    }

    fn tolerance(&self) -> u64 {
        (self.burst as u64 - 1).saturating_mul(self.interval_nanos)
    }
}

/// Nanoseconds per token at `rate_per_second`, rejecting rates too slow to represent
pub(super) fn refill_interval_nanos(field: &str, rate_per_second: f64) -> CryptoResult<u64> {
    if !rate_per_second.is_finite() || rate_per_second <= 0.0 {
        return Err(invalid(field, "a positive finite rate", &rate_per_second.to_string()));
    }
    let interval = (NANOS_PER_SEC / rate_per_second).round().max(1.0);
    if interval > MAX_INTERVAL_NANOS as f64 {
        return Err(invalid(
            field,
            &format!(
                "at least one token per {} seconds",
                MAX_INTERVAL_NANOS / 1_000_000_000
            ),
            &rate_per_second.to_string(),
        ));
    }
    Ok(interval as u64)
}

impl Strategy for TokenBucket {
    type State = TokenBucketState;

    fn initial_state(&self, now: Duration) -> TokenBucketState {
        TokenBucketState {
            tat_nanos: now.as_nanos() as u64,
        }
    }

    fn acquire(&self, state: &mut TokenBucketState, now: Duration) -> Decision {
        let now_nanos = now.as_nanos() as u64;
        let tat = state.tat_nanos.max(now_nanos);

        if tat - now_nanos <= self.tolerance() {
            state.tat_nanos = tat.saturating_add(self.interval_nanos);
            Decision::allow(self.tokens(state, now))
        } else {
            let retry_at = tat.saturating_sub(self.tolerance());
            Decision::deny(Duration::from_nanos(retry_at - now_nanos))
        }
    }

    fn is_at_rest(&self, state: &TokenBucketState, now: Duration) -> bool {
        state.tat_nanos <= now.as_nanos() as u64
    }
}
