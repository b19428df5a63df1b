/*!
 * Rate Limiting
 *
 * Bounds how often a caller identity may invoke expensive or abusable
 * operations. Three interchangeable algorithms sit behind [`RateLimiter`]:
 * fixed window, sliding window and token bucket.
 *
 * Per-identity state lives in hash-sharded maps, each behind its own
 * mutex. An acquisition reads and updates the identity's state under that
 * shard's lock, so acquisitions for one identity are linearizable and no two
 * callers can consume the same unit of quota.
 */

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::duration_ms;
use crate::error::{error_codes, CryptoError, CryptoResult};

mod fixed_window;
mod sliding_window;
mod token_bucket;

pub use fixed_window::{FixedWindow, FixedWindowState};
pub use sliding_window::{SlidingWindow, SlidingWindowState};
pub use token_bucket::{TokenBucket, TokenBucketState};


const SHARDS: usize = 16;

/// Which algorithm a limiter runs, with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitAlgorithm {
    /// At most `limit` calls per aligned window of width `window`
    FixedWindow {
        limit: u32,
        #[serde(rename = "window_ms", with = "duration_ms")]
        window: Duration,
    },
    /// At most `limit` calls in any window of width `window`, interpolated
    /// across the previous and current aligned windows
    SlidingWindow {
        limit: u32,
        #[serde(rename = "window_ms", with = "duration_ms")]
        window: Duration,
    },
    /// Up to `burst` calls at once, refilled continuously at `rate_per_second`
    TokenBucket { burst: u32, rate_per_second: f64 },
}

impl Default for RateLimitAlgorithm {
    fn default() -> Self {
        RateLimitAlgorithm::TokenBucket {
            burst: 10,
            rate_per_second: 1.0,
        }
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    pub algorithm: RateLimitAlgorithm,
    /// State for identities unseen this long may be purged
    #[serde(rename = "idle_ttl_ms", with = "duration_ms")]
    pub idle_ttl: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            algorithm: RateLimitAlgorithm::default(),
            idle_ttl: Duration::from_secs(600),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> CryptoResult<()> {
        if self.idle_ttl.is_zero() {
            return Err(invalid("rate_limit.idle_ttl_ms", "a positive duration", "0"));
        }
        match &self.algorithm {
            RateLimitAlgorithm::FixedWindow { limit, window }
            | RateLimitAlgorithm::SlidingWindow { limit, window } => {
                if *limit == 0 {
                    return Err(invalid("rate_limit.limit", "at least 1", "0"));
                }
                if window.is_zero() {
                    return Err(invalid("rate_limit.window_ms", "a positive window", "0"));
                }
            }
            RateLimitAlgorithm::TokenBucket {
                burst,
                rate_per_second,
            } => {
                if *burst == 0 {
                    return Err(invalid("rate_limit.burst", "at least 1", "0"));
                }
                token_bucket::refill_interval_nanos("rate_limit.rate_per_second", *rate_per_second)?;
            }
        }
        Ok(())
    }
}

fn invalid(parameter: &str, expected: &str, actual: &str) -> CryptoError {
    CryptoError::invalid_parameter(parameter, expected, actual, error_codes::INVALID_CONFIGURATION)
}

/// Outcome of one acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// How long to wait before the next attempt can succeed; set only on denial
    pub retry_after: Option<Duration>,
    /// Calls still available right now after this one
    pub remaining: u32,
}

impl Decision {
    pub(crate) fn allow(remaining: u32) -> Self {
        Self {
            allowed: true,
            retry_after: None,
            remaining,
        }
    }

    pub(crate) fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after.max(Duration::from_nanos(1))),
            remaining: 0,
        }
    }
}

/// One rate limiting algorithm: how per-identity state starts and how an
/// acquisition updates it. Times are offsets from the Unix epoch.
pub trait Strategy: Send + Sync + fmt::Debug {
    type State: Send + fmt::Debug;

    fn initial_state(&self, now: Duration) -> Self::State;

    /// Attempt to take one unit of quota, updating `state` only on success
    fn acquire(&self, state: &mut Self::State, now: Duration) -> Decision;

    /// True when dropping `state` would grant no more quota than keeping it
    fn is_at_rest(&self, state: &Self::State, now: Duration) -> bool;
}

#[derive(Debug)]
struct Entry<T> {
    state: T,
    last_seen: Duration,
}

/// Sharded per-identity store driving one [`Strategy`]
#[derive(Debug)]
struct Limiter<S: Strategy> {
    strategy: S,
    shards: Vec<Mutex<HashMap<String, Entry<S::State>>>>,
    hasher: RandomState,
}

impl<S: Strategy> Limiter<S> {
    fn new(strategy: S) -> Self {
        Self {
            strategy,
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, identity: &str) -> &Mutex<HashMap<String, Entry<S::State>>> {
        let idx = (self.hasher.hash_one(identity) as usize) % self.shards.len();
        &self.shards[idx]
    }
}

/// Object-safe view of a [`Limiter`], whatever its strategy
trait Acquire: Send + Sync + fmt::Debug {
    fn acquire(&self, identity: &str, now: Duration) -> Decision;
    fn reset(&self, identity: &str) -> bool;
    fn purge_idle(&self, now: Duration, idle_ttl: Duration) -> usize;
    fn tracked(&self) -> usize;
}

impl<S: Strategy> Acquire for Limiter<S> {
    fn acquire(&self, identity: &str, now: Duration) -> Decision {
        let mut shard = self.shard(identity).lock();
        let entry = shard.entry(identity.to_string()).or_insert_with(|| Entry {
            state: self.strategy.initial_state(now),
            last_seen: now,
        });
        entry.last_seen = entry.last_seen.max(now);
        self.strategy.acquire(&mut entry.state, now)
    }

    fn reset(&self, identity: &str) -> bool {
        self.shard(identity).lock().remove(identity).is_some()
    }

    fn purge_idle(&self, now: Duration, idle_ttl: Duration) -> usize {
        let mut purged = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            let before = shard.len();
            shard.retain(|_, entry| {
                now.saturating_sub(entry.last_seen) <= idle_ttl
                    || !self.strategy.is_at_rest(&entry.state, now)
            });
            purged += before - shard.len();
        }
        purged
    }

    fn tracked(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }
}

/// Per-identity rate limiter
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use keyward::rate_limit::{RateLimitAlgorithm, RateLimitConfig, RateLimiter};
///
/// let limiter = RateLimiter::new(RateLimitConfig {
///     algorithm: RateLimitAlgorithm::FixedWindow { limit: 2, window: Duration::from_secs(60) },
///     ..RateLimitConfig::default()
/// })
/// .unwrap();
///
/// assert!(limiter.try_acquire("alice").allowed);
/// assert!(limiter.try_acquire("alice").allowed);
/// assert!(!limiter.try_acquire("alice").allowed);
/// assert!(limiter.try_acquire("bob").allowed);
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    inner: Box<dyn Acquire>,
    clock: Arc<dyn Clock>,
    last_purge_nanos: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> CryptoResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> CryptoResult<Self> {
        config.validate()?;
        let inner: Box<dyn Acquire> = match &config.algorithm {
            RateLimitAlgorithm::FixedWindow { limit, window } => {
                Box::new(Limiter::new(FixedWindow::new(*limit, *window)?))
            }
            RateLimitAlgorithm::SlidingWindow { limit, window } => {
                Box::new(Limiter::new(SlidingWindow::new(*limit, *window)?))
            }
            RateLimitAlgorithm::TokenBucket {
                burst,
                rate_per_second,
            } => Box::new(Limiter::new(TokenBucket::new(*burst, *rate_per_second)?)),
        };
        let last_purge_nanos = AtomicU64::new(clock.now().as_nanos() as u64);
        Ok(Self {
            config,
            inner,
            clock,
            last_purge_nanos,
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Attempt to take one unit of quota for `identity`
    pub fn try_acquire(&self, identity: &str) -> Decision {
        let now = self.clock.now();
        self.maybe_purge(now);

        let decision = self.inner.acquire(identity, now);
        if !decision.allowed {
            log::debug!(
                "rate limit denied '{}', retry after {:?}",
                identity,
                decision.retry_after
            );
        }
        decision
    }

    /// Like [`RateLimiter::try_acquire`], but a denial is an error
    pub fn check(&self, identity: &str) -> CryptoResult<Decision> {
        let decision = self.try_acquire(identity);
        match decision.retry_after {
            Some(retry_after) if !decision.allowed => Err(CryptoError::RateLimited {
                identity: identity.to_string(),
                retry_after,
            }),
            _ => Ok(decision),
        }
    }

    /// Forget everything about `identity`, restoring its full quota
    pub fn reset(&self, identity: &str) -> bool {
        self.inner.reset(identity)
    }

    /// Drop state for identities idle longer than the configured TTL.
    ///
    /// State that still withholds quota is kept regardless of idleness.
    pub fn purge_idle(&self) -> usize {
        let now = self.clock.now();
        self.last_purge_nanos
            .store(now.as_nanos() as u64, Ordering::Relaxed);
        let purged = self.inner.purge_idle(now, self.config.idle_ttl);
        if purged > 0 {
            log::debug!("purged {} idle rate limit entries", purged);
        }
        purged
    }

    /// Number of identities currently holding state
    pub fn tracked_identities(&self) -> usize {
        self.inner.tracked()
    }

    fn maybe_purge(&self, now: Duration) {
        let now_nanos = now.as_nanos() as u64;
        let last = self.last_purge_nanos.load(Ordering::Relaxed);
        let due = now_nanos.saturating_sub(last) >= self.config.idle_ttl.as_nanos() as u64;
        if due
            && self
                .last_purge_nanos
                .compare_exchange(last, now_nanos, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            self.inner.purge_idle(now, self.config.idle_ttl);
        }
    }
}

/// Start of the aligned window of width `window` containing `now`
pub(crate) fn window_start(now: Duration, window: Duration) -> Duration {
    let width = window.as_nanos().max(1);
    let start = now.as_nanos() - now.as_nanos() % width;
    Duration::from_nanos(start as u64)
}
