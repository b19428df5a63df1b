/*!
 * Time Sources
 *
 * Rate limiting, cache expiry and key ageing all read time through the
 * [`Clock`] trait so that tests can drive them deterministically.
 */

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// A source of wall-clock time, expressed as the offset from the Unix epoch
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time since the Unix epoch
    fn now(&self) -> Duration;

    /// Current time as a UTC timestamp
    fn now_utc(&self) -> DateTime<Utc> {
        let now = self.now();
        DateTime::<Utc>::from_timestamp(now.as_secs() as i64, now.subsec_nanos())
            .unwrap_or_default()
    }
}

/// The system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        // A clock set before 1970 reads as the epoch itself.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A manually advanced clock for deterministic tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    /// Create a clock reading `start` since the epoch
    pub fn new(start: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(start.as_nanos() as u64),
        }
    }

    /// Move the clock forward by `step`
    pub fn advance(&self, step: Duration) {
        self.nanos.fetch_add(step.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Set the clock to an absolute reading
    pub fn set(&self, now: Duration) {
        self.nanos.store(now.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
