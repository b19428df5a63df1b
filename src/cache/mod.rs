/*!
 * Caching
 *
 * A bounded least-recently-used cache with optional TTL, a thread-safe
 * wrapper around it, and the cache the key deriver uses to memoize
 * deterministic derivations.
 */

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::option_duration_ms;
use crate::error::{error_codes, CryptoError, CryptoResult};

mod derived;
mod lru;
mod shared;

pub use derived::{DerivationFingerprint, DerivedKeyCache};
pub use lru::{EvictionCallback, EvictionReason, LruCache};
pub use shared::SharedLruCache;


/// Cache sizing and expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// When false, the derived-key cache never stores anything
    pub enabled: bool,
    /// Maximum number of entries
    pub capacity: usize,
    /// Entry lifetime measured from insertion; `None` never expires
    #[serde(rename = "ttl_ms", with = "option_duration_ms")]
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 128,
            ttl: Some(Duration::from_secs(300)),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> CryptoResult<()> {
        if self.capacity == 0 {
            return Err(CryptoError::invalid_parameter(
                "cache.capacity",
                "at least 1 entry",
                "0",
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        if self.ttl == Some(Duration::ZERO) {
            return Err(CryptoError::invalid_parameter(
                "cache.ttl_ms",
                "a positive lifetime or null",
                "0",
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        Ok(())
    }
}

/// Counters for cache effectiveness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries dropped for outliving the TTL
    pub expirations: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 when nothing was looked up
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}
