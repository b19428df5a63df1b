//! Property tests for the cache and limiter invariants

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use keyward::cache::LruCache;
use keyward::clock::ManualClock;
use keyward::rate_limit::{RateLimitAlgorithm, RateLimitConfig, RateLimiter};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum CacheOp {
    Put(u8, u32),
    Get(u8),
    Remove(u8),
}

fn cache_op() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (0u8..24, any::<u32>()).prop_map(|(k, v)| CacheOp::Put(k, v)),
        (0u8..24).prop_map(CacheOp::Get),
        (0u8..24).prop_map(CacheOp::Remove),
    ]
}

proptest! {
    #[test]
    fn lru_matches_recency_model(capacity in 1usize..12, ops in prop::collection::vec(cache_op(), 0..200)) {
        let mut cache = LruCache::new(capacity).unwrap();
        // Front is most recently used
        let mut model: VecDeque<(u8, u32)> = VecDeque::new();

        for op in ops {
            match op {
                CacheOp::Put(key, value) => {
                    let previous = model.iter().position(|(k, _)| *k == key).map(|i| model.remove(i).unwrap().1);
                    prop_assert_eq!(cache.put(key, value), previous);
                    if model.len() == capacity {
                        model.pop_back();
                    }
                    model.push_front((key, value));
                }
                CacheOp::Get(key) => {
                    let hit = model.iter().position(|(k, _)| *k == key).map(|i| model.remove(i).unwrap());
                    prop_assert_eq!(cache.get(&key).copied(), hit.map(|(_, v)| v));
                    if let Some(entry) = hit {
                        model.push_front(entry);
                    }
                }
                CacheOp::Remove(key) => {
                    let removed = model.iter().position(|(k, _)| *k == key).map(|i| model.remove(i).unwrap().1);
                    prop_assert_eq!(cache.remove(&key), removed);
                }
            }

            prop_assert!(cache.len() <= capacity);
            let keys: Vec<u8> = cache.keys().into_iter().copied().collect();
            let expected: Vec<u8> = model.iter().map(|(k, _)| *k).collect();
            prop_assert_eq!(keys, expected);
        }
    }

    #[test]
    fn limiter_never_grants_more_than_limit(
        limit in 1u32..50,
        attempts in 0usize..150,
        window_ms in 1_000u64..120_000,
        sliding in any::<bool>(),
    ) {
        let window = Duration::from_millis(window_ms);
        let algorithm = if sliding {
            RateLimitAlgorithm::SlidingWindow { limit, window }
        } else {
            RateLimitAlgorithm::FixedWindow { limit, window }
        };
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_000_000)));
        let limiter = RateLimiter::with_clock(
            RateLimitConfig { algorithm, ..RateLimitConfig::default() },
            clock,
        ).unwrap();

        let granted = (0..attempts).filter(|_| limiter.try_acquire("id").allowed).count();
        prop_assert!(granted <= limit as usize);
        prop_assert_eq!(granted, attempts.min(limit as usize));
    }

    #[test]
    fn token_bucket_grants_burst_plus_refill(
        burst in 1u32..20,
        rate_per_second in 1u32..20,
        elapsed_ms in 0u64..5_000,
    ) {
        let clock = Arc::new(ManualClock::new(Duration::from_secs(1_000_000)));
        let limiter = RateLimiter::with_clock(
            RateLimitConfig {
                algorithm: RateLimitAlgorithm::TokenBucket { burst, rate_per_second: rate_per_second as f64 },
                ..RateLimitConfig::default()
            },
            clock.clone(),
        ).unwrap();

        let mut granted = 0u64;
        while limiter.try_acquire("id").allowed {
            granted += 1;
        }
        prop_assert_eq!(granted, burst as u64);

        clock.advance(Duration::from_millis(elapsed_ms));
        let mut refilled = 0u64;
        while limiter.try_acquire("id").allowed {
            refilled += 1;
        }
        let interval_ms = 1_000 / rate_per_second as u64;
        let upper = (elapsed_ms * rate_per_second as u64 / 1_000).min(burst as u64) + 1;
        prop_assert!(refilled <= upper, "refilled {} > {}", refilled, upper);
        if elapsed_ms > interval_ms {
            prop_assert!(refilled >= 1);
        }
    }
}
