use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use keyward::{
    cache::{CacheConfig, DerivedKeyCache, LruCache},
    engine::AeadEngine,
    key_derivation::{DerivationAlgorithm, DerivationConfig, DerivationParams, DerivationPolicy, KeyDeriver},
    rate_limit::{RateLimitAlgorithm, RateLimitConfig, RateLimiter},
    rotation::{CancellationToken, KeyLineage, ReencryptItem, RotationPolicy},
    secure_memory::SecureBytes,
    storage::{MemoryBackend, SecureStorage},
};

fn derivation_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_derivation");
    group.sample_size(20);

    let config = DerivationConfig {
        policy: DerivationPolicy {
            min_pbkdf2_iterations: 1_000,
            min_argon2_memory_kib: 1_024,
            ..DerivationPolicy::default()
        },
        ..DerivationConfig::default()
    };
    let salt = [0x5a; 16];

    for algorithm in [
        DerivationAlgorithm::Pbkdf2HmacSha256,
        DerivationAlgorithm::Pbkdf2HmacSha512,
    ] {
        let params = DerivationParams::pbkdf2(algorithm, 10_000, 16, 32).unwrap();
        let deriver = KeyDeriver::new(config.clone()).unwrap();
        group.bench_with_input(
            BenchmarkId::new("derive_with_salt", algorithm.to_string()),
            &params,
            |b, params| b.iter(|| deriver.derive_with_salt(b"correct horse", &salt, Some(params))),
        );
    }

    let argon2 = DerivationParams::argon2id(2, 4_096, 1, 16, 32).unwrap();
    let deriver = KeyDeriver::new(config.clone()).unwrap();
    group.bench_function("derive_with_salt/Argon2id", |b| {
        b.iter(|| deriver.derive_with_salt(b"correct horse", &salt, Some(&argon2)))
    });

    // Cache hits skip the KDF entirely
    let params = DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 10_000, 16, 32).unwrap();
    let cache = Arc::new(DerivedKeyCache::new(&CacheConfig::default()).unwrap());
    let cached = KeyDeriver::new(config).unwrap().with_cache(cache);
    cached.derive_with_salt(b"correct horse", &salt, Some(&params)).unwrap();
    group.bench_function("derive_with_salt/cached", |b| {
        b.iter(|| cached.derive_with_salt(b"correct horse", &salt, Some(&params)))
    });

    group.finish();
}

fn cache_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru_cache");

    for capacity in [64usize, 1_024, 16_384] {
        group.bench_with_input(BenchmarkId::new("put_evicting", capacity), &capacity, |b, &capacity| {
            let mut cache = LruCache::new(capacity).unwrap();
            let mut key = 0u64;
            b.iter(|| {
                key += 1;
                cache.put(key, key)
            })
        });

        group.bench_with_input(BenchmarkId::new("get_hit", capacity), &capacity, |b, &capacity| {
            let mut cache = LruCache::new(capacity).unwrap();
            for key in 0..capacity as u64 {
                cache.put(key, key);
            }
            let mut key = 0u64;
            b.iter(|| {
                key = (key + 7) % capacity as u64;
                cache.get(&key).copied()
            })
        });
    }

    group.finish();
}

fn rate_limit_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_limit");

    let algorithms = [
        (
            "fixed_window",
            RateLimitAlgorithm::FixedWindow {
                limit: 1_000_000,
                window: Duration::from_secs(1),
            },
        ),
        (
            "sliding_window",
            RateLimitAlgorithm::SlidingWindow {
                limit: 1_000_000,
                window: Duration::from_secs(1),
            },
        ),
        (
            "token_bucket",
            RateLimitAlgorithm::TokenBucket {
                burst: 1_000_000,
                rate_per_second: 1_000_000.0,
            },
        ),
    ];

    for (name, algorithm) in algorithms {
        let limiter = RateLimiter::new(RateLimitConfig {
            algorithm,
            ..RateLimitConfig::default()
        })
        .unwrap();
        let identities: Vec<String> = (0..256).map(|i| format!("client-{}", i)).collect();
        let mut next = 0usize;
        group.bench_function(BenchmarkId::new("try_acquire", name), |b| {
            b.iter(|| {
                next = (next + 1) % identities.len();
                limiter.try_acquire(&identities[next])
            })
        });
    }

    group.finish();
}

fn rotation_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotation");
    group.sample_size(20);

    let storage = Arc::new(
        SecureStorage::new(Arc::new(MemoryBackend::new()), &SecureBytes::new(&[1; 32])).unwrap(),
    );
    let lineage = KeyLineage::open(
        "bench",
        RotationPolicy::default(),
        Arc::new(AeadEngine::new()),
        storage,
    )
    .unwrap();
    lineage.rotate_generated().unwrap();

    let payload = vec![0xabu8; 1024];
    group.bench_function("encrypt_1k", |b| b.iter(|| lineage.encrypt(&payload)));

    let envelope = lineage.encrypt(&payload).unwrap();
    group.bench_function("decrypt_1k", |b| b.iter(|| lineage.decrypt(&envelope)));

    let items: Vec<ReencryptItem> = (0..256)
        .map(|i| ReencryptItem::from_envelope(format!("item-{}", i), lineage.encrypt(&payload).unwrap()))
        .collect();
    lineage.rotate_generated().unwrap();
    let token = CancellationToken::new();
    group.bench_function("reencrypt_256x1k", |b| {
        b.iter(|| lineage.reencrypt(items.clone(), &token))
    });

    group.finish();
}

criterion_group!(
    benches,
    derivation_benchmarks,
    cache_benchmarks,
    rate_limit_benchmarks,
    rotation_benchmarks
);
criterion_main!(benches);
