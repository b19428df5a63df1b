use super::*;
use crate::cache::{CacheConfig, DerivedKeyCache};
use crate::error::CryptoError;
use std::sync::Arc;

fn fast_config() -> DerivationConfig {
    DerivationConfig {
        default_params: fast_params(),
        policy: DerivationPolicy {
            min_pbkdf2_iterations: 1_000,
            min_argon2_memory_kib: 1_024,
            ..DerivationPolicy::default()
        },
    }
}

fn fast_params() -> DerivationParams {
    DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 1_000, 16, 32).unwrap()
}

fn deriver() -> KeyDeriver {
    KeyDeriver::new(fast_config()).unwrap()
}

#[test]
fn test_derive_then_verify() {
    let deriver = deriver();
    let derived = deriver.derive(b"correct horse battery staple", None).unwrap();

    assert_eq!(derived.key_material().len(), 32);
    assert_eq!(derived.salt().len(), 16);
    assert_eq!(derived.params(), &fast_params());
    assert!(deriver
        .verify_key(
            b"correct horse battery staple",
            derived.salt(),
            derived.params(),
            derived.key_material().as_bytes(),
        )
        .unwrap());
}

#[test]
fn test_verify_rejects_wrong_secret() {
    let deriver = deriver();
    let derived = deriver.derive(b"right", None).unwrap();
    assert!(!deriver
        .verify_key(b"wrong", derived.salt(), derived.params(), derived.key_material().as_bytes())
        .unwrap());
    assert!(!deriver
        .verify_key(b"right", derived.salt(), derived.params(), &[0u8; 31])
        .unwrap());
}

#[test]
fn test_fresh_salt_each_derivation() {
    let deriver = deriver();
    let a = deriver.derive(b"secret", None).unwrap();
    let b = deriver.derive(b"secret", None).unwrap();
    assert_ne!(a.salt(), b.salt());
    assert_ne!(a.key_material(), b.key_material());
}

#[test]
fn test_derive_with_salt_is_deterministic() {
    let deriver = deriver();
    let salt = [0x42u8; 16];
    let a = deriver.derive_with_salt(b"secret", &salt, None).unwrap();
    let b = deriver.derive_with_salt(b"secret", &salt, None).unwrap();
    assert_eq!(a.key_material(), b.key_material());
}

#[test]
fn test_algorithms_and_lengths_change_output() {
    let deriver = deriver();
    let salt = [1u8; 16];
    let sha256 = deriver.derive_with_salt(b"secret", &salt, None).unwrap();

    let sha512_params =
        DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha512, 1_000, 16, 32).unwrap();
    let sha512 = deriver.derive_with_salt(b"secret", &salt, Some(&sha512_params)).unwrap();
    assert_ne!(sha256.key_material(), sha512.key_material());

    let long_params =
        DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 1_000, 16, 64).unwrap();
    let long = deriver.derive_with_salt(b"secret", &salt, Some(&long_params)).unwrap();
    assert_eq!(long.key_material().len(), 64);
    // PBKDF2 output blocks are independent, so the first block is shared.
    assert_eq!(
        &long.key_material().as_bytes()[..32],
        sha256.key_material().as_bytes()
    );
}

#[test]
fn test_argon2id_derivation() {
    let deriver = deriver();
    let params = DerivationParams::argon2id(1, 1_024, 1, 16, 32).unwrap();
    let salt = [7u8; 16];

    let a = deriver.derive_with_salt(b"secret", &salt, Some(&params)).unwrap();
    let b = deriver.derive_with_salt(b"secret", &salt, Some(&params)).unwrap();
    assert_eq!(a.key_material(), b.key_material());
    assert!(deriver
        .verify_key(b"secret", &salt, &params, a.key_material().as_bytes())
        .unwrap());
    assert!(!deriver
        .verify_key(b"Secret", &salt, &params, a.key_material().as_bytes())
        .unwrap());
}

#[test]
fn test_short_salt_rejected() {
    let deriver = deriver();
    let result = deriver.derive_with_salt(b"secret", &[0u8; 8], None);
    assert!(matches!(result, Err(CryptoError::InvalidParams { .. })));

    assert!(matches!(generate_salt(15), Err(CryptoError::InvalidParams { .. })));
    assert_eq!(generate_salt(16).unwrap().len(), 16);
    assert_eq!(deriver.generate_salt(None).unwrap().len(), 16);
}

#[test]
fn test_empty_secret_rejected() {
    let deriver = deriver();
    match deriver.derive(b"", None) {
        Err(CryptoError::InvalidParams { error_code, .. }) => {
            assert_eq!(error_code, crate::error::error_codes::INVALID_SECRET)
        }
        other => panic!("expected InvalidParams, got {:?}", other),
    }
}

#[test]
fn test_params_floors() {
    assert!(DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 999, 16, 32).is_err());
    assert!(DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 1_000, 8, 32).is_err());
    assert!(DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 1_000, 16, 8).is_err());
    assert!(DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 1_000, 16, 65).is_err());
    assert!(DerivationParams::pbkdf2(DerivationAlgorithm::Argon2id, 1_000, 16, 32).is_err());
    assert!(DerivationParams::argon2id(0, 8_192, 1, 16, 32).is_err());
    assert!(DerivationParams::argon2id(1, 512, 1, 16, 32).is_err());
    assert!(DerivationParams::argon2id(1, 8_192, 0, 16, 32).is_err());
}

#[test]
fn test_policy_bounds_enforced() {
    let deriver = KeyDeriver::new(DerivationConfig::default()).unwrap();
    let weak = fast_params();
    let result = deriver.derive(b"secret", Some(&weak));
    assert!(matches!(result, Err(CryptoError::InvalidParams { .. })));

    let too_parallel = DerivationParams::argon2id(1, 8_192, 32, 16, 32).unwrap();
    assert!(deriver.derive(b"secret", Some(&too_parallel)).is_err());
}

#[test]
fn test_policy_cannot_undercut_hard_floor() {
    let policy = DerivationPolicy {
        min_pbkdf2_iterations: 10,
        ..DerivationPolicy::default()
    };
    assert!(policy.validate().is_err());

    let config = DerivationConfig {
        default_params: fast_params(),
        policy: DerivationPolicy::default(),
    };
    assert!(KeyDeriver::new(config).is_err());
}

#[test]
fn test_presets_pass_default_policy() {
    let policy = DerivationPolicy::default();
    policy.check(&DerivationParams::default()).unwrap();
    policy.check(&DerivationParams::low_resource()).unwrap();
    policy.check(&DerivationParams::high_security()).unwrap();
}

#[test]
fn test_change_secret() {
    let deriver = deriver();
    let stored = deriver.derive(b"old password", None).unwrap();

    let updated = deriver
        .change_secret(b"old password", b"new password", &stored)
        .unwrap();
    assert_ne!(updated.salt(), stored.salt());
    assert!(deriver
        .verify_key(
            b"new password",
            updated.salt(),
            updated.params(),
            updated.key_material().as_bytes()
        )
        .unwrap());

    let rejected = deriver.change_secret(b"guess", b"new password", &stored);
    assert!(matches!(rejected, Err(CryptoError::InvalidParams { .. })));
}

#[test]
fn test_cache_serves_repeat_derivations() {
    let cache = Arc::new(DerivedKeyCache::new(&CacheConfig::default()).unwrap());
    let deriver = deriver().with_cache(cache.clone());
    let salt = [3u8; 16];

    let first = deriver.derive_with_salt(b"secret", &salt, None).unwrap();
    let second = deriver.derive_with_salt(b"secret", &salt, None).unwrap();
    assert_eq!(first.key_material(), second.key_material());

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(cache.len(), 1);

    let uncached = self::deriver()
        .derive_with_salt(b"secret", &salt, None)
        .unwrap();
    assert_eq!(uncached.key_material(), first.key_material());
}

#[test]
fn test_verify_key_bypasses_cache() {
    let cache = Arc::new(DerivedKeyCache::new(&CacheConfig::default()).unwrap());
    let deriver = deriver().with_cache(cache.clone());
    let salt = [4u8; 16];
    let params = fast_params();

    let key = deriver.derive_with_salt(b"secret", &salt, None).unwrap();
    for guess in [b"a".as_slice(), b"b".as_slice(), b"c".as_slice()] {
        assert!(!deriver
            .verify_key(guess, &salt, &params, key.key_material().as_bytes())
            .unwrap());
    }
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().hits + cache.stats().misses, 1);
}

#[test]
fn test_params_serde_round_trip() {
    let params = DerivationParams::argon2id(3, 65_536, 4, 32, 32).unwrap();
    let json = serde_json::to_string(&params).unwrap();
    assert!(json.contains("\"argon2id\""));
    let back: DerivationParams = serde_json::from_str(&json).unwrap();
    assert_eq!(back, params);
    assert_eq!(back.canonical_bytes(), params.canonical_bytes());
}
