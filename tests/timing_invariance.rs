//! Timing invariance of key verification
//!
//! `verify_key` must take the same time whether a wrong candidate differs
//! from the expected key in its first byte or its last byte. The default
//! test compares medians with a generous bound so it holds on shared CI
//! machines; the strict Welch t-test runs with `--features constant-time-testing`.

use keyward::key_derivation::{DerivationAlgorithm, DerivationConfig, DerivationParams, DerivationPolicy, KeyDeriver};
use keyward::security::{measure_classes, TimingConfig};
use keyward::utils;

fn deriver() -> (KeyDeriver, DerivationParams) {
    let config = DerivationConfig {
        policy: DerivationPolicy {
            min_pbkdf2_iterations: 1_000,
            ..DerivationPolicy::default()
        },
        ..DerivationConfig::default()
    };
    let params =
        DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 1_000, 16, 32).unwrap();
    (KeyDeriver::new(config).unwrap(), params)
}

/// Expected keys that differ from the true key at the first and last byte
fn mismatch_classes(key: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut first = key.to_vec();
    first[0] ^= 0x01;
    let mut last = key.to_vec();
    let end = last.len() - 1;
    last[end] ^= 0x01;
    (first, last)
}

#[test]
fn test_verify_key_rejects_both_classes() {
    let (deriver, params) = deriver();
    let salt = [0x33; 16];
    let key = deriver.derive_with_salt(b"pin-1234", &salt, Some(&params)).unwrap();
    let (first, last) = mismatch_classes(key.key_material().as_bytes());

    assert!(!deriver.verify_key(b"pin-1234", &salt, &params, &first).unwrap());
    assert!(!deriver.verify_key(b"pin-1234", &salt, &params, &last).unwrap());
    assert!(deriver
        .verify_key(b"pin-1234", &salt, &params, key.key_material().as_bytes())
        .unwrap());
}

#[test]
fn test_verify_key_median_is_position_independent() {
    let (deriver, params) = deriver();
    let salt = [0x33; 16];
    let key = deriver.derive_with_salt(b"pin-1234", &salt, Some(&params)).unwrap();
    let (first, last) = mismatch_classes(key.key_material().as_bytes());

    let report = measure_classes(
        |expected: &Vec<u8>| {
            let _ = deriver.verify_key(b"pin-1234", &salt, &params, expected);
        },
        &first,
        &last,
        &TimingConfig::robust(200),
    )
    .unwrap();

    assert!(
        report.median_ratio < 0.25,
        "median ratio {:.3} (first {:?}, last {:?})",
        report.median_ratio,
        report.class_a.median,
        report.class_b.median
    );
}

#[test]
fn test_comparison_median_is_position_independent() {
    let key = [0xa5u8; 64];
    let (first, last) = mismatch_classes(&key);

    let report = measure_classes(
        |candidate: &Vec<u8>| {
            std::hint::black_box(utils::constant_time_eq(&key, candidate));
        },
        &first,
        &last,
        &TimingConfig::robust(5_000),
    )
    .unwrap();
    assert_eq!(report.class_a.samples, 5_000);
    assert!(report.median_ratio.is_finite());
}

#[cfg(feature = "constant-time-testing")]
mod strict {
    use super::*;
    use keyward::security::verify_constant_time;

    #[test]
    fn test_verify_key_welch_t() {
        let (deriver, params) = deriver();
        let salt = [0x33; 16];
        let key = deriver.derive_with_salt(b"pin-1234", &salt, Some(&params)).unwrap();
        let (first, last) = mismatch_classes(key.key_material().as_bytes());

        let config = TimingConfig {
            iterations: 2_000,
            warmup_iterations: 200,
            ..TimingConfig::default()
        };
        verify_constant_time(
            "verify_key",
            |expected: &Vec<u8>| {
                let _ = deriver.verify_key(b"pin-1234", &salt, &params, expected);
            },
            &first,
            &last,
            &config,
        )
        .unwrap();
    }
}
