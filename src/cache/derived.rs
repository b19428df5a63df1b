use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{CacheConfig, CacheStats, LruCache, SharedLruCache};
use crate::clock::{Clock, SystemClock};
use crate::error::CryptoResult;
use crate::key_derivation::DerivationParams;
use crate::secure_memory::SecureBytes;
use crate::utils;

/// Identifies one deterministic derivation without revealing its secret
pub type DerivationFingerprint = [u8; 32];

/// Memoizes derived keys by a keyed fingerprint of their inputs.
///
/// The fingerprint is a BLAKE3 keyed hash over SHA-256 of the secret, the
/// salt and the canonical parameter encoding. The hash key is drawn at
/// construction and never leaves the process, so fingerprints cannot be
/// precomputed offline. Cached key material is held in [`SecureBytes`] and
/// zeroized on eviction.
pub struct DerivedKeyCache {
    entries: SharedLruCache<DerivationFingerprint, SecureBytes>,
    fingerprint_key: Zeroizing<[u8; 32]>,
    enabled: bool,
}

impl fmt::Debug for DerivedKeyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKeyCache")
            .field("enabled", &self.enabled)
            .field("entries", &self.entries)
            .finish()
    }
}

impl DerivedKeyCache {
    pub fn new(config: &CacheConfig) -> CryptoResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> CryptoResult<Self> {
        let lru = LruCache::from_config(config)?.with_clock(clock);

        let mut fingerprint_key = Zeroizing::new([0u8; 32]);
        fingerprint_key.copy_from_slice(&utils::random_bytes(32)?);

        Ok(Self {
            entries: SharedLruCache::new(lru),
            fingerprint_key,
            enabled: config.enabled,
        })
    }

    /// Fingerprint a derivation request
    pub fn fingerprint(
        &self,
        secret: &[u8],
        salt: &[u8],
        params: &DerivationParams,
    ) -> DerivationFingerprint {
        let secret_digest: Zeroizing<[u8; 32]> = Zeroizing::new(Sha256::digest(secret).into());

        let mut hasher = blake3::Hasher::new_keyed(&self.fingerprint_key);
        hasher.update(&secret_digest[..]);
        hasher.update(&(salt.len() as u32).to_be_bytes());
        hasher.update(salt);
        hasher.update(&params.canonical_bytes());
        *hasher.finalize().as_bytes()
    }

    pub fn get(&self, fingerprint: &DerivationFingerprint) -> Option<SecureBytes> {
        if !self.enabled {
            return None;
        }
        self.entries.get(fingerprint)
    }

    pub fn insert(&self, fingerprint: DerivationFingerprint, key_material: SecureBytes) {
        if self.enabled {
            self.entries.put(fingerprint, key_material);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }

    pub fn clear(&self) {
        self.entries.clear()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
