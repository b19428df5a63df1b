/*!
 * Key Service
 *
 * Composition root for adapters: builds the deriver with its cache, the
 * rate limiter, the sealed store and the key ring from one
 * [`KeywardConfig`], and gates derivation and signing per caller identity.
 * There is no global state; an adapter owns its `KeyService`.
 */

use std::fmt;
use std::sync::Arc;

use crate::cache::DerivedKeyCache;
use crate::clock::{Clock, SystemClock};
use crate::config::KeywardConfig;
use crate::engine::{CryptoEngine, SignatureAlgorithm};
use crate::error::{CryptoError, CryptoResult};
use crate::key_derivation::{DerivationParams, DerivedKeyResult, KeyDeriver};
use crate::rate_limit::{Decision, RateLimiter};
use crate::rotation::KeyRing;
use crate::secure_memory::SecureBytes;
use crate::storage::SecureStorage;

/// Everything an adapter needs, wired from one configuration
pub struct KeyService {
    config: KeywardConfig,
    engine: Arc<dyn CryptoEngine>,
    cache: Arc<DerivedKeyCache>,
    deriver: KeyDeriver,
    limiter: RateLimiter,
    storage: Arc<SecureStorage>,
    keyring: KeyRing,
}

impl fmt::Debug for KeyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyService")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .field("keyring", &self.keyring)
            .finish_non_exhaustive()
    }
}

impl KeyService {
    /// Build a service.
    ///
    /// `master_secret` seals key records at rest and is never read from
    /// configuration.
    pub fn new(
        config: KeywardConfig,
        engine: Arc<dyn CryptoEngine>,
        master_secret: &SecureBytes,
    ) -> CryptoResult<Self> {
        Self::with_clock(config, engine, master_secret, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: KeywardConfig,
        engine: Arc<dyn CryptoEngine>,
        master_secret: &SecureBytes,
        clock: Arc<dyn Clock>,
    ) -> CryptoResult<Self> {
        config.validate()?;

        let cache = Arc::new(DerivedKeyCache::with_clock(&config.cache, clock.clone())?);
        let deriver = KeyDeriver::new(config.derivation.clone())?.with_cache(cache.clone());
        let limiter = RateLimiter::with_clock(config.rate_limit.clone(), clock.clone())?;
        let storage = Arc::new(SecureStorage::from_settings(&config.storage, master_secret)?);
        let keyring = KeyRing::with_clock(
            config.rotation.clone(),
            engine.clone(),
            storage.clone(),
            clock,
        )?;

        log::info!(
            "key service ready: cache {} entries, {} lineage(s) on record",
            config.cache.capacity,
            keyring.discover()?.len()
        );
        Ok(Self {
            config,
            engine,
            cache,
            deriver,
            limiter,
            storage,
            keyring,
        })
    }

    /// Derive a key for `identity` under a fresh salt
    ///
    /// Fails with `RateLimited` once the identity exhausts its quota.
    pub fn derive_for(
        &self,
        identity: &str,
        secret: &[u8],
        params: Option<&DerivationParams>,
    ) -> CryptoResult<DerivedKeyResult> {
        self.admit(identity)?;
        self.deriver.derive(secret, params)
    }

    /// Re-derive a key for `identity` under a known salt
    pub fn derive_with_salt_for(
        &self,
        identity: &str,
        secret: &[u8],
        salt: &[u8],
        params: Option<&DerivationParams>,
    ) -> CryptoResult<DerivedKeyResult> {
        self.admit(identity)?;
        self.deriver.derive_with_salt(secret, salt, params)
    }

    /// Check a secret for `identity`; every attempt counts against its quota
    pub fn verify_for(
        &self,
        identity: &str,
        secret: &[u8],
        salt: &[u8],
        params: &DerivationParams,
        expected_key: &[u8],
    ) -> CryptoResult<bool> {
        self.admit(identity)?;
        self.deriver.verify_key(secret, salt, params, expected_key)
    }

    /// Sign `data` on behalf of `identity`
    pub fn sign_for(
        &self,
        identity: &str,
        data: &[u8],
        key: &SecureBytes,
        algorithm: SignatureAlgorithm,
    ) -> CryptoResult<Vec<u8>> {
        self.admit(identity)?;
        self.engine
            .sign(data, key.as_bytes(), algorithm)
            .map_err(|e| CryptoError::engine("sign", e))
    }

    /// Verify a signature on behalf of `identity`
    pub fn verify_signature(
        &self,
        identity: &str,
        data: &[u8],
        signature: &[u8],
        key: &SecureBytes,
        algorithm: SignatureAlgorithm,
    ) -> CryptoResult<bool> {
        self.admit(identity)?;
        self.engine
            .verify(data, signature, key.as_bytes(), algorithm)
            .map_err(|e| CryptoError::engine("verify", e))
    }

    pub fn config(&self) -> &KeywardConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn CryptoEngine> {
        &self.engine
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    pub fn cache(&self) -> &DerivedKeyCache {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn storage(&self) -> &Arc<SecureStorage> {
        &self.storage
    }

    pub fn keyring(&self) -> &KeyRing {
        &self.keyring
    }

    fn admit(&self, identity: &str) -> CryptoResult<Decision> {
        self.limiter.check(identity)
    }
}
