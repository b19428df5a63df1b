/*!
 * Keyward Key Lifecycle Core
 *
 * This crate implements the key-lifecycle and throttling core that sits
 * behind cryptographic front-ends (CLIs, HTTP services, language
 * bindings):
 *
 * - Password-based key derivation (PBKDF2-HMAC-SHA256/512, Argon2id) with
 *   policy bounds and constant-time verification
 * - A bounded LRU cache with optional TTL, used to memoize derivations
 * - Per-identity rate limiting (fixed window, sliding window, token bucket)
 * - Versioned key rotation with batch re-encryption of existing ciphertext
 * - Sealed at-rest storage of key material and metadata
 *
 * Cipher primitives are consumed through the [`engine::CryptoEngine`]
 * capability; [`engine::AeadEngine`] binds it to vetted crates.
 */

/// Common error types
pub mod error;

/// Configuration structures and JSON loading
pub mod config;

/// Injectable time sources
pub mod clock;

/// Utilities for cryptographic operations
pub mod utils;

/// Zeroizing containers for key material
pub mod secure_memory;

/// Timing-invariance measurement
pub mod security;

/// The crypto engine capability and its default binding
pub mod engine;

/// Password-based key derivation
pub mod key_derivation;

/// Bounded LRU caching
pub mod cache;

/// Per-identity rate limiting
pub mod rate_limit;

/// Key lineages, envelopes and re-encryption
pub mod rotation;

/// Sealed key record storage
pub mod storage;

/// Composition root for adapters
pub mod service;

pub use config::KeywardConfig;
pub use error::{CryptoError, CryptoResult};
pub use service::KeyService;

/// The types most adapters need
pub mod prelude {
    pub use crate::cache::{CacheConfig, DerivedKeyCache, LruCache, SharedLruCache};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::KeywardConfig;
    pub use crate::engine::{AeadEngine, CipherAlgorithm, CryptoEngine, SignatureAlgorithm};
    pub use crate::error::{CryptoError, CryptoResult};
    pub use crate::key_derivation::{
        DerivationAlgorithm, DerivationConfig, DerivationParams, DerivedKeyResult, KeyDeriver,
    };
    pub use crate::rate_limit::{Decision, RateLimitAlgorithm, RateLimitConfig, RateLimiter};
    pub use crate::rotation::{
        CancellationToken, EncryptedDataMetadata, Envelope, KeyInfo, KeyLineage, KeyRing,
        KeyStatus, ReencryptItem, ReencryptionResult, RotationPolicy,
    };
    pub use crate::secure_memory::SecureBytes;
    pub use crate::service::KeyService;
    pub use crate::storage::{FileBackend, MemoryBackend, SecureStorage, StorageBackend};
}
