/*!
 * Crypto Engine Capability
 *
 * The cipher, hash and signature primitives are an external collaborator.
 * Everything in this crate that needs them goes through [`CryptoEngine`],
 * so a host application can plug in its own engine. [`AeadEngine`] is the
 * default binding to the RustCrypto AEADs and ring.
 */

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod aead;

pub use aead::AeadEngine;


/// Symmetric algorithms ciphertext can be produced under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherAlgorithm {
    Aes256Gcm,
    ChaCha20Poly1305,
    XChaCha20Poly1305,
}

impl CipherAlgorithm {
    /// Required key length in bytes
    pub fn key_len(&self) -> usize {
        32
    }

    /// Nonce length in bytes, prepended to every ciphertext
    pub fn nonce_len(&self) -> usize {
        match self {
            CipherAlgorithm::Aes256Gcm | CipherAlgorithm::ChaCha20Poly1305 => 12,
            CipherAlgorithm::XChaCha20Poly1305 => 24,
        }
    }

    /// Stable wire code used in envelope headers
    pub fn code(&self) -> u8 {
        match self {
            CipherAlgorithm::Aes256Gcm => 1,
            CipherAlgorithm::ChaCha20Poly1305 => 2,
            CipherAlgorithm::XChaCha20Poly1305 => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(CipherAlgorithm::Aes256Gcm),
            2 => Some(CipherAlgorithm::ChaCha20Poly1305),
            3 => Some(CipherAlgorithm::XChaCha20Poly1305),
            _ => None,
        }
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherAlgorithm::Aes256Gcm => write!(f, "AES-256-GCM"),
            CipherAlgorithm::ChaCha20Poly1305 => write!(f, "ChaCha20-Poly1305"),
            CipherAlgorithm::XChaCha20Poly1305 => write!(f, "XChaCha20-Poly1305"),
        }
    }
}

/// Digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
    Sha3_256,
    Blake3,
}

/// Signature algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureAlgorithm {
    HmacSha256,
    HmacSha512,
}

/// Category of an engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The engine does not implement the requested algorithm
    UnsupportedAlgorithm,
    /// The key does not fit the algorithm
    InvalidKey,
    /// The input failed authentication or is malformed
    Corrupted,
    /// The engine cannot serve any request right now; batch work must stop
    Unavailable,
}

/// Error reported by a [`CryptoEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct EngineError {
    kind: EngineErrorKind,
    message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::UnsupportedAlgorithm, message)
    }

    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidKey, message)
    }

    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Corrupted, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Unavailable, message)
    }

    pub fn kind(&self) -> EngineErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the failure means the engine as a whole is down
    pub fn is_fatal(&self) -> bool {
        self.kind == EngineErrorKind::Unavailable
    }
}

/// The cipher/hash/signature capability the key lifecycle core consumes.
///
/// Implementations must be safe to call from several threads at once;
/// batch re-encryption fans out across worker threads.
pub trait CryptoEngine: Send + Sync {
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &[u8],
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, EngineError>;

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, EngineError>;

    fn hash(&self, data: &[u8], algorithm: HashAlgorithm) -> Result<Vec<u8>, EngineError>;

    fn sign(
        &self,
        data: &[u8],
        key: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> Result<Vec<u8>, EngineError>;

    fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        key: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> Result<bool, EngineError>;
}
