/*!
 * Key Rotation
 *
 * Versioned key lineages with an explicit lifecycle
 * (`Active -> Deprecated -> Revoked`), self-describing envelopes that tie
 * every ciphertext to the key version that produced it, and batch
 * re-encryption of existing ciphertext under the current key.
 *
 * Key material lives in [`crate::storage::SecureStorage`] under
 * `"{lineage}/v{version}"` and the tracked corpus under
 * `"{lineage}/corpus"`, so a lineage can be reopened after restart.
 */

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{duration_ms, option_duration_ms};
use crate::engine::CipherAlgorithm;
use crate::error::{error_codes, CryptoError, CryptoResult};

mod key_info;
mod keyring;
mod lineage;

/// Cooperative cancellation for re-encryption batches
pub use tokio_util::sync::CancellationToken;

pub use key_info::{EncryptedDataMetadata, Envelope, KeyAgeSummary, KeyInfo, KeyStatus};
pub use keyring::KeyRing;
pub use lineage::{
    FailedItem, KeyLineage, ReencryptItem, ReencryptedItem, ReencryptionResult,
    MAX_LINEAGE_NAME_LEN,
};


/// Most worker threads a re-encryption batch may use
pub const MAX_REENCRYPT_WORKERS: usize = 64;

/// How lineages rotate and retire keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RotationPolicy {
    /// Cipher for new key versions
    pub algorithm: CipherAlgorithm,
    /// How long a deprecated key stays usable before `revoke_expired` may revoke it
    #[serde(rename = "grace_period_ms", with = "duration_ms")]
    pub grace_period: Duration,
    /// Age at which the active key is due for rotation; `None` never expires
    #[serde(rename = "max_key_age_ms", with = "option_duration_ms")]
    pub max_key_age: Option<Duration>,
    /// Worker threads per re-encryption batch
    pub reencrypt_workers: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            algorithm: CipherAlgorithm::ChaCha20Poly1305,
            grace_period: Duration::from_secs(7 * 24 * 3600),
            max_key_age: Some(Duration::from_secs(90 * 24 * 3600)),
            reencrypt_workers: 4,
        }
    }
}

impl RotationPolicy {
    pub fn validate(&self) -> CryptoResult<()> {
        if !(1..=MAX_REENCRYPT_WORKERS).contains(&self.reencrypt_workers) {
            return Err(CryptoError::invalid_parameter(
                "rotation.reencrypt_workers",
                &format!("1..={}", MAX_REENCRYPT_WORKERS),
                &self.reencrypt_workers.to_string(),
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        if self.max_key_age == Some(Duration::ZERO) {
            return Err(CryptoError::invalid_parameter(
                "rotation.max_key_age_ms",
                "a positive age or null",
                "0",
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        Ok(())
    }
}
