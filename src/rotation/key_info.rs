use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::CipherAlgorithm;
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::utils;

/// Lifecycle state of one key version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyStatus {
    /// Encrypts new data; exactly one per lineage once the first key exists
    Active,
    /// Superseded, still decrypts existing data
    Deprecated,
    /// Material destroyed; nothing can be decrypted under it
    Revoked,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStatus::Active => write!(f, "active"),
            KeyStatus::Deprecated => write!(f, "deprecated"),
            KeyStatus::Revoked => write!(f, "revoked"),
        }
    }
}

/// One version of a key lineage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub version: u64,
    pub algorithm: CipherAlgorithm,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deprecated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl KeyInfo {
    pub(crate) fn new(version: u64, algorithm: CipherAlgorithm, created_at: DateTime<Utc>) -> Self {
        Self {
            version,
            algorithm,
            status: KeyStatus::Active,
            created_at,
            deprecated_at: None,
            revoked_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }

    /// Whether data under this version can still be decrypted
    pub fn is_usable(&self) -> bool {
        self.status != KeyStatus::Revoked
    }

    pub(crate) fn deprecate(&mut self, at: DateTime<Utc>) {
        if self.status == KeyStatus::Active {
            self.status = KeyStatus::Deprecated;
            self.deprecated_at = Some(at);
        }
    }

    pub(crate) fn revoke(&mut self, at: DateTime<Utc>) {
        if self.status != KeyStatus::Revoked {
            if self.deprecated_at.is_none() {
                self.deprecated_at = Some(at);
            }
            self.status = KeyStatus::Revoked;
            self.revoked_at = Some(at);
        }
    }

    /// Time since creation, as of `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }
}

/// Age report for one key version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAgeSummary {
    pub version: u64,
    pub status: KeyStatus,
    pub age: Duration,
    /// Set on the active key once it reaches the policy's maximum age
    pub needs_rotation: bool,
}

/// Describes how a ciphertext was produced; travels with every ciphertext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedDataMetadata {
    pub lineage: String,
    pub key_version: u64,
    pub algorithm: CipherAlgorithm,
    /// Millisecond precision, matching the binary header
    pub created_at: DateTime<Utc>,
}

impl EncryptedDataMetadata {
    pub fn new(
        lineage: &str,
        key_version: u64,
        algorithm: CipherAlgorithm,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            lineage: lineage.to_string(),
            key_version,
            algorithm,
            created_at: truncate_to_millis(created_at),
        }
    }

    /// Sidecar form, for ciphertext stored apart from its metadata
    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub(crate) fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}

const MAGIC: &[u8; 4] = b"KWRD";
const FORMAT_VERSION: u8 = 1;
const FIXED_HEADER_LEN: usize = 4 + 1 + 1 + 8 + 8 + 2;

/// Ciphertext together with its metadata.
///
/// The binary form is a self-describing header followed by the ciphertext:
///
/// ```text
/// magic "KWRD" | format u8 | algorithm u8 | key_version u64 BE
///   | created_at unix millis i64 BE | lineage_len u16 BE | lineage utf-8
///   | ciphertext
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub metadata: EncryptedDataMetadata,
    #[serde(with = "utils::base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn new(metadata: EncryptedDataMetadata, ciphertext: Vec<u8>) -> Self {
        Self {
            metadata,
            ciphertext,
        }
    }

    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        let lineage = self.metadata.lineage.as_bytes();
        let lineage_len = u16::try_from(lineage.len()).map_err(|_| {
            envelope_error("a lineage name of at most 65535 bytes", &lineage.len().to_string())
        })?;

        let mut out = Vec::with_capacity(FIXED_HEADER_LEN + lineage.len() + self.ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.push(self.metadata.algorithm.code());
        out.extend_from_slice(&self.metadata.key_version.to_be_bytes());
        out.extend_from_slice(&self.metadata.created_at.timestamp_millis().to_be_bytes());
        out.extend_from_slice(&lineage_len.to_be_bytes());
        out.extend_from_slice(lineage);
        out.extend_from_slice(&self.ciphertext);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(envelope_error(
                &format!("at least {} bytes", FIXED_HEADER_LEN),
                &format!("{} bytes", bytes.len()),
            ));
        }
        if &bytes[..4] != MAGIC {
            return Err(envelope_error("envelope magic", "unrecognized header"));
        }
        if bytes[4] != FORMAT_VERSION {
            return Err(envelope_error(
                &format!("format {}", FORMAT_VERSION),
                &format!("format {}", bytes[4]),
            ));
        }
        let algorithm = CipherAlgorithm::from_code(bytes[5])
            .ok_or_else(|| envelope_error("a known algorithm code", &bytes[5].to_string()))?;

        let key_version = u64::from_be_bytes(read_array(bytes, 6)?);
        let millis = i64::from_be_bytes(read_array(bytes, 14)?);
        let lineage_len = u16::from_be_bytes(read_array(bytes, 22)?) as usize;

        let lineage_end = FIXED_HEADER_LEN + lineage_len;
        let lineage = bytes
            .get(FIXED_HEADER_LEN..lineage_end)
            .ok_or_else(|| envelope_error("complete lineage name", "truncated header"))?;
        let lineage = std::str::from_utf8(lineage)
            .map_err(|_| envelope_error("utf-8 lineage name", "invalid utf-8"))?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| envelope_error("a representable timestamp", &millis.to_string()))?;

        Ok(Self {
            metadata: EncryptedDataMetadata {
                lineage: lineage.to_string(),
                key_version,
                algorithm,
                created_at,
            },
            ciphertext: bytes[lineage_end..].to_vec(),
        })
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> CryptoResult<[u8; N]> {
    bytes
        .get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| envelope_error("complete header", "truncated header"))
}

fn envelope_error(expected: &str, actual: &str) -> CryptoError {
    CryptoError::invalid_parameter("envelope", expected, actual, error_codes::INVALID_ENVELOPE)
}
