/*!
 * Error Handling for the Keyward Key Lifecycle Core
 *
 * Provides one error type for every public operation, with stable error
 * codes, user-facing messages for adapter layers, and the retry policy
 * callers are expected to follow.
 */

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::engine::{EngineError, EngineErrorKind};

/// Comprehensive error type for all key lifecycle and throttling operations
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    #[error("Invalid parameter: {parameter} - expected {expected} - got {actual}")]
    InvalidParams {
        parameter: String,
        expected: String,
        actual: String,
        error_code: u32,
    },

    #[error("Key derivation failed: {algorithm} - {cause}")]
    DerivationFailed {
        algorithm: String,
        cause: String,
        error_code: u32,
    },

    #[error("Random number generation failed: {cause}")]
    InsufficientEntropy { cause: String, error_code: u32 },

    #[error("Crypto engine error during {operation}: {source}")]
    Engine {
        operation: String,
        #[source]
        source: EngineError,
    },

    #[error("Rate limited: {identity} - retry after {retry_after:?}")]
    RateLimited {
        identity: String,
        retry_after: Duration,
    },

    #[error("Rotation already in progress for lineage '{lineage}'")]
    RotationInProgress { lineage: String },

    #[error("Key version {version} of lineage '{lineage}' is still referenced by {references} item(s)")]
    VersionInUse {
        lineage: String,
        version: u64,
        references: usize,
    },

    #[error("No active key for lineage '{lineage}'")]
    NoActiveKey { lineage: String },

    #[error("Unknown key version {version} for lineage '{lineage}'")]
    UnknownKeyVersion { lineage: String, version: u64 },

    #[error("Key version {version} of lineage '{lineage}' has been revoked")]
    KeyRevoked { lineage: String, version: u64 },

    #[error("Record not found: {id}")]
    NotFound { id: String },

    #[error("Storage unavailable: {operation} - {cause}")]
    StorageUnavailable { operation: String, cause: String },

    #[error("Integrity check failed for '{id}': {cause}")]
    IntegrityViolation { id: String, cause: String },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Error code constants for different error categories
pub mod error_codes {
    // Parameter errors: 1000-1999
    pub const INVALID_ITERATION_COUNT: u32 = 1001;
    pub const INVALID_SALT_LENGTH: u32 = 1002;
    pub const INVALID_OUTPUT_LENGTH: u32 = 1003;
    pub const INVALID_KEY_LENGTH: u32 = 1004;
    pub const INVALID_CONFIGURATION: u32 = 1005;
    pub const INVALID_SECRET: u32 = 1006;
    pub const INVALID_ENVELOPE: u32 = 1007;

    // Derivation errors: 2000-2999
    pub const KEY_DERIVATION_FAILED: u32 = 2001;
    pub const INSUFFICIENT_ENTROPY: u32 = 2002;

    // Engine errors: 3000-3999
    pub const ENGINE_UNSUPPORTED_ALGORITHM: u32 = 3001;
    pub const ENGINE_INVALID_KEY: u32 = 3002;
    pub const ENGINE_CORRUPTED: u32 = 3003;
    pub const ENGINE_UNAVAILABLE: u32 = 3004;

    // Throttling errors: 4000-4999
    pub const RATE_LIMITED: u32 = 4001;

    // Lifecycle errors: 5000-5999
    pub const ROTATION_IN_PROGRESS: u32 = 5001;
    pub const VERSION_IN_USE: u32 = 5002;
    pub const NO_ACTIVE_KEY: u32 = 5003;
    pub const UNKNOWN_KEY_VERSION: u32 = 5004;
    pub const KEY_REVOKED: u32 = 5005;
    pub const OPERATION_CANCELLED: u32 = 5006;

    // Storage errors: 6000-6999
    pub const RECORD_NOT_FOUND: u32 = 6001;
    pub const STORAGE_UNAVAILABLE: u32 = 6002;
    pub const INTEGRITY_VIOLATION: u32 = 6003;

    pub const SERIALIZATION_FAILED: u32 = 9001;
}

impl CryptoError {
    /// Get the numeric error code for this error
    pub fn error_code(&self) -> u32 {
        match self {
            CryptoError::InvalidParams { error_code, .. } => *error_code,
            CryptoError::DerivationFailed { error_code, .. } => *error_code,
            CryptoError::InsufficientEntropy { error_code, .. } => *error_code,
            CryptoError::Engine { source, .. } => match source.kind() {
                EngineErrorKind::UnsupportedAlgorithm => error_codes::ENGINE_UNSUPPORTED_ALGORITHM,
                EngineErrorKind::InvalidKey => error_codes::ENGINE_INVALID_KEY,
                EngineErrorKind::Corrupted => error_codes::ENGINE_CORRUPTED,
                EngineErrorKind::Unavailable => error_codes::ENGINE_UNAVAILABLE,
            },
            CryptoError::RateLimited { .. } => error_codes::RATE_LIMITED,
            CryptoError::RotationInProgress { .. } => error_codes::ROTATION_IN_PROGRESS,
            CryptoError::VersionInUse { .. } => error_codes::VERSION_IN_USE,
            CryptoError::NoActiveKey { .. } => error_codes::NO_ACTIVE_KEY,
            CryptoError::UnknownKeyVersion { .. } => error_codes::UNKNOWN_KEY_VERSION,
            CryptoError::KeyRevoked { .. } => error_codes::KEY_REVOKED,
            CryptoError::NotFound { .. } => error_codes::RECORD_NOT_FOUND,
            CryptoError::StorageUnavailable { .. } => error_codes::STORAGE_UNAVAILABLE,
            CryptoError::IntegrityViolation { .. } => error_codes::INTEGRITY_VIOLATION,
            CryptoError::Cancelled { .. } => error_codes::OPERATION_CANCELLED,
            CryptoError::SerializationError(_) => error_codes::SERIALIZATION_FAILED,
        }
    }

    /// Get the error category/type as a string
    pub fn error_type(&self) -> &'static str {
        match self {
            CryptoError::InvalidParams { .. } => "InvalidParams",
            CryptoError::DerivationFailed { .. } => "DerivationFailed",
            CryptoError::InsufficientEntropy { .. } => "InsufficientEntropy",
            CryptoError::Engine { .. } => "EngineError",
            CryptoError::RateLimited { .. } => "RateLimited",
            CryptoError::RotationInProgress { .. } => "RotationInProgress",
            CryptoError::VersionInUse { .. } => "VersionInUse",
            CryptoError::NoActiveKey { .. } => "NoActiveKey",
            CryptoError::UnknownKeyVersion { .. } => "UnknownKeyVersion",
            CryptoError::KeyRevoked { .. } => "KeyRevoked",
            CryptoError::NotFound { .. } => "NotFound",
            CryptoError::StorageUnavailable { .. } => "StorageUnavailable",
            CryptoError::IntegrityViolation { .. } => "IntegrityViolation",
            CryptoError::Cancelled { .. } => "Cancelled",
            CryptoError::SerializationError(_) => "SerializationError",
        }
    }

    /// Whether the caller may retry the operation that produced this error.
    ///
    /// Lifecycle conflicts and out-of-policy parameters are surfaced but
    /// never worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            CryptoError::RateLimited { .. }
            | CryptoError::StorageUnavailable { .. }
            | CryptoError::DerivationFailed { .. }
            | CryptoError::InsufficientEntropy { .. } => true,
            CryptoError::Engine { source, .. } => source.kind() != EngineErrorKind::InvalidKey,
            _ => false,
        }
    }

    /// How long a throttled caller should wait before retrying
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CryptoError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Get a user-friendly error message for adapter layers
    pub fn user_friendly_message(&self) -> String {
        match self {
            CryptoError::InvalidParams { parameter, expected, .. } => {
                format!("Invalid parameter '{}'. Expected {}.", parameter, expected)
            }
            CryptoError::DerivationFailed { algorithm, .. } => {
                format!("Key derivation with '{}' failed. Please try again.", algorithm)
            }
            CryptoError::InsufficientEntropy { .. } => {
                "The system random number generator is unavailable.".to_string()
            }
            CryptoError::Engine { operation, .. } => {
                format!("Cryptographic operation '{}' failed.", operation)
            }
            CryptoError::RateLimited { retry_after, .. } => format!(
                "Too many requests. Please retry in {} ms.",
                retry_after.as_millis().max(1)
            ),
            CryptoError::RotationInProgress { lineage } => {
                format!("A key rotation for '{}' is already running.", lineage)
            }
            CryptoError::VersionInUse { version, references, .. } => format!(
                "Key version {} still protects {} item(s) and cannot be purged.",
                version, references
            ),
            CryptoError::NoActiveKey { lineage } => {
                format!("No key has been created for '{}' yet.", lineage)
            }
            CryptoError::UnknownKeyVersion { version, .. } => {
                format!("Key version {} is unknown.", version)
            }
            CryptoError::KeyRevoked { version, .. } => {
                format!("Key version {} has been revoked.", version)
            }
            CryptoError::NotFound { id } => format!("No stored record named '{}'.", id),
            CryptoError::StorageUnavailable { .. } => {
                "Key storage is temporarily unavailable.".to_string()
            }
            CryptoError::IntegrityViolation { id, .. } => {
                format!("Stored record '{}' failed its integrity check.", id)
            }
            CryptoError::Cancelled { operation } => format!("Operation '{}' was cancelled.", operation),
            CryptoError::SerializationError(_) => {
                "Data serialization failed. Data format may be corrupted.".to_string()
            }
        }
    }

    /// Get suggested remediation steps
    pub fn suggested_remediation(&self) -> Option<String> {
        match self {
            CryptoError::InvalidParams { .. } => {
                Some("Adjust the configuration to stay within policy bounds.".to_string())
            }
            CryptoError::RateLimited { retry_after, .. } => Some(format!(
                "Wait at least {} ms before retrying.",
                retry_after.as_millis().max(1)
            )),
            CryptoError::StorageUnavailable { .. } => {
                Some("Retry with exponential backoff; check the storage medium.".to_string())
            }
            CryptoError::VersionInUse { .. } => {
                Some("Re-encrypt the remaining items under the active key first.".to_string())
            }
            CryptoError::NoActiveKey { .. } => Some("Rotate in an initial key.".to_string()),
            CryptoError::IntegrityViolation { .. } => Some(
                "Verify the master secret; the record may have been tampered with.".to_string(),
            ),
            CryptoError::InsufficientEntropy { .. } => Some(
                "Check system entropy sources before retrying.".to_string(),
            ),
            _ => None,
        }
    }

    /// Get technical details for debugging
    pub fn technical_details(&self) -> HashMap<String, String> {
        let mut details = HashMap::new();
        details.insert("error_code".to_string(), self.error_code().to_string());
        details.insert("error_type".to_string(), self.error_type().to_string());
        details.insert("timestamp".to_string(), chrono::Utc::now().to_rfc3339());

        match self {
            CryptoError::InvalidParams { parameter, expected, actual, .. } => {
                details.insert("parameter".to_string(), parameter.clone());
                details.insert("expected".to_string(), expected.clone());
                details.insert("actual".to_string(), actual.clone());
            }
            CryptoError::Engine { operation, source } => {
                details.insert("operation".to_string(), operation.clone());
                details.insert("engine_error".to_string(), format!("{:?}", source.kind()));
            }
            CryptoError::RateLimited { identity, retry_after } => {
                details.insert("identity".to_string(), identity.clone());
                details.insert("retry_after_ms".to_string(), retry_after.as_millis().to_string());
            }
            _ => {
                details.insert("details".to_string(), self.to_string());
            }
        }

        details
    }
}

/// Convenience constructors for common error types
impl CryptoError {
    pub fn invalid_parameter(parameter: &str, expected: &str, actual: &str, error_code: u32) -> Self {
        CryptoError::InvalidParams {
            parameter: parameter.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            error_code,
        }
    }

    pub fn derivation_failed(algorithm: &str, cause: &str) -> Self {
        CryptoError::DerivationFailed {
            algorithm: algorithm.to_string(),
            cause: cause.to_string(),
            error_code: error_codes::KEY_DERIVATION_FAILED,
        }
    }

    pub fn engine(operation: &str, source: EngineError) -> Self {
        CryptoError::Engine {
            operation: operation.to_string(),
            source,
        }
    }

    pub fn storage_unavailable(operation: &str, cause: &str) -> Self {
        CryptoError::StorageUnavailable {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    pub fn not_found(id: &str) -> Self {
        CryptoError::NotFound { id: id.to_string() }
    }
}

// From implementations for automatic error conversion
impl From<std::io::Error> for CryptoError {
    fn from(err: std::io::Error) -> Self {
        CryptoError::storage_unavailable("io", &err.to_string())
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::SerializationError(err.to_string())
    }
}

/// Result type alias for key lifecycle operations
pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_generation() {
        let error = CryptoError::invalid_parameter(
            "iteration_count",
            "at least 10000",
            "1",
            error_codes::INVALID_ITERATION_COUNT,
        );
        assert_eq!(error.error_code(), error_codes::INVALID_ITERATION_COUNT);
        assert_eq!(error.error_type(), "InvalidParams");
    }

    #[test]
    fn test_engine_error_codes_follow_kind() {
        let error = CryptoError::engine("decrypt", EngineError::corrupted("bad tag"));
        assert_eq!(error.error_code(), error_codes::ENGINE_CORRUPTED);

        let error = CryptoError::engine("encrypt", EngineError::invalid_key("short"));
        assert_eq!(error.error_code(), error_codes::ENGINE_INVALID_KEY);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_retry_policy() {
        let limited = CryptoError::RateLimited {
            identity: "alice".to_string(),
            retry_after: Duration::from_millis(250),
        };
        assert!(limited.is_retryable());
        assert_eq!(limited.retry_after(), Some(Duration::from_millis(250)));

        let in_use = CryptoError::VersionInUse {
            lineage: "default".to_string(),
            version: 1,
            references: 3,
        };
        assert!(!in_use.is_retryable());
        assert_eq!(in_use.retry_after(), None);

        assert!(CryptoError::storage_unavailable("write", "disk gone").is_retryable());
        assert!(!CryptoError::RotationInProgress { lineage: "a".into() }.is_retryable());
    }

    #[test]
    fn test_user_friendly_message() {
        let error = CryptoError::RateLimited {
            identity: "bob".to_string(),
            retry_after: Duration::from_millis(1500),
        };
        assert!(error.user_friendly_message().contains("1500 ms"));
    }

    #[test]
    fn test_technical_details() {
        let error = CryptoError::invalid_parameter(
            "salt",
            "at least 16 bytes",
            "8 bytes",
            error_codes::INVALID_SALT_LENGTH,
        );
        let details = error.technical_details();
        assert!(details.contains_key("error_code"));
        assert_eq!(details.get("parameter").map(String::as_str), Some("salt"));
    }

    #[test]
    fn test_io_error_maps_to_storage_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: CryptoError = io.into();
        assert!(matches!(error, CryptoError::StorageUnavailable { .. }));
    }
}
