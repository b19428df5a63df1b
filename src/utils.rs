use subtle::ConstantTimeEq;

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;

/// Generate random bytes of the specified length from the operating system CSPRNG
///
/// Fails with `InsufficientEntropy` only when the OS source itself reports
/// an error.
pub fn random_bytes(length: usize) -> CryptoResult<Vec<u8>> {
    let mut bytes = vec![0u8; length];
    getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::InsufficientEntropy {
        cause: e.to_string(),
        error_code: error_codes::INSUFFICIENT_ENTROPY,
    })?;
    Ok(bytes)
}

/// Generate random key material wrapped in a zeroizing container
pub fn random_secret(length: usize) -> CryptoResult<SecureBytes> {
    let mut secret = SecureBytes::zeroed(length);
    getrandom::getrandom(secret.as_bytes_mut()).map_err(|e| CryptoError::InsufficientEntropy {
        cause: e.to_string(),
        error_code: error_codes::INSUFFICIENT_ENTROPY,
    })?;
    Ok(secret)
}

/// Constant-time comparison of two byte slices to avoid timing attacks
///
/// The running time depends only on the slice lengths, never on the
/// position of the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Convert bytes to a lowercase hexadecimal string
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Convert a hexadecimal string to bytes
pub fn from_hex(input: &str) -> CryptoResult<Vec<u8>> {
    hex::decode(input).map_err(|e| CryptoError::SerializationError(format!("invalid hex: {}", e)))
}

/// `Vec<u8>` as a base64 string in serialized formats
pub(crate) mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::decode(encoded).map_err(serde::de::Error::custom)
    }
}
