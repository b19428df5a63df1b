//! Secure Memory Handling
//!
//! Key material moves through this crate inside [`SecureBytes`], a container
//! that zeroes its contents when dropped, never prints them, and compares
//! in constant time. Derived keys, storage master secrets and cached key
//! material all use it, so the only copies that outlive an operation are the
//! ones callers deliberately keep.

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A specialized container for sensitive byte data such as keys,
/// passwords and derived secrets.
///
/// # Security Properties
///
/// 1. Automatically zeroes memory when dropped
/// 2. Prevents contents from being inadvertently logged or displayed
/// 3. Equality is evaluated in constant time
///
/// # Example
///
/// ```
/// use keyward::secure_memory::SecureBytes;
///
/// let key = SecureBytes::new(&[0x01, 0x02, 0x03, 0x04]);
/// assert_eq!(key.len(), 4);
/// assert_eq!(format!("{:?}", key), "SecureBytes([REDACTED; 4])");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    bytes: Vec<u8>,
}

impl SecureBytes {
    /// Create a new SecureBytes holding a copy of `data`
    pub fn new(data: &[u8]) -> Self {
        Self {
            bytes: data.to_vec(),
        }
    }

    /// Create a zero-filled buffer of `len` bytes, ready to be written into
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    /// Get a reference to the underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Get a mutable reference to the underlying bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Clear the buffer, securely zeroing all data
    pub fn clear(&mut self) {
        self.bytes.zeroize();
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecureBytes([REDACTED; {}])", self.bytes.len())
    }
}

impl PartialEq for SecureBytes {
    fn eq(&self, other: &Self) -> bool {
        // Lengths are public; only the contents need constant-time treatment.
        self.bytes.len() == other.bytes.len() && bool::from(self.bytes.ct_eq(&other.bytes))
    }
}

impl Eq for SecureBytes {}

impl From<Vec<u8>> for SecureBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<&[u8]> for SecureBytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl From<&str> for SecureBytes {
    fn from(data: &str) -> Self {
        Self::new(data.as_bytes())
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecureBytes::from("hunter2");
        let rendered = format!("{:?}", secret);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_equality() {
        let a = SecureBytes::new(&[1, 2, 3]);
        let b = SecureBytes::new(&[1, 2, 3]);
        let c = SecureBytes::new(&[1, 2, 4]);
        let d = SecureBytes::new(&[1, 2]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_clear_zeroes_and_empties() {
        let mut key = SecureBytes::new(&[0xAA; 32]);
        key.clear();
        assert!(key.is_empty());
    }

    #[test]
    fn test_zeroed_buffer() {
        let mut buf = SecureBytes::zeroed(16);
        assert_eq!(buf.as_bytes(), &[0u8; 16]);
        buf.as_bytes_mut()[0] = 7;
        assert_eq!(buf.as_bytes()[0], 7);
    }
}
