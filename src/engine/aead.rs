use aes_gcm::aead::generic_array::typenum::Unsigned;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, Nonce};
use aes_gcm::Aes256Gcm;
use chacha20poly1305::{ChaCha20Poly1305, XChaCha20Poly1305};
use ring::hmac;
use sha2::{Digest, Sha256, Sha512};
use sha3::Sha3_256;

use super::{CipherAlgorithm, CryptoEngine, EngineError, HashAlgorithm, SignatureAlgorithm};
use crate::utils;

/// Default [`CryptoEngine`] backed by RustCrypto AEADs and ring HMAC.
///
/// Ciphertext layout is `nonce || ciphertext || tag`, with a fresh random
/// nonce for every encryption.
///
/// # Examples
///
/// ```
/// use keyward::engine::{AeadEngine, CipherAlgorithm, CryptoEngine};
///
/// let engine = AeadEngine::new();
/// let key = [0x42; 32];
/// let sealed = engine.encrypt(b"secret", &key, CipherAlgorithm::Aes256Gcm).unwrap();
/// let opened = engine.decrypt(&sealed, &key, CipherAlgorithm::Aes256Gcm).unwrap();
/// assert_eq!(opened, b"secret");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct AeadEngine;

impl AeadEngine {
    pub fn new() -> Self {
        Self
    }
}

fn seal<C>(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, EngineError>
where
    C: Aead + KeyInit,
{
    let cipher = C::new_from_slice(key)
        .map_err(|_| EngineError::invalid_key(format!("unexpected key length {}", key.len())))?;
    let nonce_len = <C as AeadCore>::NonceSize::USIZE;
    let nonce = utils::random_bytes(nonce_len).map_err(|e| EngineError::unavailable(e.to_string()))?;

    let sealed = cipher
        .encrypt(Nonce::<C>::from_slice(&nonce), plaintext)
        .map_err(|_| EngineError::corrupted("encryption failed"))?;

    let mut output = Vec::with_capacity(nonce_len + sealed.len());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&sealed);
    Ok(output)
}

fn open<C>(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, EngineError>
where
    C: Aead + KeyInit,
{
    let cipher = C::new_from_slice(key)
        .map_err(|_| EngineError::invalid_key(format!("unexpected key length {}", key.len())))?;
    let nonce_len = <C as AeadCore>::NonceSize::USIZE;
    if ciphertext.len() < nonce_len {
        return Err(EngineError::corrupted("ciphertext shorter than nonce"));
    }
    let (nonce, body) = ciphertext.split_at(nonce_len);

    cipher
        .decrypt(Nonce::<C>::from_slice(nonce), body)
        .map_err(|_| EngineError::corrupted("authentication failed"))
}

fn hmac_algorithm(algorithm: SignatureAlgorithm) -> hmac::Algorithm {
    match algorithm {
        SignatureAlgorithm::HmacSha256 => hmac::HMAC_SHA256,
        SignatureAlgorithm::HmacSha512 => hmac::HMAC_SHA512,
    }
}

impl CryptoEngine for AeadEngine {
    fn encrypt(
        &self,
        plaintext: &[u8],
        key: &[u8],
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, EngineError> {
        match algorithm {
            CipherAlgorithm::Aes256Gcm => seal::<Aes256Gcm>(key, plaintext),
            CipherAlgorithm::ChaCha20Poly1305 => seal::<ChaCha20Poly1305>(key, plaintext),
            CipherAlgorithm::XChaCha20Poly1305 => seal::<XChaCha20Poly1305>(key, plaintext),
        }
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        algorithm: CipherAlgorithm,
    ) -> Result<Vec<u8>, EngineError> {
        match algorithm {
            CipherAlgorithm::Aes256Gcm => open::<Aes256Gcm>(key, ciphertext),
            CipherAlgorithm::ChaCha20Poly1305 => open::<ChaCha20Poly1305>(key, ciphertext),
            CipherAlgorithm::XChaCha20Poly1305 => open::<XChaCha20Poly1305>(key, ciphertext),
        }
    }

    fn hash(&self, data: &[u8], algorithm: HashAlgorithm) -> Result<Vec<u8>, EngineError> {
        Ok(match algorithm {
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
            HashAlgorithm::Sha3_256 => Sha3_256::digest(data).to_vec(),
            HashAlgorithm::Blake3 => blake3::hash(data).as_bytes().to_vec(),
        })
    }

    fn sign(
        &self,
        data: &[u8],
        key: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> Result<Vec<u8>, EngineError> {
        if key.is_empty() {
            return Err(EngineError::invalid_key("empty signing key"));
        }
        let key = hmac::Key::new(hmac_algorithm(algorithm), key);
        Ok(hmac::sign(&key, data).as_ref().to_vec())
    }

    fn verify(
        &self,
        data: &[u8],
        signature: &[u8],
        key: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> Result<bool, EngineError> {
        if key.is_empty() {
            return Err(EngineError::invalid_key("empty signing key"));
        }
        let key = hmac::Key::new(hmac_algorithm(algorithm), key);
        Ok(hmac::verify(&key, data, signature).is_ok())
    }
}
