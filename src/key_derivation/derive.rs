use std::num::NonZeroU32;
use std::sync::Arc;

use argon2::{Algorithm, Argon2, ParamsBuilder, Version};
use ring::pbkdf2;
use serde::{Deserialize, Serialize};

use super::params::{DerivationAlgorithm, DerivationParams, DerivationPolicy, MIN_SALT_LEN};
use crate::cache::DerivedKeyCache;
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;
use crate::utils;

/// Key derivation settings: the parameters used when a caller passes none,
/// and the bounds every request is checked against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationConfig {
    pub default_params: DerivationParams,
    pub policy: DerivationPolicy,
}

impl DerivationConfig {
    pub fn validate(&self) -> CryptoResult<()> {
        self.policy.validate()?;
        self.policy.check(&self.default_params)
    }
}

/// Output of a derivation.
///
/// The key material zeroizes itself on drop; the salt and parameters are
/// not secret and are what a caller persists to verify or re-derive later.
#[derive(Debug, Clone)]
pub struct DerivedKeyResult {
    key_material: SecureBytes,
    salt: Vec<u8>,
    params: DerivationParams,
}

impl DerivedKeyResult {
    pub fn key_material(&self) -> &SecureBytes {
        &self.key_material
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn params(&self) -> &DerivationParams {
        &self.params
    }

    /// Split into parts, handing ownership of the key material to the caller
    pub fn into_parts(self) -> (SecureBytes, Vec<u8>, DerivationParams) {
        (self.key_material, self.salt, self.params)
    }
}

/// Generates a cryptographically secure random salt
///
/// # Arguments
///
/// * `length` - Length of the salt in bytes, at least 16
pub fn generate_salt(length: usize) -> CryptoResult<Vec<u8>> {
    if length < MIN_SALT_LEN {
        return Err(CryptoError::invalid_parameter(
            "salt length",
            &format!("at least {} bytes", MIN_SALT_LEN),
            &format!("{} bytes", length),
            error_codes::INVALID_SALT_LENGTH,
        ));
    }
    utils::random_bytes(length)
}

/// Derives symmetric keys from secrets, optionally memoizing results
///
/// # Example
///
/// ```
/// use keyward::key_derivation::{DerivationAlgorithm, DerivationConfig, DerivationParams, KeyDeriver};
///
/// let deriver = KeyDeriver::new(DerivationConfig::default()).unwrap();
/// let params = DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 10_000, 16, 32).unwrap();
///
/// let derived = deriver.derive(b"correct horse", Some(&params)).unwrap();
/// assert!(deriver
///     .verify_key(b"correct horse", derived.salt(), &params, derived.key_material().as_bytes())
///     .unwrap());
/// ```
#[derive(Debug)]
pub struct KeyDeriver {
    config: DerivationConfig,
    cache: Option<Arc<DerivedKeyCache>>,
}

impl KeyDeriver {
    pub fn new(config: DerivationConfig) -> CryptoResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: None,
        })
    }

    /// Memoize deterministic derivations in `cache`
    pub fn with_cache(mut self, cache: Arc<DerivedKeyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &DerivationConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<DerivedKeyCache>> {
        self.cache.as_ref()
    }

    /// Generate a salt of the length the given (or default) parameters call for
    pub fn generate_salt(&self, params: Option<&DerivationParams>) -> CryptoResult<Vec<u8>> {
        let params = params.unwrap_or(&self.config.default_params);
        generate_salt(params.salt_len())
    }

    /// Derive a key under a freshly generated salt
    pub fn derive(
        &self,
        secret: &[u8],
        params: Option<&DerivationParams>,
    ) -> CryptoResult<DerivedKeyResult> {
        let params = params.unwrap_or(&self.config.default_params);
        self.config.policy.check(params)?;
        let salt = generate_salt(params.salt_len())?;
        self.derive_with_salt(secret, &salt, Some(params))
    }

    /// Derive a key under a caller-supplied salt.
    ///
    /// Deterministic, so results are served from and stored in the cache
    /// when one is attached.
    pub fn derive_with_salt(
        &self,
        secret: &[u8],
        salt: &[u8],
        params: Option<&DerivationParams>,
    ) -> CryptoResult<DerivedKeyResult> {
        let params = params.unwrap_or(&self.config.default_params);
        self.check_request(secret, salt, params)?;

        let key_material = match &self.cache {
            Some(cache) => {
                let fingerprint = cache.fingerprint(secret, salt, params);
                match cache.get(&fingerprint) {
                    Some(hit) => hit,
                    None => {
                        let derived = run_kdf(secret, salt, params)?;
                        cache.insert(fingerprint, derived.clone());
                        derived
                    }
                }
            }
            None => run_kdf(secret, salt, params)?,
        };

        Ok(DerivedKeyResult {
            key_material,
            salt: salt.to_vec(),
            params: params.clone(),
        })
    }

    /// Check a secret against a previously derived key.
    ///
    /// The comparison runs in constant time with respect to the position of
    /// any mismatch. The cache is bypassed so that guesses cannot displace
    /// legitimate entries.
    pub fn verify_key(
        &self,
        secret: &[u8],
        salt: &[u8],
        params: &DerivationParams,
        expected_key: &[u8],
    ) -> CryptoResult<bool> {
        self.check_request(secret, salt, params)?;
        let candidate = run_kdf(secret, salt, params)?;
        Ok(utils::constant_time_eq(candidate.as_bytes(), expected_key))
    }

    /// Re-derive under a new secret after proving knowledge of the old one
    ///
    /// Fails with `InvalidParams` if `old_secret` does not reproduce `stored`.
    pub fn change_secret(
        &self,
        old_secret: &[u8],
        new_secret: &[u8],
        stored: &DerivedKeyResult,
    ) -> CryptoResult<DerivedKeyResult> {
        let matches = self.verify_key(
            old_secret,
            stored.salt(),
            stored.params(),
            stored.key_material().as_bytes(),
        )?;
        if !matches {
            return Err(CryptoError::invalid_parameter(
                "old_secret",
                "the secret the stored key was derived from",
                "a non-matching secret",
                error_codes::INVALID_SECRET,
            ));
        }
        self.derive(new_secret, Some(stored.params()))
    }

    fn check_request(&self, secret: &[u8], salt: &[u8], params: &DerivationParams) -> CryptoResult<()> {
        self.config.policy.check(params)?;
        if secret.is_empty() {
            return Err(CryptoError::invalid_parameter(
                "secret",
                "a non-empty secret",
                "0 bytes",
                error_codes::INVALID_SECRET,
            ));
        }
        if salt.len() < MIN_SALT_LEN {
            return Err(CryptoError::invalid_parameter(
                "salt",
                &format!("at least {} bytes", MIN_SALT_LEN),
                &format!("{} bytes", salt.len()),
                error_codes::INVALID_SALT_LENGTH,
            ));
        }
        Ok(())
    }
}

/// Run the configured KDF. Parameters must already be validated.
fn run_kdf(secret: &[u8], salt: &[u8], params: &DerivationParams) -> CryptoResult<SecureBytes> {
    let mut output = SecureBytes::zeroed(params.output_len());

    match params.algorithm() {
        DerivationAlgorithm::Pbkdf2HmacSha256 | DerivationAlgorithm::Pbkdf2HmacSha512 => {
            let iterations = NonZeroU32::new(params.iteration_count()).ok_or_else(|| {
                CryptoError::derivation_failed(&params.algorithm().to_string(), "zero iterations")
            })?;
            let algorithm = if params.algorithm() == DerivationAlgorithm::Pbkdf2HmacSha256 {
                pbkdf2::PBKDF2_HMAC_SHA256
            } else {
                pbkdf2::PBKDF2_HMAC_SHA512
            };
            pbkdf2::derive(algorithm, iterations, salt, secret, output.as_bytes_mut());
        }
        DerivationAlgorithm::Argon2id => {
            let mut builder = ParamsBuilder::new();
            builder
                .m_cost(params.memory_cost_kib())
                .t_cost(params.iteration_count())
                .p_cost(params.parallelism())
                .output_len(params.output_len());

            let argon2_params = builder.build().map_err(|e| {
                CryptoError::derivation_failed("Argon2id", &format!("invalid parameters: {}", e))
            })?;
            let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

            argon2
                .hash_password_into(secret, salt, output.as_bytes_mut())
                .map_err(|e| CryptoError::derivation_failed("Argon2id", &e.to_string()))?;
        }
    }

    log::debug!(
        "derived {}-byte key with {} ({} iterations)",
        params.output_len(),
        params.algorithm(),
        params.iteration_count()
    );
    Ok(output)
}
