use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{error_codes, CryptoError, CryptoResult};

/// Minimum salt length accepted anywhere in the crate
pub const MIN_SALT_LEN: usize = 16;
/// Shortest derived key that may be requested
pub const MIN_OUTPUT_LEN: usize = 16;
/// Longest derived key that may be requested
pub const MAX_OUTPUT_LEN: usize = 64;
/// Hard floor for PBKDF2 iterations; policies may only raise it
pub const ABSOLUTE_MIN_PBKDF2_ITERATIONS: u32 = 1_000;
/// Hard floor for Argon2 memory cost in KiB
pub const ABSOLUTE_MIN_ARGON2_MEMORY_KIB: u32 = 1_024;

/// Key derivation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerivationAlgorithm {
    /// PBKDF2 with HMAC-SHA256
    Pbkdf2HmacSha256,
    /// PBKDF2 with HMAC-SHA512
    Pbkdf2HmacSha512,
    /// Argon2id (RFC 9106), memory-hard
    Argon2id,
}

impl DerivationAlgorithm {
    pub(crate) fn code(&self) -> u8 {
        match self {
            DerivationAlgorithm::Pbkdf2HmacSha256 => 1,
            DerivationAlgorithm::Pbkdf2HmacSha512 => 2,
            DerivationAlgorithm::Argon2id => 3,
        }
    }
}

impl fmt::Display for DerivationAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DerivationAlgorithm::Pbkdf2HmacSha256 => write!(f, "PBKDF2-HMAC-SHA256"),
            DerivationAlgorithm::Pbkdf2HmacSha512 => write!(f, "PBKDF2-HMAC-SHA512"),
            DerivationAlgorithm::Argon2id => write!(f, "Argon2id"),
        }
    }
}

/// Parameters for key derivation
///
/// Immutable once built: every constructor validates against the hard
/// floors above, and a [`super::KeyDeriver`] re-checks its own (possibly
/// stricter) policy before each use. For Argon2id the iteration count is
/// the time cost; `memory_cost_kib` and `parallelism` are ignored by PBKDF2.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivationParams {
    algorithm: DerivationAlgorithm,
    iteration_count: u32,
    salt_len: usize,
    output_len: usize,
    #[serde(default)]
    memory_cost_kib: u32,
    #[serde(default = "default_parallelism")]
    parallelism: u32,
}

fn default_parallelism() -> u32 {
    1
}

impl Default for DerivationParams {
    fn default() -> Self {
        // OWASP 2023 guidance for PBKDF2-HMAC-SHA256
        Self {
            algorithm: DerivationAlgorithm::Pbkdf2HmacSha256,
            iteration_count: 600_000,
            salt_len: MIN_SALT_LEN,
            output_len: 32,
            memory_cost_kib: 0,
            parallelism: 1,
        }
    }
}

impl DerivationParams {
    /// PBKDF2 parameters
    pub fn pbkdf2(
        algorithm: DerivationAlgorithm,
        iteration_count: u32,
        salt_len: usize,
        output_len: usize,
    ) -> CryptoResult<Self> {
        if algorithm == DerivationAlgorithm::Argon2id {
            return Err(CryptoError::invalid_parameter(
                "algorithm",
                "a PBKDF2 variant",
                "Argon2id",
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        let params = Self {
            algorithm,
            iteration_count,
            salt_len,
            output_len,
            memory_cost_kib: 0,
            parallelism: 1,
        };
        params.check_floors()?;
        Ok(params)
    }

    /// Argon2id parameters
    pub fn argon2id(
        time_cost: u32,
        memory_cost_kib: u32,
        parallelism: u32,
        salt_len: usize,
        output_len: usize,
    ) -> CryptoResult<Self> {
        let params = Self {
            algorithm: DerivationAlgorithm::Argon2id,
            iteration_count: time_cost,
            salt_len,
            output_len,
            memory_cost_kib,
            parallelism,
        };
        params.check_floors()?;
        Ok(params)
    }

    /// Low-resource mode for constrained environments
    pub fn low_resource() -> Self {
        Self {
            algorithm: DerivationAlgorithm::Argon2id,
            iteration_count: 2,
            salt_len: MIN_SALT_LEN,
            output_len: 32,
            memory_cost_kib: 19_456, // 19 MiB
            parallelism: 1,
        }
    }

    /// High-security mode for sensitive keys
    pub fn high_security() -> Self {
        Self {
            algorithm: DerivationAlgorithm::Argon2id,
            iteration_count: 4,
            salt_len: 32,
            output_len: 32,
            memory_cost_kib: 262_144, // 256 MiB
            parallelism: 8,
        }
    }

    pub fn algorithm(&self) -> DerivationAlgorithm {
        self.algorithm
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn salt_len(&self) -> usize {
        self.salt_len
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    pub fn memory_cost_kib(&self) -> u32 {
        self.memory_cost_kib
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    /// Canonical byte encoding, used when fingerprinting derivations
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(21);
        out.push(self.algorithm.code());
        out.extend_from_slice(&self.iteration_count.to_be_bytes());
        out.extend_from_slice(&(self.output_len as u32).to_be_bytes());
        out.extend_from_slice(&(self.salt_len as u32).to_be_bytes());
        out.extend_from_slice(&self.memory_cost_kib.to_be_bytes());
        out.extend_from_slice(&self.parallelism.to_be_bytes());
        out
    }

    pub(crate) fn check_floors(&self) -> CryptoResult<()> {
        if self.salt_len < MIN_SALT_LEN {
            return Err(CryptoError::invalid_parameter(
                "salt_len",
                &format!("at least {} bytes", MIN_SALT_LEN),
                &format!("{} bytes", self.salt_len),
                error_codes::INVALID_SALT_LENGTH,
            ));
        }
        if !(MIN_OUTPUT_LEN..=MAX_OUTPUT_LEN).contains(&self.output_len) {
            return Err(CryptoError::invalid_parameter(
                "output_len",
                &format!("{}..={} bytes", MIN_OUTPUT_LEN, MAX_OUTPUT_LEN),
                &format!("{} bytes", self.output_len),
                error_codes::INVALID_OUTPUT_LENGTH,
            ));
        }
        match self.algorithm {
            DerivationAlgorithm::Pbkdf2HmacSha256 | DerivationAlgorithm::Pbkdf2HmacSha512 => {
                if self.iteration_count < ABSOLUTE_MIN_PBKDF2_ITERATIONS {
                    return Err(CryptoError::invalid_parameter(
                        "iteration_count",
                        &format!("at least {}", ABSOLUTE_MIN_PBKDF2_ITERATIONS),
                        &self.iteration_count.to_string(),
                        error_codes::INVALID_ITERATION_COUNT,
                    ));
                }
            }
            DerivationAlgorithm::Argon2id => {
                if self.iteration_count == 0 {
                    return Err(CryptoError::invalid_parameter(
                        "iteration_count",
                        "a time cost of at least 1",
                        "0",
                        error_codes::INVALID_ITERATION_COUNT,
                    ));
                }
                if self.parallelism == 0 {
                    return Err(CryptoError::invalid_parameter(
                        "parallelism",
                        "at least 1 lane",
                        "0",
                        error_codes::INVALID_CONFIGURATION,
                    ));
                }
                if self.memory_cost_kib < ABSOLUTE_MIN_ARGON2_MEMORY_KIB.max(8 * self.parallelism) {
                    return Err(CryptoError::invalid_parameter(
                        "memory_cost_kib",
                        &format!("at least {} KiB", ABSOLUTE_MIN_ARGON2_MEMORY_KIB),
                        &format!("{} KiB", self.memory_cost_kib),
                        error_codes::INVALID_CONFIGURATION,
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Bounds a deriver enforces on every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivationPolicy {
    pub min_pbkdf2_iterations: u32,
    pub max_pbkdf2_iterations: u32,
    pub min_argon2_time_cost: u32,
    pub max_argon2_time_cost: u32,
    pub min_argon2_memory_kib: u32,
    pub max_argon2_memory_kib: u32,
    pub max_parallelism: u32,
}

impl Default for DerivationPolicy {
    fn default() -> Self {
        Self {
            min_pbkdf2_iterations: 10_000,
            max_pbkdf2_iterations: 10_000_000,
            min_argon2_time_cost: 1,
            max_argon2_time_cost: 64,
            min_argon2_memory_kib: 8_192,
            max_argon2_memory_kib: 4_194_304, // 4 GiB
            max_parallelism: 16,
        }
    }
}

impl DerivationPolicy {
    /// Validate the policy itself; its floors can never drop below the hard floors
    pub fn validate(&self) -> CryptoResult<()> {
        if self.min_pbkdf2_iterations < ABSOLUTE_MIN_PBKDF2_ITERATIONS
            || self.min_pbkdf2_iterations > self.max_pbkdf2_iterations
        {
            return Err(CryptoError::invalid_parameter(
                "policy.min_pbkdf2_iterations",
                &format!(
                    "between {} and max_pbkdf2_iterations",
                    ABSOLUTE_MIN_PBKDF2_ITERATIONS
                ),
                &self.min_pbkdf2_iterations.to_string(),
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        if self.min_argon2_time_cost == 0 || self.min_argon2_time_cost > self.max_argon2_time_cost {
            return Err(CryptoError::invalid_parameter(
                "policy.min_argon2_time_cost",
                "between 1 and max_argon2_time_cost",
                &self.min_argon2_time_cost.to_string(),
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        if self.min_argon2_memory_kib < ABSOLUTE_MIN_ARGON2_MEMORY_KIB
            || self.min_argon2_memory_kib > self.max_argon2_memory_kib
        {
            return Err(CryptoError::invalid_parameter(
                "policy.min_argon2_memory_kib",
                &format!(
                    "between {} and max_argon2_memory_kib",
                    ABSOLUTE_MIN_ARGON2_MEMORY_KIB
                ),
                &self.min_argon2_memory_kib.to_string(),
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        if self.max_parallelism == 0 {
            return Err(CryptoError::invalid_parameter(
                "policy.max_parallelism",
                "at least 1",
                "0",
                error_codes::INVALID_CONFIGURATION,
            ));
        }
        Ok(())
    }

    /// Check a parameter set against this policy
    pub fn check(&self, params: &DerivationParams) -> CryptoResult<()> {
        params.check_floors()?;

        let (min, max, parameter) = match params.algorithm() {
            DerivationAlgorithm::Pbkdf2HmacSha256 | DerivationAlgorithm::Pbkdf2HmacSha512 => (
                self.min_pbkdf2_iterations,
                self.max_pbkdf2_iterations,
                "iteration_count",
            ),
            DerivationAlgorithm::Argon2id => (
                self.min_argon2_time_cost,
                self.max_argon2_time_cost,
                "iteration_count (time cost)",
            ),
        };
        if !(min..=max).contains(&params.iteration_count()) {
            return Err(CryptoError::invalid_parameter(
                parameter,
                &format!("{}..={}", min, max),
                &params.iteration_count().to_string(),
                error_codes::INVALID_ITERATION_COUNT,
            ));
        }

        if params.algorithm() == DerivationAlgorithm::Argon2id {
            if !(self.min_argon2_memory_kib..=self.max_argon2_memory_kib)
                .contains(&params.memory_cost_kib())
            {
                return Err(CryptoError::invalid_parameter(
                    "memory_cost_kib",
                    &format!(
                        "{}..={} KiB",
                        self.min_argon2_memory_kib, self.max_argon2_memory_kib
                    ),
                    &format!("{} KiB", params.memory_cost_kib()),
                    error_codes::INVALID_CONFIGURATION,
                ));
            }
            if params.parallelism() > self.max_parallelism {
                return Err(CryptoError::invalid_parameter(
                    "parallelism",
                    &format!("at most {}", self.max_parallelism),
                    &params.parallelism().to_string(),
                    error_codes::INVALID_CONFIGURATION,
                ));
            }
        }
        Ok(())
    }
}
