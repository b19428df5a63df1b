/*!
 * Key Derivation
 *
 * Derives symmetric keys from passwords and other secrets with PBKDF2 or
 * Argon2id, generates salts, and verifies candidate secrets in constant time.
 */

mod derive;
mod params;

pub use derive::generate_salt;
pub use derive::DerivationConfig;
pub use derive::DerivedKeyResult;
pub use derive::KeyDeriver;
pub use params::DerivationAlgorithm;
pub use params::DerivationParams;
pub use params::DerivationPolicy;
pub use params::{
    ABSOLUTE_MIN_ARGON2_MEMORY_KIB, ABSOLUTE_MIN_PBKDF2_ITERATIONS, MAX_OUTPUT_LEN, MIN_OUTPUT_LEN,
    MIN_SALT_LEN,
};

#[cfg(test)]
mod tests;
