/*!
 * Configuration
 *
 * Every component is built from an explicit configuration struct with a
 * documented default. [`KeywardConfig`] aggregates them and can be loaded
 * from JSON; durations are written in milliseconds. The storage master
 * secret is deliberately not part of this structure and must be supplied
 * when the service is constructed.
 */

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::key_derivation::DerivationConfig;
use crate::rate_limit::RateLimitConfig;
use crate::rotation::RotationPolicy;
use crate::storage::StorageSettings;

/// Top-level configuration for a [`crate::service::KeyService`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeywardConfig {
    /// Default derivation parameters and policy bounds
    pub derivation: DerivationConfig,
    /// Derived-key cache sizing
    pub cache: CacheConfig,
    /// Throttling for derivation and signing callers
    pub rate_limit: RateLimitConfig,
    /// Key rotation policy applied to new lineages
    pub rotation: RotationPolicy,
    /// Where sealed key records live
    pub storage: StorageSettings,
}

impl KeywardConfig {
    /// Parse a configuration from a JSON document; missing sections take their defaults
    pub fn from_json_str(json: &str) -> CryptoResult<Self> {
        let config: KeywardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> CryptoResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            CryptoError::storage_unavailable("read config", &format!("{}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    /// Serialize the configuration to pretty-printed JSON
    pub fn to_json_string(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every section against its policy bounds
    pub fn validate(&self) -> CryptoResult<()> {
        self.derivation.validate()?;
        self.cache.validate()?;
        self.rate_limit.validate()?;
        self.rotation.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

/// `Duration` as integer milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// `Option<Duration>` as integer milliseconds or `null`
pub(crate) mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
