use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::key_info::{Envelope, KeyInfo};
use super::lineage::{check_lineage_name, KeyLineage};
use super::RotationPolicy;
use crate::clock::{Clock, SystemClock};
use crate::engine::CryptoEngine;
use crate::error::CryptoResult;
use crate::storage::SecureStorage;

/// Named key lineages sharing one engine, store and policy
pub struct KeyRing {
    policy: RotationPolicy,
    engine: Arc<dyn CryptoEngine>,
    storage: Arc<SecureStorage>,
    clock: Arc<dyn Clock>,
    lineages: RwLock<HashMap<String, Arc<KeyLineage>>>,
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("policy", &self.policy)
            .field("lineages", &self.names())
            .finish()
    }
}

impl KeyRing {
    pub fn new(
        policy: RotationPolicy,
        engine: Arc<dyn CryptoEngine>,
        storage: Arc<SecureStorage>,
    ) -> CryptoResult<Self> {
        Self::with_clock(policy, engine, storage, Arc::new(SystemClock))
    }

    pub fn with_clock(
        policy: RotationPolicy,
        engine: Arc<dyn CryptoEngine>,
        storage: Arc<SecureStorage>,
        clock: Arc<dyn Clock>,
    ) -> CryptoResult<Self> {
        policy.validate()?;
        Ok(Self {
            policy,
            engine,
            storage,
            clock,
            lineages: RwLock::new(HashMap::new()),
        })
    }

    /// The lineage called `name`, opened from storage on first use
    pub fn lineage(&self, name: &str) -> CryptoResult<Arc<KeyLineage>> {
        if let Some(lineage) = self.get(name) {
            return Ok(lineage);
        }
        check_lineage_name(name)?;

        let mut lineages = self.lineages.write();
        if let Some(lineage) = lineages.get(name) {
            return Ok(lineage.clone());
        }
        let lineage = Arc::new(KeyLineage::open_with_clock(
            name,
            self.policy.clone(),
            self.engine.clone(),
            self.storage.clone(),
            self.clock.clone(),
        )?);
        lineages.insert(name.to_string(), lineage.clone());
        Ok(lineage)
    }

    /// An already opened lineage
    pub fn get(&self, name: &str) -> Option<Arc<KeyLineage>> {
        self.lineages.read().get(name).cloned()
    }

    /// Names of opened lineages, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lineages.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Open every lineage that has records in storage
    pub fn discover(&self) -> CryptoResult<Vec<String>> {
        let names: BTreeSet<String> = self
            .storage
            .list_ids("")?
            .into_iter()
            .filter_map(|id| {
                let (name, version) = id.rsplit_once("/v")?;
                version.parse::<u64>().ok()?;
                check_lineage_name(name).ok()?;
                Some(name.to_string())
            })
            .collect();

        for name in &names {
            self.lineage(name)?;
        }
        Ok(names.into_iter().collect())
    }

    /// Encrypt under the active key of lineage `name`
    pub fn encrypt(&self, name: &str, plaintext: &[u8]) -> CryptoResult<Envelope> {
        self.lineage(name)?.encrypt(plaintext)
    }

    /// Decrypt an envelope from whichever lineage produced it
    pub fn decrypt(&self, envelope: &Envelope) -> CryptoResult<Vec<u8>> {
        self.lineage(&envelope.metadata.lineage)?.decrypt(envelope)
    }

    /// Rotate every opened lineage that has no active key or an overdue one
    pub fn rotate_due(&self) -> CryptoResult<Vec<(String, KeyInfo)>> {
        let mut rotated = Vec::new();
        for name in self.names() {
            if let Some(lineage) = self.get(&name) {
                if lineage.needs_rotation() {
                    rotated.push((name, lineage.rotate_generated()?));
                }
            }
        }
        Ok(rotated)
    }

    /// Apply grace-period revocation across every opened lineage
    pub fn revoke_expired(&self) -> CryptoResult<Vec<(String, KeyInfo)>> {
        let mut revoked = Vec::new();
        for name in self.names() {
            if let Some(lineage) = self.get(&name) {
                for info in lineage.revoke_expired()? {
                    revoked.push((name.clone(), info));
                }
            }
        }
        Ok(revoked)
    }
}
