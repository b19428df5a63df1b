use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use super::key_info::{
    truncate_to_millis, EncryptedDataMetadata, Envelope, KeyAgeSummary, KeyInfo, KeyStatus,
};
use super::{CancellationToken, RotationPolicy};
use crate::clock::{Clock, SystemClock};
use crate::engine::{CipherAlgorithm, CryptoEngine};
use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;
use crate::storage::{Metadata, SecureStorage};
use crate::utils;

const META_LINEAGE: &str = "lineage";
const META_KEY_INFO: &str = "key_info";
const META_RECORD: &str = "record";
const CORPUS_RECORD: &str = "corpus";
/// Longest lineage name accepted
pub const MAX_LINEAGE_NAME_LEN: usize = 64;

/// One ciphertext submitted for re-encryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReencryptItem {
    /// Caller's identifier, echoed back in results
    pub id: String,
    pub ciphertext: Vec<u8>,
    pub metadata: EncryptedDataMetadata,
}

impl ReencryptItem {
    pub fn new(id: impl Into<String>, ciphertext: Vec<u8>, metadata: EncryptedDataMetadata) -> Self {
        Self {
            id: id.into(),
            ciphertext,
            metadata,
        }
    }

    pub fn from_envelope(id: impl Into<String>, envelope: Envelope) -> Self {
        Self::new(id, envelope.ciphertext, envelope.metadata)
    }
}

/// A successfully re-encrypted item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReencryptedItem {
    pub id: String,
    pub envelope: Envelope,
}

/// An item that could not be re-encrypted, and why
#[derive(Debug, Clone)]
pub struct FailedItem {
    pub id: String,
    pub error: CryptoError,
}

/// Outcome of a re-encryption batch.
///
/// Every submitted item appears exactly once: in `reencrypted`, in
/// `failed_items`, or, when the batch was cancelled, in `cancelled`. All
/// three lists keep the submission order.
#[derive(Debug, Clone, Default)]
pub struct ReencryptionResult {
    pub processed_count: usize,
    pub reencrypted: Vec<ReencryptedItem>,
    pub failed_items: Vec<FailedItem>,
    /// Ids of items never attempted because the batch was cancelled
    pub cancelled: Vec<String>,
}

impl ReencryptionResult {
    pub fn was_cancelled(&self) -> bool {
        !self.cancelled.is_empty()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed_items.is_empty() && self.cancelled.is_empty()
    }
}

#[derive(Debug, Default)]
struct LineageState {
    keys: BTreeMap<u64, KeyInfo>,
    active: Option<u64>,
    materials: HashMap<u64, SecureBytes>,
    /// Tracked corpus: item id to the key version its ciphertext is under
    corpus: HashMap<String, u64>,
}

impl LineageState {
    fn references(&self, version: u64) -> usize {
        self.corpus.values().filter(|v| **v == version).count()
    }
}

/// Clears the rotation flag when a rotation ends, however it ends
struct RotationGuard<'a>(&'a AtomicBool);

impl Drop for RotationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A named sequence of key versions with exactly one active key.
///
/// Rotation deprecates the active key and activates a new version;
/// deprecated keys keep decrypting until they are purged, which is refused
/// while any tracked ciphertext still references them.
///
/// Only one rotation runs at a time: a concurrent `rotate` fails with
/// `RotationInProgress`. Re-encryption and envelope encryption share the
/// lineage with each other but never overlap a rotation or purge.
pub struct KeyLineage {
    name: String,
    policy: RotationPolicy,
    engine: Arc<dyn CryptoEngine>,
    storage: Arc<SecureStorage>,
    clock: Arc<dyn Clock>,
    state: RwLock<LineageState>,
    rotating: AtomicBool,
    lifecycle: RwLock<()>,
    /// Serializes writes of the persisted corpus record
    corpus_io: Mutex<()>,
}

impl fmt::Debug for KeyLineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("KeyLineage")
            .field("name", &self.name)
            .field("active", &state.active)
            .field("versions", &state.keys.len())
            .field("tracked", &state.corpus.len())
            .finish()
    }
}

impl KeyLineage {
    /// Open lineage `name`, restoring any versions already in `storage`
    pub fn open(
        name: &str,
        policy: RotationPolicy,
        engine: Arc<dyn CryptoEngine>,
        storage: Arc<SecureStorage>,
    ) -> CryptoResult<Self> {
        Self::open_with_clock(name, policy, engine, storage, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        name: &str,
        policy: RotationPolicy,
        engine: Arc<dyn CryptoEngine>,
        storage: Arc<SecureStorage>,
        clock: Arc<dyn Clock>,
    ) -> CryptoResult<Self> {
        check_lineage_name(name)?;
        policy.validate()?;

        let lineage = Self {
            name: name.to_string(),
            policy,
            engine,
            storage,
            clock,
            state: RwLock::new(LineageState::default()),
            rotating: AtomicBool::new(false),
            lifecycle: RwLock::new(()),
            corpus_io: Mutex::new(()),
        };
        lineage.restore()?;
        Ok(lineage)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Algorithm new data is encrypted under
    pub fn algorithm(&self) -> CipherAlgorithm {
        self.policy.algorithm
    }

    /// The sole active key
    pub fn current_key(&self) -> CryptoResult<KeyInfo> {
        let state = self.state.read();
        state
            .active
            .and_then(|version| state.keys.get(&version).cloned())
            .ok_or_else(|| CryptoError::NoActiveKey {
                lineage: self.name.clone(),
            })
    }

    /// Every known version, oldest first
    pub fn versions(&self) -> Vec<KeyInfo> {
        self.state.read().keys.values().cloned().collect()
    }

    pub fn key_info(&self, version: u64) -> CryptoResult<KeyInfo> {
        self.state
            .read()
            .keys
            .get(&version)
            .cloned()
            .ok_or_else(|| self.unknown_version(version))
    }

    /// Activate `material` as a new version, deprecating the current one
    pub fn rotate(&self, material: SecureBytes) -> CryptoResult<KeyInfo> {
        if self
            .rotating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CryptoError::RotationInProgress {
                lineage: self.name.clone(),
            });
        }
        let _rotation = RotationGuard(&self.rotating);

        let expected = self.policy.algorithm.key_len();
        if material.len() != expected {
            return Err(CryptoError::invalid_parameter(
                "key material",
                &format!("{} bytes for {}", expected, self.policy.algorithm),
                &format!("{} bytes", material.len()),
                error_codes::INVALID_KEY_LENGTH,
            ));
        }

        let _exclusive = self.lifecycle.write();
        let now = self.now();

        let (previous, version) = {
            let state = self.state.read();
            let previous = state.active.and_then(|v| state.keys.get(&v).cloned());
            let version = state.keys.keys().next_back().map_or(1, |v| v + 1);
            (previous, version)
        };

        let info = KeyInfo::new(version, self.policy.algorithm, now);
        self.storage
            .store(&self.storage_id(version), material.as_bytes(), self.record_metadata(&info)?)?;

        let deprecated = match previous {
            Some(mut old) => {
                old.deprecate(now);
                if let Err(e) = self.persist_info(&old) {
                    // Leave storage with a single active key.
                    if let Err(cleanup) = self.storage.remove(&self.storage_id(version)) {
                        log::warn!(
                            "lineage '{}' could not roll back version {} after a failed rotation: {}",
                            self.name,
                            version,
                            cleanup
                        );
                    }
                    return Err(e);
                }
                Some(old)
            }
            None => None,
        };

        {
            let mut state = self.state.write();
            if let Some(old) = deprecated {
                state.keys.insert(old.version, old);
            }
            state.keys.insert(version, info.clone());
            state.materials.insert(version, material);
            state.active = Some(version);
        }

        log::info!(
            "rotated lineage '{}' to version {} ({})",
            self.name,
            version,
            self.policy.algorithm
        );
        Ok(info)
    }

    /// Rotate to freshly generated random key material
    pub fn rotate_generated(&self) -> CryptoResult<KeyInfo> {
        let material = utils::random_secret(self.policy.algorithm.key_len())?;
        self.rotate(material)
    }

    /// Encrypt under the active key
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Envelope> {
        let _shared = self.lifecycle.read();
        let (info, key) = self.active_material()?;
        let ciphertext = self
            .engine
            .encrypt(plaintext, key.as_bytes(), info.algorithm)
            .map_err(|e| CryptoError::engine("encrypt", e))?;
        let metadata = EncryptedDataMetadata::new(&self.name, info.version, info.algorithm, self.now());
        Ok(Envelope::new(metadata, ciphertext))
    }

    /// Decrypt an envelope produced under any usable version of this lineage
    pub fn decrypt(&self, envelope: &Envelope) -> CryptoResult<Vec<u8>> {
        let _shared = self.lifecycle.read();
        self.check_lineage(&envelope.metadata)?;
        let key = self.material(envelope.metadata.key_version)?;
        self.engine
            .decrypt(&envelope.ciphertext, key.as_bytes(), envelope.metadata.algorithm)
            .map_err(|e| CryptoError::engine("decrypt", e))
    }

    /// Record that item `id` holds ciphertext described by `metadata`.
    ///
    /// The tracked corpus is persisted with the lineage, so references
    /// survive a reopen.
    pub fn track(&self, id: &str, metadata: &EncryptedDataMetadata) -> CryptoResult<()> {
        self.check_lineage(metadata)?;
        let _shared = self.lifecycle.read();
        let _io = self.corpus_io.lock();
        let mut corpus = {
            let state = self.state.read();
            if !state.keys.contains_key(&metadata.key_version) {
                return Err(self.unknown_version(metadata.key_version));
            }
            if state.corpus.get(id) == Some(&metadata.key_version) {
                return Ok(());
            }
            state.corpus.clone()
        };
        corpus.insert(id.to_string(), metadata.key_version);
        self.commit_corpus(corpus)
    }

    /// Stop tracking item `id`; returns the version it referenced
    pub fn untrack(&self, id: &str) -> CryptoResult<Option<u64>> {
        let _shared = self.lifecycle.read();
        let _io = self.corpus_io.lock();
        let mut corpus = self.state.read().corpus.clone();
        let Some(version) = corpus.remove(id) else {
            return Ok(None);
        };
        self.commit_corpus(corpus)?;
        Ok(Some(version))
    }

    /// Number of tracked items under `version`
    pub fn references(&self, version: u64) -> usize {
        self.state.read().references(version)
    }

    /// Re-encrypt `items` under the active key.
    ///
    /// Items are spread over the policy's worker threads. A failing item is
    /// recorded and the batch moves on; only cancellation or an engine
    /// reporting itself unavailable stops it early. Cancellation returns the
    /// partial result with the untouched items listed as cancelled, while an
    /// unavailable engine fails the whole call. Tracked items that succeed
    /// are re-pointed at the new version.
    pub fn reencrypt(
        &self,
        items: Vec<ReencryptItem>,
        cancel: &CancellationToken,
    ) -> CryptoResult<ReencryptionResult> {
        let _shared = self.lifecycle.read();
        let (active, active_key) = self.active_material()?;
        let keys = self.preload_materials(&items);

        let next = AtomicUsize::new(0);
        let abort = AtomicBool::new(false);
        let fatal: Mutex<Option<CryptoError>> = Mutex::new(None);
        let outcomes: Vec<Mutex<Option<CryptoResult<Envelope>>>> =
            items.iter().map(|_| Mutex::new(None)).collect();
        let workers = self.policy.reencrypt_workers.clamp(1, items.len().max(1));

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if cancel.is_cancelled() || abort.load(Ordering::Acquire) {
                        break;
                    }
                    let idx = next.fetch_add(1, Ordering::AcqRel);
                    let Some(item) = items.get(idx) else { break };

                    let outcome = self.reencrypt_one(item, &keys, &active, &active_key);
                    if let Err(error) = &outcome {
                        if matches!(error, CryptoError::Engine { source, .. } if source.is_fatal()) {
                            abort.store(true, Ordering::Release);
                            fatal.lock().get_or_insert_with(|| error.clone());
                        }
                    }
                    *outcomes[idx].lock() = Some(outcome);
                });
            }
        });

        if let Some(error) = fatal.into_inner() {
            log::warn!(
                "re-encryption of lineage '{}' aborted: engine unavailable",
                self.name
            );
            return Err(error);
        }

        let mut result = ReencryptionResult::default();
        for (item, outcome) in items.into_iter().zip(outcomes) {
            match outcome.into_inner() {
                Some(Ok(envelope)) => {
                    result.processed_count += 1;
                    result.reencrypted.push(ReencryptedItem {
                        id: item.id,
                        envelope,
                    });
                }
                Some(Err(error)) => result.failed_items.push(FailedItem { id: item.id, error }),
                None => result.cancelled.push(item.id),
            }
        }

        self.repoint(&result.reencrypted, active.version);

        if result.was_cancelled() {
            log::warn!(
                "re-encryption of lineage '{}' cancelled with {} item(s) unprocessed",
                self.name,
                result.cancelled.len()
            );
        }
        log::info!(
            "re-encrypted {} item(s) of lineage '{}' to version {}, {} failed",
            result.processed_count,
            self.name,
            active.version,
            result.failed_items.len()
        );
        Ok(result)
    }

    /// Destroy a deprecated version's material and mark it revoked.
    ///
    /// Refused with `VersionInUse` while tracked items reference it. The
    /// active version cannot be purged. Purging a revoked version is a no-op.
    pub fn purge(&self, version: u64) -> CryptoResult<KeyInfo> {
        let _exclusive = self.lifecycle.write();
        let info = self.key_info(version)?;

        match info.status {
            KeyStatus::Revoked => return Ok(info),
            KeyStatus::Active => {
                return Err(CryptoError::invalid_parameter(
                    "version",
                    "a deprecated version",
                    &format!("active version {}", version),
                    error_codes::INVALID_CONFIGURATION,
                ))
            }
            KeyStatus::Deprecated => {}
        }

        let references = self.references(version);
        if references > 0 {
            return Err(CryptoError::VersionInUse {
                lineage: self.name.clone(),
                version,
                references,
            });
        }

        self.retire(info)
    }

    /// Revoke deprecated versions whose grace period has elapsed.
    ///
    /// Versions still referenced by tracked items are left deprecated.
    pub fn revoke_expired(&self) -> CryptoResult<Vec<KeyInfo>> {
        let _exclusive = self.lifecycle.write();
        let now = self.now();

        let candidates: Vec<KeyInfo> = self
            .versions()
            .into_iter()
            .filter(|info| info.status == KeyStatus::Deprecated)
            .filter(|info| {
                info.deprecated_at
                    .map_or(false, |at| (now - at).to_std().unwrap_or_default() >= self.policy.grace_period)
            })
            .collect();

        let mut revoked = Vec::new();
        for info in candidates {
            let references = self.references(info.version);
            if references > 0 {
                log::warn!(
                    "lineage '{}' version {} is past its grace period but still referenced by {} item(s)",
                    self.name,
                    info.version,
                    references
                );
                continue;
            }
            revoked.push(self.retire(info)?);
        }
        Ok(revoked)
    }

    /// Whether the lineage has no active key or its active key is too old
    pub fn needs_rotation(&self) -> bool {
        match self.current_key() {
            Ok(info) => self.is_overdue(&info, self.now()),
            Err(_) => true,
        }
    }

    /// Age of every version
    pub fn key_ages(&self) -> Vec<KeyAgeSummary> {
        let now = self.now();
        self.versions()
            .into_iter()
            .map(|info| KeyAgeSummary {
                version: info.version,
                status: info.status,
                age: info.age(now),
                needs_rotation: info.is_active() && self.is_overdue(&info, now),
            })
            .collect()
    }

    fn is_overdue(&self, info: &KeyInfo, now: DateTime<Utc>) -> bool {
        self.policy
            .max_key_age
            .map_or(false, |max| info.age(now) >= max)
    }

    fn reencrypt_one(
        &self,
        item: &ReencryptItem,
        keys: &HashMap<u64, CryptoResult<SecureBytes>>,
        active: &KeyInfo,
        active_key: &SecureBytes,
    ) -> CryptoResult<Envelope> {
        self.check_lineage(&item.metadata)?;
        let old_key = match keys.get(&item.metadata.key_version) {
            Some(Ok(key)) => key,
            Some(Err(e)) => return Err(e.clone()),
            None => return Err(self.unknown_version(item.metadata.key_version)),
        };

        let plaintext = SecureBytes::from(
            self.engine
                .decrypt(&item.ciphertext, old_key.as_bytes(), item.metadata.algorithm)
                .map_err(|e| CryptoError::engine("decrypt", e))?,
        );
        let ciphertext = self
            .engine
            .encrypt(plaintext.as_bytes(), active_key.as_bytes(), active.algorithm)
            .map_err(|e| CryptoError::engine("encrypt", e))?;

        let metadata = EncryptedDataMetadata::new(&self.name, active.version, active.algorithm, self.now());
        Ok(Envelope::new(metadata, ciphertext))
    }

    /// Resolve every version the batch needs before fanning out
    fn preload_materials(&self, items: &[ReencryptItem]) -> HashMap<u64, CryptoResult<SecureBytes>> {
        let versions: HashSet<u64> = items
            .iter()
            .filter(|item| item.metadata.lineage == self.name)
            .map(|item| item.metadata.key_version)
            .collect();
        versions
            .into_iter()
            .map(|version| (version, self.material(version)))
            .collect()
    }

    fn active_material(&self) -> CryptoResult<(KeyInfo, SecureBytes)> {
        let info = self.current_key()?;
        let key = self.material(info.version)?;
        Ok((info, key))
    }

    /// Key material for a usable version, loaded from storage on first use
    fn material(&self, version: u64) -> CryptoResult<SecureBytes> {
        let info = self.key_info(version)?;
        if !info.is_usable() {
            return Err(CryptoError::KeyRevoked {
                lineage: self.name.clone(),
                version,
            });
        }
        if let Some(key) = self.state.read().materials.get(&version) {
            return Ok(key.clone());
        }
        let key = self.storage.retrieve(&self.storage_id(version))?;
        self.state.write().materials.insert(version, key.clone());
        Ok(key)
    }

    /// Move tracked items that were re-encrypted onto `version`.
    ///
    /// If the corpus cannot be persisted the items keep their previous
    /// versions, which only delays purging those versions.
    fn repoint(&self, reencrypted: &[ReencryptedItem], version: u64) {
        let _io = self.corpus_io.lock();
        let mut corpus = self.state.read().corpus.clone();
        let mut moved = 0;
        for done in reencrypted {
            if let Some(tracked) = corpus.get_mut(&done.id) {
                if *tracked != version {
                    *tracked = version;
                    moved += 1;
                }
            }
        }
        if moved == 0 {
            return;
        }
        if let Err(e) = self.commit_corpus(corpus) {
            log::warn!(
                "lineage '{}' kept {} re-encrypted item(s) on their previous versions: {}",
                self.name,
                moved,
                e
            );
        }
    }

    /// Persist `corpus`, then make it the in-memory corpus.
    ///
    /// Callers hold `corpus_io`.
    fn commit_corpus(&self, corpus: HashMap<String, u64>) -> CryptoResult<()> {
        let ordered: BTreeMap<&str, u64> = corpus.iter().map(|(id, v)| (id.as_str(), *v)).collect();
        let body = serde_json::to_vec(&ordered)?;
        let mut metadata = Metadata::new();
        metadata.insert(META_LINEAGE.to_string(), self.name.clone());
        metadata.insert(META_RECORD.to_string(), CORPUS_RECORD.to_string());
        self.storage.store(&self.corpus_id(), &body, metadata)?;
        self.state.write().corpus = corpus;
        Ok(())
    }

    fn load_corpus(&self) -> CryptoResult<HashMap<String, u64>> {
        match self.storage.retrieve(&self.corpus_id()) {
            Ok(body) => Ok(serde_json::from_slice(body.as_bytes())?),
            Err(CryptoError::NotFound { .. }) => Ok(HashMap::new()),
            Err(e) => Err(e),
        }
    }

    /// Destroy material and persist the revoked status
    fn retire(&self, mut info: KeyInfo) -> CryptoResult<KeyInfo> {
        info.revoke(self.now());
        self.storage
            .store(&self.storage_id(info.version), &[], self.record_metadata(&info)?)?;

        let mut state = self.state.write();
        state.materials.remove(&info.version);
        state.keys.insert(info.version, info.clone());
        drop(state);

        log::info!("revoked lineage '{}' version {}", self.name, info.version);
        Ok(info)
    }

    fn restore(&self) -> CryptoResult<()> {
        let prefix = format!("{}/v", self.name);
        let mut keys = BTreeMap::new();
        for id in self.storage.list_ids(&prefix)? {
            let metadata = self.storage.metadata(&id)?;
            if metadata.get(META_LINEAGE).map(String::as_str) != Some(self.name.as_str()) {
                continue;
            }
            let Some(json) = metadata.get(META_KEY_INFO) else {
                continue;
            };
            let info: KeyInfo = serde_json::from_str(json)?;
            keys.insert(info.version, info);
        }

        // An interrupted rotation can leave two active records; the newest wins.
        let active = keys
            .values()
            .filter(|info| info.is_active())
            .map(|info| info.version)
            .max();
        let stale: Vec<KeyInfo> = keys
            .values()
            .filter(|info| info.is_active() && Some(info.version) != active)
            .cloned()
            .collect();
        for mut info in stale {
            log::warn!(
                "lineage '{}' had more than one active key; deprecating version {}",
                self.name,
                info.version
            );
            info.deprecate(info.created_at);
            self.persist_info(&info)?;
            keys.insert(info.version, info);
        }

        let corpus = self.load_corpus()?;
        if !keys.is_empty() {
            log::info!(
                "restored lineage '{}' with {} version(s), active {:?}, {} tracked item(s)",
                self.name,
                keys.len(),
                active,
                corpus.len()
            );
        }
        let mut state = self.state.write();
        state.keys = keys;
        state.active = active;
        state.corpus = corpus;
        Ok(())
    }

    fn persist_info(&self, info: &KeyInfo) -> CryptoResult<()> {
        let json = serde_json::to_string(info)?;
        self.storage
            .update_metadata(&self.storage_id(info.version), |metadata| {
                metadata.insert(META_KEY_INFO.to_string(), json);
            })?;
        Ok(())
    }

    fn record_metadata(&self, info: &KeyInfo) -> CryptoResult<Metadata> {
        let mut metadata = Metadata::new();
        metadata.insert(META_LINEAGE.to_string(), self.name.clone());
        metadata.insert(META_KEY_INFO.to_string(), serde_json::to_string(info)?);
        Ok(metadata)
    }

    fn check_lineage(&self, metadata: &EncryptedDataMetadata) -> CryptoResult<()> {
        if metadata.lineage != self.name {
            return Err(CryptoError::invalid_parameter(
                "metadata.lineage",
                &self.name,
                &metadata.lineage,
                error_codes::INVALID_ENVELOPE,
            ));
        }
        Ok(())
    }

    fn storage_id(&self, version: u64) -> String {
        format!("{}/v{}", self.name, version)
    }

    fn corpus_id(&self) -> String {
        format!("{}/{}", self.name, CORPUS_RECORD)
    }

    fn unknown_version(&self, version: u64) -> CryptoError {
        CryptoError::UnknownKeyVersion {
            lineage: self.name.clone(),
            version,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        truncate_to_millis(self.clock.now_utc())
    }
}

pub(crate) fn check_lineage_name(name: &str) -> CryptoResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_LINEAGE_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(CryptoError::invalid_parameter(
            "lineage",
            &format!(
                "1..={} characters of [A-Za-z0-9._-]",
                MAX_LINEAGE_NAME_LEN
            ),
            name,
            error_codes::INVALID_CONFIGURATION,
        ));
    }
    Ok(())
}
