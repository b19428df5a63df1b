/*!
 * Secure Storage
 *
 * Persists key material and its metadata. Material is sealed with
 * ChaCha20-Poly1305 under a key derived from a master secret supplied at
 * construction; metadata is kept in the clear but authenticated together
 * with the record id, so records cannot be altered or swapped undetected.
 *
 * Backends only ever see sealed records and must replace a record
 * atomically; [`SecureStorage`] serializes writers per id on top of that,
 * so no partially written record is ever observable.
 */

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{error_codes, CryptoError, CryptoResult};
use crate::secure_memory::SecureBytes;
use crate::utils;

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

#[cfg(test)]
mod tests;

/// Shortest master secret accepted
pub const MIN_MASTER_SECRET_LEN: usize = 16;
/// Longest record id accepted
pub const MAX_ID_LEN: usize = 120;

const RECORD_FORMAT_VERSION: u8 = 1;
const SEAL_SALT: &[u8] = b"keyward/storage/v1";
const SEAL_INFO: &[u8] = b"record-seal";
const NONCE_LEN: usize = 12;

/// Key/value metadata stored beside each record
pub type Metadata = BTreeMap<String, String>;

/// Raw persistence for sealed records.
///
/// `write` must replace any existing record atomically: a concurrent or
/// later `read` sees either the old bytes or the new ones, never a mix.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    fn read(&self, id: &str) -> CryptoResult<Option<Vec<u8>>>;

    fn write(&self, id: &str, record: &[u8]) -> CryptoResult<()>;

    /// Remove a record; returns whether it existed
    fn delete(&self, id: &str) -> CryptoResult<bool>;

    /// Every stored id, in no particular order
    fn list(&self) -> CryptoResult<Vec<String>>;
}

/// Which backend to use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StorageBackendKind {
    /// Process memory; lost on exit
    #[default]
    Memory,
    /// One file per record under `path`, or under [`default_storage_dir`]
    File {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

/// Storage configuration. The master secret is supplied separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    pub backend: StorageBackendKind,
}

impl StorageSettings {
    pub fn validate(&self) -> CryptoResult<()> {
        if let StorageBackendKind::File { path: Some(path) } = &self.backend {
            if path.as_os_str().is_empty() {
                return Err(CryptoError::invalid_parameter(
                    "storage.backend.path",
                    "a directory path or null",
                    "an empty path",
                    error_codes::INVALID_CONFIGURATION,
                ));
            }
        }
        Ok(())
    }

    /// Build the configured backend
    pub fn open_backend(&self) -> CryptoResult<Arc<dyn StorageBackend>> {
        self.validate()?;
        Ok(match &self.backend {
            StorageBackendKind::Memory => Arc::new(MemoryBackend::new()),
            StorageBackendKind::File { path } => {
                let dir = path.clone().unwrap_or_else(default_storage_dir);
                Arc::new(FileBackend::open(dir)?)
            }
        })
    }
}

/// Default directory for file-backed storage
pub fn default_storage_dir() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".keyward");
    path.push("keys");
    path
}

/// A sealed record as persisted by a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedRecord {
    version: u8,
    #[serde(with = "utils::base64_bytes")]
    nonce: Vec<u8>,
    #[serde(with = "utils::base64_bytes")]
    encrypted_data: Vec<u8>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    metadata: Metadata,
}

/// Encrypted-at-rest store for key material.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use keyward::secure_memory::SecureBytes;
/// use keyward::storage::{MemoryBackend, Metadata, SecureStorage};
///
/// let master = SecureBytes::new(&[0x5a; 32]);
/// let storage = SecureStorage::new(Arc::new(MemoryBackend::new()), &master).unwrap();
///
/// storage.store("signing/v1", b"0123456789abcdef", Metadata::new()).unwrap();
/// assert_eq!(storage.retrieve("signing/v1").unwrap().as_bytes(), b"0123456789abcdef");
/// ```
pub struct SecureStorage {
    backend: Arc<dyn StorageBackend>,
    cipher: ChaCha20Poly1305,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl fmt::Debug for SecureStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureStorage")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl SecureStorage {
    pub fn new(backend: Arc<dyn StorageBackend>, master_secret: &SecureBytes) -> CryptoResult<Self> {
        if master_secret.len() < MIN_MASTER_SECRET_LEN {
            return Err(CryptoError::invalid_parameter(
                "master_secret",
                &format!("at least {} bytes", MIN_MASTER_SECRET_LEN),
                &format!("{} bytes", master_secret.len()),
                error_codes::INVALID_KEY_LENGTH,
            ));
        }

        let hkdf = Hkdf::<Sha256>::new(Some(SEAL_SALT), master_secret.as_bytes());
        let mut seal_key = SecureBytes::zeroed(32);
        hkdf.expand(SEAL_INFO, seal_key.as_bytes_mut()).map_err(|e| {
            CryptoError::derivation_failed("HKDF-SHA256", &format!("seal key expansion: {}", e))
        })?;

        Ok(Self {
            backend,
            cipher: ChaCha20Poly1305::new(Key::from_slice(seal_key.as_bytes())),
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Build storage from settings
    pub fn from_settings(settings: &StorageSettings, master_secret: &SecureBytes) -> CryptoResult<Self> {
        Self::new(settings.open_backend()?, master_secret)
    }

    /// Seal and persist `key_material` under `id`, replacing any previous record
    pub fn store(&self, id: &str, key_material: &[u8], metadata: Metadata) -> CryptoResult<()> {
        check_id(id)?;
        let lock = self.lock_for(id);
        let _guard = lock.lock();

        let now = Utc::now();
        let created_at = match self.load(id)? {
            Some(existing) => existing.created_at,
            None => now,
        };
        let record = self.seal(id, key_material, metadata, created_at, now)?;
        self.persist(id, &record)?;
        log::info!("stored key record '{}'", id);
        Ok(())
    }

    /// Unseal the key material stored under `id`
    pub fn retrieve(&self, id: &str) -> CryptoResult<SecureBytes> {
        check_id(id)?;
        let record = self.load(id)?.ok_or_else(|| CryptoError::not_found(id))?;
        self.open(id, &record)
    }

    /// Metadata of the record under `id`, after verifying the record
    pub fn metadata(&self, id: &str) -> CryptoResult<Metadata> {
        check_id(id)?;
        let record = self.load(id)?.ok_or_else(|| CryptoError::not_found(id))?;
        self.open(id, &record)?;
        Ok(record.metadata)
    }

    /// Creation and last modification times of the record under `id`
    pub fn timestamps(&self, id: &str) -> CryptoResult<(DateTime<Utc>, DateTime<Utc>)> {
        check_id(id)?;
        let record = self.load(id)?.ok_or_else(|| CryptoError::not_found(id))?;
        Ok((record.created_at, record.modified_at))
    }

    /// Modify a record's metadata in place, keeping its key material
    pub fn update_metadata<F>(&self, id: &str, update: F) -> CryptoResult<Metadata>
    where
        F: FnOnce(&mut Metadata),
    {
        check_id(id)?;
        let lock = self.lock_for(id);
        let _guard = lock.lock();

        let record = self.load(id)?.ok_or_else(|| CryptoError::not_found(id))?;
        let material = self.open(id, &record)?;
        let mut metadata = record.metadata;
        update(&mut metadata);

        let resealed = self.seal(
            id,
            material.as_bytes(),
            metadata.clone(),
            record.created_at,
            Utc::now(),
        )?;
        self.persist(id, &resealed)?;
        Ok(metadata)
    }

    /// Delete the record under `id`; returns whether it existed
    pub fn remove(&self, id: &str) -> CryptoResult<bool> {
        check_id(id)?;
        let removed = {
            let lock = self.lock_for(id);
            let _guard = lock.lock();
            self.backend.delete(id)?
        };
        self.locks.lock().remove(id);
        if removed {
            log::info!("removed key record '{}'", id);
        }
        Ok(removed)
    }

    pub fn contains(&self, id: &str) -> CryptoResult<bool> {
        check_id(id)?;
        Ok(self.backend.read(id)?.is_some())
    }

    /// Sorted ids starting with `prefix`
    pub fn list_ids(&self, prefix: &str) -> CryptoResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .backend
            .list()?
            .into_iter()
            .filter(|id| id.starts_with(prefix))
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load(&self, id: &str) -> CryptoResult<Option<SealedRecord>> {
        match self.backend.read(id)? {
            Some(bytes) => {
                let record: SealedRecord = serde_json::from_slice(&bytes).map_err(|e| {
                    CryptoError::IntegrityViolation {
                        id: id.to_string(),
                        cause: format!("unreadable record: {}", e),
                    }
                })?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn persist(&self, id: &str, record: &SealedRecord) -> CryptoResult<()> {
        let bytes = serde_json::to_vec(record)?;
        self.backend.write(id, &bytes)
    }

    fn seal(
        &self,
        id: &str,
        key_material: &[u8],
        metadata: Metadata,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> CryptoResult<SealedRecord> {
        let nonce = utils::random_bytes(NONCE_LEN)?;
        let aad = associated_data(id, &metadata)?;
        let encrypted_data = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: key_material,
                    aad: &aad,
                },
            )
            .map_err(|_| CryptoError::IntegrityViolation {
                id: id.to_string(),
                cause: "sealing failed".to_string(),
            })?;

        Ok(SealedRecord {
            version: RECORD_FORMAT_VERSION,
            nonce,
            encrypted_data,
            created_at,
            modified_at,
            metadata,
        })
    }

    fn open(&self, id: &str, record: &SealedRecord) -> CryptoResult<SecureBytes> {
        if record.version != RECORD_FORMAT_VERSION || record.nonce.len() != NONCE_LEN {
            return Err(CryptoError::IntegrityViolation {
                id: id.to_string(),
                cause: format!("unsupported record format {}", record.version),
            });
        }
        let aad = associated_data(id, &record.metadata)?;
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(&record.nonce),
                Payload {
                    msg: &record.encrypted_data,
                    aad: &aad,
                },
            )
            .map_err(|_| CryptoError::IntegrityViolation {
                id: id.to_string(),
                cause: "authentication failed".to_string(),
            })?;
        Ok(SecureBytes::from(plaintext))
    }
}

/// Binds a sealed record to its id and metadata
fn associated_data(id: &str, metadata: &Metadata) -> CryptoResult<Vec<u8>> {
    let mut aad = Vec::with_capacity(id.len() + 64);
    aad.extend_from_slice(&(id.len() as u32).to_be_bytes());
    aad.extend_from_slice(id.as_bytes());
    aad.extend_from_slice(&serde_json::to_vec(metadata)?);
    Ok(aad)
}

fn check_id(id: &str) -> CryptoResult<()> {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(CryptoError::invalid_parameter(
            "id",
            &format!("1..={} bytes", MAX_ID_LEN),
            &format!("{} bytes", id.len()),
            error_codes::INVALID_CONFIGURATION,
        ));
    }
    Ok(())
}
