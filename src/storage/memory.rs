use std::collections::HashMap;

use parking_lot::RwLock;

use super::StorageBackend;
use crate::error::CryptoResult;

/// In-memory backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, id: &str) -> CryptoResult<Option<Vec<u8>>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn write(&self, id: &str, record: &[u8]) -> CryptoResult<()> {
        self.records.write().insert(id.to_string(), record.to_vec());
        Ok(())
    }

    fn delete(&self, id: &str) -> CryptoResult<bool> {
        Ok(self.records.write().remove(id).is_some())
    }

    fn list(&self) -> CryptoResult<Vec<String>> {
        Ok(self.records.read().keys().cloned().collect())
    }
}
