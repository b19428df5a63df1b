use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::StorageBackend;
use crate::error::{CryptoError, CryptoResult};
use crate::utils;

const RECORD_EXTENSION: &str = "json";

/// One file per record under a directory.
///
/// File names are the hex-encoded record id, so any id maps to a portable
/// name. Writes go to a temporary file in the same directory which is then
/// renamed over the target, making every replacement atomic.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Use `dir` for records, creating it if needed
    pub fn open<P: AsRef<Path>>(dir: P) -> CryptoResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| unavailable("create directory", &dir, e))?;
        #[cfg(unix)]
        restrict_permissions(&dir, 0o700)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", utils::to_hex(id.as_bytes()), RECORD_EXTENSION))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, id: &str) -> CryptoResult<Option<Vec<u8>>> {
        let path = self.path_for(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable("read", &path, e)),
        }
    }

    fn write(&self, id: &str, record: &[u8]) -> CryptoResult<()> {
        let path = self.path_for(id);
        let mut temp =
            NamedTempFile::new_in(&self.dir).map_err(|e| unavailable("create temp file", &self.dir, e))?;
        temp.write_all(record)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| unavailable("write", temp.path(), e))?;
        #[cfg(unix)]
        restrict_permissions(temp.path(), 0o600)?;
        temp.persist(&path)
            .map_err(|e| unavailable("replace", &path, e.error))?;
        Ok(())
    }

    fn delete(&self, id: &str) -> CryptoResult<bool> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(unavailable("delete", &path, e)),
        }
    }

    fn list(&self) -> CryptoResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| unavailable("list", &self.dir, e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| unavailable("list", &self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            // Names that don't decode are not ours.
            let decoded = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| utils::from_hex(stem).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            if let Some(id) = decoded {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

fn unavailable(operation: &str, path: &Path, error: io::Error) -> CryptoError {
    CryptoError::storage_unavailable(operation, &format!("{}: {}", path.display(), error))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path, mode: u32) -> CryptoResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| unavailable("set permissions", path, e))
}
