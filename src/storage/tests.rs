use super::*;
use std::sync::Arc;

fn master() -> SecureBytes {
    SecureBytes::new(&[0x42; 32])
}

fn memory_storage() -> (SecureStorage, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let storage = SecureStorage::new(backend.clone(), &master()).unwrap();
    (storage, backend)
}

fn meta(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_store_and_retrieve() {
    let (storage, _) = memory_storage();
    storage
        .store("lineage/v1", b"key material 0001", meta(&[("status", "active")]))
        .unwrap();

    assert_eq!(storage.retrieve("lineage/v1").unwrap().as_bytes(), b"key material 0001");
    assert_eq!(storage.metadata("lineage/v1").unwrap(), meta(&[("status", "active")]));
    assert!(storage.contains("lineage/v1").unwrap());
}

#[test]
fn test_unknown_id_is_not_found() {
    let (storage, _) = memory_storage();
    assert!(matches!(storage.retrieve("missing"), Err(CryptoError::NotFound { .. })));
    assert!(matches!(storage.metadata("missing"), Err(CryptoError::NotFound { .. })));
    assert!(matches!(
        storage.update_metadata("missing", |_| {}),
        Err(CryptoError::NotFound { .. })
    ));
    assert!(!storage.contains("missing").unwrap());
}

#[test]
fn test_material_is_sealed_at_rest() {
    let (storage, backend) = memory_storage();
    storage
        .store("k", b"plaintext-key-material", Metadata::new())
        .unwrap();

    let raw = backend.read("k").unwrap().unwrap();
    let raw_text = String::from_utf8_lossy(&raw);
    assert!(!raw_text.contains("plaintext-key-material"));
    assert!(!raw_text.contains(&base64::encode(b"plaintext-key-material")));
}

#[test]
fn test_short_master_secret_rejected() {
    let backend = Arc::new(MemoryBackend::new());
    let result = SecureStorage::new(backend, &SecureBytes::new(&[1; 15]));
    assert!(matches!(result, Err(CryptoError::InvalidParams { .. })));
}

#[test]
fn test_wrong_master_secret_detected() {
    let backend = Arc::new(MemoryBackend::new());
    let writer = SecureStorage::new(backend.clone(), &master()).unwrap();
    writer.store("k", b"secret", Metadata::new()).unwrap();

    let reader = SecureStorage::new(backend, &SecureBytes::new(&[0x43; 32])).unwrap();
    assert!(matches!(
        reader.retrieve("k"),
        Err(CryptoError::IntegrityViolation { .. })
    ));
}

#[test]
fn test_tampered_metadata_detected() {
    let (storage, backend) = memory_storage();
    storage
        .store("k", b"secret", meta(&[("status", "revoked")]))
        .unwrap();

    let raw = backend.read("k").unwrap().unwrap();
    let tampered = String::from_utf8(raw).unwrap().replace("revoked", "active!");
    backend.write("k", tampered.as_bytes()).unwrap();

    assert!(matches!(
        storage.retrieve("k"),
        Err(CryptoError::IntegrityViolation { .. })
    ));
    assert!(matches!(
        storage.metadata("k"),
        Err(CryptoError::IntegrityViolation { .. })
    ));
}

#[test]
fn test_swapped_records_detected() {
    let (storage, backend) = memory_storage();
    storage.store("a", b"material-a", Metadata::new()).unwrap();
    storage.store("b", b"material-b", Metadata::new()).unwrap();

    let record_a = backend.read("a").unwrap().unwrap();
    backend.write("b", &record_a).unwrap();
    assert!(matches!(
        storage.retrieve("b"),
        Err(CryptoError::IntegrityViolation { .. })
    ));
}

#[test]
fn test_garbage_record_is_integrity_violation() {
    let (storage, backend) = memory_storage();
    backend.write("k", b"not json").unwrap();
    assert!(matches!(
        storage.retrieve("k"),
        Err(CryptoError::IntegrityViolation { .. })
    ));
}

#[test]
fn test_update_metadata_keeps_material_and_created_at() {
    let (storage, _) = memory_storage();
    storage.store("k", b"material", meta(&[("a", "1")])).unwrap();
    let (created, _) = storage.timestamps("k").unwrap();

    let updated = storage
        .update_metadata("k", |m| {
            m.insert("b".to_string(), "2".to_string());
        })
        .unwrap();

    assert_eq!(updated, meta(&[("a", "1"), ("b", "2")]));
    assert_eq!(storage.metadata("k").unwrap(), updated);
    assert_eq!(storage.retrieve("k").unwrap().as_bytes(), b"material");
    assert_eq!(storage.timestamps("k").unwrap().0, created);
}

#[test]
fn test_store_overwrites() {
    let (storage, _) = memory_storage();
    storage.store("k", b"first", Metadata::new()).unwrap();
    storage.store("k", b"second", meta(&[("v", "2")])).unwrap();
    assert_eq!(storage.retrieve("k").unwrap().as_bytes(), b"second");
    assert_eq!(storage.list_ids("").unwrap(), vec!["k".to_string()]);
}

#[test]
fn test_remove() {
    let (storage, _) = memory_storage();
    storage.store("k", b"material", Metadata::new()).unwrap();
    assert!(storage.remove("k").unwrap());
    assert!(!storage.remove("k").unwrap());
    assert!(matches!(storage.retrieve("k"), Err(CryptoError::NotFound { .. })));
}

#[test]
fn test_list_ids_by_prefix() {
    let (storage, _) = memory_storage();
    for id in ["payments/v2", "payments/v1", "profile/v1", "payments-old/v1"] {
        storage.store(id, b"x", Metadata::new()).unwrap();
    }
    assert_eq!(
        storage.list_ids("payments/").unwrap(),
        vec!["payments/v1".to_string(), "payments/v2".to_string()]
    );
    assert_eq!(storage.list_ids("").unwrap().len(), 4);
}

#[test]
fn test_invalid_ids_rejected() {
    let (storage, _) = memory_storage();
    assert!(storage.store("", b"x", Metadata::new()).is_err());
    let long = "x".repeat(MAX_ID_LEN + 1);
    assert!(matches!(
        storage.store(&long, b"x", Metadata::new()),
        Err(CryptoError::InvalidParams { .. })
    ));
}

#[test]
fn test_concurrent_metadata_updates_are_not_lost() {
    let (storage, _) = memory_storage();
    storage.store("counter", b"material", meta(&[("n", "0")])).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..25 {
                    storage
                        .update_metadata("counter", |m| {
                            let n: u32 = m.get("n").and_then(|v| v.parse().ok()).unwrap_or(0);
                            m.insert("n".to_string(), (n + 1).to_string());
                        })
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(storage.metadata("counter").unwrap()["n"], "100");
}

#[test]
fn test_file_backend_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage =
            SecureStorage::new(Arc::new(FileBackend::open(dir.path()).unwrap()), &master()).unwrap();
        storage
            .store("orders/v1", b"file-backed-key!", meta(&[("lineage", "orders")]))
            .unwrap();
    }

    let storage =
        SecureStorage::new(Arc::new(FileBackend::open(dir.path()).unwrap()), &master()).unwrap();
    assert_eq!(storage.retrieve("orders/v1").unwrap().as_bytes(), b"file-backed-key!");
    assert_eq!(storage.list_ids("orders/").unwrap(), vec!["orders/v1".to_string()]);
}

#[test]
fn test_file_backend_leaves_only_record_files() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileBackend::open(dir.path()).unwrap();
    backend.write("a/b", b"one").unwrap();
    backend.write("a/b", b"two").unwrap();
    fs_names(dir.path())
        .iter()
        .for_each(|name| assert!(name.ends_with(".json"), "unexpected file {}", name));
    assert_eq!(backend.read("a/b").unwrap(), Some(b"two".to_vec()));

    std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
    std::fs::write(dir.path().join("zz.json"), b"ignored").unwrap();
    assert_eq!(backend.list().unwrap(), vec!["a/b".to_string()]);
    assert!(backend.delete("a/b").unwrap());
    assert!(!backend.delete("a/b").unwrap());
    assert_eq!(backend.read("a/b").unwrap(), None);
}

fn fs_names(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_unreachable_directory_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"a file, not a directory").unwrap();

    assert!(matches!(
        FileBackend::open(blocker.join("keys")),
        Err(CryptoError::StorageUnavailable { .. })
    ));
}

#[test]
fn test_settings_build_backends() {
    let dir = tempfile::tempdir().unwrap();
    let settings = StorageSettings {
        backend: StorageBackendKind::File {
            path: Some(dir.path().join("store")),
        },
    };
    let storage = SecureStorage::from_settings(&settings, &master()).unwrap();
    storage.store("k", b"material", Metadata::new()).unwrap();
    assert!(dir.path().join("store").is_dir());

    let empty_path = StorageSettings {
        backend: StorageBackendKind::File {
            path: Some(PathBuf::new()),
        },
    };
    assert!(empty_path.validate().is_err());

    let json = serde_json::to_string(&settings).unwrap();
    assert!(json.contains("\"type\":\"file\""));
    assert_eq!(serde_json::from_str::<StorageSettings>(&json).unwrap(), settings);
    assert_eq!(
        serde_json::from_str::<StorageSettings>("{}").unwrap().backend,
        StorageBackendKind::Memory
    );
}

#[test]
fn test_default_storage_dir_is_namespaced() {
    assert!(default_storage_dir().ends_with(".keyward/keys"));
}
