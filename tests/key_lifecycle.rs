//! End-to-end key lifecycle against file-backed storage
//!
//! Rotates, encrypts, restarts, re-encrypts and purges the way an adapter
//! would drive the crate across process restarts.

use std::sync::Arc;

use keyward::prelude::*;
use keyward::storage::{StorageBackendKind, StorageSettings};
use tempfile::TempDir;

fn master() -> SecureBytes {
    SecureBytes::new(b"an adapter-supplied master secret")
}

fn file_config(dir: &TempDir) -> KeywardConfig {
    let mut config = KeywardConfig::default();
    config.storage = StorageSettings {
        backend: StorageBackendKind::File {
            path: Some(dir.path().join("keys")),
        },
    };
    config
}

fn open_service(dir: &TempDir) -> KeyService {
    KeyService::new(file_config(dir), Arc::new(AeadEngine::new()), &master()).unwrap()
}

#[test]
fn test_rotation_survives_restart() {
    let dir = TempDir::new().unwrap();

    let (old_envelope, old_bytes) = {
        let service = open_service(&dir);
        let lineage = service.keyring().lineage("documents").unwrap();
        lineage.rotate_generated().unwrap();
        let envelope = lineage.encrypt(b"quarterly report").unwrap();
        let bytes = envelope.to_bytes().unwrap();
        lineage.rotate_generated().unwrap();
        (envelope, bytes)
    };

    let service = open_service(&dir);
    assert_eq!(service.keyring().names(), vec!["documents"]);
    let lineage = service.keyring().get("documents").unwrap();
    assert_eq!(lineage.current_key().unwrap().version, 2);
    assert_eq!(lineage.key_info(1).unwrap().status, KeyStatus::Deprecated);

    let parsed = Envelope::from_bytes(&old_bytes).unwrap();
    assert_eq!(parsed, old_envelope);
    assert_eq!(service.keyring().decrypt(&parsed).unwrap(), b"quarterly report");
}

#[test]
fn test_reencrypt_then_purge() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);
    let lineage = service.keyring().lineage("mail").unwrap();
    lineage.rotate_generated().unwrap();

    let items: Vec<ReencryptItem> = (0..20)
        .map(|i| {
            let envelope = lineage.encrypt(format!("message {}", i).as_bytes()).unwrap();
            lineage.track(&format!("msg-{}", i), &envelope.metadata).unwrap();
            ReencryptItem::from_envelope(format!("msg-{}", i), envelope)
        })
        .collect();

    lineage.rotate_generated().unwrap();
    assert!(matches!(
        lineage.purge(1),
        Err(CryptoError::VersionInUse { references: 20, .. })
    ));

    let result = lineage.reencrypt(items, &CancellationToken::new()).unwrap();
    assert!(result.is_complete_success());
    assert_eq!(result.processed_count, 20);
    for (i, done) in result.reencrypted.iter().enumerate() {
        assert_eq!(done.id, format!("msg-{}", i));
        assert_eq!(done.envelope.metadata.key_version, 2);
        assert_eq!(
            lineage.decrypt(&done.envelope).unwrap(),
            format!("message {}", i).into_bytes()
        );
    }

    let purged = lineage.purge(1).unwrap();
    assert_eq!(purged.status, KeyStatus::Revoked);

    // Revoked records keep their metadata but no material
    assert!(service.storage().retrieve("mail/v1").unwrap().is_empty());

    drop(lineage);
    drop(service);
    let reopened = open_service(&dir);
    let lineage = reopened.keyring().get("mail").unwrap();
    assert_eq!(lineage.key_info(1).unwrap().status, KeyStatus::Revoked);
    assert_eq!(lineage.current_key().unwrap().version, 2);
}

#[test]
fn test_wrong_master_secret_cannot_open_store() {
    let dir = TempDir::new().unwrap();
    {
        let service = open_service(&dir);
        service.keyring().lineage("vault").unwrap().rotate_generated().unwrap();
    }

    let result = KeyService::new(
        file_config(&dir),
        Arc::new(AeadEngine::new()),
        &SecureBytes::new(b"some other master secret entirely"),
    );
    assert!(matches!(result, Err(CryptoError::IntegrityViolation { .. })));
}

#[test]
fn test_sidecar_metadata_workflow() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);
    service.keyring().lineage("blobs").unwrap().rotate_generated().unwrap();

    let envelope = service.keyring().encrypt("blobs", b"large object").unwrap();
    let sidecar = envelope.metadata.to_json().unwrap();
    let ciphertext = envelope.ciphertext.clone();

    let rebuilt = Envelope::new(EncryptedDataMetadata::from_json(&sidecar).unwrap(), ciphertext);
    assert_eq!(service.keyring().decrypt(&rebuilt).unwrap(), b"large object");
}

#[test]
fn test_key_ages_report() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);
    let lineage = service.keyring().lineage("audit").unwrap();
    lineage.rotate_generated().unwrap();
    lineage.rotate_generated().unwrap();

    let ages = lineage.key_ages();
    assert_eq!(ages.len(), 2);
    assert_eq!(ages[0].status, KeyStatus::Deprecated);
    assert_eq!(ages[1].status, KeyStatus::Active);
    assert!(ages.iter().all(|age| !age.needs_rotation));
    assert!(!lineage.needs_rotation());
}

#[test]
fn test_derived_keys_feed_rotation() {
    let dir = TempDir::new().unwrap();
    let mut config = file_config(&dir);
    config.derivation.default_params =
        DerivationParams::pbkdf2(DerivationAlgorithm::Pbkdf2HmacSha256, 10_000, 16, 32).unwrap();
    let service = KeyService::new(config, Arc::new(AeadEngine::new()), &master()).unwrap();

    let derived = service.derive_for("operator", b"passphrase", None).unwrap();
    let (material, _, _) = derived.into_parts();
    let lineage = service.keyring().lineage("derived").unwrap();
    let info = lineage.rotate(material).unwrap();
    assert_eq!(info.version, 1);

    let envelope = lineage.encrypt(b"sealed with a derived key").unwrap();
    assert_eq!(lineage.decrypt(&envelope).unwrap(), b"sealed with a derived key");
}
