/*!
 * Integration tests for end-to-end bundle routing against an in-memory store
 */

use bundle_relay::config::{
    PolicyFlag, RelayConfig, ENCRYPTION_EXCLUSION_FILE, TRANSFER_EXCLUSION_FILE,
};
use bundle_relay::core::encryption::{AesGcmEncryptor, CryptoError, CryptoResult, PayloadEncryptor};
use bundle_relay::core::tags::{Tag, TagSet, CAT3_BUNDLE_TAG, CAT3_BUNDLE_TAG_VALUE};
use bundle_relay::core::transfer::{CleanupStatus, TransferOrchestrator, TransferOutcome};
use bundle_relay::core::RoutingAction;
use bundle_relay::error::RelayError;
use bundle_relay::logging::init_test_logging;
use bundle_relay::protocol::s3::{MemoryStore, ObjectRef, StoreOp};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const KEY: [u8; 32] = [42u8; 32];

/// Always fails, standing in for a broken transform
struct FailingEncryptor;

impl PayloadEncryptor for FailingEncryptor {
    fn encrypt(&self, _plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        Err(CryptoError::EncryptionFailed("hardware module unavailable".to_string()))
    }
}

struct Harness {
    patterns: TempDir,
    source: MemoryStore,
    cat2: MemoryStore,
    orchestrator: TransferOrchestrator,
}

fn write_patterns(transfer: &str, encryption: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(TRANSFER_EXCLUSION_FILE), transfer).unwrap();
    fs::write(dir.path().join(ENCRYPTION_EXCLUSION_FILE), encryption).unwrap();
    dir
}

fn config(policy: &str, patterns: &TempDir) -> RelayConfig {
    RelayConfig {
        policy_flag: PolicyFlag::new(policy),
        cat2_bucket: Some("cat2-bucket".to_string()),
        voltron_bucket: Some("voltron-bucket".to_string()),
        voltron_prefix: Some("incoming/bundles/".to_string()),
        pattern_dir: patterns.path().to_path_buf(),
        ..Default::default()
    }
}

fn harness_with(
    config_fn: impl FnOnce(&TempDir) -> RelayConfig,
    encryptor: Option<Arc<dyn PayloadEncryptor>>,
    chunk_size: usize,
) -> Harness {
    init_test_logging();
    let patterns = write_patterns(r#"[".*\\.tmp", "manifest\\.json"]"#, r#"[".*\\.gpg"]"#);
    let source = MemoryStore::new().with_chunk_size(chunk_size);
    let cat2 = MemoryStore::new();

    let mut orchestrator = TransferOrchestrator::new(
        config_fn(&patterns),
        Arc::new(source.clone()),
        Arc::new(cat2.clone()),
    );
    if let Some(encryptor) = encryptor {
        orchestrator = orchestrator.with_encryptor(encryptor);
    }

    Harness {
        patterns,
        source,
        cat2,
        orchestrator,
    }
}

fn harness(policy: &str) -> Harness {
    harness_with(
        |dir| config(policy, dir),
        Some(Arc::new(AesGcmEncryptor::new(&KEY).unwrap())),
        64 * 1024,
    )
}

#[tokio::test]
async fn test_voltron_bundle_moved_and_source_deleted() {
    let h = harness("VOLTRON_COPY");
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    h.source.insert(source.clone(), b"id,value\n1,2\n".to_vec(), TagSet::new());

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(
        report.outcome.to_string(),
        "Success: Bundle Encrypted and Moved to Voltron Bucket"
    );
    assert_eq!(report.action, RoutingAction::RouteToPrimaryDestination);
    assert_eq!(report.source_cleanup, CleanupStatus::Deleted);
    assert!(!h.source.contains(&source));

    let destination = ObjectRef::new("voltron-bucket", "incoming/bundles/file.csv");
    assert_eq!(report.destination.as_ref(), Some(&destination));
    let stored = h.source.get(&destination).unwrap();
    assert_eq!(&stored.data[..], b"id,value\n1,2\n");
    assert_eq!(stored.metadata.content_length, 13);
    assert!(stored.tags.exists(CAT3_BUNDLE_TAG, CAT3_BUNDLE_TAG_VALUE));
    assert!(h.cat2.keys("cat2-bucket").is_empty());
}

#[tokio::test]
async fn test_voltron_upload_failure_leaves_source() {
    let h = harness("VOLTRON_COPY");
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    h.source.fail_on(StoreOp::PutObject);

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(
        report.outcome.to_string(),
        "Failure: Bundle Failed During Encryption / Move to Voltron Bucket"
    );
    assert_eq!(report.source_cleanup, CleanupStatus::NotAttempted);
    assert!(h.source.contains(&source));
    assert_eq!(h.source.open_bodies(), 0);
}

#[tokio::test]
async fn test_voltron_download_failure_leaves_source() {
    let h = harness("VOLTRON_COPY");
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    h.source.fail_on(StoreOp::GetObject);

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(report.outcome, TransferOutcome::PrimaryFailure);
    assert!(h.source.contains(&source));
    assert_eq!(h.source.keys("voltron-bucket"), Vec::<String>::new());
}

#[tokio::test]
async fn test_voltron_delete_failure_is_reported_separately() {
    let h = harness("VOLTRON_COPY");
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    h.source.fail_on(StoreOp::DeleteObject);

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(report.outcome, TransferOutcome::PrimarySuccess);
    assert!(matches!(report.source_cleanup, CleanupStatus::Failed(_)));
    // both copies remain
    assert!(h.source.contains(&source));
    assert_eq!(h.source.keys("voltron-bucket"), vec!["incoming/bundles/file.csv"]);
}

#[tokio::test]
async fn test_voltron_route_never_calls_encryptor() {
    let h = harness_with(|dir| config("VOLTRON_COPY", dir), Some(Arc::new(FailingEncryptor)), 4);
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    h.source.insert(source.clone(), b"id,value\n1,2\n".to_vec(), TagSet::new());

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(report.outcome, TransferOutcome::PrimarySuccess);
    assert!(!report.encrypted);
    assert_eq!(report.source_cleanup, CleanupStatus::Deleted);
    assert!(!h.source.contains(&source));

    let destination = ObjectRef::new("voltron-bucket", "incoming/bundles/file.csv");
    assert_eq!(&h.source.get(&destination).unwrap().data[..], b"id,value\n1,2\n");
}

#[tokio::test]
async fn test_voltron_marker_not_duplicated() {
    let h = harness("VOLTRON_COPY");
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    let tags = TagSet::from(vec![Tag::cat3_bundle_marker(), Tag::new("owner", "imaging")]);
    h.source.insert(source.clone(), b"payload".to_vec(), tags);

    h.orchestrator.run(&source).await.unwrap();

    let destination = ObjectRef::new("voltron-bucket", "incoming/bundles/file.csv");
    let stored = h.source.get(&destination).unwrap();
    let markers = stored
        .tags
        .iter()
        .filter(|t| t.key == CAT3_BUNDLE_TAG)
        .count();
    assert_eq!(markers, 1);
    assert!(stored.tags.exists("owner", "imaging"));
}

#[tokio::test]
async fn test_processed_bundle_takes_no_action() {
    let h = harness("CAT2_COPY");
    let source = ObjectRef::new("landing", "OTHER/file.csv");
    let tags = TagSet::from(vec![Tag::new("VOLTRON-PROCESSING", "SUCCESS")]);
    h.source.insert(source.clone(), b"payload".to_vec(), tags);
    h.source.fail_on(StoreOp::GetObject);

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(report.outcome.to_string(), "No Action Taken.");
    assert!(h.source.contains(&source));
    assert!(h.cat2.keys("cat2-bucket").is_empty());
}

#[tokio::test]
async fn test_excluded_name_takes_no_action() {
    let h = harness("CAT2_COPY");
    let source = ObjectRef::new("landing", "OTHER/ignored.tmp");
    h.source.insert(source.clone(), b"scratch".to_vec(), TagSet::new());

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(report.outcome, TransferOutcome::NoActionTaken);
    assert_eq!(report.action, RoutingAction::NoAction);
    assert!(h.cat2.keys("cat2-bucket").is_empty());
    assert_eq!(h.source.open_bodies(), 0);
}

#[tokio::test]
async fn test_unknown_policy_takes_no_action() {
    let h = harness("SOMETHING_ELSE");
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());

    let report = h.orchestrator.run(&source).await.unwrap();
    assert_eq!(report.outcome, TransferOutcome::NoActionTaken);
    assert!(h.source.contains(&source));
}

#[tokio::test]
async fn test_cat2_copy_encrypts_multi_chunk_payload() {
    let h = harness_with(
        |dir| config("CAT2_COPY", dir),
        Some(Arc::new(AesGcmEncryptor::new(&KEY).unwrap())),
        7,
    );
    let source = ObjectRef::new("landing", "OTHER/nested/scan.tiff");
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let tags = TagSet::from(vec![Tag::new("owner", "imaging")]);
    h.source.insert(source.clone(), payload.clone(), tags.clone());

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(report.outcome.to_string(), "Success: Bundle Moved to CAT2 Bucket");
    assert!(report.encrypted);
    // source is kept on this route
    assert!(h.source.contains(&source));
    assert_eq!(h.source.open_bodies(), 0);

    let destination = ObjectRef::new("cat2-bucket", "ASVAWSIMAGING/CAT3_BUNDLE/scan.tiff");
    let stored = h.cat2.get(&destination).unwrap();
    assert_eq!(stored.tags, tags);
    assert_eq!(stored.metadata.content_length, stored.data.len() as u64);
    assert_eq!(report.bytes_transferred, Some(stored.data.len() as u64));

    let decrypted = AesGcmEncryptor::new(&KEY).unwrap().decrypt(&stored.data).unwrap();
    assert_eq!(decrypted, payload);
}

#[tokio::test]
async fn test_cat2_already_encrypted_passes_through() {
    let h = harness("CAT2_COPY");
    let source = ObjectRef::new("landing", "OTHER/archive.gpg");
    h.source.insert(source.clone(), b"-----PGP-----".to_vec(), TagSet::new());

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(report.outcome, TransferOutcome::SecondarySuccess);
    assert!(!report.encrypted);
    let stored = h
        .cat2
        .get(&ObjectRef::new("cat2-bucket", "ASVAWSIMAGING/CAT3_BUNDLE/archive.gpg"))
        .unwrap();
    assert_eq!(&stored.data[..], b"-----PGP-----");
}

#[tokio::test]
async fn test_cat2_encryption_failure() {
    let h = harness_with(|dir| config("CAT2_COPY", dir), Some(Arc::new(FailingEncryptor)), 16);
    let source = ObjectRef::new("landing", "OTHER/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(
        report.outcome.to_string(),
        "Failure: Bundle Failed During Move to CAT2 Bucket"
    );
    assert!(h.cat2.keys("cat2-bucket").is_empty());
    assert!(h.source.contains(&source));
    assert_eq!(h.source.open_bodies(), 0);
}

#[tokio::test]
async fn test_cat2_upload_failure() {
    let h = harness("CAT2_COPY");
    let source = ObjectRef::new("landing", "OTHER/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    h.cat2.fail_on(StoreOp::PutObject);

    let report = h.orchestrator.run(&source).await.unwrap();
    assert_eq!(report.outcome, TransferOutcome::SecondaryFailure);
    assert_eq!(h.source.open_bodies(), 0);
}

#[tokio::test]
async fn test_cat2_download_failure() {
    let h = harness("CAT2_COPY");
    let source = ObjectRef::new("landing", "OTHER/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    h.source.fail_on(StoreOp::GetObject);

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(report.outcome, TransferOutcome::SecondaryFailure);
    assert_eq!(report.bytes_transferred, None);
    assert!(h.cat2.keys("cat2-bucket").is_empty());
    assert!(h.source.contains(&source));
    assert_eq!(h.source.open_bodies(), 0);
}

#[tokio::test]
async fn test_release_failure_downgrades_success() {
    let h = harness("VOLTRON_COPY");
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    h.source.fail_on(StoreOp::CloseBody);

    let report = h.orchestrator.run(&source).await.unwrap();

    assert_eq!(report.outcome, TransferOutcome::PrimaryFailure);
    assert!(h.source.contains(&source));
}

#[tokio::test]
async fn test_missing_bucket_is_fatal() {
    let h = harness_with(
        |dir| RelayConfig {
            cat2_bucket: None,
            ..config("CAT2_COPY", dir)
        },
        Some(Arc::new(AesGcmEncryptor::new(&KEY).unwrap())),
        64,
    );
    let source = ObjectRef::new("landing", "OTHER/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    h.source.fail_on(StoreOp::GetObject);

    let err = h.orchestrator.run(&source).await.unwrap_err();
    assert!(matches!(err, RelayError::Config(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_missing_voltron_settings_are_fatal_before_download() {
    let without_prefix = |dir: &TempDir| RelayConfig {
        voltron_prefix: None,
        ..config("VOLTRON_COPY", dir)
    };
    let without_bucket = |dir: &TempDir| RelayConfig {
        voltron_bucket: None,
        ..config("VOLTRON_COPY", dir)
    };

    for h in [
        harness_with(without_prefix, None, 64),
        harness_with(without_bucket, None, 64),
    ] {
        let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
        h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
        // A download attempt would surface as a failure outcome, not an error
        h.source.fail_on(StoreOp::GetObject);

        let err = h.orchestrator.run(&source).await.unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
        assert!(err.is_fatal());
        assert!(h.source.contains(&source));
        assert_eq!(h.source.open_bodies(), 0);
    }
}

#[tokio::test]
async fn test_missing_encryptor_is_fatal_before_download() {
    let h = harness_with(|dir| config("CAT2_COPY", dir), None, 64);
    let source = ObjectRef::new("landing", "OTHER/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    h.source.fail_on(StoreOp::GetObject);

    let err = h.orchestrator.run(&source).await.unwrap_err();
    assert!(matches!(err, RelayError::Config(_)));
}

#[tokio::test]
async fn test_missing_pattern_file_is_fatal() {
    let h = harness("CAT2_COPY");
    let source = ObjectRef::new("landing", "OTHER/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    fs::remove_file(h.patterns.path().join(TRANSFER_EXCLUSION_FILE)).unwrap();

    let err = h.orchestrator.run(&source).await.unwrap_err();
    assert!(matches!(err, RelayError::PatternLoad { .. }));
}

#[tokio::test]
async fn test_tag_fetch_failure_is_fatal() {
    let h = harness("VOLTRON_COPY");
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());
    h.source.fail_on(StoreOp::GetTags);

    let err = h.orchestrator.run(&source).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(h.source.contains(&source));
}

#[tokio::test]
async fn test_decide_moves_nothing() {
    let h = harness("VOLTRON_COPY");
    let source = ObjectRef::new("landing", "CAT3_BUNDLE/file.csv");
    h.source.insert(source.clone(), b"payload".to_vec(), TagSet::new());

    let (_, action) = h.orchestrator.decide(&source).await.unwrap();

    assert_eq!(action, RoutingAction::RouteToPrimaryDestination);
    assert!(h.source.contains(&source));
    assert!(h.source.keys("voltron-bucket").is_empty());
}
