/*!
 * Transfer orchestration - one object per invocation
 *
 * Sequence: tag fetch, routing decision, then either nothing, a move to the
 * Voltron bucket (copy raw bytes, then delete the source) or a copy to the
 * CAT2 bucket (encrypt unless excluded, source kept).
 *
 * Fatal problems (missing settings, unreadable pattern files, tags that
 * cannot be read) come back as `Err`. Everything that goes wrong once a
 * transfer is in flight is folded into a failure [`TransferOutcome`].
 */

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::encryption::{EncryptionStage, PayloadEncryptor};
use super::filter::PatternSet;
use super::routing::{decide, RoutingAction};
use super::tags::{Tag, TagSet};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result, EXIT_SUCCESS, EXIT_TRANSFER_FAILED};
use crate::protocol::s3::{read_body, ObjectBody, ObjectMetadata, ObjectRef, ObjectStore};

/// Fixed key prefix for bundles written to the CAT2 bucket
pub const CAT2_KEY_PREFIX: &str = "ASVAWSIMAGING/CAT3_BUNDLE/";

/// Payloads above this many MiB are logged as large bundles
pub const LARGE_BUNDLE_THRESHOLD_MB: u64 = 500;

/// Terminal result of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    PrimarySuccess,
    PrimaryFailure,
    SecondarySuccess,
    SecondaryFailure,
    NoActionTaken,
}

impl TransferOutcome {
    /// Fixed text consumers match on
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferOutcome::PrimarySuccess => {
                "Success: Bundle Encrypted and Moved to Voltron Bucket"
            }
            TransferOutcome::PrimaryFailure => {
                "Failure: Bundle Failed During Encryption / Move to Voltron Bucket"
            }
            TransferOutcome::SecondarySuccess => "Success: Bundle Moved to CAT2 Bucket",
            TransferOutcome::SecondaryFailure => "Failure: Bundle Failed During Move to CAT2 Bucket",
            TransferOutcome::NoActionTaken => "No Action Taken.",
        }
    }

    /// `NoActionTaken` counts as success
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            TransferOutcome::PrimaryFailure | TransferOutcome::SecondaryFailure
        )
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            EXIT_SUCCESS
        } else {
            EXIT_TRANSFER_FAILED
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the source object after a Voltron copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CleanupStatus {
    NotAttempted,
    Deleted,
    Failed(String),
}

/// Everything the caller learns about one invocation
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub outcome: TransferOutcome,
    pub message: &'static str,
    pub action: RoutingAction,
    pub source: ObjectRef,
    pub destination: Option<ObjectRef>,
    pub bytes_transferred: Option<u64>,
    pub encrypted: bool,
    pub source_cleanup: CleanupStatus,
}

impl TransferReport {
    fn new(outcome: TransferOutcome, action: RoutingAction, source: &ObjectRef) -> Self {
        Self {
            outcome,
            message: outcome.as_str(),
            action,
            source: source.clone(),
            destination: None,
            bytes_transferred: None,
            encrypted: false,
            source_cleanup: CleanupStatus::NotAttempted,
        }
    }

    fn with_destination(mut self, destination: ObjectRef) -> Self {
        self.destination = Some(destination);
        self
    }

    fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes_transferred = Some(bytes);
        self
    }
}

/// Size bucket used only for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Standard,
    Large,
}

impl SizeClass {
    pub fn of(content_length: u64) -> Self {
        if content_length / 1024 / 1024 > LARGE_BUNDLE_THRESHOLD_MB {
            SizeClass::Large
        } else {
            SizeClass::Standard
        }
    }
}

/// Destination key on the CAT2 route
pub fn cat2_destination_key(source_key: &str) -> String {
    format!("{}{}", CAT2_KEY_PREFIX, crate::core::filter::file_name(source_key))
}

/// Destination key on the Voltron route: prefix and file name joined, runs of
/// `/` collapsed and any trailing `/` dropped
pub fn voltron_destination_key(prefix: &str, file_name: &str) -> String {
    let joined = format!("{}{}", prefix, file_name);
    let mut normalized = String::with_capacity(joined.len());
    for c in joined.chars() {
        if c == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(c);
    }
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Drives a single object through decision and transfer
pub struct TransferOrchestrator {
    config: RelayConfig,
    source_store: Arc<dyn ObjectStore>,
    cat2_store: Arc<dyn ObjectStore>,
    encryptor: Option<Arc<dyn PayloadEncryptor>>,
}

impl TransferOrchestrator {
    /// `source_store` serves reads, deletes and Voltron writes;
    /// `cat2_store` receives CAT2 writes
    pub fn new(
        config: RelayConfig,
        source_store: Arc<dyn ObjectStore>,
        cat2_store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            source_store,
            cat2_store,
            encryptor: None,
        }
    }

    pub fn with_encryptor(mut self, encryptor: Arc<dyn PayloadEncryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Fetch tags and decide, without moving anything
    pub async fn decide(&self, source: &ObjectRef) -> Result<(TagSet, RoutingAction)> {
        let tags = self
            .source_store
            .get_tags(source)
            .await
            .map_err(|e| RelayError::TagFetch {
                object: source.to_string(),
                source: e,
            })?;

        if tags.is_empty() {
            info!(object = %source, "Bundle has no tags");
        } else {
            for tag in tags.iter() {
                info!(object = %source, tag = %tag, "Bundle tag present");
            }
        }

        let exclusions = PatternSet::load(&self.config.transfer_exclusion_path())?;
        if let Some(pattern) = exclusions.matching_pattern(&source.key) {
            info!(object = %source, pattern, "Bundle matches a transfer-exclusion pattern");
        }

        let action = decide(&source.key, &tags, &self.config.policy_flag, &exclusions);
        info!(
            object = %source,
            policy = %self.config.policy_flag,
            action = %action,
            "Routing decision made"
        );
        Ok((tags, action))
    }

    /// Run the whole pipeline for `source`
    #[tracing::instrument(name = "relay", skip(self, source), fields(object = %source))]
    pub async fn run(&self, source: &ObjectRef) -> Result<TransferReport> {
        let (tags, action) = self.decide(source).await?;

        let report = match action {
            RoutingAction::NoAction => {
                TransferReport::new(TransferOutcome::NoActionTaken, action, source)
            }
            RoutingAction::RouteToPrimaryDestination => {
                self.move_to_voltron(source, &tags).await?
            }
            RoutingAction::RouteToSecondaryDestination => {
                self.copy_to_cat2(source, &tags).await?
            }
        };

        info!(outcome = %report.outcome, "Invocation finished");
        Ok(report)
    }

    async fn move_to_voltron(&self, source: &ObjectRef, tags: &TagSet) -> Result<TransferReport> {
        let action = RoutingAction::RouteToPrimaryDestination;
        let bucket = self.config.voltron_bucket()?;
        let prefix = self.config.voltron_prefix()?;
        let destination = ObjectRef::new(
            bucket,
            voltron_destination_key(prefix, source.file_name()),
        );
        let tags = tags.with_tag(Tag::cat3_bundle_marker());

        info!(destination = %destination, "Beginning copy to Voltron staging folder");

        let bytes = match self.copy_raw(source, &destination, &tags).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(
                    destination = %destination,
                    category = %e.category(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Bundle move to Voltron bucket failed; source left in place"
                );
                return Ok(TransferReport::new(TransferOutcome::PrimaryFailure, action, source)
                    .with_destination(destination));
            }
        };
        info!(destination = %destination, bytes, "Bundle copied to Voltron bucket");

        let cleanup = match self.source_store.delete_object(source).await {
            Ok(()) => {
                info!("Source bundle deleted");
                CleanupStatus::Deleted
            }
            Err(e) => {
                error!(
                    cleanup_failed = true,
                    destination = %destination,
                    error = %e,
                    "Bundle copied but source could not be deleted; both copies now exist"
                );
                CleanupStatus::Failed(e.to_string())
            }
        };

        let mut report = TransferReport::new(TransferOutcome::PrimarySuccess, action, source)
            .with_destination(destination)
            .with_bytes(bytes);
        report.source_cleanup = cleanup;
        Ok(report)
    }

    /// Download the source and upload it unchanged; the body is closed on every path
    async fn copy_raw(
        &self,
        source: &ObjectRef,
        destination: &ObjectRef,
        tags: &TagSet,
    ) -> Result<u64> {
        let mut body = self.source_store.get_object(source).await?;
        let read = read_body(body.as_mut()).await;
        let released = release(source, body.as_mut()).await;
        let payload = read?;
        released?;

        let len = payload.len() as u64;
        log_size_class(source, len);
        self.source_store
            .put_object(destination, &payload, &ObjectMetadata::with_length(len), tags)
            .await?;
        Ok(len)
    }

    async fn copy_to_cat2(&self, source: &ObjectRef, tags: &TagSet) -> Result<TransferReport> {
        let action = RoutingAction::RouteToSecondaryDestination;
        let bucket = self.config.cat2_bucket()?;
        let exclusions = PatternSet::load(&self.config.encryption_exclusion_path())?;
        let stage = EncryptionStage::new(&exclusions, self.encryptor.as_deref());
        if !stage.is_excluded(source) && self.encryptor.is_none() {
            return Err(RelayError::Config(
                "no encryption key configured for the CAT2 route".to_string(),
            ));
        }
        let destination = ObjectRef::new(bucket, cat2_destination_key(&source.key));

        info!(destination = %destination, "Beginning encryption and CAT2 transfer");

        match self.encrypt_and_upload(source, &destination, tags, &stage).await {
            Ok((bytes, encrypted)) => {
                info!(destination = %destination, bytes, encrypted, "Bundle copied to CAT2 bucket");
                let mut report =
                    TransferReport::new(TransferOutcome::SecondarySuccess, action, source)
                        .with_destination(destination)
                        .with_bytes(bytes);
                report.encrypted = encrypted;
                Ok(report)
            }
            Err(e) => {
                warn!(
                    destination = %destination,
                    category = %e.category(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Bundle copy to CAT2 bucket failed"
                );
                Ok(TransferReport::new(TransferOutcome::SecondaryFailure, action, source)
                    .with_destination(destination))
            }
        }
    }

    async fn encrypt_and_upload(
        &self,
        source: &ObjectRef,
        destination: &ObjectRef,
        tags: &TagSet,
        stage: &EncryptionStage<'_>,
    ) -> Result<(u64, bool)> {
        let mut body = self.source_store.get_object(source).await?;
        let uploaded = self
            .upload_prepared(source, destination, tags, stage, body.as_mut())
            .await;
        let released = release(source, body.as_mut()).await;

        match (uploaded, released) {
            (Ok(done), Ok(())) => Ok(done),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                debug!(error = %release_err, "Release also failed after transfer error");
                Err(e)
            }
            (Ok(_), Err(release_err)) => Err(release_err),
        }
    }

    async fn upload_prepared(
        &self,
        source: &ObjectRef,
        destination: &ObjectRef,
        tags: &TagSet,
        stage: &EncryptionStage<'_>,
        body: &mut dyn ObjectBody,
    ) -> Result<(u64, bool)> {
        let payload = stage.prepare(source, body).await?;
        let len = payload.len() as u64;
        log_size_class(source, len);

        // Borrowed so the plaintext buffer is wiped when `payload` drops
        self.cat2_store
            .put_object(destination, &payload.bytes, &ObjectMetadata::with_length(len), tags)
            .await?;
        Ok((len, payload.encrypted))
    }
}

/// Close a payload stream, mapping failure to a release error
async fn release(object: &ObjectRef, body: &mut dyn ObjectBody) -> Result<()> {
    body.close().await.map_err(|e| {
        error!(object = %object, error = %e, "Failed to release payload stream");
        RelayError::Release {
            key: object.key.clone(),
            reason: e.to_string(),
        }
    })
}

fn log_size_class(object: &ObjectRef, content_length: u64) {
    let size_mb = content_length / 1024 / 1024;
    match SizeClass::of(content_length) {
        SizeClass::Large => info!(
            object = %object,
            size_mb,
            threshold_mb = LARGE_BUNDLE_THRESHOLD_MB,
            "Large bundle"
        ),
        SizeClass::Standard => debug!(object = %object, size_mb, "Bundle size within threshold"),
    }
}
