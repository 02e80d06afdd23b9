//! AWS S3 implementation of [`ObjectStore`]

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as AwsS3Client;
use bytes::Bytes;
use std::time::Duration;

use super::error::{S3Error, S3Result};
use super::operations::{ObjectBody, ObjectStore};
use super::types::{ObjectMetadata, ObjectRef};
use crate::config::StoreConfig;
use crate::core::tags::{Tag, TagSet};

/// S3 client for AWS S3 and S3-compatible storage.
///
/// Not tied to a bucket; every call names its own [`ObjectRef`].
#[derive(Clone)]
pub struct S3Client {
    client: AwsS3Client,
}

impl S3Client {
    /// Create a new S3 client with the given configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bundle_relay::config::StoreConfig;
    /// use bundle_relay::protocol::s3::S3Client;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let client = S3Client::new(&StoreConfig::default()).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &StoreConfig) -> S3Result<Self> {
        validate(config)?;
        let client = Self::build_aws_client(config).await;
        Ok(Self { client })
    }

    /// Build the AWS SDK S3 client from configuration
    async fn build_aws_client(config: &StoreConfig) -> AwsS3Client {
        let region_provider = if let Some(region_str) = &config.region {
            RegionProviderChain::first_try(Region::new(region_str.clone()))
        } else {
            RegionProviderChain::default_provider()
        };

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        // Required for MinIO, LocalStack
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let timeout_config = aws_sdk_s3::config::timeout::TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(config.timeout_seconds))
            .build();
        s3_config_builder = s3_config_builder.timeout_config(timeout_config);

        AwsS3Client::from_conf(s3_config_builder.build())
    }
}

fn validate(config: &StoreConfig) -> S3Result<()> {
    if let Some(endpoint) = &config.endpoint {
        if endpoint.trim().is_empty() {
            return Err(S3Error::InvalidConfig("Endpoint cannot be empty".to_string()));
        }
    }
    if config.timeout_seconds == 0 {
        return Err(S3Error::InvalidConfig(
            "Timeout must be at least 1 second".to_string(),
        ));
    }
    Ok(())
}

/// Whether an HTTP status or S3 error code means the object is absent
fn is_missing(status: Option<u16>, code: Option<&str>) -> bool {
    status == Some(404) || matches!(code, Some("NoSuchKey" | "NoSuchBucket" | "NotFound"))
}

fn not_found_or<E>(object: &ObjectRef, e: SdkError<E>) -> S3Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = e.raw_response().map(|r| r.status().as_u16());
    let code = e.as_service_error().and_then(|s| s.code());
    if is_missing(status, code) {
        S3Error::NotFound {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
        }
    } else {
        S3Error::from(e)
    }
}

/// Body of a `GetObject` response
struct S3Body {
    stream: Option<ByteStream>,
    content_length: Option<u64>,
}

#[async_trait]
impl ObjectBody for S3Body {
    async fn next_chunk(&mut self) -> S3Result<Option<Bytes>> {
        match self.stream.as_mut() {
            Some(stream) => stream
                .try_next()
                .await
                .map_err(|e| S3Error::Body(e.to_string())),
            None => Err(S3Error::Body("stream already closed".to_string())),
        }
    }

    fn size_hint(&self) -> Option<u64> {
        self.content_length
    }

    async fn close(&mut self) -> S3Result<()> {
        // Dropping the stream returns the connection to the pool
        self.stream.take();
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn get_object(&self, object: &ObjectRef) -> S3Result<Box<dyn ObjectBody>> {
        let response = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(|e| not_found_or(object, e))?;

        let content_length = response
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        Ok(Box::new(S3Body {
            stream: Some(response.body),
            content_length,
        }))
    }

    async fn put_object(
        &self,
        object: &ObjectRef,
        body: &[u8],
        metadata: &ObjectMetadata,
        tags: &TagSet,
    ) -> S3Result<()> {
        let content_length = i64::try_from(metadata.content_length).map_err(|_| {
            S3Error::InvalidConfig(format!(
                "Content length {} out of range",
                metadata.content_length
            ))
        })?;

        let mut request = self
            .client
            .put_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .content_length(content_length)
            .body(ByteStream::from(body.to_vec()));

        if !tags.is_empty() {
            request = request.tagging(tags.to_query_string());
        }

        request.send().await.map_err(S3Error::from)?;
        Ok(())
    }

    async fn delete_object(&self, object: &ObjectRef) -> S3Result<()> {
        self.client
            .delete_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(S3Error::from)?;
        Ok(())
    }

    async fn get_tags(&self, object: &ObjectRef) -> S3Result<TagSet> {
        let response = self
            .client
            .get_object_tagging()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(|e| not_found_or(object, e))?;

        Ok(response
            .tag_set()
            .iter()
            .map(|t| Tag::new(t.key(), t.value()))
            .collect())
    }
}
