//! Error types for object store operations

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use thiserror::Error;

/// Result type alias for object store operations
pub type S3Result<T> = Result<T, S3Error>;

/// Errors that can occur while talking to an object store
#[derive(Error, Debug, Clone)]
pub enum S3Error {
    /// Request could not be built or sent for a reason the SDK does not classify
    #[error("AWS SDK error: {0}")]
    Sdk(String),

    /// Store rejected the request with an error code
    #[error("S3 service error ({code}): {message}")]
    Service { code: String, message: String },

    /// Object or bucket does not exist
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Client settings rejected before any request
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Response body could not be read
    #[error("Failed to read object body: {0}")]
    Body(String),

    /// Body stream could not be closed
    #[error("Failed to close object body: {0}")]
    Close(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl S3Error {
    /// Whether a scheduler re-invoking later could reasonably succeed.
    ///
    /// Reported in logs only; nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            S3Error::Network(_) | S3Error::Timeout(_) | S3Error::Body(_) => true,
            S3Error::Service { code, .. } => is_retryable_code(code),
            _ => false,
        }
    }

    /// Classify a service error by its S3 error code
    fn from_service(code: Option<&str>, message: Option<&str>) -> Self {
        let message = message.unwrap_or("no message").to_string();
        match code {
            Some("AccessDenied") => S3Error::AccessDenied(message),
            Some(code) => S3Error::Service {
                code: code.to_string(),
                message,
            },
            None => S3Error::Service {
                code: "Unknown".to_string(),
                message,
            },
        }
    }
}

/// Check if an S3 error code is worth a later re-run
pub(crate) fn is_retryable_code(code: &str) -> bool {
    matches!(
        code,
        "RequestTimeout" | "ServiceUnavailable" | "InternalError" | "SlowDown"
    )
}

impl<E> From<SdkError<E>> for S3Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    fn from(error: SdkError<E>) -> Self {
        match error {
            SdkError::DispatchFailure(e) => {
                S3Error::Network(format!("Network dispatch failure: {:?}", e))
            }
            SdkError::TimeoutError(e) => S3Error::Timeout(format!("{:?}", e)),
            SdkError::ResponseError(e) => S3Error::Network(format!("Response error: {:?}", e)),
            SdkError::ServiceError(context) => {
                let err = context.err();
                S3Error::from_service(err.code(), err.message())
            }
            other => S3Error::Sdk(other.to_string()),
        }
    }
}
