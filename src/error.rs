/*!
 * Error types for bundle-relay
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::encryption::CryptoError;
use crate::protocol::s3::S3Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_TRANSFER_FAILED: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or invalid setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pattern file could not be read or parsed
    #[error("Failed to load pattern file '{path}': {reason}")]
    PatternLoad { path: PathBuf, reason: String },

    /// Pattern file contained an expression that does not compile
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// Tags of the source object could not be read; nothing can be decided
    #[error("Failed to fetch tags for {object}: {source}")]
    TagFetch { object: String, source: S3Error },

    /// Object store operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] S3Error),

    /// Encryption transform failed
    #[error("Encryption error: {0}")]
    Encryption(#[from] CryptoError),

    /// A scoped payload stream could not be released
    #[error("Failed to release payload stream for {key}: {reason}")]
    Release { key: String, reason: String },
}

impl RelayError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            EXIT_FATAL
        } else {
            EXIT_TRANSFER_FAILED
        }
    }

    /// Fatal errors abort the invocation before any transfer is attempted
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::Config(_)
                | RelayError::PatternLoad { .. }
                | RelayError::InvalidPattern { .. }
                | RelayError::TagFetch { .. }
        )
    }

    /// Whether re-invoking later could succeed; reported in logs only
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Storage(e) => e.is_retryable(),
            RelayError::Release { .. } => true,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::Config(_)
            | RelayError::PatternLoad { .. }
            | RelayError::InvalidPattern { .. } => ErrorCategory::Configuration,
            RelayError::TagFetch { .. } | RelayError::Storage(_) => ErrorCategory::Transfer,
            RelayError::Encryption(_) => ErrorCategory::Encryption,
            RelayError::Release { .. } => ErrorCategory::Cleanup,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing settings or unreadable pattern files
    Configuration,
    /// Object store reads, writes and deletes
    Transfer,
    /// Encryption transform failures
    Encryption,
    /// Stream release failures
    Cleanup,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Transfer => write!(f, "transfer"),
            ErrorCategory::Encryption => write!(f, "encryption"),
            ErrorCategory::Cleanup => write!(f, "cleanup"),
        }
    }
}
