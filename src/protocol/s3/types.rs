//! Type definitions for object store operations

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Bucket name
    pub bucket: String,

    /// Object key (path within bucket)
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Base file name of the key
    pub fn file_name(&self) -> &str {
        crate::core::filter::file_name(&self.key)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Metadata written alongside a destination object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Content length in bytes
    pub content_length: u64,
}

impl ObjectMetadata {
    pub fn with_length(content_length: u64) -> Self {
        Self { content_length }
    }
}
