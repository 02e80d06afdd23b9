//! Object store traits
//!
//! The relay only needs four calls from a store, plus a streamed body with
//! an explicit, fallible close.

use async_trait::async_trait;
use bytes::Bytes;
use zeroize::Zeroizing;

use super::error::S3Result;
use super::types::{ObjectMetadata, ObjectRef};
use crate::core::tags::TagSet;

/// Streamed content of a downloaded object
#[async_trait]
pub trait ObjectBody: Send {
    /// Next chunk, or `None` at end of stream
    async fn next_chunk(&mut self) -> S3Result<Option<Bytes>>;

    /// Total length announced by the store, if known
    fn size_hint(&self) -> Option<u64> {
        None
    }

    /// Release the underlying stream
    async fn close(&mut self) -> S3Result<()>;
}

/// Narrow object store interface
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open an object for reading
    async fn get_object(&self, object: &ObjectRef) -> S3Result<Box<dyn ObjectBody>>;

    /// Write an object with metadata and tags.
    ///
    /// The payload is borrowed; the caller keeps ownership of its buffer.
    async fn put_object(
        &self,
        object: &ObjectRef,
        body: &[u8],
        metadata: &ObjectMetadata,
        tags: &TagSet,
    ) -> S3Result<()>;

    /// Delete an object
    async fn delete_object(&self, object: &ObjectRef) -> S3Result<()>;

    /// Current tags of an object
    async fn get_tags(&self, object: &ObjectRef) -> S3Result<TagSet>;
}

/// Drain a body into a buffer that is wiped when dropped.
///
/// The buffer never reallocates in place: when a chunk does not fit, the
/// contents move to a larger `Zeroizing` buffer and the old one is wiped.
pub async fn read_body(body: &mut dyn ObjectBody) -> S3Result<Zeroizing<Vec<u8>>> {
    let capacity = body
        .size_hint()
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(0);
    let mut buffer = Zeroizing::new(Vec::with_capacity(capacity));
    while let Some(chunk) = body.next_chunk().await? {
        append_wiping(&mut buffer, &chunk);
    }
    Ok(buffer)
}

fn append_wiping(buffer: &mut Zeroizing<Vec<u8>>, chunk: &[u8]) {
    let needed = buffer.len() + chunk.len();
    if needed > buffer.capacity() {
        let mut grown = Zeroizing::new(Vec::with_capacity(needed.max(buffer.capacity() * 2)));
        grown.extend_from_slice(&buffer[..]);
        *buffer = grown;
    }
    buffer.extend_from_slice(chunk);
}
