//! In-memory object store
//!
//! Backs tests and local experiments without a network. Each
//! operation can be told to fail so error paths can be driven
//! deterministically.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{S3Error, S3Result};
use super::operations::{ObjectBody, ObjectStore};
use super::types::{ObjectMetadata, ObjectRef};
use crate::core::tags::TagSet;

/// Store operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetObject,
    PutObject,
    DeleteObject,
    GetTags,
    CloseBody,
}

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub metadata: ObjectMetadata,
    pub tags: TagSet,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ObjectRef, StoredObject>,
    failures: HashSet<StoreOp>,
    open_bodies: usize,
}

/// In-memory object store; clones share the same contents
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    chunk_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            chunk_size: 64 * 1024,
        }
    }

    /// Serve bodies in chunks of `chunk_size` bytes (minimum 1)
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an object
    pub fn insert(&self, object: ObjectRef, data: impl Into<Bytes>, tags: TagSet) {
        let data = data.into();
        let stored = StoredObject {
            metadata: ObjectMetadata::with_length(data.len() as u64),
            data,
            tags,
        };
        self.lock().objects.insert(object, stored);
    }

    /// Snapshot of an object, if present
    pub fn get(&self, object: &ObjectRef) -> Option<StoredObject> {
        self.lock().objects.get(object).cloned()
    }

    pub fn contains(&self, object: &ObjectRef) -> bool {
        self.lock().objects.contains_key(object)
    }

    /// All keys currently stored in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .objects
            .keys()
            .filter(|o| o.bucket == bucket)
            .map(|o| o.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Make `op` fail until cleared
    pub fn fail_on(&self, op: StoreOp) {
        self.lock().failures.insert(op);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Bodies opened by `get_object` and not yet closed
    pub fn open_bodies(&self) -> usize {
        self.lock().open_bodies
    }

    fn check(&self, op: StoreOp, object: &ObjectRef) -> S3Result<()> {
        if self.lock().failures.contains(&op) {
            return Err(S3Error::Network(format!("injected {:?} failure for {}", op, object)));
        }
        Ok(())
    }

    fn not_found(object: &ObjectRef) -> S3Error {
        S3Error::NotFound {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
        }
    }
}

/// Body over an in-memory buffer
struct MemoryBody {
    store: MemoryStore,
    object: ObjectRef,
    data: Bytes,
    position: usize,
    closed: bool,
}

#[async_trait]
impl ObjectBody for MemoryBody {
    async fn next_chunk(&mut self) -> S3Result<Option<Bytes>> {
        if self.closed {
            return Err(S3Error::Body("stream already closed".to_string()));
        }
        if self.position >= self.data.len() {
            return Ok(None);
        }
        let end = (self.position + self.store.chunk_size).min(self.data.len());
        let chunk = self.data.slice(self.position..end);
        self.position = end;
        Ok(Some(chunk))
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    async fn close(&mut self) -> S3Result<()> {
        if !self.closed {
            self.closed = true;
            let mut state = self.store.lock();
            state.open_bodies = state.open_bodies.saturating_sub(1);
        }
        if self.store.lock().failures.contains(&StoreOp::CloseBody) {
            return Err(S3Error::Close(format!("injected close failure for {}", self.object)));
        }
        Ok(())
    }
}

impl Drop for MemoryBody {
    fn drop(&mut self) {
        if !self.closed {
            let mut state = self.store.lock();
            state.open_bodies = state.open_bodies.saturating_sub(1);
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, object: &ObjectRef) -> S3Result<Box<dyn ObjectBody>> {
        self.check(StoreOp::GetObject, object)?;
        let data = {
            let mut state = self.lock();
            let data = state
                .objects
                .get(object)
                .map(|o| o.data.clone())
                .ok_or_else(|| Self::not_found(object))?;
            state.open_bodies += 1;
            data
        };
        Ok(Box::new(MemoryBody {
            store: self.clone(),
            object: object.clone(),
            data,
            position: 0,
            closed: false,
        }))
    }

    async fn put_object(
        &self,
        object: &ObjectRef,
        body: &[u8],
        metadata: &ObjectMetadata,
        tags: &TagSet,
    ) -> S3Result<()> {
        self.check(StoreOp::PutObject, object)?;
        let stored = StoredObject {
            data: Bytes::copy_from_slice(body),
            metadata: metadata.clone(),
            tags: tags.clone(),
        };
        self.lock().objects.insert(object.clone(), stored);
        Ok(())
    }

    async fn delete_object(&self, object: &ObjectRef) -> S3Result<()> {
        self.check(StoreOp::DeleteObject, object)?;
        self.lock().objects.remove(object);
        Ok(())
    }

    async fn get_tags(&self, object: &ObjectRef) -> S3Result<TagSet> {
        self.check(StoreOp::GetTags, object)?;
        self.lock()
            .objects
            .get(object)
            .map(|o| o.tags.clone())
            .ok_or_else(|| Self::not_found(object))
    }
}
