//! In-memory blob store for offline runs and tests.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as MARKER, Engine};
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::BlobStore;
use crate::error::{AdapterResult, ErrorCode, StorageError, StorageResult};
use crate::models::{Block, BlockId, ListBlobsSegment};

/// Default number of blobs per listing page, matching the service's `maxresults` default.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Store operations a fault can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateContainer,
    ListBlobs,
    PutBlock,
    PutBlockList,
    DeleteBlob,
}

/// Key type for staged blocks: (blob, block id).
type BlockKey = (Arc<str>, BlockId);

/// Single-container blob store kept in process memory.
///
/// Listing is lexicographic by blob name, paged by `page_size`, with an opaque
/// marker naming the first blob of the next page.
pub struct MemoryBlobStore {
    container: String,
    created: AtomicBool,
    /// Committed blobs, ordered by name.
    blobs: RwLock<BTreeMap<String, Bytes>>,
    /// Staged (uncommitted) blocks.
    staged: DashMap<BlockKey, Bytes>,
    page_size: usize,
    /// One-shot faults, consumed by the first matching operation.
    faults: Mutex<VecDeque<(Operation, StorageError)>>,
}

impl MemoryBlobStore {
    /// Creates a store whose container does not exist yet.
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            created: AtomicBool::new(false),
            blobs: RwLock::new(BTreeMap::new()),
            staged: DashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            faults: Mutex::new(VecDeque::new()),
        }
    }

    /// Sets the listing page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Marks the container as already created.
    pub fn with_container(self) -> Self {
        self.created.store(true, Ordering::SeqCst);
        self
    }

    /// Returns the container name.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns whether the container exists.
    pub fn container_exists(&self) -> bool {
        self.created.load(Ordering::SeqCst)
    }

    /// Makes the next `operation` fail with `error`.
    pub fn inject_fault(&self, operation: Operation, error: StorageError) {
        self.faults.lock().push_back((operation, error));
    }

    /// Stores a committed blob directly.
    pub fn insert_blob(&self, name: impl Into<String>, data: impl Into<Bytes>) {
        self.blobs.write().insert(name.into(), data.into());
    }

    /// Returns the content of a committed blob.
    pub fn get_blob(&self, name: &str) -> Option<Bytes> {
        self.blobs.read().get(name).cloned()
    }

    /// Returns all committed blob names in listing order.
    pub fn blob_names(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }

    /// Returns the number of staged, uncommitted blocks.
    pub fn staged_block_count(&self) -> usize {
        self.staged.len()
    }

    fn take_fault(&self, operation: Operation) -> StorageResult<()> {
        let mut faults = self.faults.lock();
        match faults.iter().position(|(op, _)| *op == operation) {
            Some(index) => match faults.remove(index) {
                Some((_, error)) => Err(error),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn check_container(&self) -> StorageResult<()> {
        if self.container_exists() {
            Ok(())
        } else {
            Err(StorageError::new(ErrorCode::ContainerNotFound))
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create_container(&self) -> AdapterResult<()> {
        self.take_fault(Operation::CreateContainer)?;
        if self.created.swap(true, Ordering::SeqCst) {
            return Err(StorageError::new(ErrorCode::ContainerAlreadyExists).into());
        }
        Ok(())
    }

    async fn list_blobs_segment(&self, marker: Option<&str>) -> AdapterResult<ListBlobsSegment> {
        self.take_fault(Operation::ListBlobs)?;
        self.check_container()?;

        let start = match marker {
            Some(marker) => decode_marker(marker)?,
            None => String::new(),
        };

        let blobs = self.blobs.read();
        let mut names = blobs
            .range(start..)
            .map(|(name, _)| name.clone())
            .take(self.page_size + 1);

        let page: Vec<String> = names.by_ref().take(self.page_size).collect();
        let next_marker = names.next().map(|next| MARKER.encode(next));

        Ok(ListBlobsSegment {
            blobs: page,
            next_marker,
        })
    }

    async fn put_block(&self, blob: &str, block: &Block) -> AdapterResult<()> {
        self.take_fault(Operation::PutBlock)?;
        self.check_container()?;
        self.staged
            .insert((Arc::from(blob), block.id.clone()), block.data.clone());
        Ok(())
    }

    async fn put_block_list(&self, blob: &str, blocks: &[BlockId]) -> AdapterResult<()> {
        self.take_fault(Operation::PutBlockList)?;
        self.check_container()?;

        let key: Arc<str> = Arc::from(blob);
        let mut data = BytesMut::new();
        for id in blocks {
            let block = self
                .staged
                .get(&(key.clone(), id.clone()))
                .ok_or_else(|| StorageError::new(ErrorCode::InvalidBlockList))?;
            data.extend_from_slice(block.value());
        }

        self.staged.retain(|(name, _), _| name.as_ref() != blob);
        self.blobs.write().insert(blob.to_string(), data.freeze());
        Ok(())
    }

    async fn delete_blob(&self, blob: &str) -> AdapterResult<()> {
        self.take_fault(Operation::DeleteBlob)?;
        self.check_container()?;

        match self.blobs.write().remove(blob) {
            Some(_) => Ok(()),
            None => Err(StorageError::new(ErrorCode::BlobNotFound).into()),
        }
    }
}

fn decode_marker(marker: &str) -> StorageResult<String> {
    MARKER
        .decode(marker)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| {
            StorageError::with_message(
                ErrorCode::InvalidQueryParameterValue,
                format!("Invalid marker {marker:?}"),
            )
        })
}
