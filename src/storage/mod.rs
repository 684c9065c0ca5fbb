//! Storage backends the adapter forwards to.

mod azure;
mod memory;

pub use azure::*;
pub use memory::*;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::error::AdapterResult;
use crate::models::{Block, BlockId, ListBlobsSegment};

/// Operations against the one container a session is bound to.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Creates the container.
    async fn create_container(&self) -> AdapterResult<()>;

    /// Fetches one page of a flat listing, starting at `marker`.
    async fn list_blobs_segment(&self, marker: Option<&str>) -> AdapterResult<ListBlobsSegment>;

    /// Stages one block of `blob`.
    async fn put_block(&self, blob: &str, block: &Block) -> AdapterResult<()>;

    /// Commits staged blocks of `blob` in the given order.
    async fn put_block_list(&self, blob: &str, blocks: &[BlockId]) -> AdapterResult<()>;

    /// Deletes `blob` together with all of its snapshots.
    async fn delete_blob(&self, blob: &str) -> AdapterResult<()>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn create_container(&self) -> AdapterResult<()> {
        (**self).create_container().await
    }

    async fn list_blobs_segment(&self, marker: Option<&str>) -> AdapterResult<ListBlobsSegment> {
        (**self).list_blobs_segment(marker).await
    }

    async fn put_block(&self, blob: &str, block: &Block) -> AdapterResult<()> {
        (**self).put_block(blob, block).await
    }

    async fn put_block_list(&self, blob: &str, blocks: &[BlockId]) -> AdapterResult<()> {
        (**self).put_block_list(blob, blocks).await
    }

    async fn delete_blob(&self, blob: &str) -> AdapterResult<()> {
        (**self).delete_blob(blob).await
    }
}

/// Opens a fresh [`BlobStore`] for each request.
pub trait StoreConnector: Send + Sync {
    fn open(&self, config: &Config) -> AdapterResult<Box<dyn BlobStore>>;
}

/// Connects to a storage account over its REST API.
#[derive(Debug, Clone, Default)]
pub struct AzureConnector {
    http: reqwest::Client,
}

impl AzureConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreConnector for AzureConnector {
    fn open(&self, config: &Config) -> AdapterResult<Box<dyn BlobStore>> {
        Ok(Box::new(ContainerClient::new(self.http.clone(), config)?))
    }
}

/// Hands out the same in-memory store to every request.
#[derive(Clone)]
pub struct MemoryConnector {
    store: Arc<MemoryBlobStore>,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryBlobStore>) -> Self {
        Self { store }
    }
}

impl StoreConnector for MemoryConnector {
    fn open(&self, _config: &Config) -> AdapterResult<Box<dyn BlobStore>> {
        Ok(Box::new(self.store.clone()))
    }
}
