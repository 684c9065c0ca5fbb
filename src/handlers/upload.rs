//! POST /azblob - upload a fixed-content test blob.

use axum::{http::StatusCode, response::Response};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{Config, UploadOptions};
use crate::error::{AdapterError, AdapterResult};
use crate::models::{generate_file_name, split_blocks, BlockId, MAX_BLOCK_COUNT, TEST_PAYLOAD};
use crate::session::ClientSession;
use crate::storage::BlobStore;

use super::message_response;

/// Uploads a local file as a block blob.
///
/// Blocks are staged with at most `options.parallelism` requests in flight and then
/// committed in file order. Returns the number of bytes uploaded. A file that would
/// need more than [`MAX_BLOCK_COUNT`] blocks is rejected before anything is staged.
pub async fn upload_file_to_block_blob(
    store: &dyn BlobStore,
    path: &Path,
    blob: &str,
    options: UploadOptions,
) -> AdapterResult<u64> {
    let data = Bytes::from(tokio::fs::read(path).await?);
    let size = data.len() as u64;
    let blocks = split_blocks(data, options.block_size);
    if blocks.len() > MAX_BLOCK_COUNT {
        return Err(AdapterError::TooManyBlocks {
            blocks: blocks.len(),
            limit: MAX_BLOCK_COUNT,
        });
    }
    debug!(blob, size, blocks = blocks.len(), "staging blocks");

    let puts: Vec<_> = blocks
        .iter()
        .map(|block| store.put_block(blob, block))
        .collect();
    let mut staged = stream::iter(puts).buffer_unordered(options.parallelism.max(1));
    while let Some(result) = staged.next().await {
        result?;
    }
    drop(staged);

    let ids: Vec<BlockId> = blocks.into_iter().map(|block| block.id).collect();
    store.put_block_list(blob, &ids).await?;
    Ok(size)
}

/// Handles `POST /azblob`.
///
/// The payload is written to a scratch file inside a fresh temporary directory, which
/// is removed once the upload finishes or fails.
pub async fn upload_test_blob(session: &ClientSession, config: &Config) -> AdapterResult<Response> {
    info!("Creating a dummy file to test the upload and download");
    let file_name = generate_file_name();

    let scratch = tempfile::Builder::new()
        .prefix("azblob-")
        .tempdir_in(&config.scratch_dir)?;
    let path = scratch.path().join(&file_name);
    tokio::fs::write(&path, TEST_PAYLOAD).await?;

    info!("Uploading the file with blob name: {}", file_name);
    let size = upload_file_to_block_blob(session.store(), &path, &file_name, config.upload).await?;
    info!(blob = %file_name, size, "uploaded blob");

    if let Err(e) = scratch.close() {
        warn!(error = %e, "failed to remove scratch directory");
    }

    Ok(message_response(
        StatusCode::CREATED,
        &format!("file {} is uploaded", file_name),
    ))
}
