//! GET /azblob - list every blob in the container.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info};

use crate::error::{AdapterError, AdapterResult};
use crate::models::BlobListing;
use crate::session::ClientSession;
use crate::storage::BlobStore;

/// Follows continuation markers until the service reports the listing is complete.
///
/// Names keep service order: page by page, and within a page as returned.
pub async fn list_all_blobs(store: &dyn BlobStore, container: &str) -> AdapterResult<BlobListing> {
    let mut blobs = Vec::new();
    let mut marker: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let segment = store.list_blobs_segment(marker.as_deref()).await?;
        pages += 1;
        debug!(page = pages, count = segment.blobs.len(), "received list blobs segment");
        blobs.extend(segment.blobs);

        match segment.next_marker {
            Some(next) if marker.as_deref() == Some(next.as_str()) => {
                return Err(AdapterError::Protocol(format!(
                    "list blobs returned the same marker {next:?} twice"
                )));
            }
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    Ok(BlobListing {
        container: container.to_string(),
        blobs,
    })
}

/// Handles `GET /azblob`.
pub async fn list_blobs(session: &ClientSession) -> AdapterResult<Response> {
    info!("Listing the blobs in the container: {}", session.container());
    let listing = list_all_blobs(session.store(), session.container()).await?;
    info!(count = listing.blobs.len(), "listed blobs");
    Ok((StatusCode::OK, Json(listing)).into_response())
}
