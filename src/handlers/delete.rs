//! DELETE /azblob?filename=<name> - delete a blob and its snapshots.

use axum::{http::StatusCode, response::Response};
use tracing::{info, warn};

use crate::error::{AdapterError, AdapterResult};
use crate::models::validate_blob_name;
use crate::session::ClientSession;

use super::message_response;

/// Handles `DELETE /azblob`.
///
/// An empty name addresses no blob, so nothing is sent to the service. A name that
/// would resolve outside the container is rejected up front. Every failure of the
/// delete itself, a missing blob included, is reported as
/// [`AdapterError::DeleteFailed`].
pub async fn delete_blob(session: &ClientSession, file_name: &str) -> AdapterResult<Response> {
    info!("Deleting the file with blob name: {}", file_name);

    if file_name.is_empty() {
        warn!("delete requested without a filename; nothing to delete");
    } else {
        validate_blob_name(file_name)?;
        session
            .store()
            .delete_blob(file_name)
            .await
            .map_err(|e| AdapterError::DeleteFailed {
                name: file_name.to_string(),
                source: Box::new(e),
            })?;
    }

    Ok(message_response(
        StatusCode::OK,
        &format!("file {} is deleted", file_name),
    ))
}
