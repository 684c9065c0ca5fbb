//! Blob listing models, blob name checks and upload naming.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AdapterError;

/// Literal content of the test blob created by `POST /azblob`.
pub const TEST_PAYLOAD: &[u8] = b"hello world this is a blob\n";

/// Every blob name in the configured container, as returned by `GET /azblob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobListing {
    #[serde(rename = "Container")]
    pub container: String,
    #[serde(rename = "Blobs")]
    pub blobs: Vec<String>,
}

/// One page of a flat blob listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListBlobsSegment {
    /// Blob names in the order the service returned them.
    pub blobs: Vec<String>,
    /// Opaque continuation token; `None` once the listing is exhausted.
    pub next_marker: Option<String>,
}

impl ListBlobsSegment {
    /// Returns whether this is the final page.
    pub fn is_last(&self) -> bool {
        self.next_marker.is_none()
    }
}

/// Longest blob name the service accepts, in characters.
pub const MAX_BLOB_NAME_LENGTH: usize = 1024;

/// Checks that `name` addresses a blob inside the container.
///
/// URL resolution collapses `.` and `..` segments and an empty segment addresses a
/// different resource, so any of them would let the request escape the container.
pub fn validate_blob_name(name: &str) -> Result<(), AdapterError> {
    let invalid = |reason| AdapterError::InvalidBlobName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.chars().count() > MAX_BLOB_NAME_LENGTH {
        return Err(invalid("must be at most 1024 characters"));
    }
    if name
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid("must not contain empty, '.' or '..' path segments"));
    }
    Ok(())
}

/// Generates the name of an uploaded test blob.
///
/// The name is a non-negative decimal integer: the 128 bits of a random UUIDv4, which
/// keeps near-simultaneous uploads from colliding.
pub fn generate_file_name() -> String {
    Uuid::new_v4().as_u128().to_string()
}
