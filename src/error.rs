//! Error types for the adapter and the storage service it forwards to.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::ConfigError;
use crate::handlers::message_response;

/// Azure Storage error codes the adapter recognizes.
///
/// Codes the adapter has no special handling for are kept as [`ErrorCode::Unknown`],
/// with the raw string preserved on [`StorageError::raw_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    AuthenticationFailed,
    BlobNotFound,
    ContainerAlreadyExists,
    ContainerNotFound,
    InternalError,
    InvalidBlockList,
    InvalidQueryParameterValue,
    LeaseIdMissing,
    Md5Mismatch,
    ServerBusy,
    Unknown,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AuthenticationFailed => "AuthenticationFailed",
            ErrorCode::BlobNotFound => "BlobNotFound",
            ErrorCode::ContainerAlreadyExists => "ContainerAlreadyExists",
            ErrorCode::ContainerNotFound => "ContainerNotFound",
            ErrorCode::InternalError => "InternalError",
            ErrorCode::InvalidBlockList => "InvalidBlockList",
            ErrorCode::InvalidQueryParameterValue => "InvalidQueryParameterValue",
            ErrorCode::LeaseIdMissing => "LeaseIdMissing",
            ErrorCode::Md5Mismatch => "Md5Mismatch",
            ErrorCode::ServerBusy => "ServerBusy",
            ErrorCode::Unknown => "Unknown",
        }
    }

    /// Parses a service error code as sent in `x-ms-error-code` or `<Code>`.
    pub fn parse(s: &str) -> Self {
        match s {
            "AuthenticationFailed" => ErrorCode::AuthenticationFailed,
            "BlobNotFound" => ErrorCode::BlobNotFound,
            "ContainerAlreadyExists" => ErrorCode::ContainerAlreadyExists,
            "ContainerNotFound" => ErrorCode::ContainerNotFound,
            "InternalError" => ErrorCode::InternalError,
            "InvalidBlockList" => ErrorCode::InvalidBlockList,
            "InvalidQueryParameterValue" => ErrorCode::InvalidQueryParameterValue,
            "LeaseIdMissing" => ErrorCode::LeaseIdMissing,
            "Md5Mismatch" => ErrorCode::Md5Mismatch,
            "ServerBusy" => ErrorCode::ServerBusy,
            _ => ErrorCode::Unknown,
        }
    }

    /// Returns the HTTP status the storage service answers with for this code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidBlockList
            | ErrorCode::InvalidQueryParameterValue
            | ErrorCode::Md5Mismatch => StatusCode::BAD_REQUEST,
            ErrorCode::AuthenticationFailed => StatusCode::FORBIDDEN,
            ErrorCode::BlobNotFound | ErrorCode::ContainerNotFound => StatusCode::NOT_FOUND,
            ErrorCode::ContainerAlreadyExists => StatusCode::CONFLICT,
            ErrorCode::LeaseIdMissing => StatusCode::PRECONDITION_FAILED,
            ErrorCode::ServerBusy => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError | ErrorCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::BlobNotFound => "The specified blob does not exist.",
            ErrorCode::ContainerAlreadyExists => "The specified container already exists.",
            ErrorCode::ContainerNotFound => "The specified container does not exist.",
            ErrorCode::InvalidBlockList => "The specified block list is invalid.",
            _ => "An error occurred while processing the request.",
        }
    }
}

/// Error reported by the storage service for one REST call.
#[derive(Debug, Clone, Error)]
#[error("storage service returned {status} {raw_code}: {message}")]
pub struct StorageError {
    pub status: u16,
    pub code: ErrorCode,
    /// Code exactly as the service sent it; differs from `code` only for unknown codes.
    pub raw_code: String,
    pub message: String,
}

impl StorageError {
    /// Creates a new storage error with the code's default status and message.
    pub fn new(code: ErrorCode) -> Self {
        Self {
            status: code.status_code().as_u16(),
            code,
            raw_code: code.as_str().to_string(),
            message: code.default_message().to_string(),
        }
    }

    /// Creates a new storage error with a custom message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(code)
        }
    }

    /// Builds an error from a failed service response.
    pub fn from_response(status: u16, raw_code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: ErrorCode::parse(raw_code),
            raw_code: raw_code.to_string(),
            message: message.into(),
        }
    }
}

/// Any failure while serving one `/azblob` request.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed service response: {0}")]
    Protocol(String),

    #[error("invalid blob name {name:?}: {reason}")]
    InvalidBlobName { name: String, reason: &'static str },

    #[error("file needs {blocks} blocks, more than the {limit} a block blob can hold")]
    TooManyBlocks { blocks: usize, limit: usize },

    #[error("file {name} could not be deleted: {source}")]
    DeleteFailed {
        name: String,
        #[source]
        source: Box<AdapterError>,
    },
}

impl AdapterError {
    /// Returns the service error code, if this is a service-level error.
    pub fn service_code(&self) -> Option<ErrorCode> {
        match self {
            AdapterError::Storage(e) => Some(e.code),
            AdapterError::DeleteFailed { source, .. } => source.service_code(),
            _ => None,
        }
    }

    /// Status code returned to the caller of `/azblob`.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdapterError::DeleteFailed { .. } => StatusCode::PRECONDITION_FAILED,
            AdapterError::InvalidBlobName { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::error!(status = status.as_u16(), "request failed: {}", self);
        message_response(status, &self.to_string())
    }
}

/// Swallows a "container already exists" service error; passes everything else through.
pub fn tolerate_existing_container(result: AdapterResult<()>) -> AdapterResult<()> {
    match result {
        Err(e) if e.service_code() == Some(ErrorCode::ContainerAlreadyExists) => {
            tracing::info!("Received 409. Container already exists");
            Ok(())
        }
        other => other,
    }
}

/// Result type alias for storage calls.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
