//! `/azblob` operations.

mod delete;
mod list;
mod upload;

pub use delete::*;
pub use list::*;
pub use upload::*;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode},
};

/// Renders `{"message": "<text>"}` with `text` JSON-escaped.
pub fn message_body(text: &str) -> String {
    format!(
        r#"{{"message": {}}}"#,
        serde_json::Value::String(text.to_string())
    )
}

/// Builds a JSON `{"message": ...}` response.
pub fn message_response(status: StatusCode, text: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(message_body(text)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Response for any method the endpoint does not serve.
pub fn not_found() -> Response<Body> {
    message_response(StatusCode::NOT_FOUND, "not found")
}
