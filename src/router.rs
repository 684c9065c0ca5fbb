//! Request routing for the `/azblob` endpoint.

use axum::{
    extract::State,
    http::{Method, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AdapterResult;
use crate::handlers;
use crate::session::ClientSession;
use crate::storage::StoreConnector;

/// Application state shared between handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub connector: Arc<dyn StoreConnector>,
}

/// Creates the router for the adapter.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/azblob", any(azblob_handler))
        .fallback(fallback_handler)
        .with_state(state)
}

/// Dispatches `/azblob` on the HTTP method.
async fn azblob_handler(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    let span = info_span!("azblob", request_id = %Uuid::new_v4(), method = %method);

    async move {
        let result = match method {
            Method::GET => list(&state).await,
            Method::POST => upload(&state).await,
            Method::DELETE => {
                let file_name = query_param(&uri, "filename").unwrap_or_default();
                delete(&state, &file_name).await
            }
            _ => return handlers::not_found(),
        };
        result.unwrap_or_else(IntoResponse::into_response)
    }
    .instrument(span)
    .await
}

async fn fallback_handler() -> Response {
    handlers::not_found()
}

async fn open_session(state: &AppState) -> AdapterResult<ClientSession> {
    ClientSession::open(&state.config, state.connector.as_ref()).await
}

async fn list(state: &AppState) -> AdapterResult<Response> {
    let session = open_session(state).await?;
    handlers::list_blobs(&session).await
}

async fn upload(state: &AppState) -> AdapterResult<Response> {
    let session = open_session(state).await?;
    handlers::upload_test_blob(&session, &state.config).await
}

async fn delete(state: &AppState, file_name: &str) -> AdapterResult<Response> {
    let session = open_session(state).await?;
    handlers::delete_blob(&session, file_name).await
}

/// Returns the first value of a query parameter, decoded.
fn query_param(uri: &Uri, name: &str) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
