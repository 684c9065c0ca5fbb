//! Common test utilities.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use azblob_adapter::config::EMULATOR_ACCOUNT_KEY;
use azblob_adapter::{AdapterServer, Config, MemoryBlobStore, MemoryConnector, StoreConnector};

pub const CONTAINER: &str = "quickstart";
pub const ACCOUNT: &str = "devstoreaccount1";

/// Adapter running on a random local port.
pub struct TestAdapter {
    pub base_url: String,
    pub scratch: tempfile::TempDir,
}

impl TestAdapter {
    /// Starts the adapter over a shared in-memory store.
    pub async fn start(store: Arc<MemoryBlobStore>) -> Self {
        Self::start_with(Arc::new(MemoryConnector::new(store)), "http://127.0.0.1:1/unused").await
    }

    /// Starts the adapter with an explicit connector and blob endpoint.
    pub async fn start_with(connector: Arc<dyn StoreConnector>, endpoint: &str) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = Config::emulator(endpoint, CONTAINER);
        config.scratch_dir = scratch.path().to_path_buf();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = AdapterServer::with_connector(config, connector);

        // Start server in background
        tokio::spawn(async move {
            server.serve(listener).await.unwrap();
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            scratch,
        }
    }

    /// Returns the URL of the adapter endpoint.
    pub fn url(&self) -> String {
        format!("{}/azblob", self.base_url)
    }

    /// Returns the entries left in the scratch directory.
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.scratch.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

/// One request received by [`MockBlobService`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct MockState {
    container_exists: bool,
    blobs: BTreeMap<String, Vec<u8>>,
    staged: HashMap<(String, String), Vec<u8>>,
    leased: HashSet<String>,
    requests: Vec<RecordedRequest>,
}

/// Minimal blob service REST endpoint for one account.
///
/// Serves container create, paged list, put block, put block list and delete under
/// `/{account}/{container}`, and records every request it sees.
#[derive(Clone)]
pub struct MockBlobService {
    state: Arc<Mutex<MockState>>,
    page_size: usize,
    pub endpoint: String,
}

impl MockBlobService {
    /// Starts the service on a random port with the given listing page size.
    pub async fn start(page_size: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let service = Self {
            state: Arc::new(Mutex::new(MockState::default())),
            page_size,
            endpoint: format!("http://127.0.0.1:{}/{}", port, ACCOUNT),
        };

        let app = Router::new()
            .fallback(handle)
            .with_state(service.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        service
    }

    pub fn create_container(&self) {
        self.state.lock().container_exists = true;
    }

    pub fn container_exists(&self) -> bool {
        self.state.lock().container_exists
    }

    pub fn insert_blob(&self, name: &str, data: &[u8]) {
        self.state.lock().blobs.insert(name.to_string(), data.to_vec());
    }

    pub fn get_blob(&self, name: &str) -> Option<Vec<u8>> {
        self.state.lock().blobs.get(name).cloned()
    }

    pub fn blob_names(&self) -> Vec<String> {
        self.state.lock().blobs.keys().cloned().collect()
    }

    /// Makes deletes of `name` fail as if the blob held an active lease.
    pub fn lease(&self, name: &str) {
        self.state.lock().leased.insert(name.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    fn container_path(&self) -> String {
        format!("/{}/{}", ACCOUNT, CONTAINER)
    }
}

fn error_response(status: StatusCode, code: &str) -> Response {
    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><Error><Code>{}</Code><Message>{} raised by mock
RequestId:00000000-0000-0000-0000-000000000000</Message></Error>"#,
        code, code
    );
    (
        status,
        [("x-ms-error-code", code), ("content-type", "application/xml")],
        body,
    )
        .into_response()
}

async fn handle(
    State(service): State<MockBlobService>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = percent_encoding::percent_decode_str(uri.path())
        .decode_utf8_lossy()
        .to_string();
    let query: HashMap<String, String> = uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let mut state = service.state.lock();
    state.requests.push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        headers: headers.clone(),
    });

    if !headers.contains_key("x-ms-version") || !shared_key_matches(&method, &uri, &headers) {
        return error_response(StatusCode::FORBIDDEN, "AuthenticationFailed");
    }

    let container_path = service.container_path();
    if path == container_path {
        match (method, query.get("comp").map(String::as_str)) {
            (Method::PUT, None) => {
                if state.container_exists {
                    return error_response(StatusCode::CONFLICT, "ContainerAlreadyExists");
                }
                state.container_exists = true;
                StatusCode::CREATED.into_response()
            }
            (Method::GET, Some("list")) => {
                if !state.container_exists {
                    return error_response(StatusCode::NOT_FOUND, "ContainerNotFound");
                }
                list_page(&state, service.page_size, query.get("marker"))
            }
            _ => error_response(StatusCode::BAD_REQUEST, "UnsupportedHttpVerb"),
        }
    } else if let Some(blob) = path.strip_prefix(&format!("{}/", container_path)) {
        let blob = blob.to_string();
        if !state.container_exists {
            return error_response(StatusCode::NOT_FOUND, "ContainerNotFound");
        }
        match (method, query.get("comp").map(String::as_str)) {
            (Method::PUT, Some("block")) => {
                let id = query.get("blockid").cloned().unwrap_or_default();
                state.staged.insert((blob, id), body.to_vec());
                StatusCode::CREATED.into_response()
            }
            (Method::PUT, Some("blocklist")) => {
                let xml = String::from_utf8_lossy(&body).to_string();
                let mut data = Vec::new();
                for id in latest_ids(&xml) {
                    match state.staged.get(&(blob.clone(), id)) {
                        Some(block) => data.extend_from_slice(block),
                        None => return error_response(StatusCode::BAD_REQUEST, "InvalidBlockList"),
                    }
                }
                state.staged.retain(|(name, _), _| *name != blob);
                state.blobs.insert(blob, data);
                StatusCode::CREATED.into_response()
            }
            (Method::DELETE, None) => {
                if !state.blobs.contains_key(&blob) {
                    return error_response(StatusCode::NOT_FOUND, "BlobNotFound");
                }
                if state.leased.contains(&blob) {
                    return error_response(StatusCode::PRECONDITION_FAILED, "LeaseIdMissing");
                }
                state.blobs.remove(&blob);
                StatusCode::ACCEPTED.into_response()
            }
            _ => error_response(StatusCode::BAD_REQUEST, "UnsupportedHttpVerb"),
        }
    } else {
        error_response(StatusCode::BAD_REQUEST, "InvalidUri")
    }
}

/// Recomputes the SharedKey signature of a request from what arrived on the wire.
fn shared_key_matches(method: &Method, uri: &Uri, headers: &HeaderMap) -> bool {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    let Some(provided) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("SharedKey "))
        .and_then(|v| v.strip_prefix(&format!("{}:", ACCOUNT)))
    else {
        return false;
    };
    if !headers.contains_key("x-ms-date") {
        return false;
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };

    let mut parts = vec![method.as_str().to_string()];
    parts.push(header("content-encoding"));
    parts.push(header("content-language"));
    let length = header("content-length");
    parts.push(if length == "0" { String::new() } else { length });
    parts.push(header("content-md5"));
    parts.push(header("content-type"));
    parts.push(String::new());
    for name in [
        "if-modified-since",
        "if-match",
        "if-none-match",
        "if-unmodified-since",
        "range",
    ] {
        parts.push(header(name));
    }

    let mut ms_headers: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value
                    .to_str()
                    .unwrap_or("")
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        })
        .collect();
    ms_headers.sort();
    let canonicalized_headers: String = ms_headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if let Some(query) = uri.query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params
                .entry(key.to_lowercase())
                .or_default()
                .push(value.into_owned());
        }
    }
    let mut canonicalized_resource = format!("/{}{}", ACCOUNT, uri.path());
    for (key, mut values) in params {
        values.sort();
        canonicalized_resource.push_str(&format!("\n{}:{}", key, values.join(",")));
    }

    let string_to_sign = format!(
        "{}\n{}{}",
        parts.join("\n"),
        canonicalized_headers,
        canonicalized_resource
    );

    let key = BASE64.decode(EMULATOR_ACCOUNT_KEY).unwrap();
    let mut mac = Hmac::<Sha256>::new_from_slice(&key).unwrap();
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes()) == provided
}

/// Renders one `EnumerationResults` page.
///
/// Markers look like `2!<index>!a+b/c=` so that they only survive a round trip when
/// query escaping and signing agree.
fn list_page(state: &MockState, page_size: usize, marker: Option<&String>) -> Response {
    let start: usize = marker
        .and_then(|m| m.split('!').nth(1))
        .and_then(|index| index.parse().ok())
        .unwrap_or(0);
    let names: Vec<&String> = state.blobs.keys().collect();
    let end = (start + page_size).min(names.len());
    let page = names.get(start..end).unwrap_or_default();

    let blobs: String = page
        .iter()
        .map(|name| {
            format!(
                "<Blob><Name>{}</Name><Properties><BlobType>BlockBlob</BlobType></Properties></Blob>",
                name.replace('&', "&amp;").replace('<', "&lt;")
            )
        })
        .collect();
    let next_marker = if end < names.len() {
        marker_for(end)
    } else {
        String::new()
    };

    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><EnumerationResults ContainerName="{}"><Blobs>{}</Blobs><NextMarker>{}</NextMarker></EnumerationResults>"#,
        CONTAINER, blobs, next_marker
    );
    (StatusCode::OK, [("content-type", "application/xml")], body).into_response()
}

/// Continuation marker naming the blob at `index`.
pub fn marker_for(index: usize) -> String {
    format!("2!{}!a+b/c=", index)
}

fn latest_ids(xml: &str) -> Vec<String> {
    xml.split("<Latest>")
        .skip(1)
        .filter_map(|part| part.split("</Latest>").next())
        .map(String::from)
        .collect()
}
