//! Blob service REST client bound to one container.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use chrono::Utc;
use md5::{Digest, Md5};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Request, Response};
use tracing::debug;
use url::Url;

use super::BlobStore;
use crate::auth::SharedKeyCredential;
use crate::config::{Config, ConfigError};
use crate::error::{AdapterError, AdapterResult, StorageError};
use crate::models::{validate_blob_name, Block, BlockId, ListBlobsSegment};
use crate::xml::{parse_error_body, parse_list_blobs, serialize_block_list};

/// Characters escaped in a blob name path. `/` is kept so virtual directories stay readable.
const BLOB_NAME: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'\\')
    .add(b'^')
    .add(b'|');

/// Per-request session against one container: account URL, credential and container.
///
/// Holds no mutable state; every call signs and sends exactly one REST request.
#[derive(Debug, Clone)]
pub struct ContainerClient {
    http: reqwest::Client,
    credential: SharedKeyCredential,
    container_url: Url,
}

impl ContainerClient {
    /// Binds a session to the configured account and container.
    pub fn new(http: reqwest::Client, config: &Config) -> AdapterResult<Self> {
        let credential = SharedKeyCredential::new(&config.account.name, &config.account.key)?;
        let container_url = config.container_url();
        let container_url = Url::parse(&container_url)
            .map_err(|_| ConfigError::InvalidEndpoint(container_url.clone()))?;

        Ok(Self {
            http,
            credential,
            container_url,
        })
    }

    /// Returns the URL of the container.
    pub fn container_url(&self) -> &Url {
        &self.container_url
    }

    /// Returns the URL of a blob in the container.
    ///
    /// Names that would resolve outside the container are rejected.
    pub fn blob_url(&self, blob: &str) -> AdapterResult<Url> {
        validate_blob_name(blob)?;
        let encoded = utf8_percent_encode(blob, BLOB_NAME).to_string();
        let url = format!("{}/{}", self.container_url.as_str().trim_end_matches('/'), encoded);
        Url::parse(&url).map_err(|e| AdapterError::Protocol(format!("invalid blob url {url:?}: {e}")))
    }

    /// Signs and sends a request, turning non-2xx answers into [`StorageError`]s.
    async fn send(&self, mut request: Request) -> AdapterResult<Response> {
        self.credential.sign(&mut request, Utc::now())?;
        debug!(method = %request.method(), url = %request.url(), "sending storage request");

        let response = self.http.execute(request).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(service_error(response).await)
        }
    }
}

/// Decodes a failed response into a service error.
///
/// The code comes from `x-ms-error-code`, falling back to the XML body (HEAD responses
/// carry no body).
async fn service_error(response: Response) -> AdapterError {
    let status = response.status().as_u16();
    let header_code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return AdapterError::Transport(e),
    };
    let (body_code, message) = parse_error_body(&body).unwrap_or_default();

    let code = header_code
        .or(Some(body_code).filter(|c| !c.is_empty()))
        .unwrap_or_else(|| "Unknown".to_string());
    let message = message.lines().next().unwrap_or_default().to_string();

    debug!(status, code = %code, "storage request failed");
    StorageError::from_response(status, &code, message).into()
}

#[async_trait]
impl BlobStore for ContainerClient {
    async fn create_container(&self) -> AdapterResult<()> {
        let mut url = self.container_url.clone();
        url.query_pairs_mut().append_pair("restype", "container");

        let request = self.http.request(Method::PUT, url).body(Bytes::new()).build()?;
        self.send(request).await?;
        Ok(())
    }

    async fn list_blobs_segment(&self, marker: Option<&str>) -> AdapterResult<ListBlobsSegment> {
        let mut url = self.container_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("restype", "container");
            query.append_pair("comp", "list");
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }

        let request = self.http.request(Method::GET, url).build()?;
        let body = self.send(request).await?.text().await?;
        parse_list_blobs(&body)
    }

    async fn put_block(&self, blob: &str, block: &Block) -> AdapterResult<()> {
        let mut url = self.blob_url(blob)?;
        url.query_pairs_mut()
            .append_pair("comp", "block")
            .append_pair("blockid", block.id.as_str());

        let content_md5 = BASE64.encode(Md5::digest(&block.data));
        let request = self
            .http
            .request(Method::PUT, url)
            .header("Content-MD5", content_md5)
            .body(block.data.clone())
            .build()?;
        self.send(request).await?;
        Ok(())
    }

    async fn put_block_list(&self, blob: &str, blocks: &[BlockId]) -> AdapterResult<()> {
        let mut url = self.blob_url(blob)?;
        url.query_pairs_mut().append_pair("comp", "blocklist");

        let request = self
            .http
            .request(Method::PUT, url)
            .header(CONTENT_TYPE, "application/xml")
            .body(serialize_block_list(blocks))
            .build()?;
        self.send(request).await?;
        Ok(())
    }

    async fn delete_blob(&self, blob: &str) -> AdapterResult<()> {
        let url = self.blob_url(blob)?;
        let request = self
            .http
            .request(Method::DELETE, url)
            .header("x-ms-delete-snapshots", "include")
            .build()?;
        self.send(request).await?;
        Ok(())
    }
}
