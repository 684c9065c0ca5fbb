//! SharedKey request signing for the Azure Blob Storage REST API.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Request;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use crate::config::{ConfigError, API_VERSION};
use crate::error::{AdapterError, AdapterResult};

type HmacSha256 = Hmac<Sha256>;

/// Account name plus decoded account key.
#[derive(Clone)]
pub struct SharedKeyCredential {
    account: String,
    key: Vec<u8>,
}

impl SharedKeyCredential {
    /// Creates a credential from an account name and a base64 account key.
    pub fn new(account: impl Into<String>, key: &str) -> Result<Self, ConfigError> {
        let key = BASE64.decode(key).map_err(|_| ConfigError::InvalidAccountKey)?;
        Ok(Self {
            account: account.into(),
            key,
        })
    }

    /// Stamps `x-ms-date`/`x-ms-version` and adds the `Authorization` header.
    pub fn sign(&self, request: &mut Request, now: DateTime<Utc>) -> AdapterResult<()> {
        let headers = request.headers_mut();
        headers.insert("x-ms-date", header_value(&format_http_date(&now))?);
        headers.insert("x-ms-version", HeaderValue::from_static(API_VERSION));

        let content_length = request
            .body()
            .and_then(|body| body.as_bytes())
            .map(|bytes| bytes.len() as u64);

        let string_to_sign = build_string_to_sign(
            request.method().as_str(),
            request.headers(),
            request.url(),
            &self.account,
            content_length,
        );
        let signature = self.compute_signature(&string_to_sign)?;
        tracing::trace!(string_to_sign = ?string_to_sign, "signed request");

        let authorization = format!("SharedKey {}:{}", self.account, signature);
        request
            .headers_mut()
            .insert(AUTHORIZATION, header_value(&authorization)?);
        Ok(())
    }

    /// Computes the base64 HMAC-SHA256 of `string_to_sign` under the account key.
    pub fn compute_signature(&self, string_to_sign: &str) -> AdapterResult<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| AdapterError::Protocol("Failed to create HMAC".to_string()))?;
        mac.update(string_to_sign.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .finish()
    }
}

fn header_value(value: &str) -> AdapterResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| AdapterError::Protocol(format!("invalid header value {value:?}")))
}

/// Builds the SharedKey string-to-sign for a blob service request.
pub fn build_string_to_sign(
    method: &str,
    headers: &HeaderMap,
    url: &Url,
    account: &str,
    content_length: Option<u64>,
) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };

    let mut parts = Vec::with_capacity(12);
    parts.push(method.to_uppercase());

    // Content headers, in this exact order. Content-Length is empty when zero.
    parts.push(header("content-encoding"));
    parts.push(header("content-language"));
    let length = content_length.or_else(|| header("content-length").parse().ok());
    parts.push(match length {
        Some(0) | None => String::new(),
        Some(len) => len.to_string(),
    });
    parts.push(header("content-md5"));
    parts.push(header("content-type"));

    // Date stays empty when x-ms-date is present
    if headers.contains_key("x-ms-date") {
        parts.push(String::new());
    } else {
        parts.push(header("date"));
    }

    for name in [
        "if-modified-since",
        "if-match",
        "if-none-match",
        "if-unmodified-since",
        "range",
    ] {
        parts.push(header(name));
    }

    format!(
        "{}\n{}{}",
        parts.join("\n"),
        canonicalized_headers(headers),
        canonicalized_resource(url, account)
    )
}

/// Canonicalized x-ms-* headers, each line terminated by `\n`.
fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut ms_headers: Vec<(&str, &str)> = headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str();
            if name.starts_with("x-ms-") {
                value.to_str().ok().map(|v| (name, v))
            } else {
                None
            }
        })
        .collect();
    ms_headers.sort_by(|a, b| a.0.cmp(b.0));

    let mut result = String::new();
    for (name, value) in ms_headers {
        let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
        result.push_str(name);
        result.push(':');
        result.push_str(&normalized);
        result.push('\n');
    }
    result
}

/// Canonicalized resource: `/{account}{path}` followed by sorted, decoded query parameters.
///
/// With a path-style emulator endpoint the path already starts with the account, so the
/// account appears twice (`/devstoreaccount1/devstoreaccount1/container`).
fn canonicalized_resource(url: &Url, account: &str) -> String {
    let mut resource = format!("/{}{}", account, url.path());

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url.query_pairs() {
        params
            .entry(key.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }

    for (key, mut values) in params {
        values.sort();
        resource.push('\n');
        resource.push_str(&key);
        resource.push(':');
        resource.push_str(&values.join(","));
    }

    resource
}

/// Formats a DateTime as RFC 1123 format for HTTP headers.
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
