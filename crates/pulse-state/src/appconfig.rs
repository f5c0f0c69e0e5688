//! AppConfigStore: status persistence in a remote configuration service.
//!
//! Each status is one key-value item. Requests are authenticated with an
//! HMAC-SHA256 signature over the method, path, date, host and body hash,
//! using the credential and secret from the connection string.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::error::{StateError, StateResult};
use crate::status::PersistedStatus;
use crate::store::StatusStore;

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "1.0";
const KV_CONTENT_TYPE: &str = "application/vnd.microsoft.appconfig.kv+json";
const SIGNED_HEADERS: &str = "x-ms-date;host;x-ms-content-sha256";

/// Parsed `Endpoint=...;Id=...;Secret=...` connection string.
#[derive(Clone)]
pub struct ConnectionString {
    pub endpoint: Url,
    pub credential: String,
    secret: Vec<u8>,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint.as_str())
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl ConnectionString {
    pub fn parse(s: &str) -> StateResult<Self> {
        let mut endpoint = None;
        let mut credential = None;
        let mut secret = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Secrets are base64 and may end in '=', so split on the first one only.
            let (name, value) = part.split_once('=').ok_or_else(|| {
                StateError::ConnectionString(format!("malformed segment {part:?}"))
            })?;
            match name {
                "Endpoint" => endpoint = Some(value),
                "Id" => credential = Some(value),
                "Secret" => secret = Some(value),
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or_else(|| missing("Endpoint"))?;
        let credential = credential.ok_or_else(|| missing("Id"))?;
        let secret = secret.ok_or_else(|| missing("Secret"))?;

        let endpoint = Url::parse(endpoint)
            .map_err(|e| StateError::ConnectionString(format!("bad endpoint: {e}")))?;
        let secret = STANDARD
            .decode(secret)
            .map_err(|e| StateError::ConnectionString(format!("secret is not base64: {e}")))?;

        Ok(Self {
            endpoint,
            credential: credential.to_string(),
            secret,
        })
    }
}

fn missing(field: &str) -> StateError {
    StateError::ConnectionString(format!("missing {field}"))
}

/// Headers that authenticate one request.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Signature {
    pub date: String,
    pub content_sha256: String,
    pub authorization: String,
}

/// Sign a request. `date` must be the RFC 1123 string sent as `x-ms-date`.
pub(crate) fn sign(
    conn: &ConnectionString,
    method: &Method,
    url: &Url,
    date: &str,
    body: &[u8],
) -> StateResult<Signature> {
    let content_sha256 = STANDARD.encode(Sha256::digest(body));

    let mut path_and_query = url.path().to_string();
    if let Some(query) = url.query() {
        path_and_query.push('?');
        path_and_query.push_str(query);
    }
    let string_to_sign = format!(
        "{method}\n{path_and_query}\n{date};{host};{content_sha256}",
        host = host_header(url),
    );

    let mut mac = HmacSha256::new_from_slice(&conn.secret)
        .map_err(|e| StateError::ConnectionString(format!("invalid secret: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(Signature {
        date: date.to_string(),
        content_sha256,
        authorization: format!(
            "HMAC-SHA256 Credential={}&SignedHeaders={SIGNED_HEADERS}&Signature={signature}",
            conn.credential
        ),
    })
}

/// The `Host` header value the HTTP client will send for `url`.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct KeyValue {
    value: Option<String>,
    etag: Option<String>,
}

/// Body of a PUT; the status serializes as its literal string.
#[derive(Debug, Serialize)]
struct KeyValueUpdate {
    value: PersistedStatus,
}

/// Status store backed by a remote key-value configuration service.
pub struct AppConfigStore {
    conn: ConnectionString,
    client: reqwest::Client,
}

impl AppConfigStore {
    pub fn new(conn: ConnectionString) -> StateResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { conn, client })
    }

    fn kv_url(&self, key: &str) -> StateResult<Url> {
        let mut url = self.conn.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StateError::ConnectionString("endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .push("kv")
            .push(key);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        key: &str,
        body: Vec<u8>,
    ) -> StateResult<reqwest::Response> {
        let url = self.kv_url(key)?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let signature = sign(&self.conn, &method, &url, &date, &body)?;

        let mut request = self
            .client
            .request(method, url)
            .header("x-ms-date", signature.date)
            .header("x-ms-content-sha256", signature.content_sha256)
            .header("authorization", signature.authorization);
        if !body.is_empty() {
            request = request.header(CONTENT_TYPE, KV_CONTENT_TYPE).body(body);
        }

        Ok(request.send().await?)
    }

    async fn decode(response: reqwest::Response, key: &str) -> StateResult<PersistedStatus> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StateError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        let item: KeyValue = response
            .json()
            .await
            .map_err(|e| StateError::Decode(e.to_string()))?;
        debug!(%key, etag = item.etag.as_deref().unwrap_or(""), "key-value item received");

        item.value
            .ok_or_else(|| StateError::Decode(format!("item {key:?} has no value")))?
            .parse()
    }
}

#[async_trait]
impl StatusStore for AppConfigStore {
    async fn get(&self, key: &str) -> StateResult<Option<PersistedStatus>> {
        let response = self.send(Method::GET, key, Vec::new()).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%key, "key absent in remote store");
            return Ok(None);
        }
        Self::decode(response, key).await.map(Some)
    }

    async fn put(&self, key: &str, status: PersistedStatus) -> StateResult<PersistedStatus> {
        let body = serde_json::to_vec(&KeyValueUpdate { value: status })
            .map_err(|e| StateError::Decode(e.to_string()))?;
        let response = self.send(Method::PUT, key, body).await?;
        Self::decode(response, key).await
    }
}
