use std::sync::OnceLock;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::config::{ApiEndpoint, normalize_base_url};
use crate::domain::FileResult;
use crate::error::SearchError;

/// Raw answer of `GET {base}/health`; `body` is `None` when it is not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReply {
    pub status: u16,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPayload {
    pub bytes: Vec<u8>,
    /// Name suggested by the server's `Content-Disposition`, if any.
    pub filename: Option<String>,
}

pub trait FileApi: Send + Sync {
    fn health(&self, base_url: &str) -> Result<HealthReply, SearchError>;
    fn search(
        &self,
        endpoint: &ApiEndpoint,
        query: &[(String, String)],
    ) -> Result<Vec<FileResult>, SearchError>;
    fn material_usage(
        &self,
        endpoint: &ApiEndpoint,
        query: &[(String, String)],
    ) -> Result<Vec<FileResult>, SearchError>;
    /// Fetches a resource body. A 410 response maps to `SearchError::Gone`.
    fn download(&self, endpoint: &ApiEndpoint, id: i64) -> Result<DownloadPayload, SearchError>;
}

#[derive(Clone)]
pub struct HttpFileApi {
    client: Client,
}

impl HttpFileApi {
    pub fn new(timeout: Duration) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("job-file-search/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SearchError::Transport(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| SearchError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    fn handle_status(response: Response) -> Result<Response, SearchError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(status_error(status))
    }

    fn fetch_results(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<Vec<FileResult>, SearchError> {
        debug!(%url, params = query.len(), "api.request");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|err| SearchError::Transport(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let results: Vec<FileResult> = response
            .json()
            .map_err(|err| SearchError::Decode(err.to_string()))?;
        debug!(%url, rows = results.len(), "api.response");
        Ok(results)
    }
}

impl FileApi for HttpFileApi {
    fn health(&self, base_url: &str) -> Result<HealthReply, SearchError> {
        let url = format!("{}/health", normalize_base_url(base_url));
        debug!(%url, "api.health");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| SearchError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok());
        Ok(HealthReply { status, body })
    }

    fn search(
        &self,
        endpoint: &ApiEndpoint,
        query: &[(String, String)],
    ) -> Result<Vec<FileResult>, SearchError> {
        self.fetch_results(&endpoint.join("search"), query)
    }

    fn material_usage(
        &self,
        endpoint: &ApiEndpoint,
        query: &[(String, String)],
    ) -> Result<Vec<FileResult>, SearchError> {
        self.fetch_results(&endpoint.join("material_usage"), query)
    }

    fn download(&self, endpoint: &ApiEndpoint, id: i64) -> Result<DownloadPayload, SearchError> {
        let url = endpoint.join(&format!("resources/{id}"));
        debug!(%url, "api.download");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| SearchError::Transport(err.to_string()))?;
        if response.status() == StatusCode::GONE {
            return Err(SearchError::Gone { id });
        }
        let response = Self::handle_status(response)?;
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(disposition_filename);
        let bytes = response
            .bytes()
            .map_err(|err| SearchError::Transport(err.to_string()))?;
        Ok(DownloadPayload {
            bytes: bytes.to_vec(),
            filename,
        })
    }
}

fn status_error(status: StatusCode) -> SearchError {
    SearchError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
    }
}

/// Extracts the file name from a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*` form wins over plain `filename` and is
/// percent-decoded. A quoted `filename` runs to its closing quote.
pub fn disposition_filename(header: &str) -> Option<String> {
    static EXTENDED: OnceLock<Option<Regex>> = OnceLock::new();
    static PLAIN: OnceLock<Option<Regex>> = OnceLock::new();

    let extended = EXTENDED
        .get_or_init(|| Regex::new(r#"(?i)(?:^|;)\s*filename\*\s*=\s*[^']*'[^']*'([^;\s]+)"#).ok())
        .as_ref()?;
    if let Some(encoded) = extended.captures(header).and_then(|caps| caps.get(1)) {
        let decoded = percent_decode_str(encoded.as_str()).decode_utf8_lossy();
        if let Some(name) = non_empty(&decoded) {
            return Some(name);
        }
    }

    let plain = PLAIN
        .get_or_init(|| {
            Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^;]+))"#).ok()
        })
        .as_ref()?;
    let caps = plain.captures(header)?;
    match (caps.get(1), caps.get(2)) {
        (Some(quoted), _) => non_empty(&unescape_quoted(quoted.as_str())),
        (None, Some(token)) => non_empty(token.as_str()),
        (None, None) => None,
    }
}

fn unescape_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            other => out.push(other),
        }
    }
    out
}

fn non_empty(name: &str) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
