//! Same-origin HTTP client used by the typed resource services.
//!
//! All calls go through the gateway (`/api/...`), never directly upstream.
//! On a 401/403 the client performs exactly one silent session refresh and
//! retries the original request once; there are no further retries.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::models::Envelope;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Non-2xx response, with the raw body and headers preserved.
    #[error("{message}")]
    Http {
        status: StatusCode,
        message: String,
        body: Option<serde_json::Value>,
        headers: Box<HeaderMap>,
    },
    /// HTTP 200 but the envelope said `status != "success"`.
    #[error("{0}")]
    Domain(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("resposta inválida: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A file staged for multipart upload.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl StagedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Multipart body that can be rebuilt for the refresh-retry path
/// (reqwest multipart forms are single-use).
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, StagedFile)>,
}

impl MultipartPayload {
    pub fn text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn file(&mut self, key: impl Into<String>, file: StagedFile) {
        self.files.push((key.into(), file));
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    fn build(&self) -> reqwest::multipart::Form {
        let mut form = reqwest::multipart::Form::new();
        for (k, v) in &self.fields {
            form = form.text(k.clone(), v.clone());
        }
        for (k, f) in &self.files {
            let part = reqwest::multipart::Part::bytes(f.bytes.clone())
                .file_name(f.name.clone())
                .mime_str(&f.content_type)
                .unwrap_or_else(|_| {
                    reqwest::multipart::Part::bytes(f.bytes.clone()).file_name(f.name.clone())
                });
            form = form.part(k.clone(), part);
        }
        form
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `base_url` is the gateway origin, e.g. `http://localhost:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        let path = endpoint.trim_start_matches('/');
        if path.starts_with("api/") {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/api/{}", self.base_url, path)
        }
    }

    pub async fn get_json(&self, endpoint: &str) -> Result<serde_json::Value, ClientError> {
        let url = self.url(endpoint);
        self.execute(|http| http.get(&url)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<serde_json::Value, ClientError> {
        let url = self.url(endpoint);
        self.execute(|http| http.post(&url).json(body)).await
    }

    pub async fn post_multipart(
        &self,
        endpoint: &str,
        payload: &MultipartPayload,
    ) -> Result<serde_json::Value, ClientError> {
        let url = self.url(endpoint);
        self.execute(|http| http.post(&url).multipart(payload.build()))
            .await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<serde_json::Value, ClientError> {
        let url = self.url(endpoint);
        self.execute(|http| http.delete(&url)).await
    }

    /// Parses a response as an envelope and enforces the domain-level
    /// success convention.
    pub fn expect_success(value: serde_json::Value) -> Result<Envelope, ClientError> {
        let envelope: Envelope = serde_json::from_value(value)?;
        if envelope.is_success() {
            Ok(envelope)
        } else {
            Err(ClientError::Domain(envelope.failure_message()))
        }
    }

    async fn execute(
        &self,
        build: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, ClientError> {
        let mut resp = build(&self.http).send().await?;

        if matches!(
            resp.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            debug!(status = %resp.status(), "Attempting silent session refresh");
            let refreshed = self
                .http
                .post(format!("{}/api/auth/refresh", self.base_url))
                .send()
                .await
                .map(|r| r.status().is_success())
                .unwrap_or(false);
            if refreshed {
                resp = build(&self.http).send().await?;
            }
        }

        let status = resp.status();
        let headers = resp.headers().clone();
        let text = resp.text().await.unwrap_or_default();
        let body: Option<serde_json::Value> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            return Err(ClientError::Http {
                status,
                message: extract_message(body.as_ref(), status),
                body,
                headers: Box::new(headers),
            });
        }

        Ok(body.unwrap_or(serde_json::Value::Null))
    }
}

/// Human-readable message from an error body: `message`, then `error`,
/// then `status`, then a generic fallback.
fn extract_message(body: Option<&serde_json::Value>, status: StatusCode) -> String {
    body.and_then(|b| {
        ["message", "error", "status"]
            .iter()
            .find_map(|k| b.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string)
    })
    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
