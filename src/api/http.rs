//! reqwest-backed [`Backend`].
//!
//! ## Error mapping
//!
//! | Failure | Result |
//! |---------|--------|
//! | request never reached the server | [`ClientError::Connectivity`] |
//! | no response within the timeout   | [`ClientError::Timeout`] |
//! | non-2xx status                   | [`ClientError::Backend`] with the body's `detail` |
//! | 2xx body that does not decode    | [`ClientError::InvalidResponse`] |
//!
//! The backend's error body is `{"success": false, "error": ..., "detail": ...}`
//! for its own exceptions and `{"detail": ...}` for framework errors, where
//! `detail` may be a list for request-validation failures.

use super::Backend;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::models::{
    DeleteResponse, Document, DocumentContent, DocumentList, DocumentText, HealthStatus,
    ListQuery, ProcessingJob, Section, StatusSnapshot, Summary,
};
use crate::upload::UploadFile;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the Scipher REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpBackend {
    /// Build a client from the configuration's URL and timeouts.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("scipher-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::InvalidRequest(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// The base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn document_path(document_id: &str, suffix: &str) -> String {
        format!("/api/document/{}{}", urlencoding::encode(document_id), suffix)
    }

    // ── Administrative endpoints ─────────────────────────────────────────

    /// `GET /api/health`
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.get_json("/api/health").await
    }

    /// `DELETE /api/document/{id}`
    pub async fn delete(&self, document_id: &str) -> Result<DeleteResponse, ClientError> {
        let url = self.url(&Self::document_path(document_id, ""));
        let response = self.send(self.client.delete(&url), &url).await?;
        decode_json(response, &url).await
    }

    /// `GET /api/document/{id}/text`
    pub async fn text(&self, document_id: &str) -> Result<DocumentText, ClientError> {
        self.get_json(&Self::document_path(document_id, "/text")).await
    }

    /// `GET /api/document/{id}/sections`, optionally filtered by type.
    pub async fn sections(
        &self,
        document_id: &str,
        section_type: Option<&str>,
    ) -> Result<Vec<Section>, ClientError> {
        let url = self.url(&Self::document_path(document_id, "/sections"));
        let mut request = self.client.get(&url);
        if let Some(kind) = section_type {
            request = request.query(&[("section_type", kind)]);
        }
        let response = self.send(request, &url).await?;
        decode_json(response, &url).await
    }

    /// `GET /api/jobs/{id}`
    pub async fn jobs(&self, document_id: &str) -> Result<Vec<ProcessingJob>, ClientError> {
        self.get_json(&format!("/api/jobs/{}", urlencoding::encode(document_id))).await
    }

    /// `GET /api/documents`
    pub async fn list_documents(&self, query: &ListQuery) -> Result<DocumentList, ClientError> {
        let url = self.url("/api/documents");
        let mut params = vec![
            ("skip", query.skip.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(ref status) = query.status {
            params.push(("status", status.as_str().to_string()));
        }
        let response = self.send(self.client.get(&url).query(&params), &url).await?;
        decode_json(response, &url).await
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        let response = self.send(self.client.get(&url), &url).await?;
        decode_json(response, &url).await
    }

    /// Send a request and turn transport failures and non-2xx statuses into
    /// [`ClientError`]s.
    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, ClientError> {
        debug!("→ {}", url);
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, url, self.timeout_secs))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body)
            .unwrap_or_else(|| format!("Request failed with HTTP {}", status.as_u16()));
        debug!("← {} HTTP {}: {}", url, status.as_u16(), detail);
        Err(ClientError::Backend {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(&self, file: &UploadFile) -> Result<Document, ClientError> {
        let url = self.url("/api/upload");
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(file.content_type.as_deref().unwrap_or("application/pdf"))
            .map_err(|e| ClientError::InvalidRequest(format!("content type: {e}")))?;
        let form = Form::new().part("file", part);

        let response = self
            .send(self.client.post(&url).multipart(form), &url)
            .await?;
        decode_json(response, &url).await
    }

    async fn status(&self, document_id: &str) -> Result<StatusSnapshot, ClientError> {
        self.get_json(&format!("/api/status/{}", urlencoding::encode(document_id))).await
    }

    async fn document(&self, document_id: &str) -> Result<DocumentContent, ClientError> {
        self.get_json(&Self::document_path(document_id, "")).await
    }

    async fn markdown(&self, document_id: &str) -> Result<String, ClientError> {
        let url = self.url(&Self::document_path(document_id, "/markdown"));
        let response = self.send(self.client.get(&url), &url).await?;
        response.text().await.map_err(|e| ClientError::InvalidResponse {
            url: url.clone(),
            reason: e.to_string(),
        })
    }

    async fn summary(&self, document_id: &str) -> Result<Summary, ClientError> {
        self.get_json(&Self::document_path(document_id, "/summary"))
            .await
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ClientError> {
    let body = response
        .bytes()
        .await
        .map_err(|e| ClientError::InvalidResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    serde_json::from_slice(&body).map_err(|e| ClientError::InvalidResponse {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn transport_error(e: reqwest::Error, url: &str, timeout_secs: u64) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else if e.is_builder() {
        ClientError::InvalidRequest(e.to_string())
    } else {
        ClientError::Connectivity {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// String details are returned as-is; structured details (request
/// validation lists) are returned as compact JSON.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::String(_) | serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
