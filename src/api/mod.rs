//! Backend access.
//!
//! The lifecycle core only ever talks to the backend through [`Backend`],
//! which carries the five calls a processing session needs. [`http`] holds
//! the reqwest implementation, which also exposes the administrative
//! endpoints (listing, deletion, health) as inherent methods.
//!
//! ## Paths
//!
//! ```text
//! POST   /api/upload                  submit (multipart field `file`)
//! GET    /api/status/{id}             poll
//! GET    /api/document/{id}           structured content
//! GET    /api/document/{id}/markdown  rendered markdown
//! GET    /api/document/{id}/summary   three-level summary
//! ```

pub mod http;

use crate::error::ClientError;
use crate::models::{Document, DocumentContent, StatusSnapshot, Summary};
use crate::upload::UploadFile;
use async_trait::async_trait;

pub use http::HttpBackend;

/// The calls a processing session makes against the backend.
///
/// Implementations must be cheap to share (`Arc<dyn Backend>`); every
/// poller and fetcher holds a handle.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Submit a validated file.
    async fn upload(&self, file: &UploadFile) -> Result<Document, ClientError>;

    /// Current processing status.
    async fn status(&self, document_id: &str) -> Result<StatusSnapshot, ClientError>;

    /// Full extracted content (text + sections).
    async fn document(&self, document_id: &str) -> Result<DocumentContent, ClientError>;

    /// Rendered markdown body.
    async fn markdown(&self, document_id: &str) -> Result<String, ClientError>;

    /// Multi-level summary.
    async fn summary(&self, document_id: &str) -> Result<Summary, ClientError>;
}
