//! # scipher-client
//!
//! Client-side lifecycle control for the Scipher document-processing API.
//!
//! ## Why this crate?
//!
//! Processing a paper on the Scipher backend is asynchronous and takes a
//! while: upload, wait for extraction, then pull several derived artifacts.
//! Getting the client side right is fiddly. Polling must survive network
//! blips but stop on a terminal status, overlapping fetches must not
//! clobber each other, and a new upload must silence everything the old one
//! left in flight. This crate packages that once, behind a small API.
//!
//! ## Session Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Gate     present? PDF? non-empty? ≤ 50 MiB?       (upload.rs)
//!  ├─ 2. Submit   POST /api/upload → Document id            (api/http.rs)
//!  ├─ 3. Poll     GET /api/status/{id} until completed|failed (poller.rs)
//!  └─ 4. Fetch    content ∥ markdown ∥ summary, generation-tagged (artifact.rs)
//!
//! lifecycle.rs owns one session at a time and publishes a SessionView.
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scipher_client::{ClientConfig, LifecycleController, UploadFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Backend URL from SCIPHER_API_URL, default http://localhost:8080
//!     let config = ClientConfig::from_env()?;
//!     let controller = LifecycleController::from_config(&config)?;
//!
//!     let file = UploadFile::from_path("paper.pdf").await?;
//!     let document = controller.submit(Some(file)).await?;
//!     controller.wait_until_settled().await?;
//!
//!     let artifacts = controller.wait_for_artifacts().await;
//!     if let Some(markdown) = artifacts.markdown.data {
//!         println!("{markdown}");
//!     }
//!     eprintln!("document {}", document.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scipher` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scipher-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod artifact;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod poller;
pub mod progress;
pub mod stream;
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{Backend, HttpBackend};
pub use artifact::{
    ArtifactFetcher, ArtifactKind, ArtifactResult, ArtifactTask, ContentArtifact,
    MarkdownArtifact, SummaryArtifact,
};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ClientError, RejectReason, ScipherError};
pub use lifecycle::{ArtifactsView, LifecycleController, SessionView};
pub use models::{
    DeleteResponse, Document, DocumentContent, DocumentList, DocumentText, HealthStatus,
    LifecycleState, ListQuery, ProcessingJob, Section, StatusSnapshot, Summary,
};
pub use poller::{PollEvent, StatusPoller};
pub use progress::{NoopProgressCallback, ProgressCallback, SessionProgressCallback};
pub use stream::{session_updates, state_changes, SessionStream};
pub use upload::{UploadFile, UploadGate};
