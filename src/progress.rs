//! Progress-callback trait for document session events.
//!
//! Pass an [`Arc<dyn SessionProgressCallback>`] to
//! [`crate::config::ClientConfigBuilder::progress_callback`] to hear about a
//! session as it moves from upload to results.
//!
//! # Why callbacks alongside the watch channel?
//!
//! [`crate::LifecycleController::subscribe`] gives the latest view, which is
//! what a UI needs. Some consumers want discrete events instead (a terminal
//! spinner, an audit log), and reconstructing "this just happened" from
//! successive snapshots is fiddly. Events are delivered after the controller
//! has released its locks, so a callback may call back into the controller.
//!
//! # Example
//!
//! ```rust
//! use scipher_client::{ClientConfig, SessionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     transitions: AtomicUsize,
//! }
//!
//! impl SessionProgressCallback for CountingCallback {
//!     fn on_transition(
//!         &self,
//!         state: &scipher_client::LifecycleState,
//!         _snapshot: &scipher_client::StatusSnapshot,
//!     ) {
//!         let n = self.transitions.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("transition #{n}: {state}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { transitions: AtomicUsize::new(0) });
//!
//! let config = ClientConfig::builder()
//!     .progress_callback(counter as Arc<dyn SessionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::models::{Document, LifecycleState, StatusSnapshot};
use std::sync::Arc;

/// Called by [`crate::LifecycleController`] as a session progresses.
///
/// All methods default to no-ops. Events for one session arrive in order;
/// nothing is delivered for a session after it has been replaced or reset.
pub trait SessionProgressCallback: Send + Sync {
    /// An accepted file is about to be sent.
    fn on_upload_start(&self, file_name: &str, size: u64) {
        let _ = (file_name, size);
    }

    /// The backend accepted the upload and assigned an id.
    fn on_uploaded(&self, document: &Document) {
        let _ = document;
    }

    /// A new lifecycle state was applied.
    fn on_transition(&self, state: &LifecycleState, snapshot: &StatusSnapshot) {
        let _ = (state, snapshot);
    }

    /// A status query failed; polling continues.
    fn on_poll_error(&self, error: &str) {
        let _ = error;
    }

    /// The primary content fetch settled for a completed document.
    fn on_content_ready(&self, document_id: &str) {
        let _ = document_id;
    }

    /// The backend reported the document as failed.
    ///
    /// # Arguments
    /// * `document_id`: the failed document
    /// * `reason`     : backend error message, or a generic one
    fn on_failed(&self, document_id: &str, reason: &str) {
        let _ = (document_id, reason);
    }

    /// The session was discarded via start-over.
    fn on_reset(&self) {}
}

/// A no-op implementation for callers that don't need events.
pub struct NoopProgressCallback;

impl SessionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn SessionProgressCallback>;
