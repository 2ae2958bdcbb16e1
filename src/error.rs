//! Error types for the scipher-client library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`RejectReason`]: **Local**: the candidate file failed the upload
//!   rules. Detected synchronously, before any network call, and never
//!   retried automatically.
//!
//! * [`ClientError`]: **Per request**: one call to the backend failed,
//!   either because it never reached the server (connectivity, timeout) or
//!   because the server answered with a non-2xx status. The component that
//!   issued the request decides whether this is fatal: the status poller
//!   keeps going, an artifact fetch records it and waits for a refetch.
//!
//! * [`ScipherError`]: **Fatal**: the session as a whole cannot proceed.
//!   Returned as `Err(ScipherError)` from the top-level submit/wait calls.
//!
//! A stale result from a superseded request is none of these; it is dropped
//! where it lands and never surfaces.

use std::path::PathBuf;
use thiserror::Error;

/// Why the upload gate refused a candidate file.
///
/// The `Display` text is the short reason shown next to the drop zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// Nothing was selected.
    #[error("no file selected")]
    NoFileSelected,

    /// The content type does not indicate a PDF.
    #[error("unsupported type")]
    UnsupportedType,

    /// The file has zero bytes.
    #[error("empty file")]
    EmptyFile,

    /// The file exceeds the upload limit.
    #[error("too large")]
    TooLarge,
}

/// A single backend request failed.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    // ── Transport errors ──────────────────────────────────────────────────
    /// The request never reached the server.
    #[error("Cannot reach the backend at '{url}': {reason}\nCheck that the API server is running and SCIPHER_API_URL is correct.")]
    Connectivity { url: String, reason: String },

    /// The request was sent but no response arrived in time.
    #[error("Request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    // ── Application errors ────────────────────────────────────────────────
    /// The server answered with a non-2xx status.
    ///
    /// `detail` is the server's own message when the body carried one.
    #[error("{detail}")]
    Backend { status: u16, detail: String },

    /// A 2xx response whose body could not be decoded.
    #[error("Unexpected response from '{url}': {reason}")]
    InvalidResponse { url: String, reason: String },

    /// The request could not be built (bad content type, bad URL).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// `true` when the failure happened below HTTP (no response received).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::Timeout { .. })
    }

    /// `true` when the backend could not be reached at all.
    ///
    /// UIs use this to suggest checking whether the server is up, rather
    /// than showing the message as an application error.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity { .. })
    }

    /// HTTP status code for backend errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// All fatal errors returned by the scipher-client library.
#[derive(Debug, Error)]
pub enum ScipherError {
    /// The upload gate refused the file.
    #[error("Upload rejected: {0}")]
    Rejected(#[from] RejectReason),

    /// A backend call failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The backend reported the document as `failed`.
    #[error("Processing failed for document '{document_id}': {reason}")]
    ProcessingFailed { document_id: String, reason: String },

    /// The awaited session was replaced by a new upload or a start-over.
    #[error("Session was replaced before it settled")]
    SessionReplaced,

    /// Nothing has been submitted, or the last submit did not produce a
    /// document.
    #[error("No document session is active")]
    NoSession,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading a local file failed.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
