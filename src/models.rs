//! Wire records for the Scipher backend.
//!
//! Every endpoint gets its own explicit type so loosely-shaped JSON is
//! validated once, at the boundary. Status labels are normalised into
//! [`LifecycleState`] as they are decoded.

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Lifecycle ────────────────────────────────────────────────────────────

/// Processing stage of a submitted document.
///
/// The backend speaks five labels. Anything else decodes to
/// [`LifecycleState::Unrecognized`], which is treated as non-terminal so an
/// unexpected label keeps the poller running instead of freezing the view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifecycleState {
    /// No document yet.
    #[default]
    Idle,
    /// Stored by the backend, queued for processing.
    Uploaded,
    /// Extraction in progress.
    Processing,
    /// Terminal success: artifacts can be fetched.
    Completed,
    /// Terminal failure.
    Failed,
    /// A label outside the known vocabulary, kept verbatim.
    Unrecognized(String),
}

impl LifecycleState {
    /// Normalise a backend label (case-insensitive, surrounding whitespace ignored).
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "idle" => Self::Idle,
            "uploaded" => Self::Uploaded,
            // The backend's status enum also carries `running` for jobs.
            "processing" | "running" => Self::Processing,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Unrecognized(label.trim().to_string()),
        }
    }

    /// The wire label.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unrecognized(label) => label,
        }
    }

    /// `completed` or `failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Polling should continue while the document is in this state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Uploaded | Self::Processing | Self::Unrecognized(_)
        )
    }

    /// Position in the forward-only ordering, `None` for unknown labels.
    pub(crate) fn rank(&self) -> Option<u8> {
        match self {
            Self::Idle => Some(0),
            Self::Uploaded => Some(1),
            Self::Processing => Some(2),
            Self::Completed | Self::Failed => Some(3),
            Self::Unrecognized(_) => None,
        }
    }
}

impl From<String> for LifecycleState {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<&str> for LifecycleState {
    fn from(label: &str) -> Self {
        Self::from_label(label)
    }
}

impl From<LifecycleState> for String {
    fn from(state: LifecycleState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Documents ────────────────────────────────────────────────────────────

/// Record returned by `POST /api/upload`.
///
/// `status` is the state at submission time only; live status comes from
/// the poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub original_filename: String,
    #[serde(default)]
    pub file_size: u64,
    pub status: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Response of `GET /api/status/{id}`. Overwritten on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: LifecycleState,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One detected section of a processed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// `type` in the content payload, `section_type` in the sections listing.
    #[serde(alias = "type")]
    pub section_type: String,
    pub content: String,
    #[serde(default)]
    pub order: i64,
}

/// Response of `GET /api/document/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentContent {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub original_filename: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Response of `GET /api/document/{id}/text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    pub id: String,
    pub filename: String,
    pub text: String,
}

/// Response of `GET /api/document/{id}/summary`.
///
/// Recomputed in full by the backend on every request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub easy: Option<String>,
    #[serde(default)]
    pub intermediate: Option<String>,
    #[serde(default)]
    pub technical: Option<String>,
    #[serde(default)]
    pub chunk_count: u64,
    #[serde(default)]
    pub source_characters: u64,
}

impl Summary {
    /// The three levels in reading order, with their labels.
    pub fn levels(&self) -> [(&'static str, Option<&str>); 3] {
        [
            ("easy", self.easy.as_deref()),
            ("intermediate", self.intermediate.as_deref()),
            ("technical", self.technical.as_deref()),
        ]
    }
}

/// One row of `GET /api/jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: i64,
    pub document_id: String,
    pub job_type: String,
    pub status: LifecycleState,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Response of `GET /api/documents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    pub total: u64,
    pub skip: u64,
    pub limit: u64,
}

impl DocumentList {
    /// More pages exist past this one.
    pub fn has_more(&self) -> bool {
        self.skip + self.limit < self.total
    }
}

/// Pagination and filter for [`DocumentList`] requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub skip: u64,
    /// Clamped to 1–100 by the backend.
    pub limit: u64,
    pub status: Option<LifecycleState>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 10,
            status: None,
        }
    }
}

/// Response of `DELETE /api/document/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: String,
}

/// Response of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_normalise_case_insensitively() {
        assert_eq!(LifecycleState::from_label("COMPLETED"), LifecycleState::Completed);
        assert_eq!(LifecycleState::from_label(" Processing "), LifecycleState::Processing);
        assert_eq!(LifecycleState::from_label("Uploaded"), LifecycleState::Uploaded);
        assert_eq!(LifecycleState::from_label("failed"), LifecycleState::Failed);
        assert_eq!(LifecycleState::from_label("running"), LifecycleState::Processing);
    }

    #[test]
    fn unknown_label_is_kept_and_non_terminal() {
        let s = LifecycleState::from_label("Queued");
        assert_eq!(s, LifecycleState::Unrecognized("Queued".into()));
        assert_eq!(s.as_str(), "Queued");
        assert!(!s.is_terminal());
        assert!(s.is_active());
    }

    #[test]
    fn terminal_states() {
        assert!(LifecycleState::Completed.is_terminal());
        assert!(LifecycleState::Failed.is_terminal());
        assert!(!LifecycleState::Processing.is_terminal());
        assert!(!LifecycleState::Idle.is_active());
    }

    #[test]
    fn status_snapshot_decodes_with_optional_error() {
        let snap: StatusSnapshot = serde_json::from_str(
            r#"{"id":"7","status":"FAILED","message":"Document processing failed: bad pdf","error_message":"bad pdf"}"#,
        )
        .unwrap();
        assert_eq!(snap.status, LifecycleState::Failed);
        assert_eq!(snap.error_message.as_deref(), Some("bad pdf"));

        let snap: StatusSnapshot = serde_json::from_str(r#"{"status":"processing"}"#).unwrap();
        assert_eq!(snap.status, LifecycleState::Processing);
        assert!(snap.message.is_empty());
    }

    #[test]
    fn state_serialises_as_label() {
        let json = serde_json::to_string(&LifecycleState::Completed).unwrap();
        assert_eq!(json, r#""completed""#);
    }

    #[test]
    fn content_sections_accept_type_alias() {
        let content: DocumentContent = serde_json::from_str(
            r##"{"id":"1","filename":"a.pdf","text":"# Intro","sections":[{"type":"heading","content":"Intro","order":0}],"metadata":{"file_size":10}}"##,
        )
        .unwrap();
        assert_eq!(content.sections[0].section_type, "heading");
        assert_eq!(content.metadata["file_size"], 10);
    }

    #[test]
    fn summary_tolerates_missing_levels() {
        let summary: Summary =
            serde_json::from_str(r#"{"easy":"short","chunk_count":2,"source_characters":900}"#)
                .unwrap();
        assert_eq!(summary.easy.as_deref(), Some("short"));
        assert!(summary.technical.is_none());
        assert_eq!(summary.levels()[1], ("intermediate", None));
    }

    #[test]
    fn document_list_pagination() {
        let list = DocumentList {
            documents: vec![],
            total: 25,
            skip: 10,
            limit: 10,
        };
        assert!(list.has_more());
    }

    #[test]
    fn health_is_lenient() {
        let h: HealthStatus = serde_json::from_str(
            r#"{"status":"healthy","timestamp":"2026-01-01T00:00:00","database":"connected","version":"1.0.0"}"#,
        )
        .unwrap();
        assert!(h.is_healthy());
        assert!(h.message.is_none());
    }
}
