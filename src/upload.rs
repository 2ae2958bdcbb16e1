//! Upload gating: check a candidate file before it leaves the machine.
//!
//! The backend enforces the same rules, but checking locally means a wrong
//! file is refused instantly with a precise reason instead of after a 50 MB
//! round trip.
//!
//! Rules, in order, first failure wins:
//!
//! 1. a file is present → else [`RejectReason::NoFileSelected`]
//! 2. its type is PDF → else [`RejectReason::UnsupportedType`]
//! 3. it is not empty → else [`RejectReason::EmptyFile`]
//! 4. it is at most 50 MiB → else [`RejectReason::TooLarge`]

use crate::api::Backend;
use crate::config::MAX_UPLOAD_BYTES;
use crate::error::{RejectReason, ScipherError};
use crate::models::Document;
use std::path::Path;
use tracing::{debug, info, warn};

pub const PDF_MIME: &str = "application/pdf";

/// A file selected for upload, held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Name sent as the multipart file name.
    pub file_name: String,
    /// MIME type as reported by the picker, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            bytes: bytes.into(),
        }
    }

    /// Read a local file, inferring the content type.
    ///
    /// A `.pdf` extension or a `%PDF` header yields `application/pdf`; other
    /// files get `application/octet-stream` and will be refused by the gate.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ScipherError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ScipherError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let has_pdf_ext = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        let content_type = if has_pdf_ext || bytes.starts_with(b"%PDF") {
            PDF_MIME
        } else {
            "application/octet-stream"
        };
        debug!("Loaded {} ({} bytes, {})", path.display(), bytes.len(), content_type);

        Ok(Self::new(file_name, Some(content_type), bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the declared type indicates a PDF.
    ///
    /// Parameters (`; charset=...`) are ignored. A missing type falls back
    /// to the file extension.
    pub fn is_pdf(&self) -> bool {
        is_pdf_type(self.content_type.as_deref(), &self.file_name)
    }
}

fn is_pdf_type(content_type: Option<&str>, file_name: &str) -> bool {
    match content_type.map(|ct| ct.split(';').next().unwrap_or("").trim()) {
        Some(ct) if !ct.is_empty() => {
            ct.eq_ignore_ascii_case(PDF_MIME) || ct.eq_ignore_ascii_case("application/x-pdf")
        }
        _ => Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")),
    }
}

/// Validates candidate files and hands accepted ones to the backend.
#[derive(Debug, Clone, Copy)]
pub struct UploadGate {
    max_bytes: u64,
}

impl Default for UploadGate {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadGate {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Apply the acceptance rules.
    pub fn validate(&self, file: Option<&UploadFile>) -> Result<(), RejectReason> {
        let file = file.ok_or(RejectReason::NoFileSelected)?;
        self.check(file.content_type.as_deref(), &file.file_name, file.size())
    }

    fn check(
        &self,
        content_type: Option<&str>,
        file_name: &str,
        size: u64,
    ) -> Result<(), RejectReason> {
        if !is_pdf_type(content_type, file_name) {
            return Err(RejectReason::UnsupportedType);
        }
        if size == 0 {
            return Err(RejectReason::EmptyFile);
        }
        if size > self.max_bytes {
            return Err(RejectReason::TooLarge);
        }
        Ok(())
    }

    /// Validate, then submit once.
    ///
    /// The backend's answer is forwarded unchanged. There is no retry: a
    /// failed submit surfaces as an error and the caller may resubmit.
    pub async fn submit(
        &self,
        backend: &dyn Backend,
        file: Option<&UploadFile>,
    ) -> Result<Document, ScipherError> {
        self.submit_with(backend, file, |_| {}).await
    }

    /// Like [`submit`](Self::submit), calling `on_start` once the file has
    /// been accepted and right before it is sent.
    pub async fn submit_with<F>(
        &self,
        backend: &dyn Backend,
        file: Option<&UploadFile>,
        on_start: F,
    ) -> Result<Document, ScipherError>
    where
        F: FnOnce(&UploadFile),
    {
        let accepted = file
            .ok_or(RejectReason::NoFileSelected)
            .and_then(|f| self.validate(Some(f)).map(|()| f));
        let file = match accepted {
            Ok(file) => file,
            Err(reason) => {
                info!("Upload rejected: {}", reason);
                return Err(reason.into());
            }
        };

        on_start(file);
        info!("Uploading {} ({} bytes)", file.file_name, file.size());
        let document = backend
            .upload(file)
            .await
            .inspect_err(|e| warn!("Upload of {} failed: {}", file.file_name, e))?;
        info!("Uploaded {} as document {}", file.file_name, document.id);
        Ok(document)
    }
}
