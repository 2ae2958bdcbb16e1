//! Scripted in-memory [`Backend`] for unit tests.
//!
//! Each endpoint has a queue of steps. A step either resolves immediately or
//! waits on a gate the test opens later, which is how tests control the
//! order in which overlapping requests resolve. An empty queue falls back to
//! a benign default (status `processing`, small artifacts).

use crate::api::Backend;
use crate::error::ClientError;
use crate::models::{Document, DocumentContent, LifecycleState, StatusSnapshot, Summary};
use crate::upload::UploadFile;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

pub(crate) type Gate<T> = oneshot::Sender<Result<T, ClientError>>;

pub(crate) enum Step<T> {
    Ready(Result<T, ClientError>),
    Gated(oneshot::Receiver<Result<T, ClientError>>),
}

impl<T> Step<T> {
    async fn resolve(self) -> Result<T, ClientError> {
        match self {
            Step::Ready(result) => result,
            Step::Gated(rx) => rx.await.unwrap_or_else(|_| {
                Err(ClientError::Connectivity {
                    url: "fake://gate".into(),
                    reason: "gate dropped".into(),
                })
            }),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    statuses: Mutex<HashMap<String, VecDeque<Step<StatusSnapshot>>>>,
    markdown: Mutex<VecDeque<Step<String>>>,
    summary: Mutex<VecDeque<Step<Summary>>>,
    content: Mutex<VecDeque<Step<DocumentContent>>>,
    uploads: Mutex<VecDeque<Result<Document, ClientError>>>,
    status_log: Mutex<Vec<String>>,
    upload_calls: AtomicUsize,
    markdown_calls: AtomicUsize,
    summary_calls: AtomicUsize,
    content_calls: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // ── Scripting ────────────────────────────────────────────────────────

    pub(crate) fn push_status(&self, id: &str, result: Result<StatusSnapshot, ClientError>) {
        self.statuses
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push_back(Step::Ready(result));
    }

    pub(crate) fn push_labels(&self, id: &str, labels: &[&str]) {
        for label in labels {
            self.push_status(id, Ok(snapshot(label)));
        }
    }

    pub(crate) fn gate_status(&self, id: &str) -> Gate<StatusSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.statuses
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push_back(Step::Gated(rx));
        tx
    }

    pub(crate) fn push_markdown(&self, result: Result<String, ClientError>) {
        self.markdown.lock().unwrap().push_back(Step::Ready(result));
    }

    pub(crate) fn gate_markdown(&self) -> Gate<String> {
        let (tx, rx) = oneshot::channel();
        self.markdown.lock().unwrap().push_back(Step::Gated(rx));
        tx
    }

    pub(crate) fn push_summary(&self, result: Result<Summary, ClientError>) {
        self.summary.lock().unwrap().push_back(Step::Ready(result));
    }

    pub(crate) fn gate_summary(&self) -> Gate<Summary> {
        let (tx, rx) = oneshot::channel();
        self.summary.lock().unwrap().push_back(Step::Gated(rx));
        tx
    }

    pub(crate) fn gate_content(&self) -> Gate<DocumentContent> {
        let (tx, rx) = oneshot::channel();
        self.content.lock().unwrap().push_back(Step::Gated(rx));
        tx
    }

    pub(crate) fn push_upload(&self, document: Document) {
        self.uploads.lock().unwrap().push_back(Ok(document));
    }

    pub(crate) fn fail_next_upload(&self, error: ClientError) {
        self.uploads.lock().unwrap().push_back(Err(error));
    }

    // ── Inspection ───────────────────────────────────────────────────────

    pub(crate) fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn status_calls(&self, id: &str) -> usize {
        self.status_log
            .lock()
            .unwrap()
            .iter()
            .filter(|logged| logged.as_str() == id)
            .count()
    }

    pub(crate) fn markdown_calls(&self) -> usize {
        self.markdown_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn upload(&self, file: &UploadFile) -> Result<Document, ClientError> {
        let n = self.upload_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let scripted = self.uploads.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(mut doc)) => {
                doc.file_size = file.size();
                Ok(doc)
            }
            Some(Err(e)) => Err(e),
            None => {
                let mut doc = document(&format!("doc-{n}"));
                doc.original_filename = file.file_name.clone();
                doc.file_size = file.size();
                Ok(doc)
            }
        }
    }

    async fn status(&self, document_id: &str) -> Result<StatusSnapshot, ClientError> {
        self.status_log.lock().unwrap().push(document_id.to_string());
        let step = self
            .statuses
            .lock()
            .unwrap()
            .get_mut(document_id)
            .and_then(VecDeque::pop_front);
        match step {
            Some(step) => step.resolve().await,
            None => Ok(snapshot("processing")),
        }
    }

    async fn document(&self, document_id: &str) -> Result<DocumentContent, ClientError> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.content.lock().unwrap().pop_front();
        match step {
            Some(step) => step.resolve().await,
            None => Ok(content(document_id, &format!("raw text of {document_id}"))),
        }
    }

    async fn markdown(&self, document_id: &str) -> Result<String, ClientError> {
        self.markdown_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.markdown.lock().unwrap().pop_front();
        match step {
            Some(step) => step.resolve().await,
            None => Ok(format!("# {document_id}")),
        }
    }

    async fn summary(&self, _document_id: &str) -> Result<Summary, ClientError> {
        self.summary_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.summary.lock().unwrap().pop_front();
        match step {
            Some(step) => step.resolve().await,
            None => Ok(summary(1, 100)),
        }
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

pub(crate) fn snapshot(label: &str) -> StatusSnapshot {
    StatusSnapshot {
        id: None,
        status: LifecycleState::from_label(label),
        message: format!("Document status: {label}"),
        error_message: None,
    }
}

pub(crate) fn document(id: &str) -> Document {
    Document {
        id: id.to_string(),
        filename: format!("{id}.pdf"),
        original_filename: "paper.pdf".to_string(),
        file_size: 0,
        status: LifecycleState::Uploaded,
        upload_date: None,
        error_message: None,
    }
}

pub(crate) fn content(id: &str, text: &str) -> DocumentContent {
    DocumentContent {
        id: id.to_string(),
        filename: format!("{id}.pdf"),
        original_filename: "paper.pdf".to_string(),
        text: text.to_string(),
        sections: Vec::new(),
        metadata: serde_json::Map::new(),
    }
}

pub(crate) fn summary(chunk_count: u64, source_characters: u64) -> Summary {
    Summary {
        easy: Some("easy".into()),
        intermediate: Some("intermediate".into()),
        technical: Some("technical".into()),
        chunk_count,
        source_characters,
    }
}

pub(crate) fn backend_error(detail: &str) -> ClientError {
    ClientError::Backend {
        status: 500,
        detail: detail.to_string(),
    }
}

pub(crate) fn network_error() -> ClientError {
    ClientError::Connectivity {
        url: "fake://status".into(),
        reason: "connection refused".into(),
    }
}

/// Poll `cond` until it holds, failing the test after two seconds.
pub(crate) async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
