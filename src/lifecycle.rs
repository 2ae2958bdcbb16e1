//! Session controller: one uploaded document from submit to results.
//!
//! ## State machine
//!
//! ```text
//!            submit ok
//!   idle ───────────────▶ uploaded ──▶ processing ──┬──▶ completed ──▶ fetch content,
//!    ▲                         (polling active)     │                  markdown, summary
//!    │                                              └──▶ failed
//!    │ start_over / new submit
//!    └───────────────── from anywhere
//! ```
//!
//! State only moves forward. A backend label that would move it backward is
//! recorded in [`SessionView::last_status`] and otherwise ignored.
//!
//! ## Sessions
//!
//! Every submit (and every start-over) opens a new session with a fresh
//! number, poller and set of fetchers. Asynchronous results carry the
//! number of the session that issued them and are applied only if that
//! session is still current. Tearing a session down stops its poller and
//! invalidates its fetchers before returning, so nothing from it can land
//! afterwards.

use crate::api::{Backend, HttpBackend};
use crate::artifact::{
    ArtifactFetcher, ArtifactResult, ArtifactTask, ContentArtifact, MarkdownArtifact,
    SummaryArtifact,
};
use crate::config::ClientConfig;
use crate::error::ScipherError;
use crate::models::{Document, DocumentContent, LifecycleState, StatusSnapshot, Summary};
use crate::poller::{PollEvent, StatusPoller};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::upload::{UploadFile, UploadGate};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const GENERIC_FAILURE: &str = "Document processing failed";

/// Snapshot of the current session, published on every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    /// Session number. Changes on every submit and start-over.
    pub session: u64,
    pub state: LifecycleState,
    /// An upload is in flight.
    pub uploading: bool,
    pub document: Option<Document>,
    /// Latest status response, including ones that did not change `state`.
    pub last_status: Option<StatusSnapshot>,
    /// Message of the most recent failed status query. Cleared by the next
    /// successful one.
    pub poll_error: Option<String>,
    /// Why processing failed, once `state` is `failed`.
    pub failure: Option<String>,
    /// Why the file was refused or the upload call failed.
    pub upload_error: Option<String>,
    /// The primary content fetch has resolved for a completed document.
    pub content_ready: bool,
}

impl SessionView {
    pub fn document_id(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.id.as_str())
    }
}

/// The three artifacts of a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactsView {
    pub content: ArtifactResult<DocumentContent>,
    pub markdown: ArtifactResult<String>,
    pub summary: ArtifactResult<Summary>,
}

struct Session {
    id: u64,
    document: Document,
    poller: StatusPoller,
    content: ArtifactFetcher<ContentArtifact>,
    markdown: ArtifactFetcher<MarkdownArtifact>,
    summary: ArtifactFetcher<SummaryArtifact>,
}

impl Session {
    fn new(id: u64, document: Document, backend: &Arc<dyn Backend>, interval: Duration) -> Self {
        Self {
            id,
            document,
            poller: StatusPoller::new(Arc::clone(backend), interval),
            content: ArtifactFetcher::new(ContentArtifact, Arc::clone(backend)),
            markdown: ArtifactFetcher::new(MarkdownArtifact::default(), Arc::clone(backend)),
            summary: ArtifactFetcher::new(SummaryArtifact, Arc::clone(backend)),
        }
    }

    fn teardown(&self) {
        self.poller.stop();
        self.content.invalidate();
        self.markdown.invalidate();
        self.summary.invalidate();
        debug!(session = self.id, document_id = %self.document.id, "Session torn down");
    }

    fn artifacts(&self) -> ArtifactsView {
        ArtifactsView {
            content: self.content.current(),
            markdown: self.markdown.current(),
            summary: self.summary.current(),
        }
    }
}

#[derive(Default)]
struct Slot {
    current: u64,
    session: Option<Arc<Session>>,
}

impl Slot {
    fn live(&self, id: u64) -> Option<&Arc<Session>> {
        self.session.as_ref().filter(|s| s.id == id && self.current == id)
    }
}

/// Events queued under the lock and delivered after it is released.
enum Notice {
    UploadStart(String, u64),
    Uploaded(Document),
    Transition(LifecycleState, StatusSnapshot),
    PollError(String),
    ContentReady(String),
    Failed(String, String),
    Reset,
}

struct Inner {
    slot: Mutex<Slot>,
    view: watch::Sender<SessionView>,
    callback: ProgressCallback,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::UploadStart(name, size) => self.callback.on_upload_start(&name, size),
                Notice::Uploaded(doc) => self.callback.on_uploaded(&doc),
                Notice::Transition(state, snapshot) => {
                    self.callback.on_transition(&state, &snapshot)
                }
                Notice::PollError(e) => self.callback.on_poll_error(&e),
                Notice::ContentReady(id) => self.callback.on_content_ready(&id),
                Notice::Failed(id, reason) => self.callback.on_failed(&id, &reason),
                Notice::Reset => self.callback.on_reset(),
            }
        }
    }

    /// Tear down whatever is current and open session `current + 1`.
    fn open_session(&self, uploading: bool) -> u64 {
        let mut slot = self.lock();
        slot.current += 1;
        if let Some(old) = slot.session.take() {
            old.teardown();
        }
        let id = slot.current;
        self.view.send_replace(SessionView {
            session: id,
            uploading,
            ..SessionView::default()
        });
        id
    }

    fn on_poll_event(self: &Arc<Self>, session_id: u64, event: PollEvent) {
        let mut notices = Vec::new();
        let completed = {
            let slot = self.lock();
            let Some(session) = slot.live(session_id) else {
                debug!(session = session_id, "Ignoring poll event from a replaced session");
                return;
            };

            match event {
                PollEvent::Transition { state, snapshot } => {
                    self.apply_status(session, state, snapshot, &mut notices)
                }
                PollEvent::QueryFailed(e) => {
                    let message = e.to_string();
                    self.view
                        .send_modify(|v| v.poll_error = Some(message.clone()));
                    notices.push(Notice::PollError(message));
                    None
                }
                PollEvent::Recovered(snapshot) => {
                    debug!(session = session_id, "Status query recovered");
                    self.view.send_modify(|v| {
                        v.last_status = Some(snapshot);
                        v.poll_error = None;
                    });
                    None
                }
            }
        };
        self.notify(notices);

        if let Some(session) = completed {
            self.watch_primary(session);
        }
    }

    /// Apply a status response. Returns the session when it just entered
    /// `completed`, after its artifact fetches have been launched.
    fn apply_status(
        &self,
        session: &Arc<Session>,
        next: LifecycleState,
        snapshot: StatusSnapshot,
        notices: &mut Vec<Notice>,
    ) -> Option<Arc<Session>> {
        let current = self.view.borrow().state.clone();
        let advances = match (next.rank(), current.rank()) {
            (Some(next_rank), Some(current_rank)) => next_rank > current_rank,
            _ => false,
        };

        if !advances {
            debug!(session = session.id, from = %current, label = %next, "Status does not advance state");
            self.view.send_modify(|v| {
                v.last_status = Some(snapshot);
                v.poll_error = None;
            });
            return None;
        }

        info!(session = session.id, document_id = %session.document.id, "{} → {}", current, next);
        let failure = (next == LifecycleState::Failed).then(|| {
            snapshot
                .error_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_string())
        });

        self.view.send_modify(|v| {
            v.state = next.clone();
            v.last_status = Some(snapshot.clone());
            v.poll_error = None;
            v.failure = failure.clone();
        });
        notices.push(Notice::Transition(next.clone(), snapshot));

        match next {
            LifecycleState::Completed => {
                let document_id = session.document.id.clone();
                session.content.fetch(document_id.clone());
                session.markdown.fetch(document_id.clone());
                session.summary.fetch(document_id);
                Some(Arc::clone(session))
            }
            LifecycleState::Failed => {
                let reason = failure.unwrap_or_else(|| GENERIC_FAILURE.to_string());
                warn!(document_id = %session.document.id, "Processing failed: {}", reason);
                notices.push(Notice::Failed(session.document.id.clone(), reason));
                None
            }
            _ => None,
        }
    }

    /// Wait in the background for the primary artifact to settle.
    fn watch_primary(self: &Arc<Self>, session: Arc<Session>) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        tokio::spawn(async move {
            let primary = session.content.settled().await;
            if let Some(inner) = weak.upgrade() {
                inner.on_primary_settled(&session, primary);
            }
        });
    }

    fn on_primary_settled(&self, session: &Session, primary: ArtifactResult<DocumentContent>) {
        {
            let slot = self.lock();
            if slot.live(session.id).is_none() {
                return;
            }

            if let Some(ref content) = primary.data {
                session.markdown.kind().set_fallback_text(content.text.clone());
                if session.markdown.fill_fallback() {
                    debug!(document_id = %session.document.id, "Markdown failed, showing raw text");
                }
            }
            self.view.send_modify(|v| v.content_ready = true);
        }
        self.notify(vec![Notice::ContentReady(session.document.id.clone())]);
    }
}

/// Drives one document at a time through upload, polling and artifact
/// retrieval.
///
/// Observe progress with [`subscribe`](Self::subscribe) (latest
/// [`SessionView`]) or a [`crate::SessionProgressCallback`] (discrete events).
pub struct LifecycleController {
    backend: Arc<dyn Backend>,
    gate: UploadGate,
    poll_interval: Duration,
    inner: Arc<Inner>,
}

impl LifecycleController {
    pub fn new(config: &ClientConfig, backend: Arc<dyn Backend>) -> Self {
        let (view, _) = watch::channel(SessionView::default());
        let callback = config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback));

        Self {
            backend,
            gate: UploadGate::new(config.max_upload_bytes),
            poll_interval: config.poll_interval(),
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot::default()),
                view,
                callback,
            }),
        }
    }

    /// Controller talking to the HTTP backend at `config.base_url`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ScipherError> {
        let backend = HttpBackend::new(config)?;
        Ok(Self::new(config, Arc::new(backend)))
    }

    // ── Commands ─────────────────────────────────────────────────────────

    /// Start a new session with `file`.
    ///
    /// Any previous session is torn down first. On a refusal or a failed
    /// upload the view stays `idle` with `upload_error` set. On success the
    /// view moves to `uploaded` and polling begins; the returned document
    /// is the backend's record.
    pub async fn submit(&self, file: Option<UploadFile>) -> Result<Document, ScipherError> {
        let session_id = self.inner.open_session(true);

        let inner = &self.inner;
        let submitted = self
            .gate
            .submit_with(self.backend.as_ref(), file.as_ref(), |file| {
                inner.notify(vec![Notice::UploadStart(file.file_name.clone(), file.size())]);
            })
            .await;
        let document = match submitted {
            Ok(document) => document,
            Err(e) => {
                let message = match &e {
                    ScipherError::Rejected(reason) => reason.to_string(),
                    other => other.to_string(),
                };
                self.record_upload_error(session_id, message);
                return Err(e);
            }
        };

        {
            let mut slot = self.inner.lock();
            if slot.current != session_id {
                info!(document_id = %document.id, "Upload finished after its session was replaced");
                return Err(ScipherError::SessionReplaced);
            }
            slot.session = Some(Arc::new(Session::new(
                session_id,
                document.clone(),
                &self.backend,
                self.poll_interval,
            )));
            self.inner.view.send_modify(|v| {
                v.uploading = false;
                v.state = LifecycleState::Uploaded;
                v.document = Some(document.clone());
            });
        }
        self.inner.notify(vec![Notice::Uploaded(document.clone())]);

        // Polling starts after the upload event so observers see it first.
        let slot = self.inner.lock();
        let Some(session) = slot.live(session_id) else {
            return Err(ScipherError::SessionReplaced);
        };
        let weak = Arc::downgrade(&self.inner);
        session.poller.start(document.id.clone(), move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_poll_event(session_id, event);
            }
        });
        info!(document_id = %document.id, "Document uploaded, tracking status");
        Ok(document)
    }

    /// Discard the current session and go back to `idle`.
    pub fn start_over(&self) {
        let id = self.inner.open_session(false);
        info!(session = id, "Session reset");
        self.inner.notify(vec![Notice::Reset]);
    }

    pub fn refetch_content(&self) -> Option<ArtifactTask> {
        self.current_session()?.content.refetch()
    }

    pub fn refetch_markdown(&self) -> Option<ArtifactTask> {
        self.current_session()?.markdown.refetch()
    }

    pub fn refetch_summary(&self) -> Option<ArtifactTask> {
        self.current_session()?.summary.refetch()
    }

    // ── Observation ──────────────────────────────────────────────────────

    pub fn view(&self) -> SessionView {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view.subscribe()
    }

    pub fn document_id(&self) -> Option<String> {
        self.view().document_id().map(str::to_string)
    }

    /// Current artifacts. All idle before `completed` or without a session.
    pub fn artifacts(&self) -> ArtifactsView {
        self.current_session()
            .map(|s| s.artifacts())
            .unwrap_or_default()
    }

    pub fn content(&self) -> ArtifactResult<DocumentContent> {
        self.artifacts().content
    }

    pub fn markdown(&self) -> ArtifactResult<String> {
        self.artifacts().markdown
    }

    pub fn summary(&self) -> ArtifactResult<Summary> {
        self.artifacts().summary
    }

    /// Wait for the current session to settle.
    ///
    /// Resolves with the view once the document completed and its primary
    /// content resolved. A backend-reported failure yields
    /// [`ScipherError::ProcessingFailed`]; a new submit or start-over in the
    /// meantime yields [`ScipherError::SessionReplaced`].
    pub async fn wait_until_settled(&self) -> Result<SessionView, ScipherError> {
        let mut rx = self.inner.view.subscribe();
        let session = rx.borrow().session;

        let view = rx
            .wait_for(|v| {
                v.session != session
                    || v.content_ready
                    || v.state == LifecycleState::Failed
                    || (!v.uploading && v.document.is_none())
            })
            .await
            .map_err(|_| ScipherError::SessionReplaced)?
            .clone();

        if view.session != session {
            return Err(ScipherError::SessionReplaced);
        }
        match (&view.state, &view.document) {
            (LifecycleState::Failed, Some(document)) => Err(ScipherError::ProcessingFailed {
                document_id: document.id.clone(),
                reason: view.failure.clone().unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            }),
            (_, None) => Err(ScipherError::NoSession),
            _ => Ok(view),
        }
    }

    /// Wait until none of the current session's artifacts is loading.
    pub async fn wait_for_artifacts(&self) -> ArtifactsView {
        let Some(session) = self.current_session() else {
            return ArtifactsView::default();
        };
        let (content, markdown, summary) = tokio::join!(
            session.content.settled(),
            session.markdown.settled(),
            session.summary.settled()
        );
        ArtifactsView {
            content,
            markdown,
            summary,
        }
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        let slot = self.inner.lock();
        slot.live(slot.current).cloned()
    }

    fn record_upload_error(&self, session_id: u64, message: String) {
        let slot = self.inner.lock();
        if slot.current == session_id {
            self.inner.view.send_modify(|v| {
                v.uploading = false;
                v.upload_error = Some(message);
            });
        }
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        if let Some(session) = self.inner.lock().session.take() {
            session.teardown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectReason;
    use crate::progress::SessionProgressCallback;
    use crate::test_support::{
        backend_error, content, network_error, snapshot, summary, wait_until, FakeBackend,
    };
    use crate::upload::PDF_MIME;
    use tokio_test::assert_ok;

    const TICK_MS: u64 = 5;

    #[derive(Default)]
    struct Journal(std::sync::Mutex<Vec<String>>);

    impl Journal {
        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn push(&self, entry: String) {
            self.0.lock().unwrap().push(entry);
        }
    }

    impl SessionProgressCallback for Journal {
        fn on_upload_start(&self, file_name: &str, size: u64) {
            self.push(format!("upload {file_name} {size}"));
        }
        fn on_uploaded(&self, document: &Document) {
            self.push(format!("uploaded {}", document.id));
        }
        fn on_transition(&self, state: &LifecycleState, _snapshot: &StatusSnapshot) {
            self.push(format!("-> {state}"));
        }
        fn on_content_ready(&self, document_id: &str) {
            self.push(format!("ready {document_id}"));
        }
        fn on_failed(&self, document_id: &str, reason: &str) {
            self.push(format!("failed {document_id}: {reason}"));
        }
        fn on_reset(&self) {
            self.push("reset".into());
        }
    }

    fn controller(backend: &Arc<FakeBackend>) -> LifecycleController {
        let config = ClientConfig::builder()
            .poll_interval_ms(TICK_MS)
            .build()
            .unwrap();
        LifecycleController::new(&config, backend.clone())
    }

    fn controller_with_journal(backend: &Arc<FakeBackend>) -> (LifecycleController, Arc<Journal>) {
        let journal = Arc::new(Journal::default());
        let config = ClientConfig::builder()
            .poll_interval_ms(TICK_MS)
            .progress_callback(journal.clone())
            .build()
            .unwrap();
        (LifecycleController::new(&config, backend.clone()), journal)
    }

    fn pdf(size: usize) -> Option<UploadFile> {
        Some(UploadFile::new("paper.pdf", Some(PDF_MIME), vec![b'%'; size]))
    }

    #[tokio::test]
    async fn completed_document_shows_content_and_summary() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["uploaded", "processing", "completed"]);
        backend.push_summary(Ok(summary(4, 12_000)));
        let controller = controller(&backend);

        let document = assert_ok!(controller.submit(pdf(2 * 1024 * 1024)).await);
        assert_eq!(document.id, "doc-1");
        assert_eq!(document.file_size, 2 * 1024 * 1024);

        let view = assert_ok!(controller.wait_until_settled().await);
        assert_eq!(view.state, LifecycleState::Completed);
        assert!(view.content_ready);

        let artifacts = controller.wait_for_artifacts().await;
        assert_eq!(artifacts.content.data.unwrap().text, "raw text of doc-1");
        assert_eq!(artifacts.markdown.data.as_deref(), Some("# doc-1"));
        let summary = artifacts.summary.data.unwrap();
        assert_eq!(summary.chunk_count, 4);
        assert_eq!(summary.source_characters, 12_000);
        assert!(summary.levels().iter().all(|(_, text)| text.is_some()));

        // No status query after the terminal one.
        tokio::time::sleep(Duration::from_millis(TICK_MS * 10)).await;
        assert_eq!(backend.status_calls("doc-1"), 3);
    }

    #[tokio::test]
    async fn rejected_file_stays_idle_with_reason() {
        let backend = Arc::new(FakeBackend::new());
        let controller = controller(&backend);

        let err = controller.submit(None).await.unwrap_err();
        assert!(matches!(err, ScipherError::Rejected(RejectReason::NoFileSelected)));

        let view = controller.view();
        assert_eq!(view.state, LifecycleState::Idle);
        assert!(!view.uploading);
        assert_eq!(view.upload_error.as_deref(), Some("no file selected"));
        assert_eq!(backend.upload_calls(), 0);
    }

    #[tokio::test]
    async fn upload_failure_is_recorded_and_not_retried() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail_next_upload(backend_error("Database error: disk full"));
        let controller = controller(&backend);

        let err = controller.submit(pdf(10)).await.unwrap_err();
        assert!(matches!(err, ScipherError::Client(_)));
        assert_eq!(
            controller.view().upload_error.as_deref(),
            Some("Database error: disk full")
        );
        assert_eq!(backend.upload_calls(), 1);
        assert!(matches!(
            controller.wait_until_settled().await,
            Err(ScipherError::NoSession)
        ));
    }

    #[tokio::test]
    async fn failed_document_records_reason_and_skips_artifacts() {
        let backend = Arc::new(FakeBackend::new());
        let mut failed = snapshot("failed");
        failed.error_message = Some("PDF has no extractable text".into());
        backend.push_status("doc-1", Ok(failed));
        let (controller, journal) = controller_with_journal(&backend);

        controller.submit(pdf(10)).await.unwrap();
        match controller.wait_until_settled().await {
            Err(ScipherError::ProcessingFailed { document_id, reason }) => {
                assert_eq!(document_id, "doc-1");
                assert_eq!(reason, "PDF has no extractable text");
            }
            other => panic!("expected ProcessingFailed, got {other:?}"),
        }

        assert_eq!(controller.view().failure.as_deref(), Some("PDF has no extractable text"));
        assert_eq!(backend.content_calls(), 0);
        assert_eq!(backend.markdown_calls(), 0);
        assert_eq!(backend.summary_calls(), 0);
        assert!(journal
            .entries()
            .contains(&"failed doc-1: PDF has no extractable text".to_string()));
    }

    #[tokio::test]
    async fn failure_without_message_uses_generic_reason() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["failed"]);
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        let _ = controller.wait_until_settled().await;
        assert_eq!(controller.view().failure.as_deref(), Some(GENERIC_FAILURE));
    }

    #[tokio::test]
    async fn transient_poll_failures_still_reach_completed() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_status("doc-1", Err(network_error()));
        backend.push_status("doc-1", Err(network_error()));
        backend.push_labels("doc-1", &["completed"]);
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        let view = assert_ok!(controller.wait_until_settled().await);
        assert_eq!(view.state, LifecycleState::Completed);
        assert_eq!(view.poll_error, None);

        controller.wait_for_artifacts().await;
        assert_eq!(backend.markdown_calls(), 1);
        assert_eq!(backend.summary_calls(), 1);
    }

    #[tokio::test]
    async fn poll_error_is_visible_while_polling() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_status("doc-1", Err(network_error()));
        let gate = backend.gate_status("doc-1");
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        wait_until("poll error", || controller.view().poll_error.is_some()).await;
        assert_eq!(controller.view().state, LifecycleState::Uploaded);

        gate.send(Ok(snapshot("processing"))).unwrap();
        wait_until("recovery", || controller.view().poll_error.is_none()).await;
        assert_eq!(controller.view().state, LifecycleState::Processing);
    }

    #[tokio::test]
    async fn poll_error_clears_when_same_label_comes_back() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["processing"]);
        backend.push_status("doc-1", Err(network_error()));
        backend.push_labels("doc-1", &["processing", "processing", "processing"]);
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        wait_until("six queries", || backend.status_calls("doc-1") >= 6).await;

        let view = controller.view();
        assert_eq!(view.state, LifecycleState::Processing);
        assert_eq!(view.poll_error, None);
        assert_eq!(
            view.last_status.map(|s| s.status),
            Some(LifecycleState::Processing)
        );
    }

    #[tokio::test]
    async fn state_never_moves_backward() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["processing", "uploaded", "queued", "idle", "completed"]);
        let (controller, journal) = controller_with_journal(&backend);
        let mut rx = controller.subscribe();

        controller.submit(pdf(10)).await.unwrap();
        let mut seen = Vec::new();
        while !rx.borrow().content_ready {
            rx.changed().await.unwrap();
            let state = rx.borrow().state.clone();
            if seen.last() != Some(&state) {
                seen.push(state);
            }
        }

        assert!(seen
            .windows(2)
            .all(|w| w[0].rank().unwrap() <= w[1].rank().unwrap()));
        let transitions: Vec<_> = journal
            .entries()
            .into_iter()
            .filter(|e| e.starts_with("->"))
            .collect();
        assert_eq!(transitions, vec!["-> processing", "-> completed"]);
    }

    #[tokio::test]
    async fn unrecognized_label_updates_last_status_only() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["processing", "queued"]);
        let gate = backend.gate_status("doc-1");
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        wait_until("queued", || {
            controller
                .view()
                .last_status
                .is_some_and(|s| s.status == LifecycleState::Unrecognized("queued".into()))
        })
        .await;
        assert_eq!(controller.view().state, LifecycleState::Processing);
        drop(gate);
    }

    #[tokio::test]
    async fn markdown_failure_falls_back_to_raw_text() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["completed"]);
        backend.push_markdown(Err(backend_error("Markdown export failed")));
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        controller.wait_until_settled().await.unwrap();
        let artifacts = controller.wait_for_artifacts().await;

        assert_eq!(artifacts.markdown.data.as_deref(), Some("raw text of doc-1"));
        assert_eq!(artifacts.markdown.error.as_deref(), Some("Markdown export failed"));
    }

    #[tokio::test]
    async fn summary_loads_independently_of_content_ready() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["completed"]);
        let summary_gate = backend.gate_summary();
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        let view = controller.wait_until_settled().await.unwrap();
        assert!(view.content_ready);
        assert!(controller.summary().loading);

        summary_gate.send(Ok(summary(2, 900))).unwrap();
        let artifacts = controller.wait_for_artifacts().await;
        assert_eq!(artifacts.summary.data.unwrap().chunk_count, 2);
    }

    #[tokio::test]
    async fn new_upload_stops_old_session_and_ignores_its_results() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["completed"]);
        let stale_content = backend.gate_content();
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        wait_until("old content request", || backend.content_calls() == 1).await;

        backend.push_labels("doc-2", &["processing", "completed"]);
        controller.submit(pdf(20)).await.unwrap();
        let old_polls = backend.status_calls("doc-1");

        let view = controller.wait_until_settled().await.unwrap();
        assert_eq!(view.document_id(), Some("doc-2"));

        let _ = stale_content.send(Ok(content("doc-1", "stale")));
        tokio::time::sleep(Duration::from_millis(TICK_MS * 4)).await;

        let artifacts = controller.artifacts();
        assert_eq!(artifacts.content.data.unwrap().text, "raw text of doc-2");
        assert_eq!(backend.status_calls("doc-1"), old_polls);
    }

    #[tokio::test]
    async fn old_poller_stops_when_replaced_mid_processing() {
        let backend = Arc::new(FakeBackend::new());
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        wait_until("doc-1 polled", || backend.status_calls("doc-1") >= 2).await;
        controller.submit(pdf(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(TICK_MS)).await;
        let frozen = backend.status_calls("doc-1");

        wait_until("doc-2 polled", || backend.status_calls("doc-2") >= 3).await;
        assert_eq!(backend.status_calls("doc-1"), frozen);
    }

    #[tokio::test]
    async fn waiter_learns_when_session_is_replaced() {
        let backend = Arc::new(FakeBackend::new());
        let controller = Arc::new(controller(&backend));
        controller.submit(pdf(10)).await.unwrap();

        let waiter = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.wait_until_settled().await })
        };
        wait_until("polling", || backend.status_calls("doc-1") >= 1).await;
        controller.start_over();

        assert!(matches!(
            waiter.await.unwrap(),
            Err(ScipherError::SessionReplaced)
        ));
    }

    #[tokio::test]
    async fn start_over_discards_in_flight_artifacts() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["completed"]);
        let markdown_gate = backend.gate_markdown();
        let (controller, journal) = controller_with_journal(&backend);

        controller.submit(pdf(10)).await.unwrap();
        controller.wait_until_settled().await.unwrap();
        assert!(controller.markdown().loading);

        controller.start_over();
        let _ = markdown_gate.send(Ok("# late".into()));
        tokio::time::sleep(Duration::from_millis(TICK_MS * 4)).await;

        let view = controller.view();
        assert_eq!(view.state, LifecycleState::Idle);
        assert_eq!(view.document, None);
        assert_eq!(view.session, 2);
        assert_eq!(controller.markdown(), ArtifactResult::default());
        assert!(controller.refetch_markdown().is_none());
        assert_eq!(journal.entries().last().map(String::as_str), Some("reset"));
    }

    #[tokio::test]
    async fn refetch_summary_recomputes() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["completed"]);
        backend.push_summary(Ok(summary(1, 10)));
        backend.push_summary(Err(backend_error("Summarizer unavailable")));
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        controller.wait_until_settled().await.unwrap();
        controller.wait_for_artifacts().await;

        controller.refetch_summary().unwrap().await.unwrap();
        let result = controller.summary();
        assert_eq!(result.data, None);
        assert_eq!(result.error.as_deref(), Some("Summarizer unavailable"));
        assert_eq!(backend.summary_calls(), 2);
    }

    #[tokio::test]
    async fn callbacks_follow_the_session() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_labels("doc-1", &["processing", "completed"]);
        let (controller, journal) = controller_with_journal(&backend);

        controller.submit(pdf(64)).await.unwrap();
        controller.wait_until_settled().await.unwrap();

        assert_eq!(
            journal.entries(),
            vec![
                "upload paper.pdf 64",
                "uploaded doc-1",
                "-> processing",
                "-> completed",
                "ready doc-1",
            ]
        );
    }

    #[tokio::test]
    async fn dropping_controller_stops_polling() {
        let backend = Arc::new(FakeBackend::new());
        let controller = controller(&backend);

        controller.submit(pdf(10)).await.unwrap();
        wait_until("polled", || backend.status_calls("doc-1") >= 1).await;
        drop(controller);
        tokio::time::sleep(Duration::from_millis(TICK_MS)).await;
        let calls = backend.status_calls("doc-1");
        tokio::time::sleep(Duration::from_millis(TICK_MS * 10)).await;
        assert_eq!(backend.status_calls("doc-1"), calls);
    }
}
