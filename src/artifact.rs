//! Fetch-and-hold for derived artifacts (content, markdown, summary).
//!
//! One [`ArtifactFetcher`] exists per artifact kind per session. It
//! publishes an [`ArtifactResult`] through a `watch` channel and runs each
//! fetch as a background task, so `fetch`/`refetch` never block the caller.
//!
//! ## Generations
//!
//! Every fetch takes the next generation number and writes it into the
//! published state in the same step as resetting to `loading`. When a fetch
//! resolves it may only write if the state still carries its generation.
//! An older fetch that resolves after a newer one was requested is therefore
//! dropped: the displayed result follows request order, never response
//! order. [`ArtifactFetcher::invalidate`] bumps the generation without
//! starting a fetch, which is how a torn-down session silences its
//! in-flight requests.

use crate::api::Backend;
use crate::error::ClientError;
use crate::models::{DocumentContent, Summary};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to a running fetch. Awaiting it waits for the attempt to resolve
/// (whether or not its result was applied).
pub type ArtifactTask = JoinHandle<()>;

/// Externally visible state of one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactResult<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    generation: u64,
}

impl<T> Default for ArtifactResult<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            generation: 0,
        }
    }
}

impl<T> ArtifactResult<T> {
    /// Generation of the fetch this state belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Neither loading nor failed nor empty.
    pub fn is_ready(&self) -> bool {
        !self.loading && self.error.is_none() && self.data.is_some()
    }

    /// Not loading: idle, ready, or failed.
    pub fn is_settled(&self) -> bool {
        !self.loading
    }

    fn loading(generation: u64) -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
            generation,
        }
    }
}

/// One kind of artifact: how to load it and what to show if that fails.
#[async_trait]
pub trait ArtifactKind: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Short name for logs.
    const NAME: &'static str;

    async fn load(
        &self,
        backend: &dyn Backend,
        document_id: &str,
    ) -> Result<Self::Output, ClientError>;

    /// Degraded content to display alongside the error when `load` fails.
    fn fallback(&self) -> Option<Self::Output> {
        None
    }
}

/// Structured content (`GET /api/document/{id}`). The primary artifact.
#[derive(Debug, Default)]
pub struct ContentArtifact;

#[async_trait]
impl ArtifactKind for ContentArtifact {
    type Output = DocumentContent;
    const NAME: &'static str = "content";

    async fn load(
        &self,
        backend: &dyn Backend,
        document_id: &str,
    ) -> Result<DocumentContent, ClientError> {
        backend.document(document_id).await
    }
}

/// Rendered markdown, falling back to the raw extracted text.
#[derive(Debug, Default)]
pub struct MarkdownArtifact {
    fallback_text: Mutex<Option<String>>,
}

impl MarkdownArtifact {
    /// Remember raw text to show if the markdown endpoint fails. Blank text
    /// is ignored.
    pub fn set_fallback_text(&self, text: impl Into<String>) {
        let text = text.into();
        if !text.trim().is_empty() {
            *self
                .fallback_text
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(text);
        }
    }
}

#[async_trait]
impl ArtifactKind for MarkdownArtifact {
    type Output = String;
    const NAME: &'static str = "markdown";

    async fn load(&self, backend: &dyn Backend, document_id: &str) -> Result<String, ClientError> {
        backend.markdown(document_id).await
    }

    fn fallback(&self) -> Option<String> {
        self.fallback_text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Three-level summary. No fallback: failures surface as-is.
#[derive(Debug, Default)]
pub struct SummaryArtifact;

#[async_trait]
impl ArtifactKind for SummaryArtifact {
    type Output = Summary;
    const NAME: &'static str = "summary";

    async fn load(&self, backend: &dyn Backend, document_id: &str) -> Result<Summary, ClientError> {
        backend.summary(document_id).await
    }
}

/// Loads one artifact kind and holds the latest requested result.
pub struct ArtifactFetcher<K: ArtifactKind> {
    kind: Arc<K>,
    backend: Arc<dyn Backend>,
    state: Arc<watch::Sender<ArtifactResult<K::Output>>>,
    document_id: Mutex<Option<String>>,
}

impl<K: ArtifactKind> ArtifactFetcher<K> {
    pub fn new(kind: K, backend: Arc<dyn Backend>) -> Self {
        let (state, _) = watch::channel(ArtifactResult::default());
        Self {
            kind: Arc::new(kind),
            backend,
            state: Arc::new(state),
            document_id: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> ArtifactResult<K::Output> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ArtifactResult<K::Output>> {
        self.state.subscribe()
    }

    /// Start loading the artifact for `document_id`.
    pub fn fetch(&self, document_id: impl Into<String>) -> ArtifactTask {
        let document_id = document_id.into();
        *self
            .document_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(document_id.clone());
        self.launch(document_id)
    }

    /// Load again for the last fetched document, superseding any attempt in
    /// flight. `None` if nothing was fetched yet.
    pub fn refetch(&self) -> Option<ArtifactTask> {
        let document_id = self
            .document_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        Some(self.launch(document_id))
    }

    /// Discard whatever is in flight and return to the empty state.
    pub fn invalidate(&self) {
        self.state.send_modify(|current| {
            *current = ArtifactResult {
                generation: current.generation + 1,
                ..ArtifactResult::default()
            };
        });
    }

    /// Show the kind's fallback if the current attempt failed with nothing
    /// to display. Returns whether the state changed.
    pub fn fill_fallback(&self) -> bool {
        let Some(fallback) = self.kind.fallback() else {
            return false;
        };
        self.state.send_if_modified(|current| {
            if current.loading || current.error.is_none() || current.data.is_some() {
                return false;
            }
            current.data = Some(fallback);
            true
        })
    }

    /// Wait until the current attempt has resolved.
    pub async fn settled(&self) -> ArtifactResult<K::Output> {
        let mut rx = self.state.subscribe();
        let result = match rx.wait_for(|r| r.is_settled()).await {
            Ok(state) => state.clone(),
            Err(_) => self.current(),
        };
        result
    }

    fn launch(&self, document_id: String) -> ArtifactTask {
        let mut generation = 0;
        self.state.send_modify(|current| {
            generation = current.generation + 1;
            *current = ArtifactResult::loading(generation);
        });
        debug!(artifact = K::NAME, document_id = %document_id, generation, "Fetching");

        let kind = Arc::clone(&self.kind);
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let outcome = kind.load(backend.as_ref(), &document_id).await;
            if let Err(ref e) = outcome {
                warn!(artifact = K::NAME, document_id = %document_id, "Fetch failed: {}", e);
            }

            let applied = state.send_if_modified(|current| {
                if current.generation != generation {
                    return false;
                }
                *current = match outcome {
                    Ok(data) => ArtifactResult {
                        data: Some(data),
                        loading: false,
                        error: None,
                        generation,
                    },
                    Err(e) => ArtifactResult {
                        data: kind.fallback(),
                        loading: false,
                        error: Some(e.to_string()),
                        generation,
                    },
                };
                true
            });

            if !applied {
                debug!(artifact = K::NAME, document_id = %document_id, generation, "Discarding superseded result");
            }
        })
    }
}
