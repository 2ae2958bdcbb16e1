//! Status polling for a submitted document.
//!
//! ## Loop
//!
//! ```text
//! tick ─▶ GET /api/status/{id} ─▶ normalise ─▶ emit ─▶ terminal? ─▶ stop
//!  ▲                                                      │ no
//!  └──────────────────────────────────────────────────────┘
//! ```
//!
//! Queries are serialised: the next tick is only awaited after the previous
//! response has been handled, so at most one query is in flight and events
//! arrive in request order.
//!
//! A failed query is reported as [`PollEvent::QueryFailed`] and the loop
//! carries on with the next tick. "My query failed" is not "the document
//! failed"; only a backend-reported `failed` ends polling.
//!
//! [`StatusPoller::stop`] cancels the loop synchronously. A query that is in
//! flight at that moment is dropped and its response, if any, never reaches
//! the callback. A callback invocation that has already begun is not
//! interrupted.

use crate::api::Backend;
use crate::error::ClientError;
use crate::models::{LifecycleState, StatusSnapshot};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the poller reports to its owner.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// The normalised state changed (or this is the first response).
    Transition {
        state: LifecycleState,
        snapshot: StatusSnapshot,
    },
    /// The status query itself failed. Polling continues.
    QueryFailed(ClientError),
    /// A query succeeded after one or more failures without changing the
    /// state.
    Recovered(StatusSnapshot),
}

/// Callback invoked for every [`PollEvent`].
pub type PollCallback = Arc<dyn Fn(PollEvent) + Send + Sync>;

struct ActivePoll {
    document_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Repeatedly queries the backend for one document's status.
///
/// `start` replaces any running poll; `stop` is idempotent and safe before
/// `start`. Dropping the poller stops it.
pub struct StatusPoller {
    backend: Arc<dyn Backend>,
    interval: Duration,
    active: Mutex<Option<ActivePoll>>,
}

impl StatusPoller {
    pub fn new(backend: Arc<dyn Backend>, interval: Duration) -> Self {
        Self {
            backend,
            interval,
            active: Mutex::new(None),
        }
    }

    /// Begin polling `document_id`, reporting through `on_event`.
    ///
    /// The first query is issued immediately. Must be called from within a
    /// tokio runtime.
    pub fn start<F>(&self, document_id: impl Into<String>, on_event: F)
    where
        F: Fn(PollEvent) + Send + Sync + 'static,
    {
        let document_id = document_id.into();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.backend),
            document_id.clone(),
            self.interval,
            cancel.clone(),
            Arc::new(on_event),
        ));

        let previous = self.lock().replace(ActivePoll {
            document_id,
            cancel,
            task,
        });
        if let Some(previous) = previous {
            debug!(document_id = %previous.document_id, "Replacing running poll");
            previous.halt();
        }
    }

    /// Halt polling. No query is issued and no response is delivered after
    /// this returns, but a callback already running on another thread may
    /// still finish. Owners that need a hard cutoff check their own state
    /// inside the callback.
    pub fn stop(&self) {
        let active = self.lock().take();
        if let Some(active) = active {
            debug!(document_id = %active.document_id, "Polling stopped");
            active.halt();
        }
    }

    /// `true` while a poll loop is alive (not stopped, not finished).
    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// The document currently being polled, if any.
    pub fn document_id(&self) -> Option<String> {
        self.lock().as_ref().map(|active| active.document_id.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ActivePoll>> {
        self.active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ActivePoll {
    fn halt(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    backend: Arc<dyn Backend>,
    document_id: String,
    interval: Duration,
    cancel: CancellationToken,
    on_event: PollCallback,
) {
    info!(document_id = %document_id, "Polling status every {}ms", interval.as_millis());

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<LifecycleState> = None;
    let mut failing = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = backend.status(&document_id) => result,
        };

        // stop() may have landed while the response was being decoded.
        if cancel.is_cancelled() {
            debug!(document_id = %document_id, "Discarding status response after stop");
            break;
        }

        match result {
            Ok(snapshot) => {
                let state = snapshot.status.clone();
                debug!(document_id = %document_id, status = %state, "Status received");
                let terminal = state.is_terminal();
                if last.as_ref() != Some(&state) {
                    last = Some(state.clone());
                    on_event(PollEvent::Transition { state, snapshot });
                } else if failing {
                    on_event(PollEvent::Recovered(snapshot));
                }
                failing = false;
                if terminal {
                    info!(document_id = %document_id, "Terminal status reached, polling ends");
                    break;
                }
            }
            Err(e) => {
                warn!(document_id = %document_id, "Status query failed (will retry): {}", e);
                failing = true;
                on_event(PollEvent::QueryFailed(e));
            }
        }
    }
}
