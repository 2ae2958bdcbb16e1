//! Stream adapters over a controller's session view.
//!
//! ## Why streams?
//!
//! The watch channel behind [`LifecycleController::subscribe`] only holds
//! the latest value. A `Stream` fits combinators (`take_while`, `map`,
//! `select`) and renders naturally in an async UI loop.
//!
//! Like any watch subscriber, a stream may skip intermediate views when the
//! consumer is slower than the producer; it always observes the latest one.

use crate::lifecycle::{LifecycleController, SessionView};
use crate::models::LifecycleState;
use futures::stream;
use std::pin::Pin;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of session views.
pub type SessionStream = Pin<Box<dyn Stream<Item = SessionView> + Send>>;

/// Every published view, starting with the current one.
pub fn session_updates(controller: &LifecycleController) -> SessionStream {
    Box::pin(WatchStream::new(controller.subscribe()))
}

/// One item per lifecycle state change of the current session, ending once
/// the session settles or is replaced.
///
/// "Settled" means failed, or completed with its primary content resolved.
/// The final view is yielded before the stream ends.
pub fn state_changes(controller: &LifecycleController) -> SessionStream {
    let session = controller.view().session;
    let start = Some((controller.subscribe(), None::<(LifecycleState, bool)>));

    Box::pin(stream::unfold(start, move |state| async move {
        let (mut rx, last) = state?;
        loop {
            let view = rx.borrow_and_update().clone();
            if view.session != session {
                return None;
            }
            let key = (view.state.clone(), view.content_ready);
            if last.as_ref() != Some(&key) {
                let settled = view.content_ready || view.state == LifecycleState::Failed;
                let next = (!settled).then_some((rx, Some(key)));
                return Some((view, next));
            }
            rx.changed().await.ok()?;
        }
    }))
}
