use std::sync::Arc;
use tokio::sync::watch;

/// The lifecycle of a streamed exchange.
///
/// ```text
/// Idle -> Sending -> Streaming -> Completed
///            |           |-----> Failed
///            |           '-----> Cancelled
///            '-----> Failed | Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum SessionState {
    /// Nothing has been sent yet.
    Idle,
    /// The request is in flight, no body yet.
    Sending,
    /// Reading, decoding and applying the body.
    Streaming,
    /// The body ended normally.
    Completed,
    /// Transport error, non-success status or missing body.
    Failed,
    /// Stopped by the caller.
    Cancelled,
}

impl SessionState {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }

    /// Sending or streaming: a request is in flight and can be stopped.
    pub(crate) fn is_active(self) -> bool {
        matches!(self, SessionState::Sending | SessionState::Streaming)
    }

    fn can_become(self, next: SessionState) -> bool {
        match (self, next) {
            (SessionState::Idle, SessionState::Sending) => true,
            (SessionState::Sending, SessionState::Streaming) => true,
            (SessionState::Sending | SessionState::Streaming, next) => next.is_terminal(),
            _ => false,
        }
    }
}

/// The published state of a session, shared between the session and its
/// handles. Illegal transitions, including any transition out of a terminal
/// state, are refused.
#[derive(Debug, Clone)]
pub(super) struct SharedState {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SharedState {
    pub(super) fn new() -> SharedState {
        let (tx, _) = watch::channel(SessionState::Idle);

        SharedState { tx: Arc::new(tx) }
    }

    pub(super) fn get(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Moves to `next` if the transition is legal. Returns whether it was.
    pub(super) fn transition(&self, next: SessionState) -> bool {
        let moved = self.tx.send_if_modified(|state| {
            if state.can_become(next) {
                *state = next;
                true
            } else {
                false
            }
        });

        if moved {
            tracing::debug!(state = %next, "session transition");
        }

        moved
    }

    /// Like [`SharedState::transition`], but runs `effect` while the state is
    /// locked, so no other transition can interleave with it.
    pub(super) fn transition_with<F: FnOnce()>(&self, next: SessionState, effect: F) -> bool {
        let moved = self.tx.send_if_modified(move |state| {
            if state.can_become(next) {
                *state = next;
                effect();

                true
            } else {
                false
            }
        });

        if moved {
            tracing::debug!(state = %next, "session transition");
        }

        moved
    }

    pub(super) fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }
}
