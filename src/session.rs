//! A streamed chat exchange.
//!
//! A [`ChatSession`] drives exactly one request through the states described by
//! [`SessionState`]. Starting it appends an empty assistant placeholder to the
//! transcript, sends the conversation, then reads the body chunk by chunk. Every
//! decoded token is appended to an accumulator and the placeholder's content is
//! *replaced* with the accumulator, so the transcript always holds the complete
//! reply received so far no matter how the body was fragmented. The observer
//! passed to [`ChatSession::start`] is told about each token as it lands.
//!
//! A session can be stopped through any of its [`SessionHandle`]s while it is
//! sending or streaming. The partial reply is kept; anything decoded but not
//! yet applied when the stop happens is discarded. When a session fails or is
//! stopped before a single token arrived, the placeholder is removed again.
//!
//! Sessions are single-use and never retry. Sending again means building a new
//! session.

mod state;

use futures_util::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::chat::{Message, Transcript};
use crate::router::{self, CompletionTransport, EventDecoder, StreamEvent};

pub(crate) use state::SessionState;
use state::SharedState;

#[derive(Error, Debug)]
pub(crate) enum Error {
    /// No model identifier was given
    #[error("no model was specified")]
    EmptyModel,
    /// The transcript does not end with a non-empty user message
    #[error("the conversation does not end with a prompt to answer")]
    NothingToSend,
    /// `start` was called on a session which already left `Idle`
    #[error("the session was already started")]
    AlreadyStarted,
    /// The exchange failed in transit: network, DNS, TLS or a dropped body
    #[error("{0}")]
    Transport(#[source] router::Error),
    /// The router answered, but not with a stream: non-success status, an
    /// empty body or a body which cannot be buffered
    #[error("{0}")]
    Protocol(#[source] router::Error),
}

impl From<router::Error> for Error {
    fn from(err: router::Error) -> Self {
        if err.kind().is_protocol() {
            Error::Protocol(err)
        } else {
            Error::Transport(err)
        }
    }
}

/// How a session that did not fail ended. Both variants carry the reply as it
/// stands in the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Completed(String),
    Cancelled(String),
}

/// A token applied to the transcript.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Update<'a> {
    /// The newly received piece of text.
    pub token: &'a str,
    /// The full reply so far, as now stored in the transcript.
    pub content: &'a str,
}

/// A cloneable handle on a session's state and cancellation.
#[derive(Debug, Clone)]
pub(crate) struct SessionHandle {
    cancel: CancellationToken,
    state: SharedState,
}

impl SessionHandle {
    /// Stops the exchange. Only has an effect while sending or streaming;
    /// returns whether the session was stopped.
    pub(crate) fn stop(&self) -> bool {
        let cancel = &self.cancel;

        self.state
            .transition_with(SessionState::Cancelled, || cancel.cancel())
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state.get()
    }

    /// True while a request is in flight.
    pub(crate) fn is_loading(&self) -> bool {
        self.state().is_active()
    }

    /// Waits until the session reaches a terminal state.
    pub(crate) async fn finished(&self) -> SessionState {
        let mut rx = self.state.subscribe();

        let reached = rx.wait_for(|state| state.is_terminal()).await.map(|s| *s);

        // The sender lives as long as this handle, the channel cannot close
        reached.unwrap_or_else(|_| self.state())
    }
}

pub(crate) struct ChatSession<'t, T: CompletionTransport + ?Sized> {
    transport: &'t T,
    handle: SessionHandle,
}

impl<'t, T: CompletionTransport + ?Sized> ChatSession<'t, T> {
    pub(crate) fn new(transport: &'t T) -> ChatSession<'t, T> {
        ChatSession {
            transport,
            handle: SessionHandle {
                cancel: CancellationToken::new(),
                state: SharedState::new(),
            },
        }
    }

    pub(crate) fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub(crate) fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Runs the exchange to the end. `transcript` must end with the user's
    /// prompt; on return its last message is the reply (complete or partial),
    /// unless the session failed or was stopped before any token arrived.
    pub(crate) async fn start<F>(
        &self,
        model: &str,
        transcript: &mut Transcript,
        mut observer: F,
    ) -> Result<Outcome, Error>
    where
        F: FnMut(Update<'_>),
    {
        if self.state() != SessionState::Idle {
            return Err(Error::AlreadyStarted);
        }

        if model.trim().is_empty() {
            return Err(Error::EmptyModel);
        }

        if !transcript.awaiting_reply() {
            return Err(Error::NothingToSend);
        }

        let request = transcript.messages().to_vec();

        if !self.handle.state.transition(SessionState::Sending) {
            return Err(Error::AlreadyStarted);
        }

        transcript.push_placeholder();

        let result = self
            .exchange(model, &request, transcript, &mut observer)
            .await;

        if !matches!(result, Ok(Outcome::Completed(_))) {
            transcript.discard_placeholder();
        }

        result
    }

    async fn exchange<F>(
        &self,
        model: &str,
        request: &[Message],
        transcript: &mut Transcript,
        observer: &mut F,
    ) -> Result<Outcome, Error>
    where
        F: FnMut(Update<'_>),
    {
        let cancel = &self.handle.cancel;
        let state = &self.handle.state;

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = self.transport.stream_chat(model, request) => Some(opened),
        };

        let mut body = match opened {
            None => return Ok(Outcome::Cancelled(String::new())),
            Some(Ok(body)) => body,
            Some(Err(err)) => {
                state.transition(SessionState::Failed);
                return Err(err.into());
            }
        };

        // Refused only if the session was stopped in the meantime
        if !state.transition(SessionState::Streaming) {
            return Ok(Outcome::Cancelled(String::new()));
        }

        let mut decoder = EventDecoder::new();
        let mut accumulator = String::new();

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(Outcome::Cancelled(accumulator)),
                chunk = body.next() => chunk,
            };

            let events = match chunk {
                Some(Ok(bytes)) => match decoder.feed(&bytes) {
                    Ok(events) => events,
                    Err(err) => {
                        state.transition(SessionState::Failed);
                        return Err(Error::Protocol(err.into()));
                    }
                },
                Some(Err(err)) => {
                    state.transition(SessionState::Failed);
                    return Err(Error::Transport(err));
                }
                None => {
                    if let Some(event) = decoder.finish() {
                        if !cancel.is_cancelled() {
                            apply(event, &mut accumulator, transcript, observer);
                        }
                    }

                    break;
                }
            };

            for event in events {
                if cancel.is_cancelled() {
                    return Ok(Outcome::Cancelled(accumulator));
                }

                apply(event, &mut accumulator, transcript, observer);
            }
        }

        if state.transition(SessionState::Completed) {
            Ok(Outcome::Completed(accumulator))
        } else {
            Ok(Outcome::Cancelled(accumulator))
        }
    }
}

fn apply<F>(event: StreamEvent, accumulator: &mut String, transcript: &mut Transcript, observer: &mut F)
where
    F: FnMut(Update<'_>),
{
    match event {
        StreamEvent::Delta(token) => {
            accumulator.push_str(&token);
            transcript.replace_trailing(accumulator);

            observer(Update {
                token: &token,
                content: accumulator,
            });
        }
        StreamEvent::Done => tracing::trace!("end of stream sentinel"),
        StreamEvent::Malformed { payload, reason } => {
            tracing::debug!(%payload, %reason, "skipping undecodable frame")
        }
    }
}
