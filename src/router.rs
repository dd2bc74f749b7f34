//! Traits and type definitions for talking to an LLM routing service.
//!
//! The router exposes an OpenAI-compatible API: a streamed chat completion
//! endpoint and a listing of the models it can route to. Each model is
//! qualified by the provider which serves it (`provider/model`), and the router
//! additionally advertises its own fallback routes as `router/<route>`.
//!
//! ## Seams
//!
//! The chat session never talks to HTTP directly. It is written against the
//! [`CompletionTransport`] trait, which opens a streamed completion and hands
//! back the raw body as a [`ByteStream`]. Decoding the body into events is the
//! session's job (see [`EventDecoder`]). Catalog-presenting code is written
//! against [`CatalogSource`]. [`RouterClient`] implements both over `reqwest`.
//!
//! ## Error Handling
//!
//! Errors surfaced across these seams are [`Error`]s, tagged with an
//! [`ErrorKind`] which indicates the category of failure. The kind also tells
//! whether the router *answered* (a protocol failure, e.g. a non-success status)
//! or whether the exchange never completed (a transport failure).

mod api;
mod apireq;
mod client;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use std::error::Error as StdError;
use std::fmt;
use std::pin::Pin;

use crate::catalog::CatalogEntry;
use crate::chat::Message;

pub(crate) use self::apireq::{EventDecoder, StreamEvent};
pub(crate) use self::client::{RouterClient, DEFAULT_API_BASE};

/// General categories of errors returned by the router seams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// Failed to connect to the router, or the connection dropped. This
    /// could be due to network issues like DNS resolution, TLS or routing
    /// problems.
    Connection,
    /// A request timed out.
    TimedOut,
    /// The API key was missing, invalid or lacks permissions.
    Authentication,
    /// A rate limit or quota was exceeded.
    ExcessUsage,
    /// The router or the upstream provider is overloaded.
    ApiOverloaded,
    /// The requested resource was not found. This likely means that
    /// the requested model is not served by the router.
    NotFound,
    /// The request was malformed or is otherwise improper.
    BadRequest,
    /// The router encountered an error.
    InternalError,
    /// A response was unable to be deserialized, malformed,
    /// or otherwise violated the assumptions of the client.
    UnexpectedResponse,
    /// The router answered successfully but sent no body to stream.
    MissingBody,
    /// An error that does not fit into any of the other categories.
    UnspecifiedError,
}

impl ErrorKind {
    /// Whether the router answered the request (as opposed to the exchange
    /// failing in transit).
    pub(crate) fn is_protocol(self) -> bool {
        !matches!(
            self,
            ErrorKind::Connection | ErrorKind::TimedOut | ErrorKind::UnspecifiedError
        )
    }
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub(crate) fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Connection => "failed to connect to the router",
            ErrorKind::TimedOut => "request timed out",
            ErrorKind::Authentication => "authentication failed or not provided",
            ErrorKind::ExcessUsage => "rate limit exceeded or quota crossed",
            ErrorKind::ApiOverloaded => "the router or its provider is overloaded",
            ErrorKind::NotFound => "the requested resource was not found",
            ErrorKind::BadRequest => "the request was bad or malformed",
            ErrorKind::InternalError => "the router encountered an internal error",
            ErrorKind::UnexpectedResponse => "router response was unexpected or malformed",
            ErrorKind::MissingBody => "the router sent an empty response body",
            ErrorKind::UnspecifiedError => "an unspecified error occurred",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// The raw body of a streamed completion, chunk by chunk.
pub(crate) type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Opens streamed chat completions.
#[async_trait]
pub(crate) trait CompletionTransport: Send + Sync {
    /// Sends `{ model, messages, stream: true }` and returns the response body
    /// once the router has accepted the request.
    ///
    /// Implementations must fail with a protocol error (see
    /// [`ErrorKind::is_protocol`]) when the status is not successful or there is
    /// no body to read.
    async fn stream_chat(&self, model: &str, messages: &[Message]) -> Result<ByteStream, Error>;
}

/// Lists the models the router can route to.
#[async_trait]
pub(crate) trait CatalogSource: Send + Sync {
    async fn catalog(&self) -> Result<Vec<CatalogEntry>, Error>;
}
