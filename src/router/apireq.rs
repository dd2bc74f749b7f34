//! A utility module with helpers for making and decoding API requests.

mod convert;
mod event_stream;
mod stream_ext;

pub(crate) use reqwest::Url;

pub(crate) use event_stream::DecodeError;
pub(crate) use event_stream::EventDecoder;
pub(crate) use event_stream::StreamEvent;
pub(crate) use stream_ext::ResponseStreamExt;
