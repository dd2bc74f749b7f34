//! Conversions between Reqwest and decoder errors and router error types

use crate::router::apireq::DecodeError;
use crate::router::{Error, ErrorKind};

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::TimedOut
        } else if err.is_connect() {
            ErrorKind::Connection
        } else if err.is_decode() || err.is_redirect() {
            ErrorKind::UnexpectedResponse
        } else if err.is_body() || err.is_request() {
            // The connection dropped while the body was in flight
            ErrorKind::Connection
        } else {
            ErrorKind::UnspecifiedError
        };

        Error::from_source(kind, Box::new(err))
    }
}

impl From<DecodeError> for Error {
    fn from(err: DecodeError) -> Self {
        Error::from_source(ErrorKind::UnexpectedResponse, Box::new(err))
    }
}
