use reqwest::{Client, IntoUrl, StatusCode};
use serde::{Deserialize, Serialize};

use crate::chat::Message;
use crate::router::apireq::Url;

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    /// The API Base is not a URL that can be used in a network request
    #[error("invalid api base")]
    InvalidApiBase(#[source] reqwest::Error),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// Some issue with the request or the response stream
    #[error("{}", .0)]
    RequestFailed(
        #[from]
        #[source]
        reqwest::Error,
    ),

    /// The request was malformed or the model is not given as `provider/model`.
    #[error("{0}")]
    BadRequest(String),

    /// The API key is missing, invalid or revoked, or the user is disabled.
    #[error("{0}")]
    Authentication(String),

    /// The key does not grant access to the requested resource.
    #[error("{0}")]
    PermissionDenied(String),

    /// Requested model or route does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Unable to process the request despite the format being correct.
    #[error("{0}")]
    UnprocessableEntity(String),

    /// A rate limit or quota was hit.
    #[error("{0}")]
    RateLimit(String),

    /// The router had an internal issue.
    #[error("{0}")]
    InternalError(String),

    /// The upstream provider failed or could not be reached by the router.
    #[error("{0}")]
    BadGateway(String),

    /// The router or its provider is overloaded, try again later
    #[error("{0}")]
    ApiOverloaded(String),

    /// A status the client does not know about
    #[error("unexpected status {0}: {1}")]
    UnknownStatus(u16, String),

    /// A successful status with nothing to stream
    #[error("the response has no body")]
    EmptyBody,
}

impl Error {
    fn from_status(status: StatusCode, message: String) -> Error {
        match status.as_u16() {
            400 => Error::BadRequest(message),
            401 => Error::Authentication(message),
            403 => Error::PermissionDenied(message),
            404 => Error::NotFound(message),
            422 => Error::UnprocessableEntity(message),
            429 => Error::RateLimit(message),
            500 => Error::InternalError(message),
            502 | 504 => Error::BadGateway(message),
            503 => Error::ApiOverloaded(message),
            code => Error::UnknownStatus(code, message),
        }
    }
}

/* Structures to serialize /api/v1/chat/completions */

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'o> {
    model: &'o str,
    messages: &'o [Message],
    stream: bool,
}

/* Structures to deserialize /api/v1/models */

#[derive(Deserialize, Debug)]
pub(super) struct ModelObject {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(super) struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelObject>,
}

/* API Errors */

/// Extracts a human readable message from an error body. The router answers
/// with `{"error": "..."}` or `{"message": "..."}`, while errors forwarded from
/// upstream providers may nest the message as `{"error": {"message": "..."}}`.
fn error_message(status: StatusCode, body: &str) -> String {
    let value: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let message = value.as_ref().and_then(|v| {
        v.get("message")
            .and_then(|m| m.as_str())
            .or_else(|| v.get("error").and_then(|e| e.as_str()))
            .or_else(|| v.pointer("/error/message").and_then(|m| m.as_str()))
    });

    match message {
        Some(message) => message.to_string(),
        None if !body.trim().is_empty() && value.is_none() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

async fn error_for_status(res: reqwest::Response) -> Error {
    let status = res.status();

    // A body we cannot read still leaves us with the status
    let body = res.text().await.unwrap_or_default();

    Error::from_status(status, error_message(status, &body))
}

pub(crate) const DEFAULT_API_BASE: &'static str = "http://localhost:8080";

pub(super) struct RouterApi {
    api_base: Url,
    api_key: Option<String>,
    client: Client,
}

impl RouterApi {
    pub(super) fn new<U: IntoUrl>(api_key: Option<&str>, api_base: U) -> Result<RouterApi, Error> {
        let api_base = api_base.into_url().map_err(Error::InvalidApiBase)?;

        Ok(RouterApi {
            api_base,
            api_key: api_key.map(|k| k.to_string()),
            client: Client::new(),
        })
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(api_key) => req.bearer_auth(api_key),
            None => req,
        }
    }

    pub(super) async fn streaming_chat_completion(
        &self,
        model: &str,
        messages: &[Message],
    ) -> Result<reqwest::Response, Error> {
        let url = self.api_base.join("/api/v1/chat/completions")?;

        tracing::trace!(%url, model, messages = messages.len(), "dispatching chat completion");

        let res = self
            .authorized(self.client.post(url))
            .json(&ChatCompletionRequest {
                model,
                messages,
                stream: true,
            })
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(error_for_status(res).await);
        }

        if res.content_length() == Some(0) {
            return Err(Error::EmptyBody);
        }

        Ok(res)
    }

    pub(super) async fn models(&self) -> Result<ModelList, Error> {
        let url = self.api_base.join("/api/v1/models")?;

        let res = self.authorized(self.client.get(url)).send().await?;

        if !res.status().is_success() {
            return Err(error_for_status(res).await);
        }

        Ok(res.json::<ModelList>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message() {
        let status = StatusCode::BAD_REQUEST;

        assert_eq!(error_message(status, r#"{"error":"model required"}"#), "model required");
        assert_eq!(error_message(status, r#"{"message":"bad key"}"#), "bad key");
        assert_eq!(
            error_message(status, r#"{"error":{"message":"upstream said no","type":"x"}}"#),
            "upstream said no"
        );
        assert_eq!(error_message(status, "plain text failure"), "plain text failure");
        assert_eq!(error_message(status, ""), "Bad Request");
        assert_eq!(error_message(status, "{}"), "Bad Request");
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            Error::from_status(StatusCode::UNAUTHORIZED, String::new()),
            Error::Authentication(_)
        ));
        assert!(matches!(
            Error::from_status(StatusCode::BAD_GATEWAY, String::new()),
            Error::BadGateway(_)
        ));
        assert!(matches!(
            Error::from_status(StatusCode::IM_A_TEAPOT, String::new()),
            Error::UnknownStatus(418, _)
        ));
    }
}
