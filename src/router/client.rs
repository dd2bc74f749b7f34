use async_trait::async_trait;
use reqwest::IntoUrl;

use crate::catalog::CatalogEntry;
use crate::chat::Message;
use crate::router::apireq::ResponseStreamExt;
use crate::router::{api, ByteStream, CatalogSource, CompletionTransport, Error, ErrorKind};

pub(crate) use api::DEFAULT_API_BASE;

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::Authentication(_) | api::Error::PermissionDenied(_) => {
                ErrorKind::Authentication
            }
            api::Error::BadRequest(_)
            | api::Error::InvalidApiBase(_)
            | api::Error::InvalidEndpoint(_)
            | api::Error::UnprocessableEntity(_) => ErrorKind::BadRequest,
            api::Error::InternalError(_) | api::Error::BadGateway(_) => ErrorKind::InternalError,
            api::Error::NotFound(_) => ErrorKind::NotFound,
            api::Error::RateLimit(_) => ErrorKind::ExcessUsage,
            api::Error::ApiOverloaded(_) => ErrorKind::ApiOverloaded,
            api::Error::UnknownStatus(..) => ErrorKind::UnexpectedResponse,
            api::Error::EmptyBody => ErrorKind::MissingBody,
            api::Error::RequestFailed(_) => ErrorKind::UnspecifiedError,
        };

        match value {
            api::Error::RequestFailed(err) => err.into(),
            value => Error::from_source(kind, Box::new(value)),
        }
    }
}

/// Splits an advertised model id into the provider which serves it and the
/// provider's own name for it.
fn catalog_entry(model: api::ModelObject) -> CatalogEntry {
    match model.id.split_once('/') {
        Some((provider, name)) => CatalogEntry {
            provider_name: provider.to_string(),
            name: name.to_string(),
        },
        None => CatalogEntry {
            provider_name: model.owned_by.unwrap_or_default(),
            name: model.id,
        },
    }
}

pub(crate) struct RouterClient {
    api: api::RouterApi,
}

impl RouterClient {
    pub(crate) fn new<U: IntoUrl>(api_key: Option<&str>, api_base: U) -> Result<RouterClient, Error> {
        Ok(RouterClient {
            api: api::RouterApi::new(api_key, api_base)?,
        })
    }
}

#[async_trait]
impl CompletionTransport for RouterClient {
    async fn stream_chat(&self, model: &str, messages: &[Message]) -> Result<ByteStream, Error> {
        let res = self.api.streaming_chat_completion(model, messages).await?;

        Ok(res.byte_stream())
    }
}

#[async_trait]
impl CatalogSource for RouterClient {
    async fn catalog(&self) -> Result<Vec<CatalogEntry>, Error> {
        let models = self.api.models().await?;

        Ok(models.data.into_iter().map(catalog_entry).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_BODY: &'static str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    #[tokio::test]
    async fn test_stream_chat() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "openai/gpt-4o",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
            .mount(&server)
            .await;

        let client = RouterClient::new(Some("sk-test"), server.uri()).unwrap();

        let mut body = client
            .stream_chat("openai/gpt-4o", &[Message::user("hi")])
            .await
            .expect("should open stream");

        let mut raw = Vec::new();

        while let Some(chunk) = body.next().await {
            raw.extend_from_slice(&chunk.expect("should read"));
        }

        assert_eq!(String::from_utf8(raw).unwrap(), SSE_BODY);
    }

    #[tokio::test]
    async fn test_stream_chat_status_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({"error": "invalid api key"})),
            )
            .mount(&server)
            .await;

        let client = RouterClient::new(Some("bad"), server.uri()).unwrap();

        let err = match client.stream_chat("openai/gpt-4o", &[Message::user("hi")]).await {
            Ok(_) => panic!("expected an authentication error"),
            Err(err) => err,
        };

        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert!(err.kind().is_protocol());
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "invalid api key"
        );
    }

    #[tokio::test]
    async fn test_stream_chat_empty_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = RouterClient::new(None, server.uri()).unwrap();

        let err = match client.stream_chat("openai/gpt-4o", &[Message::user("hi")]).await {
            Ok(_) => panic!("expected a missing body"),
            Err(err) => err,
        };

        assert_eq!(err.kind(), ErrorKind::MissingBody);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Nothing listens on the discard port
        let client = RouterClient::new(None, "http://127.0.0.1:9").unwrap();

        let err = match client.stream_chat("openai/gpt-4o", &[Message::user("hi")]).await {
            Ok(_) => panic!("expected a connection failure"),
            Err(err) => err,
        };

        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(!err.kind().is_protocol());
    }

    #[tokio::test]
    async fn test_catalog() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [
                    {"id": "openai/gpt-4o", "object": "model", "owned_by": "OpenAI"},
                    {"id": "router/smart", "object": "model", "owned_by": "router"},
                    {"id": "bare-model", "object": "model", "owned_by": "Local"},
                ]
            })))
            .mount(&server)
            .await;

        let client = RouterClient::new(None, server.uri()).unwrap();

        let entries = client.catalog().await.expect("should list");

        assert_eq!(
            entries,
            vec![
                CatalogEntry::new("openai", "gpt-4o"),
                CatalogEntry::new("router", "smart"),
                CatalogEntry::new("Local", "bare-model"),
            ]
        );
    }
}
