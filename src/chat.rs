use axum::{
    body::Bytes,
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ChatRelayError {
    #[error("Invalid request body")]
    InvalidBody,
    #[error("Upstream timeout")]
    Timeout(#[source] reqwest::Error),
    #[error("Upstream error")]
    Upstream(#[source] reqwest::Error),
}

impl From<reqwest::Error> for ChatRelayError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else {
            Self::Upstream(error)
        }
    }
}

/// The request body has to be a JSON object, anything else is rejected
/// before the upstream is contacted.
pub fn parse_body(body: &[u8]) -> Result<Map<String, Value>, ChatRelayError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(ChatRelayError::InvalidBody),
    }
}

/// Upstream answer relayed back to the caller.
#[derive(Clone, Debug)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl IntoResponse for UpstreamReply {
    fn into_response(self) -> Response {
        let content_type = self.content_type.unwrap_or_default();

        if content_type.contains("application/json") {
            if let Ok(value) = serde_json::from_slice::<Value>(&self.body) {
                return (self.status, Json(value)).into_response();
            }
        }

        let content_type = if content_type.is_empty() {
            "text/plain".to_string()
        } else {
            content_type
        };

        (self.status, [(CONTENT_TYPE, content_type)], self.body).into_response()
    }
}

/// Posts the body to the chat-completion endpoint. The timeout covers
/// connecting, sending and reading the whole response.
pub async fn forward(
    client: &Client,
    endpoint: &Url,
    body: &Map<String, Value>,
    timeout: Duration,
) -> Result<UpstreamReply, ChatRelayError> {
    let response = client
        .post(endpoint.clone())
        .timeout(timeout)
        .json(body)
        .send()
        .await?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.bytes().await?;

    tracing::debug!("llm upstream replied {} ({} bytes)", status, body.len());

    Ok(UpstreamReply {
        status,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_objects_are_accepted() {
        assert!(parse_body(br#"{"model":"m","messages":[]}"#).is_ok());
        assert!(parse_body(br#"{}"#).is_ok());

        let rejected: [&[u8]; 6] = [b"", b"null", b"[]", b"\"text\"", b"42", b"{broken"];
        for body in rejected {
            assert!(
                matches!(parse_body(body), Err(ChatRelayError::InvalidBody)),
                "{:?} should be rejected",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[tokio::test]
    async fn json_reply_is_reserialized() {
        let reply = UpstreamReply {
            status: StatusCode::CREATED,
            content_type: Some("application/json; charset=utf-8".into()),
            body: Bytes::from_static(br#"{ "id" : 1 }"#),
        };
        let response = reply.into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"id":1}"#);
    }

    #[tokio::test]
    async fn broken_json_falls_back_to_raw() {
        let reply = UpstreamReply {
            status: StatusCode::OK,
            content_type: Some("application/json".into()),
            body: Bytes::from_static(b"{not json"),
        };
        let response = reply.into_response();

        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"{not json");
    }

    #[tokio::test]
    async fn missing_content_type_is_plain_text() {
        let reply = UpstreamReply {
            status: StatusCode::SERVICE_UNAVAILABLE,
            content_type: None,
            body: Bytes::from_static(b"model not loaded"),
        };
        let response = reply.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    }
}
