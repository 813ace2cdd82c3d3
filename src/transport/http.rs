//! HTTP transport on top of `reqwest`, producing JSON payloads.

use super::{FetchRequest, FetchSuccess, ResponseMeta, Transport, TransportError};
use crate::cancel::CancellationToken;
use crate::error::FetchError;
use crate::lifecycle::HttpConfig;
use crate::model::Method;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Fetches JSON resources over HTTP.
///
/// Non-2xx responses become [`TransportError::Failed`] carrying the status; the message is the
/// body's `message` field when the server sends one, `HTTP <code>` otherwise. An empty 2xx body
/// yields `Value::Null`.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::TransportSetup(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &FetchRequest) -> RequestBuilder {
        let params = &request.params;
        let method = match params.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.target);
        if !params.query.is_empty() {
            builder = builder.query(&params.query);
        }
        for (name, value) in &params.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &params.body {
            builder = builder.json(body);
        }
        builder
    }

    async fn send(&self, request: &FetchRequest) -> Result<FetchSuccess<Value>, TransportError> {
        let started = Instant::now();
        let response = self
            .build(request)
            .send()
            .await
            .map_err(|e| categorize_error(request, e, started.elapsed()))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| categorize_error(request, e, started.elapsed()))?;

        let meta = ResponseMeta {
            target: request.target.clone(),
            status: Some(status.as_u16()),
            elapsed: started.elapsed(),
            headers,
        };
        debug!(key = %request.key, status = status.as_u16(), "Response received");

        if !status.is_success() {
            return Err(TransportError::failed_with(failure_message(status, &body), meta));
        }

        let payload = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).map_err(|e| {
                TransportError::failed_with(format!("Invalid JSON payload: {}", e), meta.clone())
            })?
        };
        Ok(FetchSuccess { payload, meta })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    type Payload = Value;

    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<FetchSuccess<Value>, TransportError> {
        // Dropping the request future aborts the underlying connection.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.send(request) => result,
        }
    }
}

fn failure_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|body| {
            body.get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
        })
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

fn categorize_error(request: &FetchRequest, error: reqwest::Error, elapsed: Duration) -> TransportError {
    let message = if error.is_timeout() {
        "Request timed out".to_string()
    } else if error.is_redirect() {
        "Too many redirects".to_string()
    } else if error.is_connect() {
        "Connection failed".to_string()
    } else if error.is_decode() {
        "Could not decode response body".to_string()
    } else {
        error.to_string()
    };

    TransportError::failed_with(
        message,
        ResponseMeta {
            target: request.target.clone(),
            status: error.status().map(|status| status.as_u16()),
            elapsed,
            headers: BTreeMap::new(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceDescriptor;
    use serde_json::json;

    #[test]
    fn test_request_carries_params() {
        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let descriptor = ResourceDescriptor::new("https://api.example.com/items")
            .with_method(Method::Post)
            .with_query("page", "2")
            .with_header("x-request-id", "abc")
            .with_body(json!({ "name": "widget" }));

        let built = transport.build(&descriptor.request()).build().unwrap();
        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(built.url().as_str(), "https://api.example.com/items?page=2");
        assert_eq!(built.headers()["x-request-id"], "abc");
        assert_eq!(built.headers()["content-type"], "application/json");
    }

    #[test]
    fn test_failure_message_prefers_body_message() {
        let body = br#"{ "message": "user not found" }"#;
        assert_eq!(failure_message(StatusCode::NOT_FOUND, body), "user not found");
        assert_eq!(failure_message(StatusCode::BAD_GATEWAY, b"<html>"), "HTTP 502");
        assert_eq!(failure_message(StatusCode::GONE, b""), "HTTP 410");
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request = ResourceDescriptor::new("http://127.0.0.1:9/never").request();
        let result = transport.fetch(&request, &cancel).await;
        assert_eq!(result, Err(TransportError::Cancelled));
    }
}
