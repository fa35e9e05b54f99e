//! Transport abstraction over the underlying HTTP client.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use super::error::HttpError;
use super::request::{ApiResponse, OutgoingRequest, RequestBody};

/// Sends one decorated request and buffers the response.
///
/// Non-2xx statuses are returned as `Ok`; only failures to obtain a response
/// are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse, HttpError>;
}

/// [`Transport`] backed by a reqwest [`Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: OutgoingRequest) -> Result<ApiResponse, HttpError> {
        debug!("{} {}...", request.method, request.url);

        let builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        // Body helpers keep an explicit Content-Type if one is already set.
        let builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Form(pairs)) => builder.form(&pairs),
            Some(RequestBody::Text(text)) => builder.body(text),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(format!("failed to read response body: {}", e)))?;

        debug!("{} ({} bytes)", status, body.len());
        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use reqwest::{Method, StatusCode};

    fn outgoing(method: Method, url: String, body: Option<RequestBody>) -> OutgoingRequest {
        OutgoingRequest {
            method,
            url,
            headers: HeaderMap::new(),
            body,
        }
    }

    #[tokio::test]
    async fn test_send_returns_error_statuses_as_responses() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/events/1")
            .with_status(404)
            .with_body(r#"{"detail":"Event not found"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new());
        let response = transport
            .send(outgoing(
                Method::GET,
                format!("{}/events/1", server.url()),
                None,
            ))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.text().contains("Event not found"));
    }

    #[tokio::test]
    async fn test_send_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bookings")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({"event_id": 7, "quantity": 2}),
            ))
            .with_status(201)
            .with_body(r#"{"id": 99}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new());
        let response = transport
            .send(outgoing(
                Method::POST,
                format!("{}/bookings", server.url()),
                Some(RequestBody::Json(
                    serde_json::json!({"event_id": 7, "quantity": 2}),
                )),
            ))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_send_form_body_keeps_explicit_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body("username=alice&password=secret")
            .with_status(200)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new());
        let mut request = outgoing(
            Method::POST,
            format!("{}/auth/login", server.url()),
            Some(RequestBody::Form(vec![
                ("username".into(), "alice".into()),
                ("password".into(), "secret".into()),
            ])),
        );
        request.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        transport.send(request).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_connection_failure_is_transport_error() {
        let transport = ReqwestTransport::new(Client::new());
        // Port 1 on localhost is not expected to accept connections
        let result = transport
            .send(outgoing(Method::GET, "http://127.0.0.1:1/".into(), None))
            .await;
        assert!(matches!(result, Err(HttpError::Transport(_))));
    }
}
