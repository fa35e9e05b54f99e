//! Request and response values passed between the client and the transport.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use super::error::HttpError;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    Text(String),
}

/// Per-request options: extra headers and an optional content-type override.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub content_type: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Shorthand for a form-encoded content type, as used by login.
    pub fn form() -> Self {
        Self::new().content_type(FORM_CONTENT_TYPE)
    }

    /// Merges the options into a header map, applying the content-type override last.
    pub(crate) fn to_headers(&self) -> Result<HeaderMap, HttpError> {
        let mut headers = self.headers.clone();
        if let Some(content_type) = &self.content_type {
            let value = HeaderValue::from_str(content_type).map_err(|e| {
                HttpError::InvalidRequest(format!("content type {:?}: {}", content_type, e))
            })?;
            headers.insert(CONTENT_TYPE, value);
        }
        Ok(headers)
    }
}

/// A logical API call, kept intact so it can be resubmitted after a refresh.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<RequestBody>,
    pub options: RequestOptions,
    /// Set once the request has been resubmitted after a refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Self {
        Self {
            method,
            path: path.to_string(),
            body,
            options,
            retried: false,
        }
    }
}

/// A fully decorated request handed to the transport.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl OutgoingRequest {
    /// Returns the bearer token attached to this request, if any.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(reqwest::header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// Converts a non-2xx response into the pass-through error.
    pub(crate) fn into_status_error(self) -> HttpError {
        HttpError::Status {
            status: self.status,
            body: self.text(),
        }
    }
}

/// Joins the API base URL and a backend-relative path.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
