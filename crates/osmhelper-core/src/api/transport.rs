//! HTTP transport behind the API client.
//!
//! The client's retry, cache and rate-limit logic only sees `ApiRequest` and
//! `ApiResponse`; `ReqwestTransport` is the one place that talks to the
//! network. Any HTTP status comes back as a response. Only failures to get a
//! response at all (connect errors, timeouts) are errors.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Method};
use serde_json::Value;

use super::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `/ext/members/contact/`.
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed JSON body; non-JSON text becomes a string and an empty body `null`.
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Body as text, for error messages.
    pub fn body_text(&self) -> String {
        match &self.body {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

pub(crate) fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
    }
}

/// Sends one attempt of a request with the given bearer token (none when empty).
pub trait Transport: Send + Sync {
    fn send<'a>(&'a self, request: &'a ApiRequest, token: &'a str) -> BoxFuture<'a, Result<ApiResponse, ApiError>>;
}

/// Production transport over `reqwest`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Share an existing connection pool.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn execute(&self, request: &ApiRequest, token: &str) -> Result<ApiResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .header(header::ACCEPT, "application/json");
        if !token.is_empty() {
            builder = builder.bearer_auth(token);
        }

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        builder = match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(fields)) => builder.form(fields),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text().await?;

        Ok(ApiResponse {
            status,
            headers,
            body: parse_body(&text),
        })
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(&'a self, request: &'a ApiRequest, token: &'a str) -> BoxFuture<'a, Result<ApiResponse, ApiError>> {
        self.execute(request, token).boxed()
    }
}
