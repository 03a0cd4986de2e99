//! Scripted in-memory transport for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::time::Instant;

use super::transport::{ApiRequest, ApiResponse, RequestBody, Transport};
use super::ApiError;

pub(crate) fn json_response(status: u16, body: Value) -> ApiResponse {
    ApiResponse {
        status,
        headers: HeaderMap::new(),
        body,
    }
}

impl ApiResponse {
    pub(crate) fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }
}

struct Route {
    method: Method,
    path: String,
    params: Vec<(String, String)>,
    /// The last response repeats once the others are used up.
    responses: VecDeque<ApiResponse>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub at: Instant,
}

impl RecordedCall {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Mutex<Duration>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue `response` for requests matching method, path and (a subset of) params.
    pub fn on(&self, method: Method, path: &str, params: &[(&str, &str)], response: ApiResponse) {
        let params: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut routes = self.routes.lock().unwrap();
        if let Some(route) = routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path && r.params == params)
        {
            route.responses.push_back(response);
        } else {
            routes.push(Route {
                method,
                path: path.to_string(),
                params,
                responses: VecDeque::from([response]),
            });
        }
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.path == path).count()
    }

    pub fn call_times(&self, path: &str) -> Vec<Instant> {
        self.calls()
            .iter()
            .filter(|c| c.path == path)
            .map(|c| c.at)
            .collect()
    }

    fn respond(&self, request: &ApiRequest) -> ApiResponse {
        let mut routes = self.routes.lock().unwrap();
        let matching = routes
            .iter_mut()
            .filter(|r| r.method == request.method && r.path == request.path)
            .filter(|r| r.params.iter().all(|p| request.params.contains(p)))
            .max_by_key(|r| r.params.len());

        match matching {
            Some(route) if route.responses.len() > 1 => route.responses.pop_front().unwrap(),
            Some(route) => route.responses[0].clone(),
            None => json_response(404, json!({"error": "no route"})),
        }
    }
}

impl Transport for MockTransport {
    fn send<'a>(&'a self, request: &'a ApiRequest, _token: &'a str) -> BoxFuture<'a, Result<ApiResponse, ApiError>> {
        async move {
            self.calls.lock().unwrap().push(RecordedCall {
                method: request.method.clone(),
                path: request.path.clone(),
                params: request.params.clone(),
                body: request.body.clone(),
                at: Instant::now(),
            });
            let latency = *self.latency.lock().unwrap();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            Ok(self.respond(request))
        }
        .boxed()
    }
}
