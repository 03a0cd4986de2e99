//! API client for communicating with the OSM REST API.
//!
//! `ApiClient` issues bearer-authenticated calls with retry/backoff, keeps
//! per-token rate-limit state from response headers, and caches GET responses
//! per user with single-flight de-duplication. Clones share the cache, the
//! rate state and the connection pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{SessionData, ANONYMOUS_USER_KEY};
use crate::cache::TtlCache;
use crate::config::ClientSettings;
use crate::constants::DEFAULT_GROUP_NAME;
use crate::models::{normalize_sections, Section, UserProfile};
use crate::utils::json::{object_keys, str_at};

use super::rate_limit::{RateLimitSnapshot, RateLimitTracker};
use super::retry::{parse_retry_after, RetryPolicy};
use super::transport::{ApiRequest, ApiResponse, ReqwestTransport, RequestBody, Transport};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Path of the resource endpoint describing the signed-in user and their sections.
const RESOURCE_PATH: &str = "/oauth/resource";

/// The resource (and so the section list) changes rarely.
const RESOURCE_TTL: Duration = Duration::from_secs(5 * 60);

// ============================================================================
// Request options
// ============================================================================

/// Per-call options: query params, body, cache TTL and cache partition.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Overrides the client's default TTL for cached GETs.
    pub ttl: Option<Duration>,
    /// Cache partition; usually derived from the session.
    pub user_key: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn session(mut self, session: Option<&SessionData>) -> Self {
        self.user_key = session.map(SessionData::user_key);
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(fields));
        self
    }
}

/// Cache key: user partition, method, path and params sorted by name.
///
/// Params are JSON-encoded so separators inside names or values cannot
/// collide with a different parameter set.
fn cache_key(user_key: &str, method: &Method, path: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    let query = serde_json::to_string(&sorted).unwrap_or_default();
    format!("{}::{}::{}::{}", user_key, method.as_str().to_uppercase(), path, query)
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    cache: TtlCache<Value, ApiError>,
    rate: Arc<RateLimitTracker>,
    retry: Arc<RetryPolicy>,
    preflight_max_wait: Duration,
}

impl ApiClient {
    /// Create a client talking to the real API over HTTPS.
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(settings.api_base.clone(), settings.request_timeout)?;
        Ok(Self::with_transport(Arc::new(transport), settings))
    }

    /// Create a client over any transport.
    pub fn with_transport(transport: Arc<dyn Transport>, settings: &ClientSettings) -> Self {
        Self {
            transport,
            cache: TtlCache::new(settings.default_ttl, settings.cache_max_items),
            rate: Arc::new(RateLimitTracker::new()),
            retry: Arc::new(settings.retry.clone()),
            preflight_max_wait: settings.preflight_max_wait,
        }
    }

    pub fn cache(&self) -> &TtlCache<Value, ApiError> {
        &self.cache
    }

    pub fn rate_limit_snapshot(&self, token: &str) -> Option<RateLimitSnapshot> {
        self.rate.snapshot(token)
    }

    /// Issue a request, retrying rate-limited and gateway failures.
    ///
    /// Every response updates the token's rate state before it is inspected.
    /// Non-2xx statuses that are not retried (or run out of attempts) become
    /// an `ApiError` carrying the status.
    pub async fn request(
        &self,
        token: &str,
        method: Method,
        path: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        if token.trim().is_empty() {
            return Err(ApiError::Unauthenticated);
        }

        if let Some(wait) = self.rate.preflight_delay(token, self.preflight_max_wait) {
            warn!(path = path, wait_ms = wait.as_millis() as u64, "Rate budget nearly spent, pausing before request");
            tokio::time::sleep(wait).await;
        }

        let request = ApiRequest {
            method,
            path: path.to_string(),
            params: options.params.clone(),
            body: options.body.clone(),
        };

        let mut attempt = 1;
        loop {
            let response = self.transport.send(&request, token).await.inspect_err(|e| {
                warn!(path = path, attempt = attempt, error = %e, "Request failed without a response");
            })?;
            self.rate.update(token, &response.headers);

            if response.is_success() {
                debug!(method = %request.method, path = path, status = response.status, attempt = attempt, "Request succeeded");
                return Ok(response);
            }

            let status = response.status;
            if self.retry.should_retry(status, attempt) {
                let delay = self.retry.delay_for(attempt, response.header("retry-after"));
                warn!(
                    path = path,
                    status = status,
                    retry = attempt,
                    backoff_ms = delay.as_millis() as u64,
                    "Retryable response, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let retry_in_secs = if status == 429 {
                self.rate.seconds_until_reset(token).or_else(|| {
                    response
                        .header("retry-after")
                        .and_then(parse_retry_after)
                        .map(|wait| wait.as_secs())
                })
            } else {
                None
            };
            return Err(ApiError::from_status(status, &response.body_text(), retry_in_secs));
        }
    }

    /// Cached GET returning the JSON body.
    pub async fn get(&self, token: &str, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let user_key = options
            .user_key
            .clone()
            .unwrap_or_else(|| ANONYMOUS_USER_KEY.to_string());
        let key = cache_key(&user_key, &Method::GET, path, &options.params);
        let ttl = options.ttl.unwrap_or_else(|| self.cache.default_ttl());

        let client = self.clone();
        let token = token.to_string();
        let path = path.to_string();
        self.cache
            .wrap(&key, ttl, move || async move {
                client
                    .request(&token, Method::GET, &path, &options)
                    .await
                    .map(|response| response.body)
            })
            .await
    }

    /// Drop the cached response a `get` with the same path and options would use.
    pub fn invalidate(&self, path: &str, options: &RequestOptions) {
        let user_key = options.user_key.as_deref().unwrap_or(ANONYMOUS_USER_KEY);
        self.cache.del(&cache_key(user_key, &Method::GET, path, &options.params));
    }

    pub async fn post(&self, token: &str, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        Ok(self.request(token, Method::POST, path, &options).await?.body)
    }

    pub async fn put(&self, token: &str, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        Ok(self.request(token, Method::PUT, path, &options).await?.body)
    }

    pub async fn delete(&self, token: &str, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        Ok(self.request(token, Method::DELETE, path, &options).await?.body)
    }

    // ===== Resource & Sections =====

    /// Fetch the signed-in user's resource document (cached for 5 minutes).
    pub async fn fetch_resource(&self, token: &str, session: Option<&SessionData>) -> Result<Value, ApiError> {
        self.get(
            token,
            RESOURCE_PATH,
            RequestOptions::new().session(session).ttl(RESOURCE_TTL),
        )
        .await
    }

    /// Sections the token can access, each with its current term resolved.
    ///
    /// Never fails: a fetch error or an unrecognized payload yields an empty
    /// list (and a warning).
    pub async fn fetch_sections(&self, token: &str, session: Option<&SessionData>) -> Vec<Section> {
        let resource = match self.fetch_resource(token, session).await {
            Ok(resource) => resource,
            Err(e) => {
                warn!(error = %e, "Failed to fetch sections");
                return Vec::new();
            }
        };

        match normalize_sections(&resource, Local::now().date_naive()) {
            Some(sections) => {
                debug!(count = sections.len(), "Resolved sections");
                sections
            }
            None => {
                warn!(keys = ?object_keys(&resource), "Unrecognized section list shape in resource response");
                Vec::new()
            }
        }
    }

    /// Email, full name and group name of the signed-in user.
    pub async fn fetch_user_profile(
        &self,
        token: &str,
        session: Option<&SessionData>,
    ) -> Result<UserProfile, ApiError> {
        let resource = self.fetch_resource(token, session).await?;
        Ok(UserProfile::from_resource(&resource))
    }

    /// Group name for a section from its custom data, or the default name.
    pub async fn fetch_group_name(&self, token: &str, section_id: &str, session: Option<&SessionData>) -> String {
        let associated_id = session
            .and_then(|s| s.osm_user_id.clone())
            .unwrap_or_else(|| "1".to_string());
        let options = RequestOptions::new()
            .param("action", "getData")
            .param("section_id", section_id)
            .param("associated_id", associated_id)
            .param("associated_type", "member")
            .param("context", "members")
            .session(session);

        match self.get(token, "/ext/customdata/", options).await {
            Ok(body) => str_at(&body, &["meta", "group_name"]).unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string()),
            Err(e) => {
                warn!(section_id = section_id, error = %e, "Failed to fetch group name");
                DEFAULT_GROUP_NAME.to_string()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
