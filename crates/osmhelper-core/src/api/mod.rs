//! REST API client module for Online Scout Manager.
//!
//! This module provides the `ApiClient` for communicating with the OSM API
//! to fetch sections, members, quartermaster lists and finance data.
//!
//! The API uses OAuth2 bearer tokens. Responses carry rate-limit headers that
//! are tracked per token; GET responses are cached per user.

pub mod client;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ApiClient, RequestOptions};
pub use error::ApiError;
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker, RateState};
pub use retry::RetryPolicy;
pub use transport::{ApiRequest, ApiResponse, RequestBody, ReqwestTransport, Transport};
