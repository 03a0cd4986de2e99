//! osmhelper core library.
//!
//! This crate holds the API-access layer for Online Scout Manager (OSM):
//!
//! - `api`: authenticated client with retry/backoff, rate-limit tracking and
//!   per-user response caching
//! - `cache`: in-memory TTL cache with single-flight de-duplication
//! - `concurrency`: bounded-concurrency runner for fan-out calls
//! - `auth`: OAuth2 authorization-code flow and session identity
//! - `models`: normalized views of OSM payloads (sections, members, ...)
//! - `services`: aggregation routines built on the client
//! - `settings`: in-memory capacity and age-cutoff overrides

pub mod api;
pub mod auth;
pub mod cache;
pub mod concurrency;
pub mod config;
pub mod constants;
pub mod models;
pub mod services;
pub mod settings;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use config::Config;
