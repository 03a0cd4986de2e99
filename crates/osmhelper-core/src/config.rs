//! Application configuration management.
//!
//! Configuration comes from the process environment (a `.env` file is loaded
//! by the binary before this runs). The OAuth client id/secret, redirect URI
//! and session secret are required; startup fails listing every missing one.

use std::time::Duration;

use thiserror::Error;

use crate::api::RetryPolicy;
use crate::constants::OSM_API_BASE;

/// Environment variables that must be present and non-blank.
const REQUIRED_VARS: [&str; 4] = ["SESSION_SECRET", "CLIENT_ID", "CLIENT_SECRET", "REDIRECT_URI"];

/// Default maximum number of cached API responses.
const DEFAULT_CACHE_MAX_ITEMS: usize = 2_500;

/// Default cache TTL for GET requests.
const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Default per-attempt HTTP timeout.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Longest preflight sleep when the local rate state says the budget is spent.
const DEFAULT_PREFLIGHT_MAX_WAIT_SECS: u64 = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: String, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub session_secret: String,
    pub api_base: String,
    pub cache_max_items: usize,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_VARS
            .iter()
            .filter(|name| get(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let required = |name: &str| get(name).unwrap_or_default();

        Ok(Self {
            client_id: required("CLIENT_ID"),
            client_secret: required("CLIENT_SECRET"),
            redirect_uri: required("REDIRECT_URI"),
            session_secret: required("SESSION_SECRET"),
            api_base: get("OSM_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| OSM_API_BASE.to_string()),
            cache_max_items: parse_or("OSM_CACHE_MAX_ITEMS", get("OSM_CACHE_MAX_ITEMS"), DEFAULT_CACHE_MAX_ITEMS)?,
            cache_ttl: Duration::from_secs(parse_or(
                "OSM_CACHE_TTL_SECS",
                get("OSM_CACHE_TTL_SECS"),
                DEFAULT_CACHE_TTL_SECS,
            )?),
            request_timeout: Duration::from_secs(parse_or(
                "OSM_REQUEST_TIMEOUT_SECS",
                get("OSM_REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        })
    }

    /// Settings for constructing an `ApiClient`.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            api_base: self.api_base.clone(),
            request_timeout: self.request_timeout,
            cache_max_items: self.cache_max_items,
            default_ttl: self.cache_ttl,
            ..ClientSettings::default()
        }
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name: name.to_string(),
            value: raw,
        }),
    }
}

/// Tunables for the API client, independent of where they came from.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base: String,
    pub request_timeout: Duration,
    pub cache_max_items: usize,
    pub default_ttl: Duration,
    pub retry: RetryPolicy,
    /// Upper bound on the preflight sleep; zero disables preflight throttling.
    pub preflight_max_wait: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base: OSM_API_BASE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            cache_max_items: DEFAULT_CACHE_MAX_ITEMS,
            default_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            retry: RetryPolicy::default(),
            preflight_max_wait: Duration::from_secs(DEFAULT_PREFLIGHT_MAX_WAIT_SECS),
        }
    }
}
