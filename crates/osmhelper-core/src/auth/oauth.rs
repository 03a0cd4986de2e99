//! OAuth2 authorization-code flow against the OSM token host.

use std::sync::Arc;

use reqwest::{Method, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ApiError, ApiRequest, RequestBody, ReqwestTransport, Transport};
use crate::config::Config;
use crate::constants::OAUTH_SCOPES;

const AUTHORIZE_PATH: &str = "/oauth/authorize";
const TOKEN_PATH: &str = "/oauth/token";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid OAuth URL: {0}")]
    InvalidUrl(String),

    #[error("Token request rejected ({status}): {description}")]
    TokenRejected { status: u16, description: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Pull a readable reason out of a token endpoint error body.
fn error_description(body: &str) -> String {
    match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(TokenErrorBody {
            error_description: Some(description),
            ..
        }) => description,
        Ok(TokenErrorBody { error: Some(error), .. }) => error,
        _ if body.trim().is_empty() => "no details".to_string(),
        _ => body.chars().take(200).collect(),
    }
}

#[derive(Clone)]
pub struct OAuthClient {
    transport: Arc<dyn Transport>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_host: String,
}

impl OAuthClient {
    pub fn new(config: &Config) -> Result<Self, AuthError> {
        let transport = ReqwestTransport::new(config.api_base.clone(), config.request_timeout)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Token requests go through `transport`; the authorize URL still uses the configured host.
    pub fn with_transport(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self {
            transport,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            token_host: config.api_base.clone(),
        }
    }

    /// URL to send the user to for sign-in. `state` is echoed back to the callback.
    pub fn authorize_url(&self, state: Option<&str>) -> Result<String, AuthError> {
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", OAUTH_SCOPES),
            ("access_type", "offline"),
        ];
        if let Some(state) = state {
            params.push(("state", state));
        }
        let url = Url::parse_with_params(&format!("{}{}", self.token_host, AUTHORIZE_PATH), &params)
            .map_err(|e| AuthError::InvalidUrl(e.to_string()))?;
        Ok(url.into())
    }

    /// Exchange an authorization code from the callback for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Obtain a fresh access token with a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        self.token_request(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .await
    }

    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let mut form: Vec<(String, String)> = grant
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        form.push(("client_id".to_string(), self.client_id.clone()));
        form.push(("client_secret".to_string(), self.client_secret.clone()));

        let mut request = ApiRequest::new(Method::POST, TOKEN_PATH);
        request.body = Some(RequestBody::Form(form));
        debug!(grant_type = grant.first().map(|(_, v)| *v).unwrap_or(""), "Requesting token");

        // No bearer token: the client credentials travel in the form.
        let response = self.transport.send(&request, "").await?;
        if !response.is_success() {
            let description = error_description(&response.body_text());
            warn!(status = response.status, description = %description, "Token request rejected");
            return Err(AuthError::TokenRejected {
                status: response.status,
                description,
            });
        }

        serde_json::from_value(response.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse token response: {}", e)).into())
    }
}
