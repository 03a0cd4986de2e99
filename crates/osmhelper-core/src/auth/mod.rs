//! Authentication module for OAuth2 sign-in and session identity.
//!
//! This module provides:
//! - `OAuthClient`: authorization-code flow against the OSM token host
//! - `SessionData`: the bearer token plus the identity used to partition caches
//! - `sign_in`: code exchange followed by the profile lookup that fills the session
//!
//! Sessions live only in process memory.

pub mod oauth;
pub mod session;

use tracing::info;

use crate::api::ApiClient;

pub use oauth::{AuthError, OAuthClient, TokenResponse};
pub use session::{SessionData, ANONYMOUS_USER_KEY};

/// Exchange an authorization code and record who signed in.
///
/// The profile comes from `/oauth/resource`; a failure there fails the sign-in.
pub async fn sign_in(oauth: &OAuthClient, client: &ApiClient, code: &str) -> Result<SessionData, AuthError> {
    let tokens = oauth.exchange_code(code).await?;
    let mut session = SessionData::from_token_response(&tokens);

    let profile = client.fetch_user_profile(&session.token, Some(&session)).await?;
    session.apply_profile(&profile);
    info!(user_key = %session.user_key(), group = ?session.group_name, "Signed in");
    Ok(session)
}
