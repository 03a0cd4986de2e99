use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserProfile;

use super::TokenResponse;

/// Cache partition used when a session carries no identity.
pub const ANONYMOUS_USER_KEY: &str = "anon";

/// Token lifetime assumed when the token endpoint does not report one.
const DEFAULT_TOKEN_EXPIRY_SECS: i64 = 3600;

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub osm_user_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub group_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(token: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            token: token.into(),
            refresh_token: None,
            expires_at: now + Duration::seconds(DEFAULT_TOKEN_EXPIRY_SECS),
            osm_user_id: None,
            user_id: None,
            session_id: None,
            email: None,
            full_name: None,
            group_name: None,
            created_at: now,
        }
    }

    pub fn from_token_response(response: &TokenResponse) -> Self {
        let mut session = Self::new(response.access_token.clone());
        session.refresh_token = response.refresh_token.clone();
        if let Some(secs) = response.expires_in {
            session.expires_at = session.created_at + Duration::seconds(secs);
        }
        session
    }

    pub fn with_osm_user_id(mut self, id: impl Into<String>) -> Self {
        self.osm_user_id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Identity used to partition cached responses between users.
    pub fn user_key(&self) -> String {
        [&self.osm_user_id, &self.user_id, &self.session_id]
            .into_iter()
            .flatten()
            .find(|id| !id.is_empty())
            .cloned()
            .unwrap_or_else(|| ANONYMOUS_USER_KEY.to_string())
    }

    /// Copy the user details reported by `/oauth/resource`.
    pub fn apply_profile(&mut self, profile: &UserProfile) {
        if profile.user_id.is_some() {
            self.osm_user_id = profile.user_id.clone();
        }
        self.email = profile.email.clone();
        self.full_name = profile.full_name.clone();
        self.group_name = profile.group_name.clone();
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        let refresh_at = self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES);
        Utc::now() > refresh_at
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_minutes().max(0)
    }
}
