use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Fallback lifetimes when the realm omits the numeric fields.
const DEFAULT_EXPIRES_IN: i64 = 300;
const DEFAULT_REFRESH_EXPIRES_IN: i64 = 1800;

/// Safety margin so a token is never handed out moments before it expires
/// under an in-flight request.
const EXPIRY_GRACE_SECS: i64 = 30;

/// Raw token-endpoint response from Keycloak.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// The current OIDC token set with absolute expiry timestamps.
///
/// Constructed wholesale from every successful token response and replaced
/// as a unit, never mutated field-by-field.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: Option<String>,
    pub token_type: String,
    pub scope: Option<String>,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenSet {
    /// Build a token set from a token-endpoint response captured at
    /// `issued_at`.
    pub fn from_response(resp: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_in = resp.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let refresh_expires_in = resp
            .refresh_expires_in
            .unwrap_or(DEFAULT_REFRESH_EXPIRES_IN);
        TokenSet {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token,
            id_token: resp.id_token,
            token_type: resp.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: resp.scope,
            access_expires_at: issued_at + Duration::seconds(expires_in),
            refresh_expires_at: issued_at + Duration::seconds(refresh_expires_in),
        }
    }

    /// True once the access token is within the grace window of expiry.
    pub fn access_expired(&self) -> bool {
        Utc::now() >= self.access_expires_at - Duration::seconds(EXPIRY_GRACE_SECS)
    }

    /// True once the refresh token is within the grace window of expiry.
    pub fn refresh_expired(&self) -> bool {
        Utc::now() >= self.refresh_expires_at - Duration::seconds(EXPIRY_GRACE_SECS)
    }
}
