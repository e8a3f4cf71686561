use crate::time::Micros;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Tokens are refreshed this long before their recorded expiry
const EXPIRY_MARGIN_SECS: i64 = 5;

/// Lifetime assumed when the appliance does not report one
const DEFAULT_LIFETIME_SECS: i64 = 1200;

/// Token represents an appliance auth token together with its issue and
/// expiry times. It is sent in the `X-F5-Auth-Token` header.
#[derive(Clone)]
pub struct Token {
    /// Token value
    pub value: String,
    /// When the token was obtained
    pub issued_at: DateTime<Utc>,
    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Create a token issued now with the given lifetime in seconds
    pub fn new(value: String, lifetime_secs: i64) -> Self {
        let issued_at = Utc::now();
        Token {
            value,
            issued_at,
            expires_at: issued_at + Duration::seconds(lifetime_secs),
        }
    }

    /// Check whether the token must be renewed before use
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check expiry against a given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    /// Force the token to count as expired
    pub fn mark_expired(&mut self) {
        self.expires_at = self.issued_at.min(Utc::now() - Duration::seconds(1));
    }

    /// Reset the lifetime, counted from issue time
    pub fn set_lifetime(&mut self, lifetime_secs: i64) {
        self.expires_at = self.issued_at + Duration::seconds(lifetime_secs);
    }
}

// Keep the token value out of logs
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Body of `POST /mgmt/shared/authn/login`
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: IssuedToken,
}

/// `token` object of a login or token PATCH response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IssuedToken {
    pub token: String,
    /// Lifetime in seconds
    #[serde(default)]
    pub timeout: Option<i64>,
    #[serde(default)]
    pub expiration_micros: Option<Micros>,
}

impl From<IssuedToken> for Token {
    fn from(issued: IssuedToken) -> Self {
        let mut token = Token::new(issued.token, issued.timeout.unwrap_or(DEFAULT_LIFETIME_SECS));
        if let Some(expiration) = issued.expiration_micros {
            token.expires_at = expiration.0;
        }
        token
    }
}
