//! OAuth 2.0 token types
//!
//! `TokenResponse` mirrors the RFC 6749 token endpoint payload; `TokenSet` is
//! what callers keep around, with the relative `expires_in` resolved to an
//! absolute expiry.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Tokens are refreshed this long before they actually expire.
pub const DEFAULT_EXPIRY_DELTA_SECS: i64 = 10;

/// OAuth 2.0 access and refresh tokens with absolute expiry
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    /// Some providers never issue refresh tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (normally "Bearer")
    pub token_type: String,

    /// `None` means the provider did not say; such tokens never expire
    /// locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Build a token set from a relative lifetime in seconds.
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: Option<i64>) -> Self {
        let expires_at = expires_in.filter(|secs| *secs > 0).map(|secs| Utc::now() + Duration::seconds(secs));
        Self { access_token, refresh_token, token_type: "Bearer".to_string(), expires_at }
    }

    /// Rebuild a token set from stored values; `expiry_millis <= 0` means
    /// unknown expiry.
    #[must_use]
    pub fn from_stored(access_token: String, refresh_token: Option<String>, expiry_millis: i64) -> Self {
        let expires_at = if expiry_millis > 0 {
            Utc.timestamp_millis_opt(expiry_millis).single()
        } else {
            None
        };
        Self { access_token, refresh_token, token_type: "Bearer".to_string(), expires_at }
    }

    /// Whether the token is expired or expires within `threshold_seconds`.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Utc::now() + Duration::seconds(threshold_seconds) >= expires_at)
    }

    /// Usable as-is: non-empty and not about to expire.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired(DEFAULT_EXPIRY_DELTA_SECS)
    }

    /// Absolute expiry in epoch milliseconds, `0` when unknown.
    #[must_use]
    pub fn expiry_millis(&self) -> i64 {
        self.expires_at.map_or(0, |expires_at| expires_at.timestamp_millis())
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// OAuth token response from an authorization server
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        let mut tokens = Self::new(response.access_token, response.refresh_token, response.expires_in);
        // Providers answer "bearer" in any case; normalize for the header.
        if !response.token_type.eq_ignore_ascii_case("bearer") {
            tokens.token_type = response.token_type;
        }
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_without_expiry_never_expires() {
        let tokens = TokenSet::new("access".into(), None, None);
        assert!(!tokens.is_expired(3600));
        assert!(tokens.is_valid());
        assert_eq!(tokens.expiry_millis(), 0);
    }

    #[test]
    fn token_inside_expiry_delta_is_invalid() {
        let tokens = TokenSet::new("access".into(), Some("refresh".into()), Some(5));
        assert!(tokens.is_expired(DEFAULT_EXPIRY_DELTA_SECS));
        assert!(!tokens.is_valid());
    }

    #[test]
    fn stored_expiry_round_trips_in_millis() {
        let expiry = (Utc::now() + Duration::hours(1)).timestamp_millis();
        let tokens = TokenSet::from_stored("access".into(), None, expiry);
        assert_eq!(tokens.expiry_millis(), expiry);
        assert!(tokens.is_valid());
    }

    #[test]
    fn expired_stored_token_is_invalid() {
        let expiry = (Utc::now() - Duration::minutes(1)).timestamp_millis();
        assert!(!TokenSet::from_stored("access".into(), None, expiry).is_valid());
    }

    #[test]
    fn response_defaults_to_bearer() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":"r","expires_in":3600}"#)
                .expect("response parses");
        let tokens = TokenSet::from(response);

        assert_eq!(tokens.authorization_header(), "Bearer a");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r"));
        assert!(tokens.expires_at.is_some());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let tokens = TokenSet::new("secret-access".into(), Some("secret-refresh".into()), None);
        let debug = format!("{tokens:?}");
        assert!(!debug.contains("secret"));
    }
}
