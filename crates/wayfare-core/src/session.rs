//! Session entity owned by the auth lifecycle manager.
//!
//! A [`Session`] is created at login/registration, refreshed silently before
//! its access token expires, and destroyed on logout or unrecoverable 401.
//! The [`TokenProvider`] seam is how the HTTP layer reads the current access
//! token without depending on the auth manager.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::model::User;

/// Read access to the current bearer token.
///
/// Implemented by the auth manager; the request interceptor calls this on
/// every outgoing request. Returning `None` means the request goes out
/// unauthenticated.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// An always-anonymous provider, useful before login and in tests.
pub struct AnonymousTokens;

impl TokenProvider for AnonymousTokens {
    fn access_token(&self) -> Option<String> {
        None
    }
}

/// Authenticated session state.
///
/// Owned exclusively by the auth manager and persisted through the storage
/// adapter; everything else reads tokens via [`TokenProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Expiry of the access token, decoded from its `exp` claim when present.
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Session {
    /// Builds a session from a credential-exchange response.
    ///
    /// The expiry is decoded from the access token itself; a token without a
    /// readable `exp` claim yields `expires_at: None` and is treated as
    /// already expiring by [`Session::is_expiring_within`].
    pub fn new(
        user: &User,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Self {
        let access_token = access_token.into();
        let expires_at = decode_token_expiry(&access_token);
        Self {
            user_id: user.id.clone(),
            access_token,
            refresh_token,
            expires_at,
            permissions: user.permissions.clone(),
        }
    }

    /// Replaces the tokens after a successful refresh, keeping identity and
    /// permissions. A refresh response without a new refresh token keeps the
    /// old one.
    pub fn with_refreshed_tokens(
        mut self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Self {
        self.access_token = access_token.into();
        self.expires_at = decode_token_expiry(&self.access_token);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self
    }

    /// True when the token expires within `lead`, counted from `now`.
    ///
    /// Tokens without a decodable expiry always report true so the refresh
    /// path runs rather than letting an opaque token lapse silently.
    pub fn is_expiring_within(&self, lead: Duration, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - now < lead,
            None => true,
        }
    }
}

/// Decodes the `exp` claim of a JWT without verifying its signature.
///
/// Only the payload segment is inspected; the token is never trusted for
/// anything but scheduling the silent refresh. Returns `None` for opaque or
/// malformed tokens.
pub fn decode_token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_, payload) = (parts.next()?, parts.next()?);
    if parts.next().is_none() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.as_bytes()).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    Utc.timestamp_opt(exp, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an unsigned JWT-shaped token with the given exp claim.
    fn token_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#).as_bytes());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn test_decode_token_expiry() {
        let expires = decode_token_expiry(&token_with_exp(1_900_000_000)).unwrap();
        assert_eq!(expires.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(decode_token_expiry("not-a-jwt").is_none());
        assert!(decode_token_expiry("a.b").is_none());
        assert!(decode_token_expiry("a.%%%.c").is_none());
    }

    #[test]
    fn test_expiring_within_lead_time() {
        let now = Utc::now();
        let soon = token_with_exp((now + Duration::minutes(2)).timestamp());
        let later = token_with_exp((now + Duration::hours(2)).timestamp());

        let user = crate::model::User {
            id: "u1".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            phone: None,
            avatar_url: None,
            roles: vec![],
            permissions: vec![],
            created_at: now,
            updated_at: now,
        };

        let session = Session::new(&user, soon, None);
        assert!(session.is_expiring_within(Duration::minutes(5), now));

        let session = Session::new(&user, later, None);
        assert!(!session.is_expiring_within(Duration::minutes(5), now));
    }

    #[test]
    fn test_opaque_token_always_expiring() {
        let now = Utc::now();
        let user = crate::model::User {
            id: "u1".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            phone: None,
            avatar_url: None,
            roles: vec![],
            permissions: vec![],
            created_at: now,
            updated_at: now,
        };
        let session = Session::new(&user, "opaque-token", None);
        assert!(session.is_expiring_within(Duration::minutes(5), now));
    }

    #[test]
    fn test_refresh_keeps_old_refresh_token_when_absent() {
        let now = Utc::now();
        let user = crate::model::User {
            id: "u1".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
            phone: None,
            avatar_url: None,
            roles: vec![],
            permissions: vec![],
            created_at: now,
            updated_at: now,
        };
        let session = Session::new(&user, token_with_exp(1_900_000_000), Some("r1".into()));
        let refreshed = session.with_refreshed_tokens(token_with_exp(1_900_009_000), None);
        assert_eq!(refreshed.refresh_token.as_deref(), Some("r1"));
    }
}
