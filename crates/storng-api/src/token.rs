// ── Access tokens ──
//
// The gateway never owns credentials. Callers hand it a `TokenProvider`
// per fetch; the provider answers with the current token, supplies the
// refresh payload, and stores whatever the refresh route returns.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use crate::response::Response;

/// Source of the access token for authenticated routes.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The current access token, or `None` when signed out.
    async fn access_token(&self) -> Option<SecretString>;

    /// Data sent to the refresh route (e.g. a refresh token).
    async fn refresh_payload(&self) -> Option<Value> {
        None
    }

    /// Called with the refresh route's successful response, before queued
    /// requests are replayed. Implementations store the new token here.
    async fn on_refreshed(&self, _response: &Response) {}
}

/// A fixed token, updated in place when a refresh succeeds.
///
/// Useful for one-shot tools and tests. Refresh responses are expected to
/// carry the new token under `data.accessToken`.
#[derive(Default)]
pub struct StaticToken {
    token: Mutex<Option<SecretString>>,
}

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }

    /// A provider that never has a token.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Option<SecretString> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn on_refreshed(&self, response: &Response) {
        if let Some(token) = response
            .data
            .as_ref()
            .and_then(|d| d.get("accessToken"))
            .and_then(Value::as_str)
        {
            *self.token.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(SecretString::from(token.to_owned()));
        }
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Expiry time of a JWT access token, read from its `exp` claim.
///
/// Returns `None` for opaque tokens or tokens without `exp`. The signature
/// is not verified; this is only used to schedule refreshes.
pub fn expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// Whether `token` expires within `lookahead` from now (or already has).
///
/// Tokens whose expiry can't be read are treated as long-lived.
pub fn expires_within(token: &str, lookahead: Duration) -> bool {
    let Some(exp) = expiry(token) else {
        trace!("access token has no readable expiry; skipping refresh check");
        return false;
    };
    let ahead = i64::try_from(lookahead.as_secs()).unwrap_or(i64::MAX);
    exp.timestamp() <= Utc::now().timestamp().saturating_add(ahead)
}

/// Convenience for providers holding a `SecretString`.
pub(crate) fn secret_expires_within(token: &SecretString, lookahead: Duration) -> bool {
    expires_within(token.expose_secret(), lookahead)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwt(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(json!({"sub": "u1", "exp": exp}).to_string());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn reads_exp_claim() {
        let token = jwt(1_700_000_000);
        assert_eq!(expiry(&token).unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn token_inside_lookahead_is_expiring() {
        let token = jwt(Utc::now().timestamp() + 10);
        assert!(expires_within(&token, Duration::from_secs(30)));
    }

    #[test]
    fn token_outside_lookahead_is_fresh() {
        let token = jwt(Utc::now().timestamp() + 3600);
        assert!(!expires_within(&token, Duration::from_secs(30)));
    }

    #[test]
    fn opaque_token_never_expires() {
        assert!(expiry("not-a-jwt").is_none());
        assert!(!expires_within("not-a-jwt", Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn static_token_takes_refreshed_value() {
        let provider = StaticToken::new(SecretString::from("old".to_string()));
        provider
            .on_refreshed(&Response::success(Some(json!({"accessToken": "new"}))))
            .await;
        let token = provider.access_token().await.unwrap();
        assert_eq!(token.expose_secret(), "new");
    }
}
