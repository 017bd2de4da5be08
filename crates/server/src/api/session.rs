//! Signed session tokens carried in the `access_token` cookie.

use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use palaver_core::config::AuthConfig;
use palaver_core::domain::user::{User, UserId};
use palaver_core::errors::ApplicationError;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::error::{correlation_id, ApiError};
use crate::api::state::AppState;

pub const SESSION_COOKIE: &str = "access_token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: u64,
    cookie_secure: bool,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl_minutes: u64, cookie_secure: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_minutes,
            cookie_secure,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.jwt_secret.expose_secret().as_bytes(),
            config.token_ttl_minutes,
            config.cookie_secure,
        )
    }

    pub fn issue(&self, user_id: UserId) -> Result<String, ApplicationError> {
        let now = Utc::now();
        let expires_at = i64::try_from(self.ttl_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                ApplicationError::Configuration("auth.token_ttl_minutes is out of range".into())
            })?;
        let claims = Claims {
            sub: user_id.0.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApplicationError::Configuration(format!("failed to sign session: {e}")))
    }

    /// Any malformed, forged or expired token is [`ApplicationError::Unauthenticated`].
    pub fn verify(&self, token: &str) -> Result<UserId, ApplicationError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                debug!(event_name = "auth.session.invalid", error = %e, "session token rejected");
                ApplicationError::Unauthenticated
            })?;

        data.claims.sub.parse::<i64>().map(UserId).map_err(|_| ApplicationError::Unauthenticated)
    }

    pub fn max_age_secs(&self) -> u64 {
        self.ttl_minutes.saturating_mul(60)
    }

    pub fn set_cookie(&self, token: &str) -> String {
        let secure = if self.cookie_secure { "; Secure" } else { "" };
        format!(
            "{SESSION_COOKIE}={token}; HttpOnly{secure}; Path=/; SameSite=Lax; Max-Age={}",
            self.max_age_secs()
        )
    }

    pub fn clear_cookie(&self) -> String {
        let secure = if self.cookie_secure { "; Secure" } else { "" };
        format!("{SESSION_COOKIE}=; HttpOnly{secure}; Path=/; SameSite=Lax; Max-Age=0")
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl_minutes", &self.ttl_minutes)
            .field("cookie_secure", &self.cookie_secure)
            .finish_non_exhaustive()
    }
}

pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// The caller, resolved from a valid session cookie.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id(&parts.headers);
        let unauthenticated = || ApiError::new(ApplicationError::Unauthenticated, &correlation_id);

        let token = cookie_value(&parts.headers, SESSION_COOKIE).ok_or_else(unauthenticated)?;
        let user_id = state.sessions.verify(token).map_err(|_| unauthenticated())?;

        match state.users.find_by_id(user_id).await {
            Ok(Some(user)) => Ok(Self(user)),
            Ok(None) => Err(unauthenticated()),
            Err(error) => Err(ApiError::new(
                ApplicationError::PersistenceFailure(error.to_string()),
                &correlation_id,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use palaver_core::domain::user::UserId;
    use palaver_core::errors::ApplicationError;

    use super::{cookie_value, Claims, SessionKeys};

    fn keys() -> SessionKeys {
        SessionKeys::new(b"test-secret", 60, false)
    }

    #[test]
    fn issued_token_verifies_to_same_user() {
        let keys = keys();
        let token = keys.issue(UserId(42)).expect("token");

        assert_eq!(keys.verify(&token), Ok(UserId(42)));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = SessionKeys::new(b"other", 60, false).issue(UserId(1)).expect("token");

        assert_eq!(keys().verify(&token), Err(ApplicationError::Unauthenticated));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims { sub: "1".into(), iat: 1_000, exp: 2_000 };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test-secret"))
            .expect("token");

        assert_eq!(keys().verify(&token), Err(ApplicationError::Unauthenticated));
    }

    #[test]
    fn cookie_attributes_follow_settings() {
        let plain = keys().set_cookie("tok");
        let secure = SessionKeys::new(b"s", 1, true).set_cookie("tok");

        assert_eq!(plain, "access_token=tok; HttpOnly; Path=/; SameSite=Lax; Max-Age=3600");
        assert!(secure.contains("; Secure;"));
        assert!(keys().clear_cookie().ends_with("Max-Age=0"));
    }

    #[test]
    fn cookie_value_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("theme=dark; access_token=abc.def; x=1"));

        assert_eq!(cookie_value(&headers, "access_token"), Some("abc.def"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }
}
