//! Request authentication.
//!
//! Customers present the session token issued at sign-in as
//! `Authorization: Bearer <token>`; staff endpoints take the configured
//! admin token the same way.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::Utc;
use skillsync_shared::UserId;
use skillsync_store::StoreError;
use subtle::ConstantTimeEq;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::error::ServerError;

/// The signed-in customer making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ServerError::Unauthorized("Please sign in".into()))?
            .to_string();

        let now = Utc::now();
        match state
            .store
            .run(move |db| db.get_active_session(&token, now))
            .await
        {
            Ok(session) => Ok(AuthUser(session.user_id)),
            Err(ServerError::Store(StoreError::NotFound)) => Err(ServerError::Unauthorized(
                "Session expired, please sign in again".into(),
            )),
            Err(e) => Err(e),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let token = bearer_token(headers).unwrap_or("");

    // Constant-time comparison to prevent timing attacks on admin token.
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("authorization", HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer   ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_admin_token() {
        let config = ServerConfig {
            admin_token: Some("staff-secret".into()),
            ..ServerConfig::default()
        };
        assert!(verify_admin_token(&headers("Bearer staff-secret"), &config).is_ok());
        assert!(verify_admin_token(&headers("Bearer staff-secreT"), &config).is_err());
        assert!(verify_admin_token(&HeaderMap::new(), &config).is_err());
    }

    #[test]
    fn test_admin_disabled() {
        let config = ServerConfig::default();
        assert!(matches!(
            verify_admin_token(&headers("Bearer anything"), &config),
            Err(ServerError::Forbidden(_))
        ));
    }
}
