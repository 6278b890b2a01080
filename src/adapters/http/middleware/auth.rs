//! Authentication middleware and extractors for axum.
//!
//! - `auth_middleware` validates Bearer tokens and injects the user into extensions
//! - `RequireAuth` rejects requests that carry no valid token
//!
//! ```text
//! Request → auth_middleware → injects AuthenticatedUser into extensions
//!                                      ↓
//!                              Handler → RequireAuth extractor reads from extensions
//! ```
//!
//! Tokens are HS256 JWTs signed with the shared secret; `sub` is the user id.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::UserId;

/// The caller behind a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Claims read from the bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

/// Verifies HS256 bearer tokens.
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &SecretString, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let user_id = UserId::new(data.claims.sub)
            .map_err(|_| AuthError::InvalidToken("empty subject".to_string()))?;
        Ok(AuthenticatedUser { user_id })
    }
}

/// Auth middleware state.
pub type AuthState = Arc<JwtAuthenticator>;

/// Validates the Bearer token when one is present.
///
/// A missing token passes through so unauthenticated routes keep working;
/// `RequireAuth` enforces presence. A token that fails validation is a 401.
pub async fn auth_middleware(
    State(authenticator): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        return next.run(request).await;
    };

    match authenticator.authenticate(token) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Bearer token rejected");
            let message = match e {
                AuthError::TokenExpired => "Token expired",
                AuthError::InvalidToken(_) => "Invalid token",
            };
            AuthRejection::with_message(message).into_response()
        }
    }
}

/// Extractor that requires authentication.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| AuthRejection::with_message("Authentication is required"))
    }
}

/// 401 response for missing or invalid credentials.
#[derive(Debug)]
pub struct AuthRejection {
    message: &'static str,
}

impl AuthRejection {
    fn with_message(message: &'static str) -> Self {
        Self { message }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "code": "AUTHENTICATION_REQUIRED",
                "message": self.message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret-with-enough-length-000";

    fn secret() -> SecretString {
        SecretString::new(SECRET.to_string())
    }

    fn token(sub: &str, exp_offset: i64, iss: Option<&str>) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset) as u64;
        let claims = Claims {
            sub: sub.to_string(),
            exp,
            iss: iss.map(str::to_string),
            aud: None,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_subject() {
        let auth = JwtAuthenticator::new(&secret(), None, None);
        let user = auth.authenticate(&token("user-1", 3600, None)).unwrap();
        assert_eq!(user.user_id.as_str(), "user-1");
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = JwtAuthenticator::new(&secret(), None, None);
        assert_eq!(
            auth.authenticate(&token("user-1", -3600, None)),
            Err(AuthError::TokenExpired)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let other = SecretString::new("another-secret-entirely-0000000000".to_string());
        let auth = JwtAuthenticator::new(&other, None, None);
        assert!(matches!(
            auth.authenticate(&token("user-1", 3600, None)),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn issuer_is_enforced_when_configured() {
        let auth = JwtAuthenticator::new(&secret(), Some("https://auth.example.com"), None);
        assert!(auth
            .authenticate(&token("user-1", 3600, Some("https://auth.example.com")))
            .is_ok());
        assert!(auth
            .authenticate(&token("user-1", 3600, Some("https://evil.example.com")))
            .is_err());
    }

    #[test]
    fn empty_subject_is_rejected() {
        let auth = JwtAuthenticator::new(&secret(), None, None);
        assert!(auth.authenticate(&token("", 3600, None)).is_err());
    }
}
