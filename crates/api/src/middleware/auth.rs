//! JWT authentication helpers and the `AuthUser` extractor.
//!
//! Tokens are issued by the account service; this API only validates them.
//! `AuthUser` rejects requests without a valid bearer token, while
//! `Option<AuthUser>` lets anonymous requests through as `None`.

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quill_common::error::AppError;

use crate::state::AppState;

/// JWT claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user's UUID
    pub sub: String,
    pub username: String,
    /// Account email, used as the default contact address for messages
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration time (UNIX timestamp)
    pub exp: i64,
    /// Issued at (UNIX timestamp)
    pub iat: i64,
}

/// Authenticated user extracted from JWT token.
///
/// ```ignore
/// async fn handler(auth: AuthUser) -> impl IntoResponse {
///     // auth.user_id is the authenticated user's UUID
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub claims: Claims,
}

impl AuthUser {
    fn from_token(token: &str, secret: &str) -> Result<Self, AppError> {
        let claims = decode_jwt(token, secret)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Auth("Invalid user ID in token".to_string()))?;
        Ok(AuthUser {
            user_id,
            username: claims.username.clone(),
            email: claims.email.clone().filter(|e| !e.trim().is_empty()),
            claims,
        })
    }
}

/// Encode a JWT token for a user.
///
/// Tokens are issued by the account service, so this API never calls it.
/// It exists for tests and local tooling that need a token signed with
/// `JWT_SECRET`.
#[doc(hidden)]
pub fn encode_jwt(
    user_id: Uuid,
    username: &str,
    email: Option<&str>,
    secret: &str,
    expiry_hours: u64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(expiry_hours as i64);

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        email: email.map(str::to_string),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to encode JWT: {}", e)))?;

    Ok(token)
}

/// Decode and validate a JWT token.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

/// The bearer token, `None` if there is no Authorization header at all.
fn bearer_token(parts: &Parts) -> Result<Option<String>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| Some(t.trim().to_string()))
        .ok_or_else(|| {
            AppError::Auth("Malformed Authorization header. Use 'Bearer <JWT>'".to_string())
        })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let secret = state.config.jwt_secret.clone();
        let token = bearer_token(parts);

        async move {
            let token = token?.ok_or_else(|| {
                AppError::Auth(
                    "Missing Authorization header. Use 'Bearer <JWT>'".to_string(),
                )
            })?;
            AuthUser::from_token(&token, &secret)
        }
    }
}

/// No Authorization header means anonymous; a bad token is still rejected.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Option<Self>, Self::Rejection>> + Send {
        let secret = state.config.jwt_secret.clone();
        let token = bearer_token(parts);

        async move {
            match token? {
                Some(token) => AuthUser::from_token(&token, &secret).map(Some),
                None => Ok(None),
            }
        }
    }
}
