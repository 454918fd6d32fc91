//! Bearer-token authentication.
//!
//! [`jwt_auth`] stores the shared [`JwtState`] in request extensions, and the
//! [`AuthUser`] extractor reads it back to check the caller's token. Handlers
//! that also serve anonymous callers take `Option<AuthUser>`.

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    async_trait,
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, errors::Error as JwtError, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::web::error::ApiError;

/// Access token payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id.
    pub sub: i64,
    pub username: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
}

impl JwtClaims {
    /// Claims for `user_id` valid for `ttl_secs` from now.
    pub fn issue(user_id: i64, username: &str, ttl_secs: u64) -> Self {
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        Self {
            sub: user_id,
            username: username.to_string(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// HS256 verification key and rules.
#[derive(Clone)]
pub struct JwtState {
    key: DecodingKey,
    validation: Validation,
}

impl JwtState {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, JwtError> {
        decode::<JwtClaims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}

/// Token from `Authorization: Bearer`, falling back to a `token` query
/// parameter for links opened directly in a browser.
fn bearer_token(parts: &Parts) -> Option<Cow<'_, str>> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match from_header {
        Some(token) => Some(Cow::Borrowed(token)),
        None => parts
            .uri
            .query()?
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "token")
            .and_then(|(_, value)| urlencoding::decode(value).ok()),
    }
}

/// The caller, proven by a valid access token. Rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct AuthUser(pub JwtClaims);

impl AuthUser {
    pub fn user_id(&self) -> i64 {
        self.0.sub
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(jwt) = parts.extensions.get::<Arc<JwtState>>() else {
            tracing::error!("JwtState missing from request extensions");
            return Err(ApiError::internal("Authentication is not configured"));
        };
        let token =
            bearer_token(parts).ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

        match jwt.verify(&token) {
            Ok(claims) => Ok(AuthUser(claims)),
            Err(e) => {
                tracing::debug!("Rejected access token: {}", e);
                Err(ApiError::unauthorized("Invalid or expired token"))
            }
        }
    }
}

/// Attach `jwt` to the request so [`AuthUser`] can find it.
pub async fn jwt_auth(jwt: Arc<JwtState>, mut request: Request<Body>, next: Next) -> Response {
    request.extensions_mut().insert(jwt);
    next.run(request).await
}
