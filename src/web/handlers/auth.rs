//! Authentication handlers and shared application state.

use axum::{extract::State, http::StatusCode, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::sync::Arc;

use crate::auth::RegistrationRequest;
use crate::db::{SharedStorage, User};
use crate::file::{DriveService, FileStorage};
use crate::web::dto::{ApiResponse, AuthResponse, LoginRequest, RegisterRequest, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::middleware::{AuthUser, JwtClaims};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Entity store.
    pub storage: SharedStorage,
    /// Blob storage for file content.
    pub blobs: FileStorage,
    /// JWT encoding key.
    pub encoding_key: EncodingKey,
    /// Access token expiry in seconds.
    pub access_token_expiry: u64,
    /// Maximum size of a single upload in bytes.
    pub max_upload_size: u64,
    /// Quota given to newly registered users, in bytes.
    pub default_storage_limit: i64,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        storage: SharedStorage,
        blobs: FileStorage,
        jwt_secret: &str,
        access_expiry: u64,
    ) -> Self {
        Self {
            storage,
            blobs,
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            access_token_expiry: access_expiry,
            max_upload_size: crate::config::FilesConfig::default().max_upload_size_bytes(),
            default_storage_limit: crate::config::FilesConfig::default()
                .default_storage_limit_bytes(),
        }
    }

    /// Set upload size and default quota (both in bytes).
    pub fn with_limits(mut self, max_upload_size: u64, default_storage_limit: i64) -> Self {
        self.max_upload_size = max_upload_size;
        self.default_storage_limit = default_storage_limit;
        self
    }

    /// Drive operations over this state's stores.
    pub fn drive(&self) -> DriveService<'_> {
        DriveService::new(self.storage.as_ref(), &self.blobs)
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> Result<String, ApiError> {
        let claims = JwtClaims::issue(user.id, &user.username, self.access_token_expiry);

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }

    fn auth_response(&self, user: User) -> Result<AuthResponse, ApiError> {
        Ok(AuthResponse {
            access_token: self.generate_access_token(&user)?,
            expires_in: self.access_token_expiry,
            user,
        })
    }
}

/// POST /api/auth/register - Create an account and log in.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), ApiError> {
    let mut request = RegistrationRequest::new(req.username, req.password, req.display_name);
    if let Some(avatar_url) = req.avatar_url {
        request = request.with_avatar_url(avatar_url);
    }

    let user = crate::auth::register(
        state.storage.as_ref(),
        request,
        state.default_storage_limit,
    )
    .await?;

    let response = state.auth_response(user)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(response))))
}

/// POST /api/auth/login - Exchange credentials for an access token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let user = crate::auth::login(state.storage.as_ref(), &req.username, &req.password).await?;
    Ok(Json(ApiResponse::new(state.auth_response(user)?)))
}

/// GET /api/auth/me - Current user.
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state
        .storage
        .get_user(auth.user_id())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(ApiResponse::new(user)))
}
