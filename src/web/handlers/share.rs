//! Share handlers for the HTTP API.
//!
//! Owners create, list and revoke shares. Resolving a token is public,
//! subject to expiry and the share's access type.

use axum::{
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::file::{AccessType, Share, ShareRequest, ShareTarget, ShareWithDetails};
use crate::web::dto::{ApiResponse, CreateShareRequest, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::handlers::file::file_response;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// Resolve a token and check that `viewer` may see it.
async fn open_share(
    state: &AppState,
    token: &str,
    viewer: Option<&AuthUser>,
) -> Result<ShareWithDetails, ApiError> {
    let details = state.drive().resolve_share(token).await?;

    if details.share.is_expired(Utc::now()) {
        return Err(ApiError::gone("This share link has expired"));
    }
    if details.share.access_type == AccessType::Restricted && viewer.is_none() {
        return Err(ApiError::unauthorized("Sign in to open this share"));
    }

    if state.drive().share_target_trashed(&details).await? {
        return Err(ApiError::not_found("share not found"));
    }

    Ok(details)
}

/// POST /api/shares - Share a file or folder.
pub async fn create_share(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateShareRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Share>>), ApiError> {
    let target = ShareTarget::from_ids(req.file_id, req.folder_id)?;
    let request = ShareRequest {
        target,
        access_type: req.access_type,
        allow_download: req.allow_download,
        expiry_date: req.expiry_date,
    };

    let share = state
        .drive()
        .create_share(auth.user_id(), &request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(share))))
}

/// GET /api/shares - Shares created by the current user.
pub async fn list_shares(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<Vec<Share>>>, ApiError> {
    let shares = state.drive().list_shares(auth.user_id()).await?;
    Ok(Json(ApiResponse::new(shares)))
}

/// DELETE /api/shares/:id - Revoke a share.
pub async fn delete_share(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(share_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.drive().delete_share(auth.user_id(), share_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/shares/:token - Resolve a share link.
pub async fn get_share(
    State(state): State<Arc<AppState>>,
    viewer: Option<AuthUser>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<ShareWithDetails>>, ApiError> {
    let details = open_share(&state, &token, viewer.as_ref()).await?;
    Ok(Json(ApiResponse::new(details)))
}

/// GET /api/shares/:token/download - Download a shared file.
pub async fn download_shared(
    State(state): State<Arc<AppState>>,
    viewer: Option<AuthUser>,
    Path(token): Path<String>,
) -> Result<Response<Body>, ApiError> {
    let details = open_share(&state, &token, viewer.as_ref()).await?;

    if !details.share.allow_download {
        return Err(ApiError::forbidden("Downloads are disabled for this share"));
    }
    let file = details
        .file
        .ok_or_else(|| ApiError::forbidden("This share does not point to a file"))?;

    file_response(&state, &file).await
}
