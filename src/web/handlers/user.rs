//! User handlers for the HTTP API.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::auth::ProfileUpdate;
use crate::db::User;
use crate::file::StorageSummary;
use crate::web::dto::{ApiResponse, UpdateProfileRequest, ValidatedJson};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/user/storage - Quota usage.
pub async fn storage_summary(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<StorageSummary>>, ApiError> {
    let summary = state.drive().storage_summary(auth.user_id()).await?;
    Ok(Json(ApiResponse::new(summary)))
}

/// POST /api/user/storage/reconcile - Recompute usage from stored files.
pub async fn reconcile_storage(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<StorageSummary>>, ApiError> {
    let summary = state.drive().reconcile_storage(auth.user_id()).await?;
    Ok(Json(ApiResponse::new(summary)))
}

/// PATCH /api/user - Update display name or avatar.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let update = ProfileUpdate {
        display_name: req.display_name,
        avatar_url: req.avatar_url,
    };
    let user = crate::auth::update_profile(state.storage.as_ref(), auth.user_id(), update).await?;
    Ok(Json(ApiResponse::new(user)))
}
