//! Derived view handlers: recent, starred, shared and trash.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::file::DriveView;
use crate::web::dto::ApiResponse;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

type ViewResponse = Result<Json<ApiResponse<DriveView>>, ApiError>;

/// GET /api/recent
pub async fn recent(State(state): State<Arc<AppState>>, auth: AuthUser) -> ViewResponse {
    let view = state.drive().recent(auth.user_id()).await?;
    Ok(Json(ApiResponse::new(view)))
}

/// GET /api/starred
pub async fn starred(State(state): State<Arc<AppState>>, auth: AuthUser) -> ViewResponse {
    let view = state.drive().starred(auth.user_id()).await?;
    Ok(Json(ApiResponse::new(view)))
}

/// GET /api/shared
pub async fn shared(State(state): State<Arc<AppState>>, auth: AuthUser) -> ViewResponse {
    let view = state.drive().shared(auth.user_id()).await?;
    Ok(Json(ApiResponse::new(view)))
}

/// GET /api/trash
pub async fn trash(State(state): State<Arc<AppState>>, auth: AuthUser) -> ViewResponse {
    let view = state.drive().trash(auth.user_id()).await?;
    Ok(Json(ApiResponse::new(view)))
}

/// DELETE /api/trash - Permanently delete everything in the trash.
pub async fn empty_trash(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    state.drive().empty_trash(auth.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
