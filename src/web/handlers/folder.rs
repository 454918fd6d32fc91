//! Folder handlers for the HTTP API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::file::{Folder, FolderChanges, FolderWithStats};
use crate::web::dto::{
    ApiResponse, CreateFolderRequest, ListFoldersQuery, UpdateFolderRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /api/folders?parentId= - Child folders (root when omitted).
pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListFoldersQuery>,
) -> Result<Json<ApiResponse<Vec<FolderWithStats>>>, ApiError> {
    let folders = state
        .drive()
        .list_folders(auth.user_id(), query.parent_id)
        .await?;
    Ok(Json(ApiResponse::new(folders)))
}

/// POST /api/folders - Create a folder.
pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateFolderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Folder>>), ApiError> {
    let folder = state
        .drive()
        .create_folder(auth.user_id(), &req.name, req.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(folder))))
}

/// GET /api/folders/:id - Folder with file totals.
pub async fn get_folder(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<ApiResponse<FolderWithStats>>, ApiError> {
    let folder = state.drive().get_folder(auth.user_id(), folder_id).await?;
    Ok(Json(ApiResponse::new(folder)))
}

/// PATCH /api/folders/:id - Rename, move or star a folder.
pub async fn update_folder(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(folder_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFolderRequest>,
) -> Result<Json<ApiResponse<Folder>>, ApiError> {
    let changes = FolderChanges {
        name: req.name,
        parent_id: req.parent_id,
        starred: req.starred,
    };
    let folder = state
        .drive()
        .update_folder(auth.user_id(), folder_id, &changes)
        .await?;
    Ok(Json(ApiResponse::new(folder)))
}

/// DELETE /api/folders/:id - Permanently delete a folder and its contents.
pub async fn delete_folder(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(folder_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.drive().delete_folder(auth.user_id(), folder_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/folders/:id/trash
pub async fn trash_folder(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<ApiResponse<Folder>>, ApiError> {
    let folder = state.drive().trash_folder(auth.user_id(), folder_id).await?;
    Ok(Json(ApiResponse::new(folder)))
}

/// POST /api/folders/:id/restore
pub async fn restore_folder(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<ApiResponse<Folder>>, ApiError> {
    let folder = state
        .drive()
        .restore_folder(auth.user_id(), folder_id)
        .await?;
    Ok(Json(ApiResponse::new(folder)))
}

/// GET /api/folders/:id/path - Breadcrumb from the root to this folder.
pub async fn folder_path(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(folder_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Folder>>>, ApiError> {
    let path = state.drive().folder_path(auth.user_id(), folder_id).await?;
    Ok(Json(ApiResponse::new(path)))
}
