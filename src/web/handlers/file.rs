//! File handlers for the HTTP API.

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::file::{FileChanges, FileMetadata, FileStorage, FileWithPath, StoredUpload};
use crate::web::dto::{ApiResponse, ListFilesQuery, UpdateFileRequest, ValidatedJson};
use crate::web::error::{ApiError, ErrorCode};
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;
use crate::VaultError;

/// Generate a safe Content-Disposition header value for file downloads.
///
/// The quoted `filename` is an ASCII fallback with control characters
/// removed and quotes, backslashes and non-ASCII characters replaced;
/// `filename*` carries the full name per RFC 5987 when they differ.
pub(crate) fn content_disposition_header(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    if fallback == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// Build a download response for a file's stored content.
pub(crate) async fn file_response(
    state: &AppState,
    file: &FileMetadata,
) -> Result<Response<Body>, ApiError> {
    let content = state.blobs.load(&file.path).await.map_err(|e| match e {
        VaultError::NotFound(_) => {
            tracing::error!("Blob {} missing for file {}", file.path, file.id);
            ApiError::not_found("File content not found")
        }
        other => ApiError::from(other),
    })?;

    Response::builder()
        .header(header::CONTENT_TYPE, &file.mime_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&file.name),
        )
        .header(header::CONTENT_LENGTH, content.len())
        .header(header::CACHE_CONTROL, "private, no-cache")
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

fn multipart_error(e: MultipartError) -> ApiError {
    tracing::debug!("Failed to read multipart data: {}", e);
    ApiError::new(ErrorCode::for_status(e.status()), e.body_text())
}

/// Copy a multipart field into `blob`, enforcing the upload limit and quota.
async fn write_field(
    field: &mut Field<'_>,
    blob: &mut tokio::fs::File,
    max_upload_size: u64,
    available: u64,
) -> Result<u64, ApiError> {
    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size > max_upload_size {
            return Err(ApiError::payload_too_large(format!(
                "File too large (max {} MB)",
                max_upload_size / 1024 / 1024
            )));
        }
        if size > available {
            return Err(VaultError::StorageExceeded {
                requested: size,
                available,
            }
            .into());
        }
        blob.write_all(&chunk).await.map_err(VaultError::from)?;
    }
    blob.flush().await.map_err(VaultError::from)?;
    Ok(size)
}

/// Stream the `file` field into a new blob. The blob is removed on failure.
async fn receive_file(
    state: &AppState,
    user_id: i64,
    mut field: Field<'_>,
) -> Result<StoredUpload, ApiError> {
    let name = field
        .file_name()
        .map(str::to_string)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No file name provided"))?;
    let mime_type = field.content_type().map(str::to_string);
    let available = state.drive().available_bytes(user_id).await?;

    let stored_name = FileStorage::generate_stored_name(&name);
    let mut blob = state.blobs.create(&stored_name).await?;
    let written = write_field(&mut field, &mut blob, state.max_upload_size, available).await;
    drop(blob);

    match written {
        Ok(size) => Ok(StoredUpload {
            name,
            folder_id: None,
            mime_type,
            size,
            stored_name,
        }),
        Err(e) => {
            discard_blob(state, &stored_name).await;
            Err(e)
        }
    }
}

async fn discard_blob(state: &AppState, stored_name: &str) {
    if let Err(e) = state.blobs.delete(stored_name).await {
        warn!("Failed to remove partial upload {}: {}", stored_name, e);
    }
}

fn parse_folder_id(text: &str) -> Result<Option<i64>, ApiError> {
    let text = text.trim();
    if text.is_empty() || text == "null" {
        return Ok(None);
    }
    text.parse()
        .map(Some)
        .map_err(|_| ApiError::bad_request("Invalid folderId"))
}

/// Read the upload form into `upload`, returning the `folderId` field.
async fn read_upload_form(
    state: &AppState,
    user_id: i64,
    multipart: &mut Multipart,
    upload: &mut Option<StoredUpload>,
) -> Result<Option<i64>, ApiError> {
    let mut folder_id = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "folderId" => {
                let text = field.text().await.map_err(multipart_error)?;
                folder_id = parse_folder_id(&text)?;
            }
            "file" => {
                if upload.is_some() {
                    return Err(ApiError::bad_request("Only one file per upload"));
                }
                *upload = Some(receive_file(state, user_id, field).await?);
            }
            _ => {}
        }
    }
    Ok(folder_id)
}

/// GET /api/files?folderId= - List files in a folder (root when omitted).
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<ApiResponse<Vec<FileWithPath>>>, ApiError> {
    let files = state
        .drive()
        .list_files(auth.user_id(), query.folder_id)
        .await?;
    Ok(Json(ApiResponse::new(files)))
}

/// POST /api/files/upload - Upload a file.
///
/// Request body: multipart/form-data with a `file` field and an optional
/// `folderId` field.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<FileWithPath>>), ApiError> {
    let user_id = auth.user_id();
    let mut upload = None;

    let form = read_upload_form(&state, user_id, &mut multipart, &mut upload).await;
    let folder_id = match form {
        Ok(folder_id) => folder_id,
        Err(e) => {
            if let Some(ref stored) = upload {
                discard_blob(&state, &stored.stored_name).await;
            }
            return Err(e);
        }
    };

    let mut upload = upload.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    upload.folder_id = folder_id;

    let file = state.drive().register_upload(user_id, upload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(file))))
}

/// GET /api/files/:id - File metadata.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileWithPath>>, ApiError> {
    let file = state.drive().get_file(auth.user_id(), file_id).await?;
    Ok(Json(ApiResponse::new(file)))
}

/// PATCH /api/files/:id - Rename, move or star a file.
pub async fn update_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateFileRequest>,
) -> Result<Json<ApiResponse<FileWithPath>>, ApiError> {
    let changes = FileChanges {
        name: req.name,
        folder_id: req.folder_id,
        starred: req.starred,
    };
    let file = state
        .drive()
        .update_file(auth.user_id(), file_id, &changes)
        .await?;
    Ok(Json(ApiResponse::new(file)))
}

/// DELETE /api/files/:id - Permanently delete a file.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.drive().delete_file(auth.user_id(), file_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/files/:id/download - File content.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let file = state.drive().open_download(auth.user_id(), file_id).await?;
    file_response(&state, &file).await
}

/// POST /api/files/:id/trash - Move a file to the trash.
pub async fn trash_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileWithPath>>, ApiError> {
    let file = state.drive().trash_file(auth.user_id(), file_id).await?;
    Ok(Json(ApiResponse::new(file)))
}

/// POST /api/files/:id/restore - Take a file out of the trash.
pub async fn restore_file(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<FileWithPath>>, ApiError> {
    let file = state.drive().restore_file(auth.user_id(), file_id).await?;
    Ok(Json(ApiResponse::new(file)))
}
