//! Test helpers for web API integration tests.
//!
//! Provides a TestApp wrapping an axum-test server over an in-memory
//! store and a temporary blob directory.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use tempfile::TempDir;

use filevault::config::FilesConfig;
use filevault::db::{MemoryStorage, SharedStorage};
use filevault::file::FileStorage;
use filevault::web::handlers::AppState;
use filevault::web::middleware::JwtState;
use filevault::web::router::create_router;

/// JWT secret used by every test server.
pub const TEST_JWT_SECRET: &str = "test-secret-key-for-testing-only";

/// Password used for every registered test user.
pub const TEST_PASSWORD: &str = "password123";

/// A running test server plus handles on its stores.
pub struct TestApp {
    pub server: TestServer,
    pub storage: SharedStorage,
    _blob_dir: TempDir,
}

/// Create a test app with the default upload and quota limits.
pub fn create_test_app() -> TestApp {
    let files = FilesConfig::default();
    create_test_app_with_limits(
        files.max_upload_size_bytes(),
        files.default_storage_limit_bytes(),
    )
}

/// Create a test app with the given upload limit and per-user quota.
pub fn create_test_app_with_limits(max_upload_size: u64, storage_limit: i64) -> TestApp {
    let blob_dir = TempDir::new().expect("Failed to create blob directory");
    let blobs = FileStorage::new(blob_dir.path()).expect("Failed to create file storage");
    let storage: SharedStorage = Arc::new(MemoryStorage::new());

    let app_state = Arc::new(
        AppState::new(storage.clone(), blobs, TEST_JWT_SECRET, 900)
            .with_limits(max_upload_size, storage_limit),
    );
    let jwt_state = Arc::new(JwtState::new(TEST_JWT_SECRET));
    let router = create_router(app_state, jwt_state, &[]);

    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        storage,
        _blob_dir: blob_dir,
    }
}

/// Format an Authorization header value.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Register a user and return the raw response body.
pub async fn register_user(server: &TestServer, username: &str) -> Value {
    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "username": username,
            "password": TEST_PASSWORD,
            "displayName": username.to_uppercase(),
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()
}

/// Register a user and return their access token.
pub async fn register_token(server: &TestServer, username: &str) -> String {
    let body = register_user(server, username).await;
    get_access_token(&body)
}

/// Get access token from an auth response.
pub fn get_access_token(response: &Value) -> String {
    response["data"]["accessToken"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Get user ID from an auth response.
pub fn get_user_id(response: &Value) -> i64 {
    response["data"]["user"]["id"].as_i64().unwrap()
}

/// Create a folder and return its ID.
pub async fn create_folder(
    server: &TestServer,
    token: &str,
    name: &str,
    parent_id: Option<i64>,
) -> i64 {
    let response = server
        .post("/api/folders")
        .add_header(AUTHORIZATION, bearer(token))
        .json(&json!({ "name": name, "parentId": parent_id }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["data"]["id"].as_i64().unwrap()
}

/// Upload a file and return the raw response.
pub async fn upload(
    server: &TestServer,
    token: &str,
    name: &str,
    content: &[u8],
    folder_id: Option<i64>,
) -> TestResponse {
    let mut form = MultipartForm::new();
    if let Some(folder_id) = folder_id {
        form = form.add_text("folderId", folder_id.to_string());
    }
    let part = Part::bytes(content.to_vec())
        .file_name(name)
        .mime_type("application/octet-stream");
    form = form.add_part("file", part);

    server
        .post("/api/files/upload")
        .add_header(AUTHORIZATION, bearer(token))
        .multipart(form)
        .await
}

/// Upload a file and return its ID.
pub async fn upload_file(
    server: &TestServer,
    token: &str,
    name: &str,
    content: &[u8],
    folder_id: Option<i64>,
) -> i64 {
    let response = upload(server, token, name, content, folder_id).await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["data"]["id"].as_i64().unwrap()
}
