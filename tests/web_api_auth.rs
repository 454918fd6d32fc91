//! Web API Auth Tests
//!
//! Integration tests for registration, login, the current user and
//! profile updates.

mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{bearer, create_test_app, get_access_token, register_user, TEST_PASSWORD};

// ============================================================================
// Registration Tests
// ============================================================================

#[tokio::test]
async fn test_register_success() {
    let app = create_test_app();

    let body = register_user(&app.server, "alice").await;

    assert!(!get_access_token(&body).is_empty());
    assert_eq!(body["data"]["expiresIn"], 900);
    let user = &body["data"]["user"];
    assert_eq!(user["username"], "alice");
    assert_eq!(user["displayName"], "ALICE");
    assert_eq!(user["storageUsed"], 0);
    assert_eq!(user["storageLimit"], 10_i64 * 1024 * 1024 * 1024);
    assert!(user.get("password").is_none());
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let app = create_test_app();
    register_user(&app.server, "alice").await;

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "Alice",
            "password": TEST_PASSWORD,
            "displayName": "Another Alice"
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_short_password() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "alice",
            "password": "short",
            "displayName": "Alice"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["password"].is_array());
}

#[tokio::test]
async fn test_register_invalid_username_characters() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "alice smith",
            "password": TEST_PASSWORD,
            "displayName": "Alice"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Login Tests
// ============================================================================

#[tokio::test]
async fn test_login_success() {
    let app = create_test_app();
    register_user(&app.server, "alice").await;

    let response = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": TEST_PASSWORD }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert!(!get_access_token(&body).is_empty());
    assert_eq!(body["data"]["user"]["username"], "alice");
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_user_look_alike() {
    let app = create_test_app();
    register_user(&app.server, "alice").await;

    let wrong_password = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "username": "alice", "password": "wrongpassword" }))
        .await;
    let unknown_user = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "username": "nobody", "password": TEST_PASSWORD }))
        .await;

    wrong_password.assert_status(StatusCode::UNAUTHORIZED);
    unknown_user.assert_status(StatusCode::UNAUTHORIZED);
    let a: Value = wrong_password.json();
    let b: Value = unknown_user.json();
    assert_eq!(a["error"]["message"], b["error"]["message"]);
}

// ============================================================================
// Current User Tests
// ============================================================================

#[tokio::test]
async fn test_me_requires_token() {
    let app = create_test_app();

    let response = app.server.get("/api/auth/me").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_rejects_garbage_token() {
    let app = create_test_app();

    let response = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer("not-a-jwt"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_current_user() {
    let app = create_test_app();
    let token = get_access_token(&register_user(&app.server, "alice").await);

    let response = app
        .server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["username"], "alice");
}

#[tokio::test]
async fn test_token_in_query_string() {
    let app = create_test_app();
    let token = get_access_token(&register_user(&app.server, "alice").await);

    let response = app
        .server
        .get(&format!("/api/auth/me?token={}", token))
        .await;

    response.assert_status_ok();
}

// ============================================================================
// Profile Tests
// ============================================================================

#[tokio::test]
async fn test_update_profile() {
    let app = create_test_app();
    let token = get_access_token(&register_user(&app.server, "alice").await);

    let response = app
        .server
        .patch("/api/user")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "displayName": "Alice Liddell",
            "avatarUrl": "https://example.com/alice.png"
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["displayName"], "Alice Liddell");
    assert_eq!(body["data"]["avatarUrl"], "https://example.com/alice.png");

    let response = app
        .server
        .patch("/api/user")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "avatarUrl": "" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["displayName"], "Alice Liddell");
    assert!(body["data"]["avatarUrl"].is_null());
}

#[tokio::test]
async fn test_update_profile_rejects_bad_avatar_url() {
    let app = create_test_app();
    let token = get_access_token(&register_user(&app.server, "alice").await);

    let response = app
        .server
        .patch("/api/user")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "avatarUrl": "javascript:alert(1)" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = create_test_app();

    let response = app.server.get("/api/auth/me").await;

    assert_eq!(response.header("x-content-type-options"), "nosniff");
    assert_eq!(response.header("x-frame-options"), "DENY");
}
