//! Router configuration for the HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{auth, file, folder, share, user, views, AppState};
use super::middleware::{create_cors_layer, jwt_auth, security_headers, JwtState};

/// Room for multipart boundaries and the `folderId` field on top of the file.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    cors_origins: &[String],
) -> Router {
    let upload_limit =
        usize::try_from(app_state.max_upload_size.saturating_add(MULTIPART_OVERHEAD))
            .unwrap_or(usize::MAX);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let user_routes = Router::new()
        .route("/", patch(user::update_profile))
        .route("/storage", get(user::storage_summary))
        .route("/storage/reconcile", post(user::reconcile_storage));

    let folder_routes = Router::new()
        .route("/", get(folder::list_folders).post(folder::create_folder))
        .route(
            "/:id",
            get(folder::get_folder)
                .patch(folder::update_folder)
                .delete(folder::delete_folder),
        )
        .route("/:id/trash", post(folder::trash_folder))
        .route("/:id/restore", post(folder::restore_folder))
        .route("/:id/path", get(folder::folder_path));

    let file_routes = Router::new()
        .route("/", get(file::list_files))
        .route(
            "/upload",
            post(file::upload_file).layer(
                ServiceBuilder::new()
                    .layer(DefaultBodyLimit::disable())
                    .layer(RequestBodyLimitLayer::new(upload_limit)),
            ),
        )
        .route(
            "/:id",
            get(file::get_file)
                .patch(file::update_file)
                .delete(file::delete_file),
        )
        .route("/:id/download", get(file::download_file))
        .route("/:id/trash", post(file::trash_file))
        .route("/:id/restore", post(file::restore_file));

    // GET resolves by token, DELETE revokes by id.
    let share_routes = Router::new()
        .route("/", get(share::list_shares).post(share::create_share))
        .route("/:token", get(share::get_share).delete(share::delete_share))
        .route("/:token/download", get(share::download_shared));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/user", user_routes)
        .nest("/folders", folder_routes)
        .nest("/files", file_routes)
        .nest("/shares", share_routes)
        .route("/recent", get(views::recent))
        .route("/starred", get(views::starred))
        .route("/shared", get(views::shared))
        .route("/trash", get(views::trash).delete(views::empty_trash));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

async fn health_check() -> &'static str {
    "OK"
}
