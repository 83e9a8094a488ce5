pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::PortalConfig;
use crate::services::file_store::FileStore;
use crate::services::registry::SubmissionRegistry;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::submissions::upload_file,
        api::handlers::submissions::check_file,
        api::handlers::submissions::portal_status,
        api::handlers::submissions::download_blob,
        api::handlers::admin::login,
        api::handlers::admin::list_submissions,
        api::handlers::admin::search_submission,
        api::handlers::admin::delete_submission,
        api::handlers::admin::get_status,
        api::handlers::admin::toggle_status,
        api::handlers::admin::export_sheet,
        api::handlers::admin::download_archive,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::submissions::UploadResponse,
            api::handlers::submissions::CheckFileResponse,
            api::handlers::admin::LoginRequest,
            api::handlers::admin::LoginResponse,
            api::handlers::admin::DeleteResponse,
            models::SubmissionRecord,
            models::PortalStatus,
        )
    ),
    tags(
        (name = "submissions", description = "Student submission endpoints"),
        (name = "admin", description = "Administration endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SubmissionRegistry>,
    pub store: Arc<FileStore>,
    pub config: PortalConfig,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/status", get(api::handlers::submissions::portal_status))
        .route("/check-file", get(api::handlers::submissions::check_file))
        .route(
            "/upload",
            post(api::handlers::submissions::upload_file).layer(
                axum::extract::DefaultBodyLimit::max(
                    state.config.max_file_size + 10 * 1024 * 1024, // Add 10MB buffer for multipart overhead
                ),
            ),
        )
        .route(
            "/uploads/:filename",
            get(api::handlers::submissions::download_blob),
        )
        .route("/admin/login", post(api::handlers::admin::login))
        .route(
            "/admin/submissions",
            get(api::handlers::admin::list_submissions).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::admin_auth_middleware,
            )),
        )
        .route(
            "/admin/submissions/:rollno",
            axum::routing::delete(api::handlers::admin::delete_submission).layer(
                from_fn_with_state(state.clone(), api::middleware::auth::admin_auth_middleware),
            ),
        )
        .route(
            "/admin/search",
            get(api::handlers::admin::search_submission).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::admin_auth_middleware,
            )),
        )
        .route(
            "/admin/status",
            get(api::handlers::admin::get_status).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::admin_auth_middleware,
            )),
        )
        .route(
            "/admin/toggle",
            post(api::handlers::admin::toggle_status).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::admin_auth_middleware,
            )),
        )
        .route(
            "/admin/export",
            get(api::handlers::admin::export_sheet).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::admin_auth_middleware,
            )),
        )
        .route(
            "/admin/archive",
            get(api::handlers::admin::download_archive).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::admin_auth_middleware,
            )),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
