use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::AppState;
use crate::api::error::AppError;
use crate::models::{PortalStatus, SubmissionRecord};
use crate::services::archive;
use crate::utils::validation::validate_roll_no;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub authenticated: bool,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub message: String,
    pub record: SubmissionRecord,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub recent: Option<usize>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub rollno: String,
}

#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Password accepted", body = LoginResponse),
        (status = 401, description = "Invalid password")
    ),
    tag = "admin"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.password != state.config.admin_password {
        return Err(AppError::Unauthorized("Invalid password".to_string()));
    }

    Ok(Json(LoginResponse {
        authenticated: true,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/submissions",
    params(
        ("recent" = Option<usize>, Query, description = "Return only the N most recent records, newest first")
    ),
    responses(
        (status = 200, description = "Submission records", body = [SubmissionRecord]),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SubmissionRecord>>, AppError> {
    let records = match query.recent {
        Some(limit) => state.registry.recent(limit).await,
        None => state.registry.list_all().await,
    };

    Ok(Json(records))
}

#[utoipa::path(
    get,
    path = "/admin/search",
    params(
        ("rollno" = String, Query, description = "Roll number to look up")
    ),
    responses(
        (status = 200, description = "Matching record", body = SubmissionRecord),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No submission for that roll number")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn search_submission(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SubmissionRecord>, AppError> {
    let roll_no =
        validate_roll_no(&query.rollno).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let record = state
        .registry
        .find_by_roll_no(&roll_no)
        .await
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No submission found for roll number '{}'",
                roll_no
            ))
        })?;

    Ok(Json(record))
}

#[utoipa::path(
    delete,
    path = "/admin/submissions/{rollno}",
    params(
        ("rollno" = String, Path, description = "Roll number to delete")
    ),
    responses(
        (status = 200, description = "Record removed", body = DeleteResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "No submission for that roll number")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn delete_submission(
    State(state): State<AppState>,
    Path(rollno): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let roll_no = validate_roll_no(&rollno).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let removed = state.registry.remove(&roll_no).await?;

    // Blob removal is best effort, the record is already gone
    if let Err(e) = state.store.delete(&roll_no).await {
        tracing::warn!("Failed to delete blob for roll number {}: {}", roll_no, e);
    }

    tracing::info!("🗑️ Submission deleted for roll number {}", roll_no);

    Ok(Json(DeleteResponse {
        message: "Submission deleted".to_string(),
        record: removed,
    }))
}

#[utoipa::path(
    get,
    path = "/admin/status",
    responses(
        (status = 200, description = "Whether submissions are open", body = PortalStatus),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn get_status(State(state): State<AppState>) -> Json<PortalStatus> {
    Json(state.registry.status().await)
}

#[utoipa::path(
    post,
    path = "/admin/toggle",
    responses(
        (status = 200, description = "Flipped status", body = PortalStatus),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn toggle_status(State(state): State<AppState>) -> Result<Json<PortalStatus>, AppError> {
    let status = state.registry.toggle().await?;

    tracing::info!(
        "🔔 Submissions are now {}",
        if status.accepting_submissions {
            "open"
        } else {
            "closed"
        }
    );

    Ok(Json(status))
}

#[utoipa::path(
    get,
    path = "/admin/export",
    responses(
        (status = 200, description = "Registry sheet as CSV"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn export_sheet(State(state): State<AppState>) -> Result<Response, AppError> {
    let csv = state.registry.export_sheet().await;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"submissions.csv\"",
        )
        .body(Body::from(csv))
        .unwrap())
}

#[utoipa::path(
    get,
    path = "/admin/archive",
    responses(
        (status = 200, description = "Zip archive of all stored blobs"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
pub async fn download_archive(State(state): State<AppState>) -> Result<Response, AppError> {
    let names = state.store.list().await?;
    let bytes = archive::bundle_blobs(state.store.uploads_dir(), &names)?;

    tracing::info!("📦 Archive of {} file(s) prepared", names.len());

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"submissions.zip\"",
        )
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .unwrap())
}
