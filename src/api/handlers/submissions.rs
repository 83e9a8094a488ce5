use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use chrono::Local;
use futures::TryStreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tokio_util::io::{ReaderStream, StreamReader};
use utoipa::ToSchema;

use crate::AppState;
use crate::api::error::AppError;
use crate::models::{PortalStatus, SubmissionRecord};
use crate::services::file_store::StagedUpload;
use crate::utils::validation::{
    file_extension, normalize_batch, validate_blob_name, validate_name, validate_roll_no,
};

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    pub record: SubmissionRecord,
}

#[derive(Deserialize)]
pub struct CheckFileQuery {
    pub rollno: String,
}

#[derive(Serialize, ToSchema)]
pub struct CheckFileResponse {
    pub exists: bool,
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "Fields: name, rollno, optional batch, file"),
    responses(
        (status = 200, description = "Submission stored", body = UploadResponse),
        (status = 400, description = "Missing or invalid field"),
        (status = 403, description = "Submissions are closed"),
        (status = 413, description = "File too large")
    ),
    tag = "submissions"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    // Capture errors in an inner result so the remaining multipart stream
    // can still be consumed on failure
    let result: Result<Json<UploadResponse>, AppError> = async {
        if !state.registry.is_accepting().await {
            return Err(AppError::SubmissionsClosed);
        }

        let mut name: Option<String> = None;
        let mut roll_no: Option<String> = None;
        let mut batch = String::new();
        let mut staged: Option<(StagedUpload, String)> = None;

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            let err_msg = e.to_string();
            if err_msg.contains("length limit exceeded") {
                AppError::PayloadTooLarge(
                    "Request body exceeds the maximum allowed limit".to_string(),
                )
            } else {
                AppError::BadRequest(err_msg)
            }
        })? {
            let field_name = field.name().unwrap_or_default().to_string();

            match field_name.as_str() {
                "file" => {
                    let original_filename = field.file_name().unwrap_or("").to_string();
                    let extension = file_extension(&original_filename);

                    let body_with_io_error = field.map_err(std::io::Error::other);
                    let reader = StreamReader::new(body_with_io_error);

                    let upload = state.store.stage(reader).await?;
                    staged = Some((upload, extension));
                }
                "name" => {
                    name = Some(field.text().await.unwrap_or_default());
                }
                "rollno" => {
                    roll_no = Some(field.text().await.unwrap_or_default());
                }
                "batch" => {
                    batch = normalize_batch(&field.text().await.unwrap_or_default());
                }
                _ => {}
            }
        }

        let name = validate_name(name.as_deref().unwrap_or(""))
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let roll_no = validate_roll_no(roll_no.as_deref().unwrap_or(""))
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let (upload, extension) =
            staged.ok_or(AppError::BadRequest("No file provided".to_string()))?;

        // The blob replaces whatever this roll number had stored before
        let blob_name = state.store.commit(upload, &roll_no, &extension).await?;

        let record = SubmissionRecord {
            name,
            roll_no: roll_no.clone(),
            batch,
            file_link: format!("/uploads/{}", blob_name),
            submitted_at: Local::now().format("%-m/%-d/%Y, %-I:%M:%S %p").to_string(),
        };

        let stored = state.registry.upsert(record).await?;

        tracing::info!("📄 Submission stored for roll number {}", roll_no);

        Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            record: stored,
        }))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Consume the remaining multipart stream to avoid a TCP reset
            // surfacing as a network error in the browser
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/check-file",
    params(
        ("rollno" = String, Query, description = "Roll number to look up")
    ),
    responses(
        (status = 200, description = "Whether a submission exists", body = CheckFileResponse)
    ),
    tag = "submissions"
)]
pub async fn check_file(
    State(state): State<AppState>,
    Query(query): Query<CheckFileQuery>,
) -> Json<CheckFileResponse> {
    // A roll number that fails validation can never have been stored
    let exists = match validate_roll_no(&query.rollno) {
        Ok(roll_no) => state.registry.find_by_roll_no(&roll_no).await.is_some(),
        Err(_) => false,
    };

    Json(CheckFileResponse { exists })
}

#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Whether submissions are open", body = PortalStatus)
    ),
    tag = "submissions"
)]
pub async fn portal_status(State(state): State<AppState>) -> Json<PortalStatus> {
    Json(state.registry.status().await)
}

#[utoipa::path(
    get,
    path = "/uploads/{filename}",
    params(
        ("filename" = String, Path, description = "Stored blob filename")
    ),
    responses(
        (status = 200, description = "File stream"),
        (status = 400, description = "Invalid filename"),
        (status = 404, description = "File not found")
    ),
    tag = "submissions"
)]
pub async fn download_blob(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    validate_blob_name(&filename).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let (file, len) = state.store.open(&filename).await?;
    let (content_type, content_disposition) = resolve_file_headers(&filename);

    let stream = ReaderStream::new(file);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .body(Body::from_stream(stream))
        .unwrap())
}

/// Resolve content-type and content-disposition for a stored blob.
pub(crate) fn resolve_file_headers(filename: &str) -> (String, String) {
    let extension = filename.split('.').next_back().unwrap_or("").to_lowercase();
    let content_type = match extension.as_str() {
        "pdf" => "application/pdf",
        "txt" | "md" | "log" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        "py" | "c" | "cpp" | "h" | "java" | "js" | "rs" => "text/plain; charset=utf-8",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
    .to_string();

    let ascii_filename = filename
        .chars()
        .filter(|c| c.is_ascii() && !c.is_control() && *c != '"' && *c != '\\' && *c != ';')
        .take(64)
        .collect::<String>();
    let fallback_filename = if ascii_filename.is_empty() {
        "file"
    } else {
        &ascii_filename
    };

    let encoded_filename = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();

    let disposition_type = if content_type.starts_with("text/")
        || content_type.starts_with("image/")
        || content_type == "application/pdf"
    {
        "inline"
    } else {
        "attachment"
    };

    let content_disposition = format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition_type, fallback_filename, encoded_filename
    );

    (content_type, content_disposition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_file_headers() {
        let (ct, cd) = resolve_file_headers("101.py");
        assert_eq!(ct, "text/plain; charset=utf-8");
        assert!(cd.starts_with("inline"));
        assert!(cd.contains("filename=\"101.py\""));

        let (ct, cd) = resolve_file_headers("102.zip");
        assert_eq!(ct, "application/zip");
        assert!(cd.starts_with("attachment"));

        let (ct, _) = resolve_file_headers("103");
        assert_eq!(ct, "application/octet-stream");
    }
}
