use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartRejection},
    routing::{delete, post},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    api::{ApiError, AppState, parse_id, run_blocking},
    models::attachment::Attachment,
    services::attachments::{AttachFileParameters, attach_file, detach_file},
};

const FILE_FIELD: &str = "file";

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload/:id", post(upload))
        .route("/upload/:pid/:fid", delete(remove))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    file: Attachment,
}

async fn upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    // Uploads answer 400 for an unknown project, parsable id or not.
    let project_id = parse_id(&id, "Project").map_err(|e| ApiError::Validation(e.to_string()))?;
    let mut multipart = multipart?;

    let mut received = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        received = Some((original_name, bytes.to_vec()));
        break;
    }
    let (original_name, bytes) = received
        .ok_or_else(|| ApiError::Validation(format!("Missing multipart field '{FILE_FIELD}'")))?;

    let file = run_blocking(&state, move |ctx| {
        Ok(attach_file(
            &ctx.storage,
            &ctx.blobs,
            AttachFileParameters {
                project_id,
                original_name,
                bytes,
            },
        )?)
    })
    .await?;

    Ok(Json(UploadResponse {
        success: true,
        file,
    }))
}

async fn remove(
    State(state): State<AppState>,
    Path((pid, fid)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let project_id = parse_id(&pid, "Project")?;
    let attachment_id = parse_id(&fid, "File")?;
    run_blocking(&state, move |ctx| {
        Ok(detach_file(&ctx.storage, &ctx.blobs, project_id, attachment_id)?)
    })
    .await?;
    Ok(Json(json!({ "success": true })))
}
