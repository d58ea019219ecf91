use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::get,
};
use serde::Serialize;

use crate::{
    api::{ApiError, AppState, parse_id, run_blocking},
    models::project::{Project, ProjectFields},
    services::projects::{
        create_project, delete_project, get_project, list_projects, update_project,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list).post(create))
        .route("/projects/:id", get(show).put(update).delete(destroy))
}

#[derive(Serialize)]
struct ProjectResponse {
    success: bool,
    project: Project,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_blob_removals: Vec<String>,
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    run_blocking(&state, |ctx| Ok(list_projects(&ctx.storage)))
        .await
        .map(Json)
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    let project_id = parse_id(&id, "Project")?;
    run_blocking(&state, move |ctx| Ok(get_project(&ctx.storage, project_id)?))
        .await
        .map(Json)
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<ProjectFields>, JsonRejection>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let Json(fields) = payload?;
    let project = run_blocking(&state, move |ctx| Ok(create_project(&ctx.storage, fields)?)).await?;
    Ok(Json(ProjectResponse {
        success: true,
        project,
    }))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ProjectFields>, JsonRejection>,
) -> Result<Json<ProjectResponse>, ApiError> {
    let project_id = parse_id(&id, "Project")?;
    let Json(fields) = payload?;
    let project = run_blocking(&state, move |ctx| {
        Ok(update_project(&ctx.storage, project_id, fields)?)
    })
    .await?;
    Ok(Json(ProjectResponse {
        success: true,
        project,
    }))
}

async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let project_id = parse_id(&id, "Project")?;
    let result = run_blocking(&state, move |ctx| {
        Ok(delete_project(&ctx.storage, &ctx.blobs, project_id)?)
    })
    .await?;
    Ok(Json(DeleteResponse {
        success: true,
        failed_blob_removals: result.failed_blob_removals,
    }))
}
