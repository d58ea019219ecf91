use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::{
    services::{
        attachments::{AttachFileError, DetachFileError},
        projects::{CreateProjectError, DeleteProjectError, GetProjectError, UpdateProjectError},
        users::{AuthenticateError, DeleteUserError, RegisterUserError},
    },
    storage::{StorageError, blobs::BlobStore, json::JsonFileStorage},
};

mod dashboard;
mod projects;
mod uploads;
mod users;

/// Everything a request needs; each request reloads from disk.
pub struct AppContext {
    pub storage: JsonFileStorage,
    pub blobs: BlobStore,
}

pub type AppState = Arc<AppContext>;

pub fn router(context: AppContext, max_upload_bytes: usize) -> Router {
    let api = Router::new()
        .merge(projects::routes())
        .merge(uploads::routes(max_upload_bytes))
        .merge(users::routes())
        .merge(dashboard::routes());

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(context))
}

/// Runs store work off the async runtime; all of it is blocking disk I/O.
pub(crate) async fn run_blocking<T, F>(state: &AppState, job: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppContext) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || job(&*state))
        .await
        .map_err(|e| ApiError::Internal(format!("Worker task failed: {e}")))?
}

/// Path ids are UUIDs; anything else cannot name an existing record.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("{what} '{raw}' not found")))
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key. Reported as 400 like any other rejected input.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Storage(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Storage faults carry server paths; those stay in the log.
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        error!(error = %err, "storage failure");
        ApiError::Storage(String::from("Internal storage error"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::Validation(err.body_text())
        }
    }
}

impl From<GetProjectError> for ApiError {
    fn from(err: GetProjectError) -> Self {
        match err {
            GetProjectError::ProjectNotFound(_) => ApiError::NotFound(err.to_string()),
        }
    }
}

impl From<CreateProjectError> for ApiError {
    fn from(err: CreateProjectError) -> Self {
        match err {
            CreateProjectError::InvalidField(_) => ApiError::Validation(err.to_string()),
            CreateProjectError::Storage(e) => e.into(),
        }
    }
}

impl From<UpdateProjectError> for ApiError {
    fn from(err: UpdateProjectError) -> Self {
        match err {
            UpdateProjectError::ProjectNotFound(_) => ApiError::NotFound(err.to_string()),
            UpdateProjectError::InvalidField(_) => ApiError::Validation(err.to_string()),
            UpdateProjectError::Storage(e) => e.into(),
        }
    }
}

impl From<DeleteProjectError> for ApiError {
    fn from(err: DeleteProjectError) -> Self {
        match err {
            DeleteProjectError::ProjectNotFound(_) => ApiError::NotFound(err.to_string()),
            DeleteProjectError::Storage(e) => e.into(),
        }
    }
}

impl From<AttachFileError> for ApiError {
    fn from(err: AttachFileError) -> Self {
        match err {
            AttachFileError::ProjectNotFound(_) => ApiError::Validation(err.to_string()),
            AttachFileError::Storage(e) => e.into(),
        }
    }
}

impl From<DetachFileError> for ApiError {
    fn from(err: DetachFileError) -> Self {
        match err {
            DetachFileError::ProjectNotFound(_) | DetachFileError::AttachmentNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            DetachFileError::Storage(e) => e.into(),
        }
    }
}

impl From<RegisterUserError> for ApiError {
    fn from(err: RegisterUserError) -> Self {
        match err {
            RegisterUserError::MissingField(_) => ApiError::Validation(err.to_string()),
            RegisterUserError::EmailAlreadyExists(_) => ApiError::Conflict(err.to_string()),
            RegisterUserError::Storage(e) => e.into(),
        }
    }
}

impl From<AuthenticateError> for ApiError {
    fn from(err: AuthenticateError) -> Self {
        match err {
            AuthenticateError::MissingField(_) => ApiError::Validation(err.to_string()),
            AuthenticateError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
        }
    }
}

impl From<DeleteUserError> for ApiError {
    fn from(err: DeleteUserError) -> Self {
        match err {
            DeleteUserError::UserNotFound(_) => ApiError::NotFound(err.to_string()),
            DeleteUserError::ProtectedUser(_) => ApiError::Forbidden(err.to_string()),
            DeleteUserError::Storage(e) => e.into(),
        }
    }
}
