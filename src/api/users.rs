use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    api::{ApiError, AppState, parse_id, run_blocking},
    models::user::{PublicUser, Role},
    services::users::{
        AuthenticateParameters, RegisterUserParameters, authenticate, delete_user, list_users,
        register_user,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list))
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/:id", delete(remove))
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Serialize)]
struct UserResponse {
    success: bool,
    user: PublicUser,
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<PublicUser>>, ApiError> {
    run_blocking(&state, |ctx| Ok(list_users(&ctx.storage)))
        .await
        .map(Json)
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = payload?;
    let user = run_blocking(&state, move |ctx| {
        Ok(register_user(
            &ctx.storage,
            RegisterUserParameters {
                username: request.username,
                email: request.email,
                password: request.password,
                role: Role::User,
            },
        )?)
    })
    .await?;
    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = payload?;
    let user = run_blocking(&state, move |ctx| {
        Ok(authenticate(
            &ctx.storage,
            AuthenticateParameters {
                email: request.email,
                password: request.password,
            },
        )?)
    })
    .await?;
    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user_id = parse_id(&id, "User")?;
    run_blocking(&state, move |ctx| Ok(delete_user(&ctx.storage, user_id)?)).await?;
    Ok(Json(json!({ "success": true })))
}
