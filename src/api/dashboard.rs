use axum::{Json, Router, extract::State, routing::get};

use crate::{
    api::{ApiError, AppState, run_blocking},
    services::dashboard::{DashboardSummary, summarize},
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(summary))
}

async fn summary(State(state): State<AppState>) -> Result<Json<DashboardSummary>, ApiError> {
    run_blocking(&state, |ctx| Ok(summarize(&ctx.storage)))
        .await
        .map(Json)
}
