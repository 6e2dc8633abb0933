use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    AppState,
    error::AppError,
    session::Session,
    utils::success_to_api_response,
    workflow::UserWorkflow,
};

use super::model::VoteRequest;

#[axum::debug_handler]
pub async fn available_polls(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(user.available_polls().await?))
}

#[axum::debug_handler]
pub async fn vote(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(poll_id): Path<i64>,
    Json(req): Json<VoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserWorkflow::new(&state.pool, &session)?;
    let vote_id = user.vote(poll_id, req.option_id).await?;

    tracing::info!("User {} voted in poll {}", session.user_id, poll_id);
    Ok((
        StatusCode::CREATED,
        success_to_api_response(json!({ "vote_id": vote_id, "poll_id": poll_id })),
    ))
}

#[axum::debug_handler]
pub async fn results_polls(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(user.results_polls().await?))
}

#[axum::debug_handler]
pub async fn poll_results(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(poll_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = UserWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(user.results(poll_id).await?))
}
