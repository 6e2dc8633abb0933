use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    session::Session,
    utils::success_to_api_response,
    workflow::Workspace,
};

use super::model::SendMessageRequest;

#[axum::debug_handler]
pub async fn contacts(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let workspace = Workspace::open(&state.pool, &session).await?;
    Ok(success_to_api_response(workspace.contacts().await?))
}

#[axum::debug_handler]
pub async fn conversation(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let workspace = Workspace::open(&state.pool, &session).await?;
    Ok(success_to_api_response(workspace.conversation(user_id).await?))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let workspace = Workspace::open(&state.pool, &session).await?;
    let message = workspace.send_message(user_id, &req.message_text).await?;
    Ok((StatusCode::CREATED, success_to_api_response(message)))
}
