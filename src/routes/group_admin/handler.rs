use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    AppState,
    error::AppError,
    routes::poll::GroupPoll,
    session::Session,
    utils::success_to_api_response,
    workflow::GroupAdminWorkflow,
};

#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    Ok(success_to_api_response(group_admin.dashboard().await?))
}

#[axum::debug_handler]
pub async fn list_polls(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    Ok(success_to_api_response(group_admin.polls().await?))
}

#[axum::debug_handler]
pub async fn monitor_poll(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(poll_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    Ok(success_to_api_response(group_admin.monitor_poll(poll_id).await?))
}

#[axum::debug_handler]
pub async fn create_poll(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<GroupPoll>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    let poll = group_admin.create_poll(req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(poll)))
}

#[axum::debug_handler]
pub async fn list_members(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    Ok(success_to_api_response(group_admin.members().await?))
}

#[axum::debug_handler]
pub async fn member_details(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    Ok(success_to_api_response(group_admin.member_details(user_id).await?))
}

#[axum::debug_handler]
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    group_admin.remove_member(user_id).await?;
    Ok(success_to_api_response(json!({ "user_id": user_id })))
}

#[axum::debug_handler]
pub async fn pending_requests(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    Ok(success_to_api_response(group_admin.pending_requests().await?))
}

#[axum::debug_handler]
pub async fn approve_request(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(member_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    group_admin.approve(member_id).await?;
    Ok(success_to_api_response(json!({ "member_id": member_id, "status": "accepted" })))
}

#[axum::debug_handler]
pub async fn reject_request(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(member_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group_admin = GroupAdminWorkflow::open(&state.pool, &session).await?;
    group_admin.reject(member_id).await?;
    Ok(success_to_api_response(json!({ "member_id": member_id, "status": "rejected" })))
}
