use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    AppState,
    error::AppError,
    routes::poll::{NewPoll, PollUpdate},
    session::Session,
    utils::success_to_api_response,
    workflow::AdminWorkflow,
};

use super::model::{CreateGroupAdminRequest, CreateGroupAdminResponse, SetRoleRequest};

#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(admin.dashboard().await?))
}

#[axum::debug_handler]
pub async fn list_polls(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(admin.polls().await?))
}

#[axum::debug_handler]
pub async fn monitor_poll(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(poll_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(admin.monitor_poll(poll_id).await?))
}

#[axum::debug_handler]
pub async fn create_poll(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<NewPoll>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    let poll = admin.create_poll(req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(poll)))
}

#[axum::debug_handler]
pub async fn update_poll(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(poll_id): Path<i64>,
    Json(req): Json<PollUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(admin.update_poll(poll_id, req).await?))
}

#[axum::debug_handler]
pub async fn delete_poll(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(poll_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    admin.delete_poll(poll_id).await?;
    Ok(success_to_api_response(json!({ "poll_id": poll_id })))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(admin.users().await?))
}

#[axum::debug_handler]
pub async fn set_role(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<i64>,
    Json(req): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    admin.set_role(user_id, req.role).await?;
    Ok(success_to_api_response(json!({ "user_id": user_id, "role": req.role })))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    admin.delete_user(user_id).await?;
    Ok(success_to_api_response(json!({ "user_id": user_id })))
}

#[axum::debug_handler]
pub async fn list_group_admins(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(admin.group_admins().await?))
}

#[axum::debug_handler]
pub async fn create_group_admin(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateGroupAdminRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.password != req.confirm_password {
        return Err(AppError::validation("Passwords do not match"));
    }

    let admin = AdminWorkflow::new(&state.pool, &session)?;
    let (user, group) = admin
        .create_group_admin(
            &state.hasher,
            &req.username,
            &req.password,
            &req.group_name,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        success_to_api_response(CreateGroupAdminResponse { user, group }),
    ))
}

#[axum::debug_handler]
pub async fn list_groups(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    Ok(success_to_api_response(admin.groups().await?))
}

#[axum::debug_handler]
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let admin = AdminWorkflow::new(&state.pool, &session)?;
    admin.delete_group(group_id).await?;
    Ok(success_to_api_response(json!({ "group_id": group_id })))
}
