use axum::{
    extract::{Extension, Json, State},
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

use super::model::JoinGroupRequest;

/// 申请加入群组，等待群组管理员审批
#[axum::debug_handler]
pub async fn join_group(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(req): Json<JoinGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let group_name = req.group_name.trim();
    if group_name.is_empty() {
        return Err(AppError::validation("Group name cannot be empty"));
    }

    let user = UserWorkflow::new(&state.pool, &session)?;
    let member_id = user.join_group(group_name).await?;

    tracing::info!("User {} requested to join group {}", session.user_id, group_name);
    Ok((
        StatusCode::CREATED,
        success_to_api_response(json!({ "member_id": member_id, "status": "pending" })),
    ))
}
