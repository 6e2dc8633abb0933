use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    session::{Role, Session},
    utils::{generate_token, success_to_api_response},
};

use super::model::{LoginRequest, LoginResponse, RegisterRequest, User};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(confirm) = &req.confirm_password {
        if confirm != &req.password {
            return Err(AppError::validation("Passwords do not match"));
        }
    }

    let role = req.role.unwrap_or(Role::User);
    if role.is_privileged() && !state.config.allow_privileged_signup {
        return Err(AppError::NotAuthorized);
    }

    let user = User::register(
        &state.pool,
        &state.hasher,
        &req.username,
        &req.password,
        role,
    )
    .await?;

    Ok((StatusCode::CREATED, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::validation(
            "Please enter your username and password",
        ));
    }

    let session = User::authenticate(
        &state.pool,
        &state.hasher,
        &req.username,
        &req.password,
    )
    .await?;

    let (token, expires_at) = generate_token(&session, &state.config)?;

    tracing::info!("User {} logged in as {}", session.user_id, session.role);
    Ok((
        StatusCode::OK,
        success_to_api_response(LoginResponse {
            user_id: session.user_id,
            username: session.username,
            role: session.role,
            token,
            expires_at,
        }),
    ))
}

/// 返回中间件加载的当前会话
#[axum::debug_handler]
pub async fn me(Extension(session): Extension<Session>) -> impl IntoResponse {
    (StatusCode::OK, success_to_api_response(session))
}
