use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{
    AppState,
    error::AppError,
    routes::user::User,
    session::Session,
    utils::verify_token,
};

/// 校验 Bearer token，并把当前会话放进请求扩展
///
/// 每次请求都会重新读取用户，被删除或改了角色的账号立即生效。
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AppError::Unauthenticated)?;

    let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::Unauthenticated
    })?;

    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthenticated)?;

    let user = User::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    req.extensions_mut().insert(Session::from(&user));
    Ok(next.run(req).await)
}
