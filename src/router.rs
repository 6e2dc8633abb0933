use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes::{admin, group, group_admin, message, poll, user},
};

// 无需登录的路由
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(user::register))
        .route("/users/login", post(user::login))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/polls", get(admin::list_polls).post(admin::create_poll))
        .route(
            "/admin/polls/{poll_id}",
            get(admin::monitor_poll)
                .put(admin::update_poll)
                .delete(admin::delete_poll),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}", delete(admin::delete_user))
        .route("/admin/users/{user_id}/role", put(admin::set_role))
        .route(
            "/admin/group-admins",
            get(admin::list_group_admins).post(admin::create_group_admin),
        )
        .route("/admin/groups", get(admin::list_groups))
        .route("/admin/groups/{group_id}", delete(admin::delete_group))
}

fn group_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/group-admin/dashboard", get(group_admin::dashboard))
        .route(
            "/group-admin/polls",
            get(group_admin::list_polls).post(group_admin::create_poll),
        )
        .route("/group-admin/polls/{poll_id}", get(group_admin::monitor_poll))
        .route("/group-admin/members", get(group_admin::list_members))
        .route(
            "/group-admin/members/{user_id}",
            get(group_admin::member_details).delete(group_admin::remove_member),
        )
        .route("/group-admin/requests", get(group_admin::pending_requests))
        .route(
            "/group-admin/requests/{member_id}/approve",
            post(group_admin::approve_request),
        )
        .route(
            "/group-admin/requests/{member_id}/reject",
            post(group_admin::reject_request),
        )
}

fn member_routes() -> Router<AppState> {
    Router::new()
        .route("/polls/available", get(poll::available_polls))
        .route("/polls/results", get(poll::results_polls))
        .route("/polls/{poll_id}/vote", post(poll::vote))
        .route("/polls/{poll_id}/results", get(poll::poll_results))
        .route("/groups/join", post(group::join_group))
}

fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/messages/contacts", get(message::contacts))
        .route(
            "/messages/{user_id}",
            get(message::conversation).post(message::send_message),
        )
}

/// 组装全部路由：公开路由、需认证路由，统一挂在 `api_base_uri` 下
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users/me", get(user::me))
        .merge(admin_routes())
        .merge(group_admin_routes())
        .merge(member_routes())
        .merge(message_routes())
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new().merge(public_routes()).merge(protected_routes);

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    router.layer(from_fn(log_errors)).with_state(state)
}
