mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use voting_backend::{
    AppState,
    config::Config,
    router::create_router,
    session::Role,
    utils::{BcryptHasher, error_codes},
};

fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".into(),
        database_max_connections: 1,
        jwt_secret: "test-secret".into(),
        jwt_expiration_secs: 3600,
        server_host: "127.0.0.1".into(),
        server_port: 0,
        api_base_uri: "/api".into(),
        bcrypt_cost: 4,
        allow_privileged_signup: false,
    }
}

async fn app() -> Router {
    let pool = common::setup().await;
    create_router(AppState {
        pool,
        config: test_config(),
        hasher: Arc::new(BcryptHasher::new(4)),
    })
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register_and_login(app: &Router, username: &str) -> String {
    let (status, _) = call(
        app,
        "POST",
        "/api/users/register",
        None,
        Some(json!({ "username": username, "password": "pw", "confirm_password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        app,
        "POST",
        "/api/users/login",
        None,
        Some(json!({ "username": username, "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["resp_data"]["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_and_fetch_the_session() {
    let app = app().await;
    let token = register_and_login(&app, "alice").await;

    let (status, body) = call(&app, "GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], error_codes::SUCCESS);
    assert_eq!(body["resp_data"]["username"], "alice");
    assert_eq!(body["resp_data"]["role"], "user");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = app().await;

    let (status, body) = call(&app, "GET", "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], error_codes::AUTH_FAILED);

    let (status, _) = call(&app, "GET", "/api/users/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_logins_and_duplicates_map_to_error_codes() {
    let app = app().await;
    register_and_login(&app, "alice").await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/users/login",
        None,
        Some(json!({ "username": "alice", "password": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], error_codes::AUTH_FAILED);

    let (status, body) = call(
        &app,
        "POST",
        "/api/users/register",
        None,
        Some(json!({ "username": "alice", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], error_codes::ALREADY_EXISTS);
}

#[tokio::test]
async fn public_signup_cannot_pick_a_privileged_role() {
    let app = app().await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/users/register",
        None,
        Some(json!({ "username": "mallory", "password": "pw", "role": Role::Admin })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], error_codes::PERMISSION_DENIED);
}

#[tokio::test]
async fn users_cannot_reach_admin_routes() {
    let app = app().await;
    let token = register_and_login(&app, "alice").await;

    let (status, _) = call(&app, "GET", "/api/admin/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, "GET", "/api/polls/available", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"], json!([]));
}
