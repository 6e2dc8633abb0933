use std::sync::Arc;

use axum::Json;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;
use crate::session::{Role, Session};

/// 单向密码哈希能力
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, bcrypt::BcryptError>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError>;
}

pub type SharedHasher = Arc<dyn PasswordHasher>;

/// 在阻塞线程池中计算哈希，避免占用异步工作线程
pub async fn hash_password(hasher: &SharedHasher, password: &str) -> Result<String, AppError> {
    let hasher = Arc::clone(hasher);
    let password = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;
    Ok(hashed)
}

pub async fn verify_password(
    hasher: &SharedHasher,
    password: &str,
    hashed: &str,
) -> Result<bool, AppError> {
    let hasher = Arc::clone(hasher);
    let password = password.to_owned();
    let hashed = hashed.to_owned();
    let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &hashed)).await??;
    Ok(matches)
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        hash(password.as_bytes(), self.cost)
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
        verify(password.as_bytes(), hash)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub username: String,
    pub role: Role,
    pub exp: i64, // 过期时间
    pub iat: i64, // 签发时间
}

pub fn generate_token(
    session: &Session,
    config: &Config,
) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = (now + Duration::seconds(config.jwt_expiration().as_secs() as i64)).timestamp();

    let claims = Claims {
        sub: session.user_id.to_string(),
        username: session.username.clone(),
        role: session.role,
        exp: expiration,
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;

    tracing::debug!("Issued token for user {}", session.user_id);
    Ok((token, expiration))
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

// 统一响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resp_data: Option<T>,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code: error_codes::SUCCESS,
        msg: "success".into(),
        resp_data: Some(data),
    })
}

pub fn error_to_api_response<T>(code: i32, msg: String) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        code,
        msg,
        resp_data: None,
    })
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const ALREADY_EXISTS: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn bcrypt_hasher_verifies_only_the_original_password() {
        let hasher = BcryptHasher::new(4);
        let hashed = hasher.hash("hunter2").unwrap();

        assert_ne!(hashed, "hunter2");
        assert!(hasher.verify("hunter2", &hashed).unwrap());
        assert!(!hasher.verify("hunter3", &hashed).unwrap());
    }

    #[tokio::test]
    async fn shared_hasher_runs_on_the_blocking_pool() {
        let hasher: SharedHasher = Arc::new(BcryptHasher::new(4));
        let hashed = hash_password(&hasher, "hunter2").await.unwrap();

        assert!(verify_password(&hasher, "hunter2", &hashed).await.unwrap());
        assert!(!verify_password(&hasher, "hunter3", &hashed).await.unwrap());
        assert!(matches!(
            verify_password(&hasher, "hunter2", "not-a-hash").await,
            Err(AppError::PasswordHash(_))
        ));
    }

    #[test]
    fn token_carries_session_identity() {
        let config = test_config();
        let session = Session {
            user_id: 7,
            username: "alice".into(),
            role: Role::GroupAdmin,
        };

        let (token, exp) = generate_token(&session, &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::GroupAdmin);
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = test_config();
        let session = Session {
            user_id: 1,
            username: "bob".into(),
            role: Role::User,
        };
        let (token, _) = generate_token(&session, &config).unwrap();

        let other = Config {
            jwt_secret: "another-secret".into(),
            ..test_config()
        };
        assert!(verify_token(&token, &other).is_err());
    }
}
