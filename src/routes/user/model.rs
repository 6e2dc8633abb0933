use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::error::{AppError, on_unique_violation};
use crate::session::{Role, Session};
use crate::utils::{SharedHasher, hash_password, verify_password};

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
}

#[derive(FromRow)]
struct UserRow {
    user_id: i64,
    username: String,
    password_hash: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            user_id: row.user_id,
            username: row.username,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(AppError::CorruptRecord)?,
        })
    }
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Session {
            user_id: user.user_id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
    pub token: String,
    pub expires_at: i64,
}

const USER_COLUMNS: &str = "user_id, username, password_hash, role";

impl User {
    pub async fn register(
        pool: &SqlitePool,
        hasher: &SharedHasher,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Self, AppError> {
        let mut conn = pool.acquire().await?;
        Self::register_with(&mut conn, hasher, username, password, role).await
    }

    /// 在给定连接上注册，供事务内组合使用
    pub(crate) async fn register_with(
        conn: &mut SqliteConnection,
        hasher: &SharedHasher,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Self, AppError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AppError::validation("Please fill out all fields"));
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
                .bind(username)
                .fetch_one(&mut *conn)
                .await?;
        if exists {
            return Err(AppError::DuplicateUsername);
        }

        let password_hash = hash_password(hasher, password).await?;

        let user_id = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, role)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(&password_hash)
        .bind(role.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| on_unique_violation(e, AppError::DuplicateUsername))?
        .last_insert_rowid();

        tracing::info!("Registered user {} ({}) as {}", username, user_id, role);

        Ok(User {
            user_id,
            username: username.to_string(),
            password_hash,
            role,
        })
    }

    pub async fn authenticate(
        pool: &SqlitePool,
        hasher: &SharedHasher,
        username: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let Some(user) = Self::find_by_username(pool, username.trim()).await? else {
            tracing::debug!("Login attempt for unknown user {}", username);
            return Err(AppError::InvalidCredentials);
        };

        match verify_password(hasher, password, &user.password_hash).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Password mismatch for user {}", user.user_id);
                return Err(AppError::InvalidCredentials);
            }
            // 存储的哈希无法解析：记录下来，对客户端仍按凭证错误处理
            Err(AppError::PasswordHash(e)) => {
                tracing::warn!("Stored password hash for user {} is unusable: {}", user.user_id, e);
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        }

        Ok(Session::from(&user))
    }

    pub async fn find_by_id(pool: &SqlitePool, user_id: i64) -> Result<Option<Self>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = ?"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn find_by_username(
        pool: &SqlitePool,
        username: &str,
    ) -> Result<Option<Self>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY user_id"
        ))
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    pub async fn list_by_role(pool: &SqlitePool, role: Role) -> Result<Vec<Self>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY user_id"
        ))
        .bind(role.as_str())
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn set_role(pool: &SqlitePool, user_id: i64, role: Role) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE user_id = ?")
            .bind(role.as_str())
            .bind(user_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user"));
        }

        tracing::info!("Changed role of user {} to {}", user_id, role);
        Ok(())
    }

    /// 外键级联删除该用户拥有的群组、投票、消息等
    pub async fn delete(pool: &SqlitePool, user_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("user"));
        }

        tracing::info!("Deleted user {}", user_id);
        Ok(())
    }
}
