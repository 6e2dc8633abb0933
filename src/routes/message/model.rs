use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::database::{format_timestamp, parse_timestamp};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message_text: String,
    pub timestamp: NaiveDateTime,
}

#[derive(FromRow)]
struct MessageRow {
    message_id: i64,
    sender_id: i64,
    receiver_id: i64,
    message_text: String,
    timestamp: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = AppError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            message_id: row.message_id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            message_text: row.message_text,
            timestamp: parse_timestamp(&row.timestamp)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message_text: String,
}

impl Message {
    pub async fn send(
        pool: &SqlitePool,
        sender_id: i64,
        receiver_id: i64,
        message_text: &str,
    ) -> Result<Self, AppError> {
        let message_text = message_text.trim();
        if message_text.is_empty() {
            return Err(AppError::EmptyMessage);
        }

        let receiver_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?)")
                .bind(receiver_id)
                .fetch_one(pool)
                .await?;
        if !receiver_exists {
            return Err(AppError::NotFound("user"));
        }

        let timestamp = format_timestamp(&Utc::now().naive_utc());
        let message_id = sqlx::query(
            r#"
            INSERT INTO messages (sender_id, receiver_id, message_text, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(message_text)
        .bind(&timestamp)
        .execute(pool)
        .await?
        .last_insert_rowid();

        tracing::info!("User {} sent message {} to user {}", sender_id, message_id, receiver_id);

        Ok(Message {
            message_id,
            sender_id,
            receiver_id,
            message_text: message_text.to_string(),
            timestamp: parse_timestamp(&timestamp)?,
        })
    }

    /// 与该用户有过消息往来的用户ID
    pub async fn correspondents(pool: &SqlitePool, user_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar(
            r#"
            SELECT receiver_id FROM messages WHERE sender_id = ?
            UNION
            SELECT sender_id FROM messages WHERE receiver_id = ?
            ORDER BY 1
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(ids)
    }

    /// 两个用户之间的双向消息，按时间升序
    pub async fn history(pool: &SqlitePool, user_a: i64, user_b: i64) -> Result<Vec<Self>, AppError> {
        sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT message_id, sender_id, receiver_id, message_text, timestamp
            FROM messages
            WHERE (sender_id = ? AND receiver_id = ?)
               OR (sender_id = ? AND receiver_id = ?)
            ORDER BY timestamp ASC, message_id ASC
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(user_b)
        .bind(user_a)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Message::try_from)
        .collect()
    }
}
