use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::error::{AppError, on_unique_violation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub group_id: i64,
    pub group_name: String,
    pub admin_user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Accepted,
    Rejected,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "pending",
            MembershipStatus::Accepted => "accepted",
            MembershipStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MembershipStatus::Pending),
            "accepted" => Ok(MembershipStatus::Accepted),
            "rejected" => Ok(MembershipStatus::Rejected),
            other => Err(format!("unknown membership status: {}", other)),
        }
    }
}

/// 成员记录，附带用户名
#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub member_id: i64,
    pub group_id: i64,
    pub user_id: i64,
    pub username: String,
    pub status: MembershipStatus,
}

#[derive(FromRow)]
struct GroupMemberRow {
    member_id: i64,
    group_id: i64,
    user_id: i64,
    username: String,
    status: String,
}

impl TryFrom<GroupMemberRow> for GroupMember {
    type Error = AppError;

    fn try_from(row: GroupMemberRow) -> Result<Self, Self::Error> {
        Ok(GroupMember {
            member_id: row.member_id,
            group_id: row.group_id,
            user_id: row.user_id,
            username: row.username,
            status: row.status.parse().map_err(AppError::CorruptRecord)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub group_name: String,
}

const MEMBER_SELECT: &str = r#"
    SELECT m.member_id, m.group_id, m.user_id, u.username, m.status
    FROM group_members m
    JOIN users u ON m.user_id = u.user_id
"#;

impl Group {
    pub async fn create(
        pool: &SqlitePool,
        group_name: &str,
        admin_user_id: i64,
    ) -> Result<Self, AppError> {
        let mut conn = pool.acquire().await?;
        Self::create_with(&mut conn, group_name, admin_user_id).await
    }

    pub(crate) async fn create_with(
        conn: &mut SqliteConnection,
        group_name: &str,
        admin_user_id: i64,
    ) -> Result<Self, AppError> {
        let group_name = group_name.trim();
        if group_name.is_empty() {
            return Err(AppError::validation("Group name is required"));
        }

        let admin_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?)")
                .bind(admin_user_id)
                .fetch_one(&mut *conn)
                .await?;
        if !admin_exists {
            return Err(AppError::NotFound("user"));
        }

        let group_id = sqlx::query("INSERT INTO groups (group_name, admin_user_id) VALUES (?, ?)")
            .bind(group_name)
            .bind(admin_user_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| on_unique_violation(e, AppError::DuplicateGroupName))?
            .last_insert_rowid();

        tracing::info!(
            "Created group {} ({}) owned by user {}",
            group_name,
            group_id,
            admin_user_id
        );

        Ok(Group {
            group_id,
            group_name: group_name.to_string(),
            admin_user_id,
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, group_id: i64) -> Result<Option<Self>, AppError> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT group_id, group_name, admin_user_id FROM groups WHERE group_id = ?",
        )
        .bind(group_id)
        .fetch_optional(pool)
        .await?;
        Ok(group)
    }

    pub async fn find_by_name(pool: &SqlitePool, group_name: &str) -> Result<Option<Self>, AppError> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT group_id, group_name, admin_user_id FROM groups WHERE group_name = ?",
        )
        .bind(group_name.trim())
        .fetch_optional(pool)
        .await?;
        Ok(group)
    }

    /// 群组管理员所拥有的群组
    pub async fn owned_by(pool: &SqlitePool, admin_user_id: i64) -> Result<Option<Self>, AppError> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            SELECT group_id, group_name, admin_user_id
            FROM groups
            WHERE admin_user_id = ?
            ORDER BY group_id
            LIMIT 1
            "#,
        )
        .bind(admin_user_id)
        .fetch_optional(pool)
        .await?;
        Ok(group)
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>, AppError> {
        let groups = sqlx::query_as::<_, Group>(
            "SELECT group_id, group_name, admin_user_id FROM groups ORDER BY group_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(groups)
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM groups")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    pub async fn delete(pool: &SqlitePool, group_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM groups WHERE group_id = ?")
            .bind(group_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("group"));
        }

        tracing::info!("Deleted group {}", group_id);
        Ok(())
    }

    /// 申请加入群组，返回成员记录ID
    ///
    /// 已有待审或已通过的记录时拒绝；被拒绝过的记录重置为待审。
    pub async fn request_join(
        pool: &SqlitePool,
        group_id: i64,
        user_id: i64,
    ) -> Result<i64, AppError> {
        let existing: Option<(i64, String)> = sqlx::query_as(
            "SELECT member_id, status FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        if let Some((member_id, status)) = existing {
            let status: MembershipStatus = status.parse().map_err(AppError::CorruptRecord)?;
            if status != MembershipStatus::Rejected {
                return Err(AppError::MembershipExists);
            }

            sqlx::query("UPDATE group_members SET status = 'pending' WHERE member_id = ?")
                .bind(member_id)
                .execute(pool)
                .await?;
            tracing::info!("User {} re-requested to join group {}", user_id, group_id);
            return Ok(member_id);
        }

        let member_id = sqlx::query(
            "INSERT INTO group_members (group_id, user_id, status) VALUES (?, ?, 'pending')",
        )
        .bind(group_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| on_unique_violation(e, AppError::MembershipExists))?
        .last_insert_rowid();

        tracing::info!("User {} requested to join group {}", user_id, group_id);
        Ok(member_id)
    }

    /// 审批加入申请；重复审批直接覆盖状态
    pub async fn decide_membership(
        pool: &SqlitePool,
        member_id: i64,
        status: MembershipStatus,
    ) -> Result<(), AppError> {
        if status == MembershipStatus::Pending {
            return Err(AppError::validation(
                "A membership can only be accepted or rejected",
            ));
        }

        let result = sqlx::query("UPDATE group_members SET status = ? WHERE member_id = ?")
            .bind(status.as_str())
            .bind(member_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("membership"));
        }

        tracing::info!("Membership {} marked {}", member_id, status);
        Ok(())
    }

    pub async fn remove_member(pool: &SqlitePool, group_id: i64, user_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("membership"));
        }

        tracing::info!("Removed user {} from group {}", user_id, group_id);
        Ok(())
    }

    pub async fn find_member(pool: &SqlitePool, member_id: i64) -> Result<Option<GroupMember>, AppError> {
        let row = sqlx::query_as::<_, GroupMemberRow>(&format!(
            "{MEMBER_SELECT} WHERE m.member_id = ?"
        ))
        .bind(member_id)
        .fetch_optional(pool)
        .await?;

        row.map(GroupMember::try_from).transpose()
    }

    pub async fn list_members(
        pool: &SqlitePool,
        group_id: i64,
        status: MembershipStatus,
    ) -> Result<Vec<GroupMember>, AppError> {
        sqlx::query_as::<_, GroupMemberRow>(&format!(
            "{MEMBER_SELECT} WHERE m.group_id = ? AND m.status = ? ORDER BY m.member_id"
        ))
        .bind(group_id)
        .bind(status.as_str())
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(GroupMember::try_from)
        .collect()
    }

    /// 已通过的成员数量
    pub async fn count_members(pool: &SqlitePool, group_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ? AND status = 'accepted'",
        )
        .bind(group_id)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    pub async fn is_accepted_member(
        pool: &SqlitePool,
        group_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let accepted = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM group_members
                WHERE group_id = ? AND user_id = ? AND status = 'accepted'
            )
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(accepted)
    }
}
