//! 按角色划分的业务流程
//!
//! 每个流程对象只能由对应角色的会话打开，调用方拿到的就是该角色允许的能力集合。
//! 时间默认取当前 UTC 时间，可用 `at` 固定。

mod admin;
mod group_admin;
mod member;

pub use admin::{AdminDashboard, AdminWorkflow};
pub use group_admin::{GroupAdminDashboard, GroupAdminWorkflow};
pub use member::{Ballot, PollResults, UserWorkflow};

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::routes::message::Message;
use crate::routes::poll::{OptionTally, Poll, PollStatus};
use crate::routes::user::User;
use crate::session::{Role, Session};

/// 投票监控视图：投票本身、当前状态、实时计票
#[derive(Debug, Clone, Serialize)]
pub struct PollMonitor {
    pub poll: Poll,
    pub status: PollStatus,
    pub tally: Vec<OptionTally>,
}

impl PollMonitor {
    async fn load(pool: &SqlitePool, poll: Poll, now: NaiveDateTime) -> Result<Self, AppError> {
        let tally = Poll::tally(pool, poll.poll_id).await?;
        Ok(PollMonitor {
            status: poll.status_at(now),
            poll,
            tally,
        })
    }
}

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn require_role(session: &Session, role: Role) -> Result<(), AppError> {
    if session.role != role {
        tracing::warn!(
            "User {} with role {} tried to open the {} workflow",
            session.user_id,
            session.role,
            role
        );
        return Err(AppError::NotAuthorized);
    }
    Ok(())
}

/// 按会话角色分派的流程
pub enum Workspace<'a> {
    Admin(AdminWorkflow<'a>),
    GroupAdmin(GroupAdminWorkflow<'a>),
    User(UserWorkflow<'a>),
}

impl<'a> Workspace<'a> {
    pub async fn open(pool: &'a SqlitePool, session: &'a Session) -> Result<Self, AppError> {
        let workspace = match session.role {
            Role::Admin => Workspace::Admin(AdminWorkflow::new(pool, session)?),
            Role::GroupAdmin => Workspace::GroupAdmin(GroupAdminWorkflow::open(pool, session).await?),
            Role::User => Workspace::User(UserWorkflow::new(pool, session)?),
        };
        Ok(workspace)
    }

    pub fn role(&self) -> Role {
        match self {
            Workspace::Admin(_) => Role::Admin,
            Workspace::GroupAdmin(_) => Role::GroupAdmin,
            Workspace::User(_) => Role::User,
        }
    }

    /// 当前角色可以发起对话的用户
    pub async fn contacts(&self) -> Result<Vec<User>, AppError> {
        match self {
            Workspace::Admin(w) => w.contacts().await,
            Workspace::GroupAdmin(w) => w.contacts().await,
            Workspace::User(w) => w.contacts().await,
        }
    }

    pub async fn conversation(&self, with_user_id: i64) -> Result<Vec<Message>, AppError> {
        match self {
            Workspace::Admin(w) => w.conversation(with_user_id).await,
            Workspace::GroupAdmin(w) => w.conversation(with_user_id).await,
            Workspace::User(w) => w.conversation(with_user_id).await,
        }
    }

    pub async fn send_message(&self, to_user_id: i64, text: &str) -> Result<Message, AppError> {
        match self {
            Workspace::Admin(w) => w.send_message(to_user_id, text).await,
            Workspace::GroupAdmin(w) => w.send_message(to_user_id, text).await,
            Workspace::User(w) => w.reply(to_user_id, text).await,
        }
    }
}
