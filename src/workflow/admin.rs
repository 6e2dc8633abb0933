use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqlitePool;

use super::{PollMonitor, now, require_role};
use crate::error::AppError;
use crate::routes::group::Group;
use crate::routes::message::Message;
use crate::routes::poll::{NewPoll, Poll, PollUpdate};
use crate::routes::user::User;
use crate::session::{Role, Session};
use crate::utils::SharedHasher;

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub user_count: i64,
    pub group_count: i64,
    pub poll_count: i64,
    pub active_voter_count: i64,
    pub live_polls: Vec<Poll>,
}

pub struct AdminWorkflow<'a> {
    pool: &'a SqlitePool,
    session: &'a Session,
    now: NaiveDateTime,
}

impl<'a> AdminWorkflow<'a> {
    pub fn new(pool: &'a SqlitePool, session: &'a Session) -> Result<Self, AppError> {
        require_role(session, Role::Admin)?;
        Ok(Self {
            pool,
            session,
            now: now(),
        })
    }

    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub async fn dashboard(&self) -> Result<AdminDashboard, AppError> {
        Ok(AdminDashboard {
            user_count: User::count(self.pool).await?,
            group_count: Group::count(self.pool).await?,
            poll_count: Poll::count(self.pool).await?,
            active_voter_count: Poll::active_voter_count(self.pool).await?,
            live_polls: Poll::live(self.pool, self.now).await?,
        })
    }

    pub async fn polls(&self) -> Result<Vec<Poll>, AppError> {
        Poll::list_all(self.pool).await
    }

    pub async fn monitor_poll(&self, poll_id: i64) -> Result<PollMonitor, AppError> {
        let poll = Poll::find_by_id(self.pool, poll_id)
            .await?
            .ok_or(AppError::NotFound("poll"))?;
        PollMonitor::load(self.pool, poll, self.now).await
    }

    /// 公开或任意群组的投票
    pub async fn create_poll(&self, new_poll: NewPoll) -> Result<Poll, AppError> {
        Poll::create(self.pool, self.session.user_id, new_poll).await
    }

    pub async fn update_poll(&self, poll_id: i64, update: PollUpdate) -> Result<Poll, AppError> {
        Poll::update(self.pool, poll_id, update).await
    }

    pub async fn delete_poll(&self, poll_id: i64) -> Result<(), AppError> {
        Poll::delete(self.pool, poll_id).await
    }

    pub async fn users(&self) -> Result<Vec<User>, AppError> {
        User::list_all(self.pool).await
    }

    pub async fn groups(&self) -> Result<Vec<Group>, AppError> {
        Group::list_all(self.pool).await
    }

    pub async fn group_admins(&self) -> Result<Vec<User>, AppError> {
        User::list_by_role(self.pool, Role::GroupAdmin).await
    }

    /// 新建群组管理员账号及其群组，两者同时成功或同时失败
    pub async fn create_group_admin(
        &self,
        hasher: &SharedHasher,
        username: &str,
        password: &str,
        group_name: &str,
    ) -> Result<(User, Group), AppError> {
        if group_name.trim().is_empty() {
            return Err(AppError::validation("Please fill out all fields"));
        }

        let mut tx = self.pool.begin().await?;
        let user = User::register_with(&mut tx, hasher, username, password, Role::GroupAdmin).await?;
        let group = Group::create_with(&mut tx, group_name, user.user_id).await?;
        tx.commit().await?;

        tracing::info!(
            "Admin {} created group admin {} for group {}",
            self.session.user_id,
            user.user_id,
            group.group_id
        );
        Ok((user, group))
    }

    /// 群组管理员在仍拥有群组时不能改为其他角色
    pub async fn set_role(&self, user_id: i64, role: Role) -> Result<(), AppError> {
        if user_id == self.session.user_id {
            return Err(AppError::validation("You cannot change your own role"));
        }

        let user = User::find_by_id(self.pool, user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        if user.role == Role::GroupAdmin && role != Role::GroupAdmin {
            if let Some(group) = Group::owned_by(self.pool, user_id).await? {
                tracing::warn!(
                    "Refused to change role of user {} who still owns group {}",
                    user_id,
                    group.group_id
                );
                return Err(AppError::validation(
                    "This user still owns a group; delete or reassign the group first",
                ));
            }
        }

        User::set_role(self.pool, user_id, role).await
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<(), AppError> {
        if user_id == self.session.user_id {
            return Err(AppError::validation("You cannot delete your own account"));
        }
        User::delete(self.pool, user_id).await
    }

    pub async fn delete_group(&self, group_id: i64) -> Result<(), AppError> {
        Group::delete(self.pool, group_id).await
    }

    /// 管理员可以和任何其他用户对话
    pub async fn contacts(&self) -> Result<Vec<User>, AppError> {
        let users = User::list_all(self.pool).await?;
        Ok(users
            .into_iter()
            .filter(|u| u.user_id != self.session.user_id)
            .collect())
    }

    pub async fn send_message(&self, to_user_id: i64, text: &str) -> Result<Message, AppError> {
        if to_user_id == self.session.user_id {
            return Err(AppError::validation("You cannot message yourself"));
        }
        Message::send(self.pool, self.session.user_id, to_user_id, text).await
    }

    pub async fn conversation(&self, with_user_id: i64) -> Result<Vec<Message>, AppError> {
        Message::history(self.pool, self.session.user_id, with_user_id).await
    }
}
