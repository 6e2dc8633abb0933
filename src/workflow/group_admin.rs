use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqlitePool;

use super::{PollMonitor, now, require_role};
use crate::error::AppError;
use crate::routes::group::{Group, GroupMember, MembershipStatus};
use crate::routes::message::Message;
use crate::routes::poll::{GroupPoll, Poll};
use crate::routes::user::User;
use crate::session::{Role, Session};

#[derive(Debug, Serialize)]
pub struct GroupAdminDashboard {
    pub group: Group,
    pub member_count: i64,
    pub live_polls: Vec<Poll>,
}

/// 群组管理员流程，所有操作限定在其拥有的群组内
pub struct GroupAdminWorkflow<'a> {
    pool: &'a SqlitePool,
    session: &'a Session,
    group: Group,
    now: NaiveDateTime,
}

impl<'a> GroupAdminWorkflow<'a> {
    pub async fn open(pool: &'a SqlitePool, session: &'a Session) -> Result<Self, AppError> {
        require_role(session, Role::GroupAdmin)?;

        let group = Group::owned_by(pool, session.user_id)
            .await?
            .ok_or(AppError::NoGroupAssigned)?;

        Ok(Self {
            pool,
            session,
            group,
            now: now(),
        })
    }

    pub fn at(mut self, now: NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub async fn dashboard(&self) -> Result<GroupAdminDashboard, AppError> {
        Ok(GroupAdminDashboard {
            group: self.group.clone(),
            member_count: Group::count_members(self.pool, self.group.group_id).await?,
            live_polls: Poll::live_in_group(self.pool, self.group.group_id, self.now).await?,
        })
    }

    pub async fn polls(&self) -> Result<Vec<Poll>, AppError> {
        Poll::list_by_group(self.pool, self.group.group_id).await
    }

    pub async fn monitor_poll(&self, poll_id: i64) -> Result<PollMonitor, AppError> {
        let poll = Poll::find_by_id(self.pool, poll_id)
            .await?
            .ok_or(AppError::NotFound("poll"))?;
        if poll.group_id != Some(self.group.group_id) {
            return Err(AppError::NotAuthorized);
        }
        PollMonitor::load(self.pool, poll, self.now).await
    }

    pub async fn create_poll(&self, poll: GroupPoll) -> Result<Poll, AppError> {
        Poll::create(
            self.pool,
            self.session.user_id,
            poll.into_new_poll(self.group.group_id),
        )
        .await
    }

    pub async fn members(&self) -> Result<Vec<GroupMember>, AppError> {
        Group::list_members(self.pool, self.group.group_id, MembershipStatus::Accepted).await
    }

    pub async fn member_details(&self, user_id: i64) -> Result<User, AppError> {
        if !Group::is_accepted_member(self.pool, self.group.group_id, user_id).await? {
            return Err(AppError::NotFound("membership"));
        }
        User::find_by_id(self.pool, user_id)
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    pub async fn remove_member(&self, user_id: i64) -> Result<(), AppError> {
        Group::remove_member(self.pool, self.group.group_id, user_id).await
    }

    pub async fn pending_requests(&self) -> Result<Vec<GroupMember>, AppError> {
        Group::list_members(self.pool, self.group.group_id, MembershipStatus::Pending).await
    }

    pub async fn approve(&self, member_id: i64) -> Result<(), AppError> {
        self.decide(member_id, MembershipStatus::Accepted).await
    }

    pub async fn reject(&self, member_id: i64) -> Result<(), AppError> {
        self.decide(member_id, MembershipStatus::Rejected).await
    }

    async fn decide(&self, member_id: i64, status: MembershipStatus) -> Result<(), AppError> {
        let member = Group::find_member(self.pool, member_id)
            .await?
            .ok_or(AppError::NotFound("membership"))?;
        if member.group_id != self.group.group_id {
            return Err(AppError::NotAuthorized);
        }
        Group::decide_membership(self.pool, member_id, status).await
    }

    /// 群组管理员只能联系系统管理员
    pub async fn contacts(&self) -> Result<Vec<User>, AppError> {
        User::list_by_role(self.pool, Role::Admin).await
    }

    pub async fn send_message(&self, to_user_id: i64, text: &str) -> Result<Message, AppError> {
        let receiver = User::find_by_id(self.pool, to_user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        if receiver.role != Role::Admin {
            return Err(AppError::NotAuthorized);
        }
        Message::send(self.pool, self.session.user_id, to_user_id, text).await
    }

    pub async fn conversation(&self, with_user_id: i64) -> Result<Vec<Message>, AppError> {
        Message::history(self.pool, self.session.user_id, with_user_id).await
    }
}
