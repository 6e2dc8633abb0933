use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqlitePool;

use super::{now, require_role};
use crate::error::AppError;
use crate::routes::group::Group;
use crate::routes::message::Message;
use crate::routes::poll::{Poll, PollOption, ResultsView};
use crate::routes::user::User;
use crate::session::{Role, Session};

/// 可投票的投票及其选项
#[derive(Debug, Clone, Serialize)]
pub struct Ballot {
    pub poll: Poll,
    pub options: Vec<PollOption>,
    pub has_voted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollResults {
    pub poll: Poll,
    pub view: ResultsView,
}

pub struct UserWorkflow<'a> {
    pool: &'a SqlitePool,
    session: &'a Session,
    now: NaiveDateTime,
}

impl<'a> UserWorkflow<'a> {
    pub fn new(pool: &'a SqlitePool, session: &'a Session) -> Result<Self, AppError> {
        require_role(session, Role::User)?;
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

    pub async fn available_polls(&self) -> Result<Vec<Ballot>, AppError> {
        let polls = Poll::visible_polls_for(self.pool, self.session.user_id, self.now).await?;

        let mut ballots = Vec::with_capacity(polls.len());
        for poll in polls {
            let options = Poll::options(self.pool, poll.poll_id).await?;
            let has_voted = Poll::has_voted(self.pool, poll.poll_id, self.session.user_id).await?;
            ballots.push(Ballot {
                poll,
                options,
                has_voted,
            });
        }
        Ok(ballots)
    }

    /// 投票须在窗口内、对该用户可见且尚未投过
    pub async fn vote(&self, poll_id: i64, option_id: i64) -> Result<i64, AppError> {
        let poll = Poll::find_by_id(self.pool, poll_id)
            .await?
            .ok_or(AppError::NotFound("poll"))?;

        if !poll.is_eligible(self.pool, self.session.user_id).await? {
            return Err(AppError::NotAuthorized);
        }
        if !poll.is_active_at(self.now) {
            return Err(AppError::validation("This poll is not open for voting"));
        }
        if Poll::has_voted(self.pool, poll_id, self.session.user_id).await? {
            return Err(AppError::AlreadyVoted);
        }

        Poll::cast_vote(self.pool, poll_id, option_id, self.session.user_id).await
    }

    pub async fn results_polls(&self) -> Result<Vec<Poll>, AppError> {
        Poll::results_eligible_polls_for(self.pool, self.session.user_id).await
    }

    pub async fn results(&self, poll_id: i64) -> Result<PollResults, AppError> {
        let poll = Poll::find_by_id(self.pool, poll_id)
            .await?
            .ok_or(AppError::NotFound("poll"))?;

        if !poll.is_eligible(self.pool, self.session.user_id).await? {
            return Err(AppError::NotAuthorized);
        }

        let tally = Poll::tally(self.pool, poll_id).await?;
        let view = ResultsView::render(&poll, &tally, self.now);
        Ok(PollResults { poll, view })
    }

    /// 按群组名称申请加入，返回成员记录ID
    pub async fn join_group(&self, group_name: &str) -> Result<i64, AppError> {
        let group = Group::find_by_name(self.pool, group_name)
            .await?
            .ok_or(AppError::NotFound("group"))?;
        Group::request_join(self.pool, group.group_id, self.session.user_id).await
    }

    /// 与该用户有过往来的管理员
    pub async fn contacts(&self) -> Result<Vec<User>, AppError> {
        let mut contacts = Vec::new();
        for user_id in Message::correspondents(self.pool, self.session.user_id).await? {
            if let Some(user) = User::find_by_id(self.pool, user_id).await? {
                if user.role == Role::Admin {
                    contacts.push(user);
                }
            }
        }
        Ok(contacts)
    }

    pub async fn conversation(&self, with_user_id: i64) -> Result<Vec<Message>, AppError> {
        Message::history(self.pool, self.session.user_id, with_user_id).await
    }

    /// 普通用户只能回复已联系过自己的管理员
    ///
    /// 群组管理员只能给管理员发消息，无法回复普通用户，因此不在可回复范围内。
    pub async fn reply(&self, to_user_id: i64, text: &str) -> Result<Message, AppError> {
        let receiver = User::find_by_id(self.pool, to_user_id)
            .await?
            .ok_or(AppError::NotFound("user"))?;
        if receiver.role != Role::Admin {
            return Err(AppError::NotAuthorized);
        }

        let correspondents = Message::correspondents(self.pool, self.session.user_id).await?;
        if !correspondents.contains(&to_user_id) {
            tracing::warn!(
                "User {} tried to open a conversation with admin {}",
                self.session.user_id,
                to_user_id
            );
            return Err(AppError::NotAuthorized);
        }

        Message::send(self.pool, self.session.user_id, to_user_id, text).await
    }
}
