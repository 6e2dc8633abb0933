use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::database::{format_timestamp, parse_timestamp};
use crate::error::{AppError, on_unique_violation};
use crate::routes::group::Group;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Poll {
    pub poll_id: i64,
    pub question: String,
    pub is_public: bool,
    pub creator_id: i64,
    pub group_id: Option<i64>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

/// 投票生命周期，完全由当前时间与起止时间决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Scheduled,
    Active,
    Closed,
}

#[derive(FromRow)]
struct PollRow {
    poll_id: i64,
    poll_question: String,
    is_public: bool,
    creator_id: i64,
    group_id: Option<i64>,
    start_time: String,
    end_time: String,
}

impl TryFrom<PollRow> for Poll {
    type Error = AppError;

    fn try_from(row: PollRow) -> Result<Self, Self::Error> {
        Ok(Poll {
            poll_id: row.poll_id,
            question: row.poll_question,
            is_public: row.is_public,
            creator_id: row.creator_id,
            group_id: row.group_id,
            start_time: parse_timestamp(&row.start_time)?,
            end_time: parse_timestamp(&row.end_time)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PollOption {
    pub option_id: i64,
    pub poll_id: i64,
    pub option_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct OptionTally {
    pub option_id: i64,
    pub option_text: String,
    pub votes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPoll {
    pub question: String,
    pub is_public: bool,
    pub group_id: Option<i64>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub options: Vec<String>,
}

impl NewPoll {
    /// 校验并规整：去除首尾空白，丢弃空的可选项
    pub fn validate(mut self) -> Result<Self, AppError> {
        self.question = self.question.trim().to_string();
        if self.question.is_empty() {
            return Err(AppError::validation("Poll question is required"));
        }

        self.options = self
            .options
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if self.options.len() < MIN_OPTIONS {
            return Err(AppError::validation("A poll needs at least two options"));
        }
        if self.options.len() > MAX_OPTIONS {
            return Err(AppError::validation("A poll can have at most four options"));
        }

        if self.start_time >= self.end_time {
            return Err(AppError::validation("End time must be after start time"));
        }

        match (self.is_public, self.group_id) {
            (true, Some(_)) => Err(AppError::validation("A public poll cannot belong to a group")),
            (false, None) => Err(AppError::validation("A private poll needs a group")),
            _ => Ok(self),
        }
    }
}

/// 群组管理员创建的投票，范围固定为其所属群组
#[derive(Debug, Clone, Deserialize)]
pub struct GroupPoll {
    pub question: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub options: Vec<String>,
}

impl GroupPoll {
    pub fn into_new_poll(self, group_id: i64) -> NewPoll {
        NewPoll {
            question: self.question,
            is_public: false,
            group_id: Some(group_id),
            start_time: self.start_time,
            end_time: self.end_time,
            options: self.options,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollUpdate {
    pub question: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option_id: i64,
}

/// 单个选项的结果行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionResult {
    pub option_text: String,
    pub votes: i64,
    pub percentage: f64,
}

impl fmt::Display for OptionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} votes ({:.2}%)",
            self.option_text, self.votes, self.percentage
        )
    }
}

/// 结果页的展示状态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResultsView {
    StillActive { ends_at: NaiveDateTime },
    NoVotes,
    Tallied { results: Vec<OptionResult> },
}

impl ResultsView {
    /// 只有在结束时间已到时才给出数值结果
    pub fn render(poll: &Poll, tally: &[OptionTally], now: NaiveDateTime) -> Self {
        if !poll.has_ended_at(now) {
            return ResultsView::StillActive {
                ends_at: poll.end_time,
            };
        }

        let total: i64 = tally.iter().map(|t| t.votes).sum();
        if total == 0 {
            return ResultsView::NoVotes;
        }

        let results = tally
            .iter()
            .map(|t| OptionResult {
                option_text: t.option_text.clone(),
                votes: t.votes,
                percentage: t.votes as f64 / total as f64 * 100.0,
            })
            .collect();
        ResultsView::Tallied { results }
    }
}

const POLL_COLUMNS: &str =
    "p.poll_id, p.poll_question, p.is_public, p.creator_id, p.group_id, p.start_time, p.end_time";

impl Poll {
    pub fn status_at(&self, now: NaiveDateTime) -> PollStatus {
        if now < self.start_time {
            PollStatus::Scheduled
        } else if now <= self.end_time {
            PollStatus::Active
        } else {
            PollStatus::Closed
        }
    }

    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        self.status_at(now) == PollStatus::Active
    }

    pub fn has_ended_at(&self, now: NaiveDateTime) -> bool {
        self.end_time <= now
    }

    /// 投票与选项在同一事务中写入
    pub async fn create(pool: &SqlitePool, creator_id: i64, new_poll: NewPoll) -> Result<Self, AppError> {
        let new_poll = new_poll.validate()?;

        let mut tx = pool.begin().await?;

        if let Some(group_id) = new_poll.group_id {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM groups WHERE group_id = ?)")
                    .bind(group_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(AppError::NotFound("group"));
            }
        }

        let poll_id = sqlx::query(
            r#"
            INSERT INTO polls (poll_question, is_public, creator_id, group_id, start_time, end_time)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new_poll.question)
        .bind(new_poll.is_public)
        .bind(creator_id)
        .bind(new_poll.group_id)
        .bind(format_timestamp(&new_poll.start_time))
        .bind(format_timestamp(&new_poll.end_time))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for text in &new_poll.options {
            insert_option(&mut tx, poll_id, text).await?;
        }

        tx.commit().await?;

        tracing::info!(
            "User {} created poll {} with {} options",
            creator_id,
            poll_id,
            new_poll.options.len()
        );

        Ok(Poll {
            poll_id,
            question: new_poll.question,
            is_public: new_poll.is_public,
            creator_id,
            group_id: new_poll.group_id,
            // 存储精度为秒
            start_time: parse_timestamp(&format_timestamp(&new_poll.start_time))?,
            end_time: parse_timestamp(&format_timestamp(&new_poll.end_time))?,
        })
    }

    pub async fn add_option(pool: &SqlitePool, poll_id: i64, option_text: &str) -> Result<PollOption, AppError> {
        let option_text = option_text.trim();
        if option_text.is_empty() {
            return Err(AppError::validation("Option text is required"));
        }

        let mut conn = pool.acquire().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT (SELECT COUNT(*) FROM options o WHERE o.poll_id = p.poll_id)
            FROM polls p
            WHERE p.poll_id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&mut *conn)
        .await?;

        match existing {
            None => return Err(AppError::NotFound("poll")),
            Some(n) if n as usize >= MAX_OPTIONS => {
                return Err(AppError::validation("A poll can have at most four options"));
            }
            Some(_) => {}
        }

        let option_id = insert_option(&mut conn, poll_id, option_text).await?;
        Ok(PollOption {
            option_id,
            poll_id,
            option_text: option_text.to_string(),
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, poll_id: i64) -> Result<Option<Self>, AppError> {
        let row = sqlx::query_as::<_, PollRow>(&format!(
            "SELECT {POLL_COLUMNS} FROM polls p WHERE p.poll_id = ?"
        ))
        .bind(poll_id)
        .fetch_optional(pool)
        .await?;

        row.map(Poll::try_from).transpose()
    }

    pub async fn options(pool: &SqlitePool, poll_id: i64) -> Result<Vec<PollOption>, AppError> {
        let options = sqlx::query_as::<_, PollOption>(
            "SELECT option_id, poll_id, option_text FROM options WHERE poll_id = ? ORDER BY option_id",
        )
        .bind(poll_id)
        .fetch_all(pool)
        .await?;
        Ok(options)
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>, AppError> {
        fetch_polls(pool, &format!("SELECT {POLL_COLUMNS} FROM polls p ORDER BY p.poll_id"), None).await
    }

    pub async fn list_by_group(pool: &SqlitePool, group_id: i64) -> Result<Vec<Self>, AppError> {
        fetch_polls(
            pool,
            &format!("SELECT {POLL_COLUMNS} FROM polls p WHERE p.group_id = ? ORDER BY p.poll_id"),
            Some(group_id),
        )
        .await
    }

    /// 当前处于投票窗口内的所有投票
    pub async fn live(pool: &SqlitePool, as_of: NaiveDateTime) -> Result<Vec<Self>, AppError> {
        let polls = Self::list_all(pool).await?;
        Ok(polls.into_iter().filter(|p| p.is_active_at(as_of)).collect())
    }

    pub async fn live_in_group(
        pool: &SqlitePool,
        group_id: i64,
        as_of: NaiveDateTime,
    ) -> Result<Vec<Self>, AppError> {
        let polls = Self::list_by_group(pool, group_id).await?;
        Ok(polls.into_iter().filter(|p| p.is_active_at(as_of)).collect())
    }

    /// 用户可查看结果的投票：公开投票，或用户已通过审核的群组投票
    pub async fn results_eligible_polls_for(pool: &SqlitePool, user_id: i64) -> Result<Vec<Self>, AppError> {
        fetch_polls(
            pool,
            &format!(
                r#"
                SELECT {POLL_COLUMNS}
                FROM polls p
                WHERE p.is_public = 1
                   OR EXISTS (
                        SELECT 1 FROM group_members m
                        WHERE m.group_id = p.group_id
                          AND m.user_id = ?
                          AND m.status = 'accepted'
                   )
                ORDER BY p.poll_id
                "#
            ),
            Some(user_id),
        )
        .await
    }

    /// 用户在给定时刻可参与投票的投票
    pub async fn visible_polls_for(
        pool: &SqlitePool,
        user_id: i64,
        as_of: NaiveDateTime,
    ) -> Result<Vec<Self>, AppError> {
        let polls = Self::results_eligible_polls_for(pool, user_id).await?;
        Ok(polls.into_iter().filter(|p| p.is_active_at(as_of)).collect())
    }

    /// 不考虑时间窗口，仅判断公开性与群组成员资格
    pub async fn is_eligible(&self, pool: &SqlitePool, user_id: i64) -> Result<bool, AppError> {
        match (self.is_public, self.group_id) {
            (true, _) => Ok(true),
            (false, Some(group_id)) => Group::is_accepted_member(pool, group_id, user_id).await,
            (false, None) => Ok(false),
        }
    }

    pub async fn cast_vote(
        pool: &SqlitePool,
        poll_id: i64,
        option_id: i64,
        user_id: i64,
    ) -> Result<i64, AppError> {
        let belongs: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM options WHERE option_id = ? AND poll_id = ?)",
        )
        .bind(option_id)
        .bind(poll_id)
        .fetch_one(pool)
        .await?;
        if !belongs {
            return Err(AppError::NotFound("option"));
        }

        let vote_id = sqlx::query("INSERT INTO votes (poll_id, option_id, user_id) VALUES (?, ?, ?)")
            .bind(poll_id)
            .bind(option_id)
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(|e| on_unique_violation(e, AppError::AlreadyVoted))?
            .last_insert_rowid();

        tracing::info!("User {} voted on poll {}", user_id, poll_id);
        Ok(vote_id)
    }

    pub async fn has_voted(pool: &SqlitePool, poll_id: i64, user_id: i64) -> Result<bool, AppError> {
        let voted = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM votes WHERE poll_id = ? AND user_id = ?)",
        )
        .bind(poll_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;
        Ok(voted)
    }

    /// 每个选项一行，无票的选项计为零
    pub async fn tally(pool: &SqlitePool, poll_id: i64) -> Result<Vec<OptionTally>, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM polls WHERE poll_id = ?)")
            .bind(poll_id)
            .fetch_one(pool)
            .await?;
        if !exists {
            return Err(AppError::NotFound("poll"));
        }

        let tally = sqlx::query_as::<_, OptionTally>(
            r#"
            SELECT o.option_id, o.option_text, COUNT(v.vote_id) AS votes
            FROM options o
            LEFT JOIN votes v ON v.option_id = o.option_id
            WHERE o.poll_id = ?
            GROUP BY o.option_id, o.option_text
            ORDER BY o.option_id
            "#,
        )
        .bind(poll_id)
        .fetch_all(pool)
        .await?;

        tracing::debug!("Tallied poll {} over {} options", poll_id, tally.len());
        Ok(tally)
    }

    pub async fn update(pool: &SqlitePool, poll_id: i64, update: PollUpdate) -> Result<Self, AppError> {
        let mut poll = Self::find_by_id(pool, poll_id)
            .await?
            .ok_or(AppError::NotFound("poll"))?;

        if let Some(question) = update.question {
            let question = question.trim();
            if question.is_empty() {
                return Err(AppError::validation("Poll question is required"));
            }
            poll.question = question.to_string();
        }
        if let Some(start_time) = update.start_time {
            poll.start_time = start_time;
        }
        if let Some(end_time) = update.end_time {
            poll.end_time = end_time;
        }
        if poll.start_time >= poll.end_time {
            return Err(AppError::validation("End time must be after start time"));
        }

        sqlx::query(
            r#"
            UPDATE polls
            SET poll_question = ?, start_time = ?, end_time = ?
            WHERE poll_id = ?
            "#,
        )
        .bind(&poll.question)
        .bind(format_timestamp(&poll.start_time))
        .bind(format_timestamp(&poll.end_time))
        .bind(poll_id)
        .execute(pool)
        .await?;

        tracing::info!("Updated poll {}", poll_id);
        Self::find_by_id(pool, poll_id)
            .await?
            .ok_or(AppError::NotFound("poll"))
    }

    pub async fn delete(pool: &SqlitePool, poll_id: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM polls WHERE poll_id = ?")
            .bind(poll_id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("poll"));
        }

        tracing::info!("Deleted poll {}", poll_id);
        Ok(())
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM polls")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// 至少投过一次票的不同用户数
    pub async fn active_voter_count(pool: &SqlitePool) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM votes")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}

async fn insert_option(conn: &mut SqliteConnection, poll_id: i64, option_text: &str) -> Result<i64, AppError> {
    let option_id = sqlx::query("INSERT INTO options (poll_id, option_text) VALUES (?, ?)")
        .bind(poll_id)
        .bind(option_text)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();
    Ok(option_id)
}

async fn fetch_polls(pool: &SqlitePool, sql: &str, param: Option<i64>) -> Result<Vec<Poll>, AppError> {
    let mut query = sqlx::query_as::<_, PollRow>(sql);
    if let Some(param) = param {
        query = query.bind(param);
    }

    query
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Poll::try_from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn poll(start: u32, end: u32) -> Poll {
        Poll {
            poll_id: 1,
            question: "Favourite colour?".into(),
            is_public: true,
            creator_id: 1,
            group_id: None,
            start_time: at(start),
            end_time: at(end),
        }
    }

    fn new_poll(options: &[&str]) -> NewPoll {
        NewPoll {
            question: "  Lunch?  ".into(),
            is_public: true,
            group_id: None,
            start_time: at(9),
            end_time: at(17),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    #[test]
    fn status_follows_the_inclusive_window() {
        let p = poll(9, 17);
        assert_eq!(p.status_at(at(8)), PollStatus::Scheduled);
        assert_eq!(p.status_at(at(9)), PollStatus::Active);
        assert_eq!(p.status_at(at(17)), PollStatus::Active);
        assert_eq!(p.status_at(at(18)), PollStatus::Closed);
    }

    #[test]
    fn validation_trims_and_drops_blank_optional_options() {
        let cleaned = new_poll(&["Pizza", " Sushi ", "", "   "]).validate().unwrap();
        assert_eq!(cleaned.question, "Lunch?");
        assert_eq!(cleaned.options, vec!["Pizza", "Sushi"]);
    }

    #[test]
    fn validation_rejects_bad_polls() {
        assert!(new_poll(&["Only one"]).validate().is_err());
        assert!(new_poll(&["a", "b", "c", "d", "e"]).validate().is_err());

        let mut blank_question = new_poll(&["a", "b"]);
        blank_question.question = "   ".into();
        assert!(blank_question.validate().is_err());

        let mut reversed = new_poll(&["a", "b"]);
        reversed.end_time = at(9);
        assert!(reversed.validate().is_err());

        let mut private_without_group = new_poll(&["a", "b"]);
        private_without_group.is_public = false;
        assert!(private_without_group.validate().is_err());

        let mut public_with_group = new_poll(&["a", "b"]);
        public_with_group.group_id = Some(3);
        assert!(public_with_group.validate().is_err());
    }

    fn tally(counts: &[(&str, i64)]) -> Vec<OptionTally> {
        counts
            .iter()
            .enumerate()
            .map(|(i, (text, votes))| OptionTally {
                option_id: i as i64 + 1,
                option_text: text.to_string(),
                votes: *votes,
            })
            .collect()
    }

    #[test]
    fn results_are_hidden_until_the_poll_ends() {
        let p = poll(9, 17);
        let view = ResultsView::render(&p, &tally(&[("Red", 2), ("Blue", 1)]), at(12));
        assert_eq!(view, ResultsView::StillActive { ends_at: at(17) });
    }

    #[test]
    fn results_render_percentages_after_close() {
        let p = poll(9, 17);
        let view = ResultsView::render(&p, &tally(&[("Red", 2), ("Blue", 1)]), at(17));

        let ResultsView::Tallied { results } = view else {
            panic!("expected tallied results");
        };
        let lines: Vec<String> = results.iter().map(ToString::to_string).collect();
        assert_eq!(lines, vec!["Red: 2 votes (66.67%)", "Blue: 1 votes (33.33%)"]);
    }

    #[test]
    fn zero_votes_render_without_division() {
        let p = poll(9, 17);
        let view = ResultsView::render(&p, &tally(&[("Red", 0), ("Blue", 0)]), at(20));
        assert_eq!(view, ResultsView::NoVotes);
    }
}
