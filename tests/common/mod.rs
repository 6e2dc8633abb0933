#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::SqlitePool;
use voting_backend::{
    database,
    routes::group::Group,
    routes::poll::{NewPoll, Poll},
    routes::user::User,
    session::{Role, Session},
    utils::{BcryptHasher, SharedHasher},
};

pub const PASSWORD: &str = "correct horse";

pub fn hasher() -> SharedHasher {
    Arc::new(BcryptHasher::new(4))
}

pub async fn setup() -> SqlitePool {
    let pool = database::connect_in_memory().await.unwrap();
    database::migrate(&pool).await.unwrap();
    pool
}

/// 2024-05-01 当天的某个整点
pub fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub async fn user(pool: &SqlitePool, username: &str, role: Role) -> Session {
    let user = User::register(pool, &hasher(), username, PASSWORD, role)
        .await
        .unwrap();
    Session::from(&user)
}

pub async fn group_with_admin(pool: &SqlitePool, group_name: &str, admin: &str) -> (Session, Group) {
    let session = user(pool, admin, Role::GroupAdmin).await;
    let group = Group::create(pool, group_name, session.user_id).await.unwrap();
    (session, group)
}

pub async fn accepted_member(pool: &SqlitePool, group: &Group, username: &str) -> Session {
    let session = user(pool, username, Role::User).await;
    let member_id = Group::request_join(pool, group.group_id, session.user_id)
        .await
        .unwrap();
    Group::decide_membership(
        pool,
        member_id,
        voting_backend::routes::group::MembershipStatus::Accepted,
    )
    .await
    .unwrap();
    session
}

pub fn public_poll(question: &str, options: &[&str]) -> NewPoll {
    NewPoll {
        question: question.into(),
        is_public: true,
        group_id: None,
        start_time: at(9),
        end_time: at(17),
        options: options.iter().map(|o| o.to_string()).collect(),
    }
}

pub fn group_poll(question: &str, group_id: i64, options: &[&str]) -> NewPoll {
    NewPoll {
        is_public: false,
        group_id: Some(group_id),
        ..public_poll(question, options)
    }
}

pub async fn create_poll(pool: &SqlitePool, creator: &Session, new_poll: NewPoll) -> Poll {
    Poll::create(pool, creator.user_id, new_poll).await.unwrap()
}
