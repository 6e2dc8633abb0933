pub mod admin;
pub mod group;
pub mod group_admin;
pub mod message;
pub mod poll;
pub mod user;
