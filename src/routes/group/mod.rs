mod handler;
mod model;

pub use handler::join_group;
pub use model::{Group, GroupMember, JoinGroupRequest, MembershipStatus};
