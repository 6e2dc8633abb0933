mod handler;

pub use handler::{
    approve_request, create_poll, dashboard, list_members, list_polls, member_details,
    monitor_poll, pending_requests, reject_request, remove_member,
};
