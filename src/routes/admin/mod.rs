mod handler;
mod model;

pub use handler::{
    create_group_admin, create_poll, dashboard, delete_group, delete_poll, delete_user,
    list_group_admins, list_groups, list_polls, list_users, monitor_poll, set_role, update_poll,
};
pub use model::{CreateGroupAdminRequest, CreateGroupAdminResponse, SetRoleRequest};
