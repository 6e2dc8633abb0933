use serde::{Deserialize, Serialize};

use crate::routes::group::Group;
use crate::routes::user::User;
use crate::session::Role;

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupAdminRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub group_name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateGroupAdminResponse {
    pub user: User,
    pub group: Group,
}
