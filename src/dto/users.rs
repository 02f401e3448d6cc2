use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::User;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<User>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    /// Admin only.
    pub role: Option<String>,
    /// Admin only.
    pub is_active: Option<bool>,
    /// Admin only.
    pub is_verified: Option<bool>,
}
