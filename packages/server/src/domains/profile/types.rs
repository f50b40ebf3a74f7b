use serde::{Deserialize, Serialize};

use crate::common::{Role, Sex};
use crate::domains::auth::models::{User, UserDetail};

/// An identity together with its detail row.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub detail: Option<UserDetail>,
}

/// Detail fields are editable by the owner. Account flags only take effect
/// when the caller is an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: String,
    #[serde(default)]
    pub sex: Sex,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteUserRequest {
    pub reason: String,
}
