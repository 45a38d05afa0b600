/// Account management system
///
/// Handles registration, login, profiles, password resets and the staff
/// operations on user accounts.

mod manager;
pub mod password;

pub use manager::AccountManager;

use crate::{admin::Role, blob_store::ImageUpload};
use serde::Deserialize;

/// Self-service profile edit
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: String,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub cep: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub address_complement: Option<String>,
    pub current_password: String,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
    pub image: Option<ImageUpload>,
}

/// Staff edit of another account
#[derive(Debug, Clone)]
pub struct AdminUserUpdate {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub can_comment: bool,
    pub remove_photo: bool,
    pub new_password: Option<String>,
}

/// Result of a staff edit; a refused role change does not undo the other
/// fields
#[derive(Debug, Clone)]
pub struct AdminUpdateOutcome {
    pub user: crate::db::account::User,
    pub role_error: Option<String>,
}

/// User listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub q: Option<String>,
    pub role: Option<String>,
    pub page: Option<i64>,
}
