/// Account database models
use crate::{admin::Role, error::AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, FromRow, Row};

/// Account record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub can_comment: bool,
    pub verified: bool,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub cep: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub address_complement: Option<String>,
    pub profile_image_id: Option<i64>,
    pub session_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column list matching [`User::from_row`]
pub const USER_COLUMNS: &str = "id, email, username, password_hash, role, can_comment, verified, \
    bio, phone, cep, district, address, address_complement, profile_image_id, session_version, \
    created_at, updated_at";

impl User {
    pub fn from_row(row: &SqliteRow) -> AppResult<Self> {
        let role_str: String = row.try_get("role")?;

        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            role: Role::from_str(&role_str)?,
            can_comment: row.try_get("can_comment")?,
            verified: row.try_get("verified")?,
            bio: row.try_get("bio")?,
            phone: row.try_get("phone")?,
            cep: row.try_get("cep")?,
            district: row.try_get("district")?,
            address: row.try_get("address")?,
            address_complement: row.try_get("address_complement")?,
            profile_image_id: row.try_get("profile_image_id")?,
            session_version: row.try_get("session_version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Password reset token record (only the hash is stored)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PasswordResetToken {
    pub token_hash: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}
