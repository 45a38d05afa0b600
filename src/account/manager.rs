/// Account manager implementation using runtime queries
use crate::{
    account::{password, AdminUpdateOutcome, AdminUserUpdate, ProfileUpdate, UserFilter},
    admin::{
        audit::{self, AuditAction},
        authorize_credential_change, authorize_role_change, Role,
    },
    blob_store::{delete_image, insert_image},
    db::{self, account::{User, USER_COLUMNS}, Page},
    error::{AppError, AppResult},
    identity::{IdentityRecord, IdentityStore, SessionUser},
    validation,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

const USERNAME_MAX_LENGTH: usize = 50;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn clean_username(username: &str) -> AppResult<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "Username cannot exceed {} characters",
            USERNAME_MAX_LENGTH
        )));
    }
    Ok(username.to_string())
}

fn email_taken() -> AppError {
    AppError::Validation("An account with this email already exists".to_string())
}

/// Account manager service
#[derive(Clone)]
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a reader account
    pub async fn register(&self, username: &str, email: &str, password_plain: &str) -> AppResult<User> {
        let username = clean_username(username)?;
        let email = validation::normalize_email(email);
        validation::validate_password(password_plain)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(email_taken());
        }

        let password_hash = password::hash_password(password_plain)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO account (email, username, password_hash, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        )
        .bind(&email)
        .bind(&username)
        .bind(&password_hash)
        .bind(Role::Reader.as_str())
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| if db::is_unique_violation(&e) { email_taken() } else { e.into() })?;

        tracing::info!("Registered account {} ({})", result.last_insert_rowid(), email);

        self.get_user(result.last_insert_rowid()).await
    }

    /// Create an account with an explicit role (seeding)
    pub async fn create_with_role(
        &self,
        username: &str,
        email: &str,
        password_plain: &str,
        role: Role,
    ) -> AppResult<User> {
        let email = validation::normalize_email(email);
        let password_hash = password::hash_password(password_plain)?;
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO account (email, username, password_hash, role, verified, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        )
        .bind(&email)
        .bind(clean_username(username)?)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| if db::is_unique_violation(&e) { email_taken() } else { e.into() })?;

        self.get_user(result.last_insert_rowid()).await
    }

    /// Check email and password; failures never reveal which one was wrong
    pub async fn authenticate(&self, email: &str, password_plain: &str) -> AppResult<User> {
        let invalid = || AppError::Authentication("Invalid email or password".to_string());

        let user = self
            .find_by_email(&validation::normalize_email(email))
            .await?
            .ok_or_else(invalid)?;

        if !password::verify_password(password_plain, &user.password_hash) {
            tracing::info!("Failed login for account {}", user.id);
            return Err(invalid());
        }

        tracing::info!("Account {} logged in", user.id);
        Ok(user)
    }

    /// Get account by id
    pub async fn get_user(&self, id: i64) -> AppResult<User> {
        let row = sqlx::query(&format!("SELECT {} FROM account WHERE id = ?1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        User::from_row(&row)
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM account WHERE email = ?1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(User::from_row).transpose()
    }

    /// Apply a self-service profile edit
    ///
    /// The current password is required. A new password bumps the session
    /// version, so the caller must reissue the session cookie.
    pub async fn update_profile(&self, user_id: i64, update: ProfileUpdate) -> AppResult<User> {
        let user = self.get_user(user_id).await?;

        if !password::verify_password(&update.current_password, &user.password_hash) {
            return Err(AppError::Validation("Current password is incorrect".to_string()));
        }

        let username = clean_username(&update.username)?;
        let phone = match update.phone.as_deref() {
            Some(phone) => validation::format_phone(phone)?,
            None => None,
        };
        let cep = match update.cep.as_deref() {
            Some(cep) => validation::format_cep(cep)?,
            None => None,
        };

        let new_password_hash = match validation::non_empty(update.new_password) {
            Some(new_password) => {
                validation::validate_new_password(
                    &new_password,
                    update.confirm_password.as_deref().unwrap_or_default(),
                )?;
                Some(password::hash_password(&new_password)?)
            }
            None => None,
        };

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "UPDATE account
             SET username = ?1, bio = ?2, phone = ?3, cep = ?4, district = ?5, address = ?6,
                 address_complement = ?7, updated_at = ?8
             WHERE id = ?9",
        )
        .bind(&username)
        .bind(validation::non_empty(update.bio))
        .bind(&phone)
        .bind(&cep)
        .bind(validation::non_empty(update.district))
        .bind(validation::non_empty(update.address))
        .bind(validation::non_empty(update.address_complement))
        .bind(Utc::now())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if let Some(hash) = &new_password_hash {
            sqlx::query(
                "UPDATE account SET password_hash = ?1, session_version = session_version + 1 WHERE id = ?2",
            )
            .bind(hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(image) = &update.image {
            let image_id = insert_image(&mut *tx, image).await?;
            sqlx::query("UPDATE account SET profile_image_id = ?1 WHERE id = ?2")
                .bind(image_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            if let Some(old_id) = user.profile_image_id {
                delete_image(&mut *tx, old_id).await?;
            }
        }

        tx.commit().await?;

        tracing::info!("Account {} updated profile", user_id);
        self.get_user(user_id).await
    }

    /// Staff edit of another account
    ///
    /// A role the actor may not grant is refused and reported in the outcome
    /// while the remaining fields are still saved.
    pub async fn admin_update_user(
        &self,
        actor: &SessionUser,
        target_id: i64,
        update: AdminUserUpdate,
    ) -> AppResult<AdminUpdateOutcome> {
        let target = self.get_user(target_id).await?;

        let username = clean_username(&update.username)?;
        let email = validation::normalize_email(&update.email);
        if email.is_empty() {
            return Err(AppError::Validation("Email is required".to_string()));
        }
        if email != target.email {
            if let Some(other) = self.find_by_email(&email).await? {
                if other.id != target.id {
                    return Err(email_taken());
                }
            }
        }

        let new_password = validation::non_empty(update.new_password);
        if email != target.email || new_password.is_some() {
            authorize_credential_change(actor.role, target.role, actor.id == target.id)?;
        }

        let new_password_hash = match new_password {
            Some(new_password) => {
                validation::validate_password(&new_password)?;
                Some(password::hash_password(&new_password)?)
            }
            None => None,
        };

        let (role, role_error) = match authorize_role_change(actor.role, target.role, update.role) {
            Ok(role) => (role, None),
            Err(e) => {
                tracing::warn!(
                    "User {} ({}) tried to set role {} on user {}",
                    actor.id,
                    actor.role,
                    update.role,
                    target.id
                );
                (target.role, Some(e.to_string()))
            }
        };

        let mut tx = self.db.begin().await?;

        sqlx::query(
            "UPDATE account SET username = ?1, email = ?2, role = ?3, can_comment = ?4, updated_at = ?5
             WHERE id = ?6",
        )
        .bind(&username)
        .bind(&email)
        .bind(role.as_str())
        .bind(update.can_comment)
        .bind(Utc::now())
        .bind(target.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| if db::is_unique_violation(&e) { email_taken() } else { AppError::from(e) })?;

        if let Some(hash) = &new_password_hash {
            sqlx::query(
                "UPDATE account SET password_hash = ?1, session_version = session_version + 1 WHERE id = ?2",
            )
            .bind(hash)
            .bind(target.id)
            .execute(&mut *tx)
            .await?;
        }

        if update.remove_photo {
            if let Some(image_id) = target.profile_image_id {
                sqlx::query("UPDATE account SET profile_image_id = NULL WHERE id = ?1")
                    .bind(target.id)
                    .execute(&mut *tx)
                    .await?;
                delete_image(&mut *tx, image_id).await?;
            }
        }

        audit::record(&mut *tx, actor.id, AuditAction::UserUpdate, target.id, None).await?;

        if role != target.role {
            let details = format!("{} -> {}", target.role, role);
            audit::record(&mut *tx, actor.id, AuditAction::RoleChange, target.id, Some(&details)).await?;
        }

        if update.can_comment != target.can_comment {
            let details = if update.can_comment { "restored" } else { "suspended" };
            audit::record(&mut *tx, actor.id, AuditAction::CommentPrivilege, target.id, Some(details))
                .await?;
        }

        tx.commit().await?;

        tracing::info!("User {} updated account {}", actor.id, target.id);

        Ok(AdminUpdateOutcome {
            user: self.get_user(target.id).await?,
            role_error,
        })
    }

    /// Suspend or restore a user's comment privilege
    pub async fn set_comment_privilege(
        &self,
        actor: &SessionUser,
        target_id: i64,
        can_comment: bool,
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("UPDATE account SET can_comment = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(can_comment)
            .bind(Utc::now())
            .bind(target_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", target_id)));
        }

        let details = if can_comment { "restored" } else { "suspended" };
        audit::record(&mut *tx, actor.id, AuditAction::CommentPrivilege, target_id, Some(details)).await?;

        tx.commit().await?;

        tracing::info!(
            "User {} {} comment privilege of user {}",
            actor.id,
            details,
            target_id
        );

        Ok(())
    }

    /// Delete an account with its comments, favorites and reset tokens
    ///
    /// Accounts that still author articles are refused.
    pub async fn delete_user(&self, actor: &SessionUser, target_id: i64) -> AppResult<()> {
        if actor.id == target_id {
            return Err(AppError::Validation("You cannot delete your own account".to_string()));
        }

        let target = self.get_user(target_id).await?;

        if target.role.manages_all_content() && actor.role != Role::SuperAdmin {
            return Err(AppError::Authorization(
                "Only a super admin can delete admin accounts".to_string(),
            ));
        }

        let article_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article WHERE author_id = ?1")
            .bind(target_id)
            .fetch_one(&self.db)
            .await?;

        if article_count > 0 {
            return Err(AppError::Validation(format!(
                "User still authors {} article(s); delete or reassign them first",
                article_count
            )));
        }

        let mut tx = self.db.begin().await?;

        // Approved comments (and approved replies to them) leave the counters
        sqlx::query(
            r#"
            UPDATE article
            SET comment_count = MAX(comment_count - (
                SELECT COUNT(*) FROM comment c
                WHERE c.article_id = article.id AND c.approved = 1
                  AND (c.author_id = ?1
                       OR c.parent_id IN (SELECT id FROM comment WHERE author_id = ?1))
            ), 0)
            WHERE id IN (SELECT article_id FROM comment WHERE author_id = ?1)
            "#,
        )
        .bind(target_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM comment WHERE parent_id IN (SELECT id FROM comment WHERE author_id = ?1)")
            .bind(target_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM comment WHERE author_id = ?1")
            .bind(target_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM favorite WHERE user_id = ?1")
            .bind(target_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE article_access SET user_id = NULL WHERE user_id = ?1")
            .bind(target_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM password_reset_token WHERE user_id = ?1")
            .bind(target_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM account WHERE id = ?1")
            .bind(target_id)
            .execute(&mut *tx)
            .await?;

        if let Some(image_id) = target.profile_image_id {
            delete_image(&mut *tx, image_id).await?;
        }

        audit::record(&mut *tx, actor.id, AuditAction::UserDelete, target_id, Some(&target.email)).await?;

        tx.commit().await?;

        tracing::info!("User {} deleted account {} ({})", actor.id, target_id, target.email);

        Ok(())
    }

    /// List accounts, newest first
    ///
    /// `q` matches username, email or role as a substring, or the exact id.
    pub async fn list_users(&self, filter: &UserFilter, page_size: i64) -> AppResult<Page<User>> {
        let page = filter.page.unwrap_or(1).max(1);
        let q = validation::non_empty(filter.q.clone());
        let pattern = q.as_deref().map(db::like_pattern);
        let id = q.as_deref().and_then(|q| q.parse::<i64>().ok());
        let role = match validation::non_empty(filter.role.clone()) {
            Some(role) => Some(Role::from_str(&role)?.as_str()),
            None => None,
        };

        let where_clause = r#"
            WHERE (?1 IS NULL
                   OR username LIKE ?1 ESCAPE '\'
                   OR email LIKE ?1 ESCAPE '\'
                   OR role LIKE ?1 ESCAPE '\'
                   OR id = ?2)
              AND (?3 IS NULL OR role = ?3)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM account {}", where_clause))
            .bind(&pattern)
            .bind(id)
            .bind(role)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM account {} ORDER BY created_at DESC, id DESC LIMIT ?4 OFFSET ?5",
            USER_COLUMNS, where_clause
        ))
        .bind(&pattern)
        .bind(id)
        .bind(role)
        .bind(page_size)
        .bind(db::page_offset(page, page_size))
        .fetch_all(&self.db)
        .await?;

        let users = rows.iter().map(User::from_row).collect::<AppResult<Vec<_>>>()?;

        Ok(Page::new(users, page, page_size, total))
    }

    /// Issue a single-use reset token for the account with this email
    ///
    /// Returns `None` for unknown emails; callers answer identically either
    /// way. Earlier unused tokens for the account are invalidated.
    pub async fn issue_password_reset(&self, email: &str) -> AppResult<Option<(User, String)>> {
        let user = match self.find_by_email(&validation::normalize_email(email)).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let now = Utc::now();
        let expires_at = now + Duration::hours(RESET_TOKEN_TTL_HOURS);

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE password_reset_token SET used = 1 WHERE user_id = ?1 AND used = 0")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO password_reset_token (token_hash, user_id, created_at, expires_at, used)
             VALUES (?1, ?2, ?3, ?4, 0)",
        )
        .bind(hash_reset_token(&token))
        .bind(user.id)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Issued password reset token for account {}", user.id);

        Ok(Some((user, token)))
    }

    /// Check that a reset token is usable without consuming it
    pub async fn check_reset_token(&self, token: &str) -> AppResult<i64> {
        let row = sqlx::query(
            "SELECT user_id, expires_at, used FROM password_reset_token WHERE token_hash = ?1",
        )
        .bind(hash_reset_token(token))
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid or expired reset link".to_string()))?;

        let used: bool = row.try_get("used")?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;

        if used || Utc::now() > expires_at {
            return Err(AppError::Validation("Invalid or expired reset link".to_string()));
        }

        Ok(row.try_get("user_id")?)
    }

    /// Reset a password with a token and invalidate existing sessions
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<User> {
        let user_id = self.check_reset_token(token).await?;
        validation::validate_password(new_password)?;
        let password_hash = password::hash_password(new_password)?;

        let mut tx = self.db.begin().await?;

        let consumed = sqlx::query(
            "UPDATE password_reset_token SET used = 1 WHERE token_hash = ?1 AND used = 0",
        )
        .bind(hash_reset_token(token))
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            return Err(AppError::Validation("Invalid or expired reset link".to_string()));
        }

        sqlx::query(
            "UPDATE account
             SET password_hash = ?1, session_version = session_version + 1, updated_at = ?2
             WHERE id = ?3",
        )
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Password reset successful for account {}", user_id);

        self.get_user(user_id).await
    }

    /// Count accounts created since a point in time
    pub async fn count_created_since(&self, since: DateTime<Utc>) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE created_at >= ?1")
            .bind(since)
            .fetch_one(&self.db)
            .await?)
    }

    pub async fn count(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM account")
            .fetch_one(&self.db)
            .await?)
    }
}

#[async_trait]
impl IdentityStore for AccountManager {
    async fn find_identity(&self, user_id: i64) -> AppResult<Option<IdentityRecord>> {
        let row = sqlx::query(
            "SELECT id, username, email, role, can_comment, verified, profile_image_id, session_version
             FROM account WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let role: String = row.try_get("role")?;

        Ok(Some(IdentityRecord {
            user: SessionUser {
                id: row.try_get("id")?,
                username: row.try_get("username")?,
                email: row.try_get("email")?,
                role: Role::from_str(&role)?,
                can_comment: row.try_get("can_comment")?,
                verified: row.try_get("verified")?,
                profile_image_id: row.try_get("profile_image_id")?,
            },
            session_version: row.try_get("session_version")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::{store::png_bytes, ImageUpload};
    use crate::db::memory_pool;
    use crate::test_support::{insert_article, insert_comment, session_user};

    async fn manager() -> AccountManager {
        AccountManager::new(memory_pool().await)
    }

    fn profile(current_password: &str) -> ProfileUpdate {
        ProfileUpdate {
            username: "reader".to_string(),
            current_password: current_password.to_string(),
            ..ProfileUpdate::default()
        }
    }

    fn admin_update(user: &User, role: Role) -> AdminUserUpdate {
        AdminUserUpdate {
            username: user.username.clone(),
            email: user.email.clone(),
            role,
            can_comment: user.can_comment,
            remove_photo: false,
            new_password: None,
        }
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let manager = manager().await;

        let user = manager
            .register(" reader ", "Reader@NewsHub.com", "secret1!")
            .await
            .unwrap();
        assert_eq!(user.username, "reader");
        assert_eq!(user.email, "reader@newshub.com");
        assert_eq!(user.role, Role::Reader);
        assert!(user.can_comment);

        let logged_in = manager.authenticate("reader@newshub.com", "secret1!").await.unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_validation_error() {
        let manager = manager().await;
        manager.register("a", "dup@newshub.com", "secret1!").await.unwrap();

        let err = manager.register("b", "DUP@newshub.com", "secret1!").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_enforces_password_policy() {
        let manager = manager().await;
        assert!(manager.register("a", "a@newshub.com", "weak").await.is_err());
        assert_eq!(manager.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_authenticate_failures_are_generic() {
        let manager = manager().await;
        manager.register("a", "a@newshub.com", "secret1!").await.unwrap();

        let wrong_password = manager.authenticate("a@newshub.com", "wrong1!x").await.unwrap_err();
        let unknown_email = manager.authenticate("b@newshub.com", "secret1!").await.unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AppError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_update_profile_requires_current_password() {
        let manager = manager().await;
        let user = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        let err = manager.update_profile(user.id, profile("nope")).await.unwrap_err();
        assert_eq!(err.to_string(), "Current password is incorrect");
    }

    #[tokio::test]
    async fn test_update_profile_normalizes_contact_fields() {
        let manager = manager().await;
        let user = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        let mut update = profile("secret1!");
        update.username = "New Name".to_string();
        update.phone = Some("11912345678".to_string());
        update.cep = Some("01001000".to_string());
        update.district = Some("  ".to_string());

        let updated = manager.update_profile(user.id, update).await.unwrap();
        assert_eq!(updated.username, "New Name");
        assert_eq!(updated.phone.as_deref(), Some("+55 (11) 91234-5678"));
        assert_eq!(updated.cep.as_deref(), Some("01001-000"));
        assert_eq!(updated.district, None);
        assert_eq!(updated.session_version, user.session_version);
    }

    #[tokio::test]
    async fn test_password_change_bumps_session_version() {
        let manager = manager().await;
        let user = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        let mut update = profile("secret1!");
        update.new_password = Some("better2@".to_string());
        update.confirm_password = Some("better2@".to_string());

        let updated = manager.update_profile(user.id, update).await.unwrap();
        assert_eq!(updated.session_version, user.session_version + 1);
        assert!(manager.authenticate("r@newshub.com", "better2@").await.is_ok());
        assert!(manager.authenticate("r@newshub.com", "secret1!").await.is_err());
    }

    #[tokio::test]
    async fn test_profile_image_replacement_deletes_old_blob() {
        let manager = manager().await;
        let user = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();
        let image = ImageUpload {
            data: png_bytes(),
            mime_type: "image/png".to_string(),
        };

        let mut update = profile("secret1!");
        update.image = Some(image.clone());
        let first = manager.update_profile(user.id, update).await.unwrap();
        let first_image = first.profile_image_id.unwrap();

        let mut update = profile("secret1!");
        update.image = Some(image);
        let second = manager.update_profile(user.id, update).await.unwrap();
        assert_ne!(second.profile_image_id, Some(first_image));

        let images: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM image")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_eq!(images, 1);
    }

    #[tokio::test]
    async fn test_rejected_promotion_still_applies_other_fields() {
        let manager = manager().await;
        let admin = manager
            .create_with_role("admin", "admin@newshub.com", "admin123!", Role::Admin)
            .await
            .unwrap();
        let target = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        let mut update = admin_update(&target, Role::Admin);
        update.username = "renamed".to_string();
        update.email = "renamed@newshub.com".to_string();
        update.can_comment = false;

        let outcome = manager
            .admin_update_user(&session_user(&admin), target.id, update)
            .await
            .unwrap();

        assert!(outcome.role_error.unwrap().contains("super admin"));
        assert_eq!(outcome.user.role, Role::Reader);
        assert_eq!(outcome.user.username, "renamed");
        assert_eq!(outcome.user.email, "renamed@newshub.com");
        assert!(!outcome.user.can_comment);
    }

    #[tokio::test]
    async fn test_super_admin_promotes() {
        let manager = manager().await;
        let root = manager
            .create_with_role("root", "root@newshub.com", "superadmin1!", Role::SuperAdmin)
            .await
            .unwrap();
        let target = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        let outcome = manager
            .admin_update_user(&session_user(&root), target.id, admin_update(&target, Role::Admin))
            .await
            .unwrap();
        assert!(outcome.role_error.is_none());
        assert_eq!(outcome.user.role, Role::Admin);

        let roles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE action = 'user.role'")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_eq!(roles, 1);
    }

    #[tokio::test]
    async fn test_admin_cannot_change_super_admin_credentials() {
        let manager = manager().await;
        let admin = manager
            .create_with_role("admin", "admin@newshub.com", "admin123!", Role::Admin)
            .await
            .unwrap();
        let root = manager
            .create_with_role("root", "root@newshub.com", "superadmin1!", Role::SuperAdmin)
            .await
            .unwrap();

        let mut update = admin_update(&root, Role::SuperAdmin);
        update.new_password = Some("Owned#2024".to_string());
        let err = manager
            .admin_update_user(&session_user(&admin), root.id, update)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut update = admin_update(&root, Role::SuperAdmin);
        update.email = "takeover@newshub.com".to_string();
        assert!(manager
            .admin_update_user(&session_user(&admin), root.id, update)
            .await
            .is_err());

        assert!(manager.authenticate("root@newshub.com", "Owned#2024").await.is_err());
        assert!(manager.authenticate("root@newshub.com", "superadmin1!").await.is_ok());

        // A rename without credential changes still goes through
        let mut update = admin_update(&root, Role::SuperAdmin);
        update.username = "rootuser".to_string();
        let outcome = manager
            .admin_update_user(&session_user(&admin), root.id, update)
            .await
            .unwrap();
        assert_eq!(outcome.user.username, "rootuser");
    }

    #[tokio::test]
    async fn test_admin_update_rejects_taken_email() {
        let manager = manager().await;
        let admin = manager
            .create_with_role("admin", "admin@newshub.com", "admin123!", Role::Admin)
            .await
            .unwrap();
        let target = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        let mut update = admin_update(&target, Role::Reader);
        update.email = "admin@newshub.com".to_string();

        let err = manager
            .admin_update_user(&session_user(&admin), target.id, update)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_identity_store_reads_current_role() {
        let manager = manager().await;
        let root = manager
            .create_with_role("root", "root@newshub.com", "superadmin1!", Role::SuperAdmin)
            .await
            .unwrap();
        let target = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        let before = manager.find_identity(target.id).await.unwrap().unwrap();
        assert_eq!(before.user.role, Role::Reader);

        manager
            .admin_update_user(&session_user(&root), target.id, admin_update(&target, Role::Editor))
            .await
            .unwrap();

        let after = manager.find_identity(target.id).await.unwrap().unwrap();
        assert_eq!(after.user.role, Role::Editor);
        assert!(manager.find_identity(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_comment_privilege_toggle_is_audited() {
        let manager = manager().await;
        let admin = manager
            .create_with_role("admin", "admin@newshub.com", "admin123!", Role::Admin)
            .await
            .unwrap();
        let target = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        manager
            .set_comment_privilege(&session_user(&admin), target.id, false)
            .await
            .unwrap();
        assert!(!manager.get_user(target.id).await.unwrap().can_comment);

        let details: String = sqlx::query_scalar(
            "SELECT details FROM audit_log WHERE action = 'user.comment_privilege'",
        )
        .fetch_one(&manager.db)
        .await
        .unwrap();
        assert_eq!(details, "suspended");

        assert!(matches!(
            manager.set_comment_privilege(&session_user(&admin), 9999, true).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_user_removes_comments_and_counters() {
        let manager = manager().await;
        let root = manager
            .create_with_role("root", "root@newshub.com", "superadmin1!", Role::SuperAdmin)
            .await
            .unwrap();
        let target = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();
        let other = manager.register("other", "o@newshub.com", "secret1!").await.unwrap();

        let article = insert_article(&manager.db, root.id, "Story", true).await;
        let parent = insert_comment(&manager.db, article, target.id, None, true).await;
        insert_comment(&manager.db, article, other.id, Some(parent), true).await;
        insert_comment(&manager.db, article, other.id, None, true).await;
        sqlx::query("UPDATE article SET comment_count = 3 WHERE id = ?1")
            .bind(article)
            .execute(&manager.db)
            .await
            .unwrap();

        manager.delete_user(&session_user(&root), target.id).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT comment_count FROM article WHERE id = ?1")
            .bind(article)
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comment")
            .fetch_one(&manager.db)
            .await
            .unwrap();
        assert_eq!(comments, 1);
        assert!(matches!(manager.get_user(target.id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_user_guards() {
        let manager = manager().await;
        let admin = manager
            .create_with_role("admin", "admin@newshub.com", "admin123!", Role::Admin)
            .await
            .unwrap();
        let other_admin = manager
            .create_with_role("admin2", "admin2@newshub.com", "admin123!", Role::Admin)
            .await
            .unwrap();
        let editor = manager
            .create_with_role("editor", "editor@newshub.com", "editor123!", Role::Editor)
            .await
            .unwrap();
        insert_article(&manager.db, editor.id, "Owned", false).await;

        let actor = session_user(&admin);
        assert!(matches!(
            manager.delete_user(&actor, admin.id).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            manager.delete_user(&actor, other_admin.id).await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            manager.delete_user(&actor, editor.id).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_users_search_and_pagination() {
        let manager = manager().await;
        for i in 0..25 {
            manager
                .register(&format!("user{:02}", i), &format!("user{:02}@newshub.com", i), "secret1!")
                .await
                .unwrap();
        }
        manager
            .create_with_role("chief", "chief@newshub.com", "editor123!", Role::Editor)
            .await
            .unwrap();

        let first = manager.list_users(&UserFilter::default(), 20).await.unwrap();
        assert_eq!(first.total, 26);
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.pages, 2);

        let second = manager
            .list_users(&UserFilter { page: Some(2), ..UserFilter::default() }, 20)
            .await
            .unwrap();
        assert_eq!(second.items.len(), 6);

        let search = manager
            .list_users(&UserFilter { q: Some("USER1".into()), ..UserFilter::default() }, 20)
            .await
            .unwrap();
        assert_eq!(search.total, 10);

        let editors = manager
            .list_users(&UserFilter { role: Some("editor".into()), ..UserFilter::default() }, 20)
            .await
            .unwrap();
        assert_eq!(editors.total, 1);
        assert_eq!(editors.items[0].username, "chief");

        let by_id = manager
            .list_users(
                &UserFilter { q: Some(editors.items[0].id.to_string()), ..UserFilter::default() },
                20,
            )
            .await
            .unwrap();
        assert!(by_id.items.iter().any(|u| u.username == "chief"));

        // LIKE wildcards are literal
        let wildcard = manager
            .list_users(&UserFilter { q: Some("%".into()), ..UserFilter::default() }, 20)
            .await
            .unwrap();
        assert_eq!(wildcard.total, 0);
    }

    #[tokio::test]
    async fn test_password_reset_lifecycle() {
        let manager = manager().await;
        let user = manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        assert!(manager.issue_password_reset("nobody@newshub.com").await.unwrap().is_none());

        let (_, token) = manager.issue_password_reset("r@newshub.com").await.unwrap().unwrap();
        assert_eq!(manager.check_reset_token(&token).await.unwrap(), user.id);

        // weak passwords do not consume the token
        assert!(manager.reset_password(&token, "weak").await.is_err());

        let reset = manager.reset_password(&token, "fresh3#pw").await.unwrap();
        assert_eq!(reset.session_version, user.session_version + 1);
        assert!(manager.authenticate("r@newshub.com", "fresh3#pw").await.is_ok());

        // single use
        assert!(manager.reset_password(&token, "again4$pw").await.is_err());
    }

    #[tokio::test]
    async fn test_new_reset_token_invalidates_previous() {
        let manager = manager().await;
        manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();

        let (_, first) = manager.issue_password_reset("r@newshub.com").await.unwrap().unwrap();
        let (_, second) = manager.issue_password_reset("r@newshub.com").await.unwrap().unwrap();

        assert!(manager.check_reset_token(&first).await.is_err());
        assert!(manager.check_reset_token(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let manager = manager().await;
        manager.register("reader", "r@newshub.com", "secret1!").await.unwrap();
        let (_, token) = manager.issue_password_reset("r@newshub.com").await.unwrap().unwrap();

        sqlx::query("UPDATE password_reset_token SET expires_at = ?1")
            .bind(Utc::now() - Duration::minutes(1))
            .execute(&manager.db)
            .await
            .unwrap();

        assert!(manager.check_reset_token(&token).await.is_err());
    }
}
