/// Staff action audit log
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};

/// Audited staff actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    CommentApprove,
    CommentReject,
    CommentDelete,
    CommentPrivilege,
    UserUpdate,
    RoleChange,
    UserDelete,
    ArticleDelete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CommentApprove => "comment.approve",
            AuditAction::CommentReject => "comment.reject",
            AuditAction::CommentDelete => "comment.delete",
            AuditAction::CommentPrivilege => "user.comment_privilege",
            AuditAction::UserUpdate => "user.update",
            AuditAction::RoleChange => "user.role",
            AuditAction::UserDelete => "user.delete",
            AuditAction::ArticleDelete => "article.delete",
        }
    }

    fn subject_type(&self) -> &'static str {
        match self {
            AuditAction::CommentApprove | AuditAction::CommentReject | AuditAction::CommentDelete => {
                "comment"
            }
            AuditAction::ArticleDelete => "article",
            _ => "user",
        }
    }
}

/// Audit log entry joined with the actor's name
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub actor_id: i64,
    pub actor_name: Option<String>,
    pub action: String,
    pub subject_type: String,
    pub subject_id: Option<i64>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Record an action on the caller's connection, usually inside the
/// transaction performing it
pub async fn record(
    conn: &mut SqliteConnection,
    actor_id: i64,
    action: AuditAction,
    subject_id: i64,
    details: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (actor_id, action, subject_type, subject_id, details, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(actor_id)
    .bind(action.as_str())
    .bind(action.subject_type())
    .bind(subject_id)
    .bind(details)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        "Audit: user {} {} {} {}",
        actor_id,
        action.as_str(),
        action.subject_type(),
        subject_id
    );

    Ok(())
}

/// Read access to the audit log
#[derive(Clone)]
pub struct AuditLog {
    db: SqlitePool,
}

impl AuditLog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Most recent entries first
    pub async fn recent(&self, limit: i64) -> AppResult<Vec<AuditLogEntry>> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT l.id, l.actor_id, a.username AS actor_name, l.action, l.subject_type,
                   l.subject_id, l.details, l.created_at
            FROM audit_log l
            LEFT JOIN account a ON a.id = l.actor_id
            ORDER BY l.created_at DESC, l.id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    /// Entries about one subject, oldest first
    pub async fn for_subject(&self, subject_type: &str, subject_id: i64) -> AppResult<Vec<AuditLogEntry>> {
        let entries = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT l.id, l.actor_id, a.username AS actor_name, l.action, l.subject_type,
                   l.subject_id, l.details, l.created_at
            FROM audit_log l
            LEFT JOIN account a ON a.id = l.actor_id
            WHERE l.subject_type = ?1 AND l.subject_id = ?2
            ORDER BY l.id ASC
            "#,
        )
        .bind(subject_type)
        .bind(subject_id)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let pool = memory_pool().await;
        let log = AuditLog::new(pool.clone());

        let mut conn = pool.acquire().await.unwrap();
        record(&mut *conn, 1, AuditAction::CommentApprove, 10, None).await.unwrap();
        record(&mut *conn, 1, AuditAction::RoleChange, 2, Some("reader -> editor"))
            .await
            .unwrap();
        drop(conn);

        let recent = log.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "user.role");
        assert_eq!(recent[0].subject_type, "user");
        assert_eq!(recent[0].details.as_deref(), Some("reader -> editor"));
        // actor no longer exists, name is absent
        assert!(recent[0].actor_name.is_none());

        let about_comment = log.for_subject("comment", 10).await.unwrap();
        assert_eq!(about_comment.len(), 1);
        assert_eq!(about_comment[0].action, "comment.approve");
    }
}
