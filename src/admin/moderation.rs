/// Comment submission and moderation
///
/// Comments start pending and become visible once staff approve them.
/// `article.comment_count` is adjusted in the same transaction as the
/// comment write:
///
/// - submitting increments it
/// - rejecting an approved comment decrements it, rejecting a pending one
///   does not
/// - deleting approved comments decrements it once per approved row
///
/// The counter never drops below zero.
use crate::{
    admin::audit::{self, AuditAction},
    db::{
        self,
        content::{Comment, CommentThread, CommentView, QueuedComment},
        Page,
    },
    error::{AppError, AppResult},
    identity::SessionUser,
    validation,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

const FLAG_REASON_MAX_LENGTH: usize = 500;

const COMMENT_COLUMNS: &str = "id, article_id, author_id, parent_id, body, approved, flagged, \
    flag_reason, edited, edited_at, upvotes, downvotes, created_at";

/// Vote direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteKind {
    Up,
    Down,
}

impl VoteKind {
    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "upvote" => Ok(VoteKind::Up),
            "downvote" => Ok(VoteKind::Down),
            _ => Err(AppError::Validation(format!("Invalid vote type: {}", s))),
        }
    }
}

/// Vote totals after a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteTotals {
    pub upvotes: i64,
    pub downvotes: i64,
}

/// Moderation queue filter; blank values mean "any"
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentFilter {
    pub approved: Option<String>,
    pub flagged: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
}

/// Parse a tri-state query flag
pub fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value.map(str::trim) {
        Some("true") | Some("1") | Some("yes") => Some(true),
        Some("false") | Some("0") | Some("no") => Some(false),
        _ => None,
    }
}

/// Comment manager
#[derive(Clone)]
pub struct CommentManager {
    db: SqlitePool,
    min_length: usize,
}

impl CommentManager {
    pub fn new(db: SqlitePool, min_length: usize) -> Self {
        Self { db, min_length }
    }

    /// Get a comment by id
    pub async fn get(&self, id: i64) -> AppResult<Comment> {
        sqlx::query_as::<_, Comment>(&format!("SELECT {} FROM comment WHERE id = ?1", COMMENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))
    }

    /// Submit a pending comment
    pub async fn submit(
        &self,
        author: &SessionUser,
        article_id: i64,
        body: &str,
        parent_id: Option<i64>,
    ) -> AppResult<Comment> {
        let not_found = || AppError::NotFound(format!("Article {} not found", article_id));

        let article = sqlx::query("SELECT published, comments_enabled FROM article WHERE id = ?1")
            .bind(article_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(not_found)?;

        let published: bool = article.try_get("published")?;
        if !published {
            return Err(not_found());
        }

        let comments_enabled: bool = article.try_get("comments_enabled")?;
        if !comments_enabled {
            return Err(AppError::Validation(
                "Comments are disabled for this article".to_string(),
            ));
        }

        if !author.can_comment {
            return Err(AppError::CommentingSuspended(
                "Your comment privilege has been suspended".to_string(),
            ));
        }

        let body = validation::validate_comment_body(body, self.min_length)?;

        if let Some(parent_id) = parent_id {
            let parent = self.get(parent_id).await.map_err(|e| match e {
                AppError::NotFound(_) => AppError::Validation("Parent comment not found".to_string()),
                other => other,
            })?;

            if parent.article_id != article_id {
                return Err(AppError::Validation(
                    "Parent comment belongs to another article".to_string(),
                ));
            }
            if parent.parent_id.is_some() {
                return Err(AppError::Validation("Replies cannot be nested".to_string()));
            }
        }

        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "INSERT INTO comment (article_id, author_id, parent_id, body, approved, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        )
        .bind(article_id)
        .bind(author.id)
        .bind(parent_id)
        .bind(&body)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE article SET comment_count = comment_count + 1 WHERE id = ?1")
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let id = result.last_insert_rowid();
        tracing::info!("User {} submitted comment {} on article {}", author.id, id, article_id);

        self.get(id).await
    }

    /// Edit a comment's body; the comment returns to pending
    pub async fn edit(&self, actor: &SessionUser, comment_id: i64, body: &str) -> AppResult<Comment> {
        let comment = self.get(comment_id).await?;

        if comment.author_id != actor.id && !actor.is_admin() {
            return Err(AppError::Authorization(format!(
                "User {} cannot edit comment {}",
                actor.id, comment_id
            )));
        }

        let body = validation::validate_comment_body(body, self.min_length)?;

        sqlx::query(
            "UPDATE comment SET body = ?1, approved = 0, edited = 1, edited_at = ?2 WHERE id = ?3",
        )
        .bind(&body)
        .bind(Utc::now())
        .bind(comment_id)
        .execute(&self.db)
        .await?;

        tracing::info!("User {} edited comment {}", actor.id, comment_id);

        self.get(comment_id).await
    }

    /// Flag a comment for staff review
    pub async fn flag(&self, actor: &SessionUser, comment_id: i64, reason: &str) -> AppResult<Comment> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation("A reason is required to flag a comment".to_string()));
        }
        if reason.chars().count() > FLAG_REASON_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "Reason cannot exceed {} characters",
                FLAG_REASON_MAX_LENGTH
            )));
        }

        let result = sqlx::query("UPDATE comment SET flagged = 1, flag_reason = ?1 WHERE id = ?2")
            .bind(reason)
            .bind(comment_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {} not found", comment_id)));
        }

        tracing::info!("User {} flagged comment {}", actor.id, comment_id);

        self.get(comment_id).await
    }

    /// Count a vote
    pub async fn vote(&self, comment_id: i64, kind: VoteKind) -> AppResult<VoteTotals> {
        let sql = match kind {
            VoteKind::Up => "UPDATE comment SET upvotes = upvotes + 1 WHERE id = ?1 AND approved = 1",
            VoteKind::Down => {
                "UPDATE comment SET downvotes = downvotes + 1 WHERE id = ?1 AND approved = 1"
            }
        };

        let result = sqlx::query(sql).bind(comment_id).execute(&self.db).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {} not found", comment_id)));
        }

        let comment = self.get(comment_id).await?;
        Ok(VoteTotals {
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
        })
    }

    /// Approve or reject a comment; either way the flag is cleared
    pub async fn moderate(&self, actor: &SessionUser, comment_id: i64, approve: bool) -> AppResult<Comment> {
        let comment = self.get(comment_id).await?;

        let mut tx = self.db.begin().await?;

        if approve {
            sqlx::query("UPDATE comment SET approved = 1, flagged = 0, flag_reason = NULL WHERE id = ?1")
                .bind(comment_id)
                .execute(&mut *tx)
                .await?;
        } else {
            // Only the statement that actually flips approved 1 -> 0 may decrement
            let demoted = sqlx::query(
                "UPDATE comment SET approved = 0, flagged = 0, flag_reason = NULL WHERE id = ?1 AND approved = 1",
            )
            .bind(comment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
                == 1;

            if demoted {
                sqlx::query("UPDATE article SET comment_count = MAX(comment_count - 1, 0) WHERE id = ?1")
                    .bind(comment.article_id)
                    .execute(&mut *tx)
                    .await?;
            } else {
                sqlx::query("UPDATE comment SET flagged = 0, flag_reason = NULL WHERE id = ?1")
                    .bind(comment_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let action = if approve {
            AuditAction::CommentApprove
        } else {
            AuditAction::CommentReject
        };
        audit::record(&mut *tx, actor.id, action, comment_id, None).await?;

        tx.commit().await?;

        tracing::info!(
            "User {} {} comment {}",
            actor.id,
            if approve { "approved" } else { "rejected" },
            comment_id
        );

        self.get(comment_id).await
    }

    /// Delete a comment together with its replies
    pub async fn delete(&self, actor: &SessionUser, comment_id: i64) -> AppResult<()> {
        let comment = self.get(comment_id).await?;

        let mut tx = self.db.begin().await?;

        // Approved rows are counted by the deletes themselves
        let approved_replies = sqlx::query("DELETE FROM comment WHERE parent_id = ?1 AND approved = 1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM comment WHERE parent_id = ?1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        let approved_self = sqlx::query("DELETE FROM comment WHERE id = ?1 AND approved = 1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let pending_self = sqlx::query("DELETE FROM comment WHERE id = ?1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if approved_self + pending_self == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Comment {} not found", comment_id)));
        }

        let removed_approved = (approved_replies + approved_self) as i64;
        if removed_approved > 0 {
            sqlx::query("UPDATE article SET comment_count = MAX(comment_count - ?1, 0) WHERE id = ?2")
                .bind(removed_approved)
                .bind(comment.article_id)
                .execute(&mut *tx)
                .await?;
        }

        audit::record(&mut *tx, actor.id, AuditAction::CommentDelete, comment_id, None).await?;

        tx.commit().await?;

        tracing::info!("User {} deleted comment {}", actor.id, comment_id);

        Ok(())
    }

    /// Approved comments of an article: top level newest first, replies
    /// oldest first
    pub async fn threads(&self, article_id: i64) -> AppResult<Vec<CommentThread>> {
        let comments = sqlx::query_as::<_, CommentView>(
            r#"
            SELECT c.id, c.parent_id, c.author_id, a.username AS author_name,
                   a.profile_image_id AS author_image_id, c.body, c.edited,
                   c.upvotes, c.downvotes, c.created_at
            FROM comment c
            JOIN account a ON a.id = c.author_id
            WHERE c.article_id = ?1 AND c.approved = 1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.db)
        .await?;

        let (top_level, replies): (Vec<_>, Vec<_>) =
            comments.into_iter().partition(|c| c.parent_id.is_none());

        let mut threads: Vec<CommentThread> = top_level
            .into_iter()
            .rev()
            .map(|comment| CommentThread {
                comment,
                replies: Vec::new(),
            })
            .collect();

        for reply in replies {
            if let Some(thread) = threads
                .iter_mut()
                .find(|t| Some(t.comment.id) == reply.parent_id)
            {
                thread.replies.push(reply);
            }
        }

        Ok(threads)
    }

    /// Moderation queue, newest first
    pub async fn queue(&self, filter: &CommentFilter, page_size: i64) -> AppResult<Page<QueuedComment>> {
        let page = filter.page.unwrap_or(1).max(1);
        let approved = parse_flag(filter.approved.as_deref());
        let flagged = parse_flag(filter.flagged.as_deref());
        let pattern = validation::non_empty(filter.q.clone()).map(|q| db::like_pattern(&q));

        let where_clause = r#"
            WHERE (?1 IS NULL OR c.approved = ?1)
              AND (?2 IS NULL OR c.flagged = ?2)
              AND (?3 IS NULL
                   OR c.body LIKE ?3 ESCAPE '\'
                   OR a.username LIKE ?3 ESCAPE '\'
                   OR ar.title LIKE ?3 ESCAPE '\')
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM comment c
             JOIN account a ON a.id = c.author_id
             JOIN article ar ON ar.id = c.article_id
             {}",
            where_clause
        ))
        .bind(approved)
        .bind(flagged)
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        let items = sqlx::query_as::<_, QueuedComment>(&format!(
            r#"
            SELECT c.id, c.body, c.approved, c.flagged, c.flag_reason, c.edited, c.created_at,
                   c.author_id, a.username AS author_name, a.email AS author_email,
                   c.article_id, ar.title AS article_title, ar.slug AS article_slug
            FROM comment c
            JOIN account a ON a.id = c.author_id
            JOIN article ar ON ar.id = c.article_id
            {}
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT ?4 OFFSET ?5
            "#,
            where_clause
        ))
        .bind(approved)
        .bind(flagged)
        .bind(&pattern)
        .bind(page_size)
        .bind(db::page_offset(page, page_size))
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(items, page, page_size, total))
    }

    pub async fn pending_count(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM comment WHERE approved = 0")
            .fetch_one(&self.db)
            .await?)
    }

    pub async fn flagged_count(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM comment WHERE flagged = 1")
            .fetch_one(&self.db)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::Role;
    use crate::db::memory_pool;
    use crate::test_support::{insert_article, insert_comment, insert_user};

    struct Fixture {
        manager: CommentManager,
        pool: SqlitePool,
        reader: SessionUser,
        editor: SessionUser,
        article: i64,
    }

    fn actor(id: i64, role: Role) -> SessionUser {
        SessionUser {
            id,
            username: format!("user{}", id),
            email: format!("user{}@newshub.com", id),
            role,
            can_comment: true,
            verified: true,
            profile_image_id: None,
        }
    }

    async fn fixture() -> Fixture {
        let pool = memory_pool().await;
        let reader = insert_user(&pool, "reader", Role::Reader).await;
        let editor = insert_user(&pool, "editor", Role::Editor).await;
        let article = insert_article(&pool, editor, "Story", true).await;

        Fixture {
            manager: CommentManager::new(pool.clone(), 2),
            pool,
            reader: actor(reader, Role::Reader),
            editor: actor(editor, Role::Editor),
            article,
        }
    }

    async fn comment_count(pool: &SqlitePool, article: i64) -> i64 {
        sqlx::query_scalar("SELECT comment_count FROM article WHERE id = ?1")
            .bind(article)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn comment_rows(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM comment")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_is_pending_and_counts() {
        let f = fixture().await;

        let comment = f.manager.submit(&f.reader, f.article, "  Nice read  ", None).await.unwrap();
        assert!(!comment.approved);
        assert_eq!(comment.body, "Nice read");
        assert_eq!(comment_count(&f.pool, f.article).await, 1);

        // pending comments are hidden
        assert!(f.manager.threads(f.article).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_suspended_author_cannot_comment() {
        let f = fixture().await;
        let mut suspended = f.reader.clone();
        suspended.can_comment = false;

        let err = f.manager.submit(&suspended, f.article, "Hello", None).await.unwrap_err();
        assert!(matches!(err, AppError::CommentingSuspended(_)));
        assert_eq!(comment_rows(&f.pool).await, 0);
        assert_eq!(comment_count(&f.pool, f.article).await, 0);
    }

    #[tokio::test]
    async fn test_submit_rejections_leave_no_trace() {
        let f = fixture().await;
        let draft = insert_article(&f.pool, f.editor.id, "Draft", false).await;

        assert!(matches!(
            f.manager.submit(&f.reader, draft, "Hello", None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.manager.submit(&f.reader, 9999, "Hello", None).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            f.manager.submit(&f.reader, f.article, "  x ", None).await,
            Err(AppError::Validation(_))
        ));

        sqlx::query("UPDATE article SET comments_enabled = 0 WHERE id = ?1")
            .bind(f.article)
            .execute(&f.pool)
            .await
            .unwrap();
        assert!(matches!(
            f.manager.submit(&f.reader, f.article, "Hello", None).await,
            Err(AppError::Validation(_))
        ));

        assert_eq!(comment_rows(&f.pool).await, 0);
        assert_eq!(comment_count(&f.pool, f.article).await, 0);
    }

    #[tokio::test]
    async fn test_reply_parent_rules() {
        let f = fixture().await;
        let other = insert_article(&f.pool, f.editor.id, "Other", true).await;
        let parent = insert_comment(&f.pool, f.article, f.reader.id, None, true).await;
        let reply = insert_comment(&f.pool, f.article, f.reader.id, Some(parent), true).await;

        assert!(f.manager.submit(&f.reader, f.article, "Reply", Some(parent)).await.is_ok());
        assert!(f.manager.submit(&f.reader, f.article, "Nested", Some(reply)).await.is_err());
        assert!(f.manager.submit(&f.reader, other, "Elsewhere", Some(parent)).await.is_err());
        assert!(f.manager.submit(&f.reader, f.article, "Missing", Some(9999)).await.is_err());
    }

    #[tokio::test]
    async fn test_reject_pending_twice_never_decrements() {
        let f = fixture().await;
        let comment = f.manager.submit(&f.reader, f.article, "Hello", None).await.unwrap();

        f.manager.moderate(&f.editor, comment.id, false).await.unwrap();
        f.manager.moderate(&f.editor, comment.id, false).await.unwrap();

        assert_eq!(comment_count(&f.pool, f.article).await, 1);
    }

    #[tokio::test]
    async fn test_reject_approved_decrements_once() {
        let f = fixture().await;
        let comment = f.manager.submit(&f.reader, f.article, "Hello", None).await.unwrap();

        f.manager.moderate(&f.editor, comment.id, true).await.unwrap();
        f.manager.moderate(&f.editor, comment.id, false).await.unwrap();
        f.manager.moderate(&f.editor, comment.id, false).await.unwrap();

        assert_eq!(comment_count(&f.pool, f.article).await, 0);
    }

    #[tokio::test]
    async fn test_counter_never_negative() {
        let f = fixture().await;
        let comment = insert_comment(&f.pool, f.article, f.reader.id, None, true).await;

        // counter is already zero
        f.manager.moderate(&f.editor, comment, false).await.unwrap();
        assert_eq!(comment_count(&f.pool, f.article).await, 0);

        let other = insert_comment(&f.pool, f.article, f.reader.id, None, true).await;
        f.manager.delete(&f.editor, other).await.unwrap();
        assert_eq!(comment_count(&f.pool, f.article).await, 0);
    }

    #[tokio::test]
    async fn test_moderation_clears_flag_and_audits() {
        let f = fixture().await;
        let comment = f.manager.submit(&f.reader, f.article, "Hello", None).await.unwrap();

        let flagged = f.manager.flag(&f.reader, comment.id, "spam").await.unwrap();
        assert!(flagged.flagged);
        assert_eq!(flagged.flag_reason.as_deref(), Some("spam"));
        assert_eq!(f.manager.flagged_count().await.unwrap(), 1);

        let approved = f.manager.moderate(&f.editor, comment.id, true).await.unwrap();
        assert!(approved.approved);
        assert!(!approved.flagged);
        assert!(approved.flag_reason.is_none());

        let audited: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_log WHERE action = 'comment.approve' AND subject_id = ?1",
        )
        .bind(comment.id)
        .fetch_one(&f.pool)
        .await
        .unwrap();
        assert_eq!(audited, 1);
    }

    #[tokio::test]
    async fn test_flag_requires_reason() {
        let f = fixture().await;
        let comment = f.manager.submit(&f.reader, f.article, "Hello", None).await.unwrap();

        assert!(matches!(
            f.manager.flag(&f.reader, comment.id, "   ").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            f.manager.flag(&f.reader, 9999, "spam").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_edit_resets_to_pending_and_hides() {
        let f = fixture().await;
        let comment = f.manager.submit(&f.reader, f.article, "Hello", None).await.unwrap();
        f.manager.moderate(&f.editor, comment.id, true).await.unwrap();
        assert_eq!(f.manager.threads(f.article).await.unwrap().len(), 1);

        let edited = f.manager.edit(&f.reader, comment.id, "Hello again").await.unwrap();
        assert!(!edited.approved);
        assert!(edited.edited);
        assert!(edited.edited_at.is_some());
        assert!(f.manager.threads(f.article).await.unwrap().is_empty());
        assert_eq!(comment_count(&f.pool, f.article).await, 1);
    }

    #[tokio::test]
    async fn test_edit_permissions() {
        let f = fixture().await;
        let comment = f.manager.submit(&f.reader, f.article, "Hello", None).await.unwrap();

        // editors moderate but do not edit other people's words
        assert!(matches!(
            f.manager.edit(&f.editor, comment.id, "Changed").await,
            Err(AppError::Authorization(_))
        ));

        let admin = actor(insert_user(&f.pool, "admin", Role::Admin).await, Role::Admin);
        assert!(f.manager.edit(&admin, comment.id, "Changed").await.is_ok());
    }

    #[tokio::test]
    async fn test_vote_counts() {
        let f = fixture().await;
        let comment = insert_comment(&f.pool, f.article, f.reader.id, None, true).await;

        f.manager.vote(comment, VoteKind::Up).await.unwrap();
        f.manager.vote(comment, VoteKind::Up).await.unwrap();
        let totals = f.manager.vote(comment, VoteKind::Down).await.unwrap();
        assert_eq!(totals, VoteTotals { upvotes: 2, downvotes: 1 });

        let pending = insert_comment(&f.pool, f.article, f.reader.id, None, false).await;
        assert!(matches!(
            f.manager.vote(pending, VoteKind::Up).await,
            Err(AppError::NotFound(_))
        ));
        assert!(VoteKind::from_str("sideways").is_err());
    }

    async fn file_pool(dir: &tempfile::TempDir) -> SqlitePool {
        let pool = db::create_pool(&dir.path().join("newshub.sqlite"), db::DatabaseOptions::default())
            .await
            .unwrap();
        db::run_migrations(&pool).await.unwrap();
        pool
    }

    async fn set_comment_count(pool: &SqlitePool, article: i64, count: i64) {
        sqlx::query("UPDATE article SET comment_count = ?1 WHERE id = ?2")
            .bind(count)
            .bind(article)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_rejects_decrement_once() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir).await;
        let manager = CommentManager::new(pool.clone(), 2);
        let reader = insert_user(&pool, "reader", Role::Reader).await;
        let editor = actor(insert_user(&pool, "editor", Role::Editor).await, Role::Editor);

        for i in 0..10 {
            let article = insert_article(&pool, editor.id, &format!("Story {}", i), true).await;
            let first = insert_comment(&pool, article, reader, None, true).await;
            insert_comment(&pool, article, reader, None, true).await;
            set_comment_count(&pool, article, 2).await;

            let (a, b) = tokio::join!(
                manager.moderate(&editor, first, false),
                manager.moderate(&editor, first, false)
            );
            a.unwrap();
            b.unwrap();

            assert_eq!(comment_count(&pool, article).await, 1);
        }
    }

    #[tokio::test]
    async fn test_concurrent_deletes_decrement_once() {
        let dir = tempfile::tempdir().unwrap();
        let pool = file_pool(&dir).await;
        let manager = CommentManager::new(pool.clone(), 2);
        let reader = insert_user(&pool, "reader", Role::Reader).await;
        let editor = actor(insert_user(&pool, "editor", Role::Editor).await, Role::Editor);

        let article = insert_article(&pool, editor.id, "Story", true).await;
        let first = insert_comment(&pool, article, reader, None, true).await;
        insert_comment(&pool, article, reader, Some(first), true).await;
        insert_comment(&pool, article, reader, None, true).await;
        set_comment_count(&pool, article, 3).await;

        let (a, b) = tokio::join!(manager.delete(&editor, first), manager.delete(&editor, first));
        assert!(a.is_ok() || b.is_ok());

        assert_eq!(comment_count(&pool, article).await, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_replies_and_adjusts_counter() {
        let f = fixture().await;
        let parent = f.manager.submit(&f.reader, f.article, "Parent", None).await.unwrap();
        let reply = f.manager.submit(&f.reader, f.article, "Reply", Some(parent.id)).await.unwrap();
        let pending_reply = f.manager.submit(&f.reader, f.article, "Later", Some(parent.id)).await.unwrap();
        f.manager.moderate(&f.editor, parent.id, true).await.unwrap();
        f.manager.moderate(&f.editor, reply.id, true).await.unwrap();
        assert_eq!(comment_count(&f.pool, f.article).await, 3);

        f.manager.delete(&f.editor, parent.id).await.unwrap();

        assert_eq!(comment_rows(&f.pool).await, 0);
        assert!(matches!(f.manager.get(pending_reply.id).await, Err(AppError::NotFound(_))));
        assert_eq!(comment_count(&f.pool, f.article).await, 1);
    }

    #[tokio::test]
    async fn test_threads_ordering() {
        let f = fixture().await;
        let first = insert_comment(&f.pool, f.article, f.reader.id, None, true).await;
        let second = insert_comment(&f.pool, f.article, f.reader.id, None, true).await;
        let reply_a = insert_comment(&f.pool, f.article, f.editor.id, Some(first), true).await;
        let reply_b = insert_comment(&f.pool, f.article, f.editor.id, Some(first), true).await;
        insert_comment(&f.pool, f.article, f.editor.id, Some(first), false).await;

        let threads = f.manager.threads(f.article).await.unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].comment.id, second);
        assert_eq!(threads[1].comment.id, first);
        let reply_ids: Vec<i64> = threads[1].replies.iter().map(|r| r.id).collect();
        assert_eq!(reply_ids, vec![reply_a, reply_b]);
        assert_eq!(threads[1].replies[0].author_name, "editor");
    }

    #[tokio::test]
    async fn test_queue_filters() {
        let f = fixture().await;
        for i in 0..22 {
            insert_comment(&f.pool, f.article, f.reader.id, None, i % 2 == 0).await;
        }
        let special = f.manager.submit(&f.reader, f.article, "Needle in haystack", None).await.unwrap();
        f.manager.flag(&f.reader, special.id, "rude").await.unwrap();

        let all = f.manager.queue(&CommentFilter::default(), 20).await.unwrap();
        assert_eq!(all.total, 23);
        assert_eq!(all.items.len(), 20);
        assert_eq!(all.items[0].id, special.id);

        let pending = f
            .manager
            .queue(&CommentFilter { approved: Some("false".into()), ..Default::default() }, 20)
            .await
            .unwrap();
        assert_eq!(pending.total, 12);
        assert_eq!(f.manager.pending_count().await.unwrap(), 12);

        let flagged = f
            .manager
            .queue(&CommentFilter { flagged: Some("true".into()), ..Default::default() }, 20)
            .await
            .unwrap();
        assert_eq!(flagged.total, 1);
        assert_eq!(flagged.items[0].flag_reason.as_deref(), Some("rude"));

        let search = f
            .manager
            .queue(&CommentFilter { q: Some("needle".into()), approved: Some("".into()), ..Default::default() }, 20)
            .await
            .unwrap();
        assert_eq!(search.total, 1);
        assert_eq!(search.items[0].article_title, "Story");
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(Some("true")), Some(true));
        assert_eq!(parse_flag(Some("0")), Some(false));
        assert_eq!(parse_flag(Some("")), None);
        assert_eq!(parse_flag(None), None);
    }
}
