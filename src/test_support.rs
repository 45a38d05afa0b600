/// Fixtures shared by the unit tests
use crate::{db::account::User, identity::SessionUser};
use chrono::Utc;
use sqlx::SqlitePool;

pub fn session_user(user: &User) -> SessionUser {
    SessionUser {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        role: user.role,
        can_comment: user.can_comment,
        verified: user.verified,
        profile_image_id: user.profile_image_id,
    }
}

/// Insert an article row directly; the slug is derived from the title
pub async fn insert_article(pool: &SqlitePool, author_id: i64, title: &str, published: bool) -> i64 {
    let now = Utc::now();
    let slug = title.to_lowercase().replace(' ', "-");

    sqlx::query(
        "INSERT INTO article (title, slug, summary, body, published, published_at, author_id,
                              created_at, updated_at)
         VALUES (?1, ?2, '', 'body', ?3, ?4, ?5, ?6, ?6)",
    )
    .bind(title)
    .bind(slug)
    .bind(published)
    .bind(if published { Some(now) } else { None })
    .bind(author_id)
    .bind(now)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

/// Insert a comment row directly, bypassing counters
pub async fn insert_comment(
    pool: &SqlitePool,
    article_id: i64,
    author_id: i64,
    parent_id: Option<i64>,
    approved: bool,
) -> i64 {
    sqlx::query(
        "INSERT INTO comment (article_id, author_id, parent_id, body, approved, created_at)
         VALUES (?1, ?2, ?3, 'a comment', ?4, ?5)",
    )
    .bind(article_id)
    .bind(author_id)
    .bind(parent_id)
    .bind(approved)
    .bind(Utc::now())
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

/// Insert an account row directly with a throwaway hash
pub async fn insert_user(pool: &SqlitePool, username: &str, role: crate::admin::Role) -> i64 {
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO account (email, username, password_hash, role, created_at, updated_at)
         VALUES (?1, ?2, 'x', ?3, ?4, ?4)",
    )
    .bind(format!("{}@newshub.com", username))
    .bind(username)
    .bind(role.as_str())
    .bind(now)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}
