/// Content database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Article record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub body: String,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub comments_enabled: bool,
    pub author_id: i64,
    pub image_id: Option<i64>,
    pub view_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Article row joined with its author, used by every listing
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ArticleCard {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub image_id: Option<i64>,
    pub view_count: i64,
    pub comment_count: i64,
    pub author_id: i64,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// Select list producing [`ArticleCard`] rows; callers append the filters
pub const ARTICLE_CARD_SELECT: &str = "SELECT ar.id, ar.title, ar.slug, ar.summary, ar.published, \
    ar.published_at, ar.image_id, ar.view_count, ar.comment_count, ar.author_id, \
    a.username AS author_name, ar.created_at \
    FROM article ar JOIN account a ON a.id = ar.author_id";

/// Category record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Category with the number of linked articles
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CategoryStats {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_id: Option<i64>,
    pub article_count: i64,
}

/// Tag record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Comment record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub author_id: i64,
    pub parent_id: Option<i64>,
    pub body: String,
    pub approved: bool,
    pub flagged: bool,
    pub flag_reason: Option<String>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: DateTime<Utc>,
}

/// Approved comment as rendered under an article
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub author_id: i64,
    pub author_name: String,
    pub author_image_id: Option<i64>,
    pub body: String,
    pub edited: bool,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: DateTime<Utc>,
}

/// Top-level comment with its approved replies
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    pub comment: CommentView,
    pub replies: Vec<CommentView>,
}

/// Comment as listed in the moderation queue
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QueuedComment {
    pub id: i64,
    pub body: String,
    pub approved: bool,
    pub flagged: bool,
    pub flag_reason: Option<String>,
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_name: String,
    pub author_email: String,
    pub article_id: i64,
    pub article_title: String,
    pub article_slug: String,
}

/// Stored image blob
#[derive(Debug, Clone, FromRow)]
pub struct Image {
    pub id: i64,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}
