/// Dashboard counters and period statistics
use crate::{
    db::content::{ArticleCard, QueuedComment, ARTICLE_CARD_SELECT},
    error::{AppError, AppResult},
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

const DASHBOARD_DRAFTS: i64 = 5;
const DASHBOARD_PENDING: i64 = 10;
const DASHBOARD_MOST_VIEWED: i64 = 5;
const PERIOD_TOP_ARTICLES: i64 = 10;
const PERIOD_TOP_CATEGORIES: i64 = 5;

/// Reporting window for the statistics page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum StatsPeriod {
    Day,
    #[default]
    Week,
    Month,
    Quarter,
    Year,
}

impl StatsPeriod {
    pub const ALL: [StatsPeriod; 5] = [
        StatsPeriod::Day,
        StatsPeriod::Week,
        StatsPeriod::Month,
        StatsPeriod::Quarter,
        StatsPeriod::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatsPeriod::Day => "24h",
            StatsPeriod::Week => "7d",
            StatsPeriod::Month => "30d",
            StatsPeriod::Quarter => "90d",
            StatsPeriod::Year => "365d",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatsPeriod::Day => "Last 24 hours",
            StatsPeriod::Week => "Last 7 days",
            StatsPeriod::Month => "Last 30 days",
            StatsPeriod::Quarter => "Last 90 days",
            StatsPeriod::Year => "Last year",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        StatsPeriod::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Invalid period: {}", s)))
    }

    pub fn duration(&self) -> Duration {
        match self {
            StatsPeriod::Day => Duration::hours(24),
            StatsPeriod::Week => Duration::days(7),
            StatsPeriod::Month => Duration::days(30),
            StatsPeriod::Quarter => Duration::days(90),
            StatsPeriod::Year => Duration::days(365),
        }
    }

    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

/// Article ranked by activity in a period
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArticleActivity {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub author_name: String,
    pub view_count: i64,
    pub comment_count: i64,
    /// Accesses or approved comments inside the period
    pub period_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CategoryActivity {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub access_count: i64,
}

/// Admin landing page data
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_articles: i64,
    pub total_users: i64,
    pub total_comments: i64,
    pub pending_comment_count: i64,
    pub drafts: Vec<ArticleCard>,
    pub pending_comments: Vec<QueuedComment>,
    pub most_viewed: Vec<ArticleCard>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodStats {
    pub period: StatsPeriod,
    pub since: DateTime<Utc>,
    pub most_viewed: Vec<ArticleActivity>,
    pub most_commented: Vec<ArticleActivity>,
    pub top_categories: Vec<CategoryActivity>,
    pub total_accesses: i64,
    pub new_users: i64,
}

/// Read-only reporting queries
#[derive(Clone)]
pub struct StatsManager {
    db: SqlitePool,
}

impl StatsManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn count(&self, sql: &str) -> AppResult<i64> {
        Ok(sqlx::query_scalar(sql).fetch_one(&self.db).await?)
    }

    /// Totals, recent drafts, oldest pending comments and most read articles
    ///
    /// Editors only see their own drafts; `author_scope` is their id.
    pub async fn dashboard(&self, author_scope: Option<i64>) -> AppResult<DashboardSummary> {
        let total_articles = self.count("SELECT COUNT(*) FROM article").await?;
        let total_users = self.count("SELECT COUNT(*) FROM account").await?;
        let total_comments = self.count("SELECT COUNT(*) FROM comment").await?;
        let pending_comment_count = self.count("SELECT COUNT(*) FROM comment WHERE approved = 0").await?;

        let drafts = sqlx::query_as::<_, ArticleCard>(&format!(
            "{} WHERE ar.published = 0 AND (?1 IS NULL OR ar.author_id = ?1)
             ORDER BY ar.updated_at DESC LIMIT ?2",
            ARTICLE_CARD_SELECT
        ))
        .bind(author_scope)
        .bind(DASHBOARD_DRAFTS)
        .fetch_all(&self.db)
        .await?;

        let pending_comments = sqlx::query_as::<_, QueuedComment>(
            r#"
            SELECT c.id, c.body, c.approved, c.flagged, c.flag_reason, c.edited, c.created_at,
                   c.author_id, a.username AS author_name, a.email AS author_email,
                   c.article_id, ar.title AS article_title, ar.slug AS article_slug
            FROM comment c
            JOIN account a ON a.id = c.author_id
            JOIN article ar ON ar.id = c.article_id
            WHERE c.approved = 0
            ORDER BY c.created_at ASC
            LIMIT ?1
            "#,
        )
        .bind(DASHBOARD_PENDING)
        .fetch_all(&self.db)
        .await?;

        let most_viewed = sqlx::query_as::<_, ArticleCard>(&format!(
            "{} WHERE ar.published = 1 ORDER BY ar.view_count DESC, ar.id DESC LIMIT ?1",
            ARTICLE_CARD_SELECT
        ))
        .bind(DASHBOARD_MOST_VIEWED)
        .fetch_all(&self.db)
        .await?;

        Ok(DashboardSummary {
            total_articles,
            total_users,
            total_comments,
            pending_comment_count,
            drafts,
            pending_comments,
            most_viewed,
        })
    }

    /// Activity inside the period ending now
    pub async fn period(&self, period: StatsPeriod) -> AppResult<PeriodStats> {
        self.period_ending(period, Utc::now()).await
    }

    pub async fn period_ending(&self, period: StatsPeriod, now: DateTime<Utc>) -> AppResult<PeriodStats> {
        let since = period.start(now);

        let most_viewed = sqlx::query_as::<_, ArticleActivity>(
            r#"
            SELECT ar.id, ar.title, ar.slug, a.username AS author_name, ar.view_count,
                   ar.comment_count, COUNT(x.id) AS period_count
            FROM article ar
            JOIN account a ON a.id = ar.author_id
            JOIN article_access x ON x.article_id = ar.id AND x.created_at >= ?1
            GROUP BY ar.id
            ORDER BY ar.view_count DESC, ar.id DESC
            LIMIT ?2
            "#,
        )
        .bind(since)
        .bind(PERIOD_TOP_ARTICLES)
        .fetch_all(&self.db)
        .await?;

        let most_commented = sqlx::query_as::<_, ArticleActivity>(
            r#"
            SELECT ar.id, ar.title, ar.slug, a.username AS author_name, ar.view_count,
                   ar.comment_count, COUNT(c.id) AS period_count
            FROM article ar
            JOIN account a ON a.id = ar.author_id
            JOIN comment c ON c.article_id = ar.id AND c.approved = 1 AND c.created_at >= ?1
            GROUP BY ar.id
            ORDER BY ar.comment_count DESC, ar.id DESC
            LIMIT ?2
            "#,
        )
        .bind(since)
        .bind(PERIOD_TOP_ARTICLES)
        .fetch_all(&self.db)
        .await?;

        let top_categories = sqlx::query_as::<_, CategoryActivity>(
            r#"
            SELECT cat.id, cat.name, cat.slug, COUNT(x.id) AS access_count
            FROM category cat
            JOIN article_category ac ON ac.category_id = cat.id
            JOIN article_access x ON x.article_id = ac.article_id AND x.created_at >= ?1
            GROUP BY cat.id
            ORDER BY access_count DESC, cat.name ASC
            LIMIT ?2
            "#,
        )
        .bind(since)
        .bind(PERIOD_TOP_CATEGORIES)
        .fetch_all(&self.db)
        .await?;

        let total_accesses: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM article_access WHERE created_at >= ?1")
                .bind(since)
                .fetch_one(&self.db)
                .await?;

        let new_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account WHERE created_at >= ?1")
            .bind(since)
            .fetch_one(&self.db)
            .await?;

        Ok(PeriodStats {
            period,
            since,
            most_viewed,
            most_commented,
            top_categories,
            total_accesses,
            new_users,
        })
    }
}
