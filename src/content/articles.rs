/// Article publishing, listings and reader interactions
use crate::{
    admin::audit::{self, AuditAction},
    blob_store::{delete_image, insert_image},
    content::{
        slug::{slugify, unique_article_slug},
        taxonomy::find_or_create_tag,
        ArticleDetail, ArticleFilter, ArticleInput,
    },
    db::{
        self,
        content::{Article, ArticleCard, Category, Tag, ARTICLE_CARD_SELECT},
        Page,
    },
    error::{AppError, AppResult},
    identity::{Identity, SessionUser},
    validation,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeSet;

const ARTICLE_COLUMNS: &str = "id, title, slug, summary, body, published, published_at, \
    comments_enabled, author_id, image_id, view_count, comment_count, created_at, updated_at";

const RELATED_LIMIT: i64 = 3;

/// Newest publication first
const PUBLIC_ORDER: &str = "ORDER BY ar.published_at DESC, ar.id DESC";

/// Drafts are visible to their author and to admins
pub fn can_view(article: &Article, viewer: &Identity) -> bool {
    if article.published {
        return true;
    }

    match viewer.user() {
        Some(user) => user.id == article.author_id || user.is_admin(),
        None => false,
    }
}

/// Editors manage their own articles, admins manage all of them
pub fn can_manage(article: &Article, actor: &SessionUser) -> bool {
    actor.is_admin() || (actor.is_staff() && article.author_id == actor.id)
}

/// Article manager
#[derive(Clone)]
pub struct ArticleManager {
    db: SqlitePool,
    page_size: i64,
}

impl ArticleManager {
    pub fn new(db: SqlitePool, page_size: i64) -> Self {
        Self { db, page_size }
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub async fn get(&self, id: i64) -> AppResult<Article> {
        sqlx::query_as::<_, Article>(&format!("SELECT {} FROM article WHERE id = ?1", ARTICLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Article {} not found", id)))
    }

    async fn cards(&self, filter_sql: &str, binds: &[i64], page: i64, page_size: i64) -> AppResult<Page<ArticleCard>> {
        let page = page.max(1);

        let count_sql = format!("SELECT COUNT(*) FROM article ar {}", filter_sql);
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in binds {
            count = count.bind(*bind);
        }
        let total = count.fetch_one(&self.db).await?;

        let limit_index = binds.len() + 1;
        let list_sql = format!(
            "{} {} {} LIMIT ?{} OFFSET ?{}",
            ARTICLE_CARD_SELECT,
            filter_sql,
            PUBLIC_ORDER,
            limit_index,
            limit_index + 1
        );
        let mut query = sqlx::query_as::<_, ArticleCard>(&list_sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        let items = query
            .bind(page_size)
            .bind(db::page_offset(page, page_size))
            .fetch_all(&self.db)
            .await?;

        Ok(Page::new(items, page, page_size, total))
    }

    /// Published articles, newest first
    pub async fn list_published(&self, page: i64) -> AppResult<Page<ArticleCard>> {
        self.cards("WHERE ar.published = 1", &[], page, self.page_size).await
    }

    pub async fn list_by_category(&self, category_id: i64, page: i64) -> AppResult<Page<ArticleCard>> {
        self.cards(
            "WHERE ar.published = 1
               AND ar.id IN (SELECT article_id FROM article_category WHERE category_id = ?1)",
            &[category_id],
            page,
            self.page_size,
        )
        .await
    }

    pub async fn list_by_tag(&self, tag_id: i64, page: i64) -> AppResult<Page<ArticleCard>> {
        self.cards(
            "WHERE ar.published = 1
               AND ar.id IN (SELECT article_id FROM article_tag WHERE tag_id = ?1)",
            &[tag_id],
            page,
            self.page_size,
        )
        .await
    }

    /// Case-insensitive substring search over title, summary and body
    pub async fn search(&self, q: &str, page: i64) -> AppResult<Page<ArticleCard>> {
        let q = q.trim();
        if q.is_empty() {
            return Ok(Page::new(Vec::new(), 1, self.page_size, 0));
        }

        let pattern = db::like_pattern(q);
        let page = page.max(1);
        let filter = r#"
            WHERE ar.published = 1
              AND (ar.title LIKE ?1 ESCAPE '\'
                   OR ar.summary LIKE ?1 ESCAPE '\'
                   OR ar.body LIKE ?1 ESCAPE '\')
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM article ar {}", filter))
            .bind(&pattern)
            .fetch_one(&self.db)
            .await?;

        let items = sqlx::query_as::<_, ArticleCard>(&format!(
            "{} {} {} LIMIT ?2 OFFSET ?3",
            ARTICLE_CARD_SELECT, filter, PUBLIC_ORDER
        ))
        .bind(&pattern)
        .bind(self.page_size)
        .bind(db::page_offset(page, self.page_size))
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(items, page, self.page_size, total))
    }

    pub async fn categories_of(&self, article_id: i64) -> AppResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.slug, c.description, c.image_id, c.created_at
            FROM category c
            JOIN article_category ac ON ac.category_id = c.id
            WHERE ac.article_id = ?1
            ORDER BY c.name
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn tags_of(&self, article_id: i64) -> AppResult<Vec<Tag>> {
        Ok(sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.slug, t.created_at
            FROM tag t
            JOIN article_tag link ON link.tag_id = t.id
            WHERE link.article_id = ?1
            ORDER BY t.name
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.db)
        .await?)
    }

    async fn detail(&self, article: Article) -> AppResult<ArticleDetail> {
        let author_name: String = sqlx::query_scalar("SELECT username FROM account WHERE id = ?1")
            .bind(article.author_id)
            .fetch_one(&self.db)
            .await?;
        let categories = self.categories_of(article.id).await?;
        let tags = self.tags_of(article.id).await?;

        Ok(ArticleDetail {
            article,
            author_name,
            categories,
            tags,
        })
    }

    /// Article page lookup; drafts are reported missing to viewers who may
    /// not see them
    pub async fn detail_by_slug(&self, slug: &str, viewer: &Identity) -> AppResult<ArticleDetail> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {} FROM article WHERE slug = ?1",
            ARTICLE_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.db)
        .await?
        .filter(|article| can_view(article, viewer))
        .ok_or_else(|| AppError::NotFound(format!("Article {} not found", slug)))?;

        self.detail(article).await
    }

    /// Count a view and log the access
    pub async fn record_view(&self, article_id: i64, user_id: Option<i64>, ip: Option<&str>) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE article SET view_count = view_count + 1 WHERE id = ?1")
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO article_access (article_id, user_id, ip, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(article_id)
            .bind(user_id)
            .bind(ip)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Published articles sharing a category with this one
    pub async fn related(&self, article_id: i64) -> AppResult<Vec<ArticleCard>> {
        Ok(sqlx::query_as::<_, ArticleCard>(&format!(
            r#"
            {}
            WHERE ar.published = 1 AND ar.id != ?1
              AND ar.id IN (
                  SELECT ac.article_id FROM article_category ac
                  WHERE ac.category_id IN (SELECT category_id FROM article_category WHERE article_id = ?1)
              )
            {}
            LIMIT ?2
            "#,
            ARTICLE_CARD_SELECT, PUBLIC_ORDER
        ))
        .bind(article_id)
        .bind(RELATED_LIMIT)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn is_favorite(&self, user_id: i64, article_id: i64) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorite WHERE user_id = ?1 AND article_id = ?2")
            .bind(user_id)
            .bind(article_id)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    /// Add or remove a favorite and return the new state
    pub async fn toggle_favorite(&self, user_id: i64, article_id: i64) -> AppResult<bool> {
        let article = self.get(article_id).await?;
        if !article.published {
            return Err(AppError::NotFound(format!("Article {} not found", article_id)));
        }

        let removed = sqlx::query("DELETE FROM favorite WHERE user_id = ?1 AND article_id = ?2")
            .bind(user_id)
            .bind(article_id)
            .execute(&self.db)
            .await?;

        if removed.rows_affected() > 0 {
            tracing::debug!("User {} removed favorite {}", user_id, article_id);
            return Ok(false);
        }

        sqlx::query("INSERT OR IGNORE INTO favorite (user_id, article_id, created_at) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(article_id)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        tracing::debug!("User {} added favorite {}", user_id, article_id);
        Ok(true)
    }

    /// A user's favorite published articles, most recently saved first
    pub async fn favorites(&self, user_id: i64) -> AppResult<Vec<ArticleCard>> {
        Ok(sqlx::query_as::<_, ArticleCard>(&format!(
            r#"
            {}
            JOIN favorite f ON f.article_id = ar.id
            WHERE f.user_id = ?1 AND ar.published = 1
            ORDER BY f.created_at DESC, f.id DESC
            "#,
            ARTICLE_CARD_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?)
    }

    /// Staff listing, newest first; editors only see their own articles
    pub async fn admin_list(
        &self,
        actor: &SessionUser,
        filter: &ArticleFilter,
        page_size: i64,
    ) -> AppResult<Page<ArticleCard>> {
        let page = filter.page.unwrap_or(1).max(1);
        let author_scope = if actor.is_admin() { None } else { Some(actor.id) };
        let published = crate::admin::moderation::parse_flag(filter.published.as_deref());
        let pattern = validation::non_empty(filter.q.clone()).map(|q| db::like_pattern(&q));

        let where_clause = r#"
            WHERE (?1 IS NULL OR ar.author_id = ?1)
              AND (?2 IS NULL OR ar.published = ?2)
              AND (?3 IS NULL OR ar.title LIKE ?3 ESCAPE '\')
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM article ar {}", where_clause))
            .bind(author_scope)
            .bind(published)
            .bind(&pattern)
            .fetch_one(&self.db)
            .await?;

        let items = sqlx::query_as::<_, ArticleCard>(&format!(
            "{} {} ORDER BY ar.created_at DESC, ar.id DESC LIMIT ?4 OFFSET ?5",
            ARTICLE_CARD_SELECT, where_clause
        ))
        .bind(author_scope)
        .bind(published)
        .bind(&pattern)
        .bind(page_size)
        .bind(db::page_offset(page, page_size))
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(items, page, page_size, total))
    }

    /// Load an article for editing
    pub async fn editable(&self, actor: &SessionUser, id: i64) -> AppResult<ArticleDetail> {
        let article = self.get(id).await?;
        if !can_manage(&article, actor) {
            return Err(AppError::Authorization(format!(
                "User {} cannot manage article {}",
                actor.id, id
            )));
        }

        self.detail(article).await
    }

    async fn link_taxonomy(
        conn: &mut SqliteConnection,
        article_id: i64,
        input: &ArticleInput,
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM article_category WHERE article_id = ?1")
            .bind(article_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query("DELETE FROM article_tag WHERE article_id = ?1")
            .bind(article_id)
            .execute(&mut *conn)
            .await?;

        let category_ids: BTreeSet<i64> = input.category_ids.iter().copied().collect();
        for category_id in category_ids {
            // unknown ids are skipped
            sqlx::query(
                "INSERT INTO article_category (article_id, category_id)
                 SELECT ?1, id FROM category WHERE id = ?2",
            )
            .bind(article_id)
            .bind(category_id)
            .execute(&mut *conn)
            .await?;
        }

        let mut tag_ids = BTreeSet::new();
        for name in input.tag_names() {
            tag_ids.insert(find_or_create_tag(&mut *conn, &name).await?);
        }
        for tag_id in tag_ids {
            sqlx::query("INSERT INTO article_tag (article_id, tag_id) VALUES (?1, ?2)")
                .bind(article_id)
                .bind(tag_id)
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    fn base_slug(input: &ArticleInput) -> String {
        match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => slugify(slug),
            None => slugify(&input.title),
        }
    }

    /// Create an article authored by the actor
    pub async fn create(&self, actor: &SessionUser, input: ArticleInput) -> AppResult<Article> {
        if !actor.is_staff() {
            return Err(AppError::Authorization(format!("User {} cannot write articles", actor.id)));
        }

        let input = input.trimmed();
        validation::check(&input)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let slug = unique_article_slug(&mut *tx, &Self::base_slug(&input), None).await?;

        let image_id = match &input.image {
            Some(image) => Some(insert_image(&mut *tx, image).await?),
            None => None,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO article (title, slug, summary, body, published, published_at, comments_enabled,
                                 author_id, image_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
            "#,
        )
        .bind(&input.title)
        .bind(&slug)
        .bind(&input.summary)
        .bind(&input.body)
        .bind(input.publish)
        .bind(if input.publish { Some(now) } else { None })
        .bind(input.comments_enabled)
        .bind(actor.id)
        .bind(image_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();
        Self::link_taxonomy(&mut *tx, id, &input).await?;

        tx.commit().await?;

        tracing::info!("User {} created article {} ({})", actor.id, id, slug);

        self.get(id).await
    }

    /// Update an article; the first publication stamps `published_at`
    pub async fn update(&self, actor: &SessionUser, id: i64, input: ArticleInput) -> AppResult<Article> {
        let current = self.get(id).await?;
        if !can_manage(&current, actor) {
            return Err(AppError::Authorization(format!(
                "User {} cannot manage article {}",
                actor.id, id
            )));
        }

        let input = input.trimmed();
        validation::check(&input)?;

        let now = Utc::now();
        let published_at = match (input.publish, current.published_at) {
            (true, None) => Some(now),
            (_, existing) => existing,
        };

        let mut image_id = current.image_id;
        let mut stale_image = None;
        if input.remove_image {
            stale_image = image_id.take();
        }

        let mut tx = self.db.begin().await?;

        let slug = unique_article_slug(&mut *tx, &Self::base_slug(&input), Some(id)).await?;

        if let Some(image) = &input.image {
            stale_image = stale_image.or(image_id);
            image_id = Some(insert_image(&mut *tx, image).await?);
        }

        sqlx::query(
            r#"
            UPDATE article
            SET title = ?1, slug = ?2, summary = ?3, body = ?4, published = ?5, published_at = ?6,
                comments_enabled = ?7, image_id = ?8, updated_at = ?9
            WHERE id = ?10
            "#,
        )
        .bind(&input.title)
        .bind(&slug)
        .bind(&input.summary)
        .bind(&input.body)
        .bind(input.publish)
        .bind(published_at)
        .bind(input.comments_enabled)
        .bind(image_id)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(stale) = stale_image {
            delete_image(&mut *tx, stale).await?;
        }

        Self::link_taxonomy(&mut *tx, id, &input).await?;

        tx.commit().await?;

        tracing::info!("User {} updated article {}", actor.id, id);

        self.get(id).await
    }

    /// Delete an article with everything that hangs off it
    pub async fn delete(&self, actor: &SessionUser, id: i64) -> AppResult<()> {
        let article = self.get(id).await?;
        if !can_manage(&article, actor) {
            return Err(AppError::Authorization(format!(
                "User {} cannot manage article {}",
                actor.id, id
            )));
        }

        let mut tx = self.db.begin().await?;

        for sql in [
            "DELETE FROM favorite WHERE article_id = ?1",
            "DELETE FROM article_access WHERE article_id = ?1",
            "DELETE FROM article_category WHERE article_id = ?1",
            "DELETE FROM article_tag WHERE article_id = ?1",
            "DELETE FROM comment WHERE article_id = ?1 AND parent_id IS NOT NULL",
            "DELETE FROM comment WHERE article_id = ?1",
            "DELETE FROM article WHERE id = ?1",
        ] {
            sqlx::query(sql).bind(id).execute(&mut *tx).await?;
        }

        if let Some(image_id) = article.image_id {
            delete_image(&mut *tx, image_id).await?;
        }

        audit::record(&mut *tx, actor.id, AuditAction::ArticleDelete, id, Some(&article.title)).await?;

        tx.commit().await?;

        tracing::info!("User {} deleted article {} ({})", actor.id, id, article.slug);

        Ok(())
    }

    pub async fn draft_count(&self) -> AppResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM article WHERE published = 0")
            .fetch_one(&self.db)
            .await?)
    }
}
