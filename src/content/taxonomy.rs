/// Categories and tags
use crate::{
    blob_store::{delete_image, insert_image},
    content::{slug::slugify, CategoryInput, TagInput},
    db::{
        self,
        content::{Category, CategoryStats, Tag},
    },
    error::{AppError, AppResult},
    validation,
};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, image_id, created_at";

fn category_taken() -> AppError {
    AppError::Validation("A category with this name or slug already exists".to_string())
}

fn tag_taken() -> AppError {
    AppError::Validation("A tag with this slug already exists".to_string())
}

/// Explicit slug when given, otherwise derived from the name
fn slug_for(name: &str, supplied: Option<&str>) -> String {
    match supplied.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slugify(slug),
        None => slugify(name),
    }
}

/// Find a tag by name or slug, creating it when absent
pub async fn find_or_create_tag(conn: &mut SqliteConnection, name: &str) -> AppResult<i64> {
    let slug = slugify(name);

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM tag WHERE name = ?1 OR slug = ?2 ORDER BY id LIMIT 1")
            .bind(name)
            .bind(&slug)
            .fetch_optional(&mut *conn)
            .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO tag (name, slug, created_at) VALUES (?1, ?2, ?3)")
        .bind(name)
        .bind(&slug)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    tracing::debug!("Created tag {} ({})", name, slug);

    Ok(result.last_insert_rowid())
}

/// Category and tag manager
#[derive(Clone)]
pub struct TaxonomyManager {
    db: SqlitePool,
}

impl TaxonomyManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn categories(&self) -> AppResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>(&format!(
            "SELECT {} FROM category ORDER BY name",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?)
    }

    /// Categories with the number of linked articles
    pub async fn categories_with_counts(&self) -> AppResult<Vec<CategoryStats>> {
        Ok(sqlx::query_as::<_, CategoryStats>(
            r#"
            SELECT c.id, c.name, c.slug, c.description, c.image_id,
                   COUNT(ac.article_id) AS article_count
            FROM category c
            LEFT JOIN article_category ac ON ac.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn category(&self, id: i64) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(&format!("SELECT {} FROM category WHERE id = ?1", CATEGORY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    pub async fn category_by_slug(&self, slug: &str) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(&format!("SELECT {} FROM category WHERE slug = ?1", CATEGORY_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", slug)))
    }

    async fn category_conflicts(&self, name: &str, slug: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM category WHERE (name = ?1 OR slug = ?2) AND (?3 IS NULL OR id != ?3)",
        )
        .bind(name)
        .bind(slug)
        .bind(exclude_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count > 0)
    }

    /// Create a category; duplicate names or slugs are validation errors
    pub async fn create_category(&self, input: CategoryInput) -> AppResult<Category> {
        let name = input.name.trim().to_string();
        let input = CategoryInput { name, ..input };
        validation::check(&input)?;

        let slug = slug_for(&input.name, input.slug.as_deref());
        if self.category_conflicts(&input.name, &slug, None).await? {
            return Err(category_taken());
        }

        let mut tx = self.db.begin().await?;

        let image_id = match &input.image {
            Some(image) => Some(insert_image(&mut *tx, image).await?),
            None => None,
        };

        let result = sqlx::query(
            "INSERT INTO category (name, slug, description, image_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&input.name)
        .bind(&slug)
        .bind(validation::non_empty(input.description.clone()))
        .bind(image_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| if db::is_unique_violation(&e) { category_taken() } else { e.into() })?;

        tx.commit().await?;

        tracing::info!("Created category {} ({})", input.name, slug);

        self.category(result.last_insert_rowid()).await
    }

    pub async fn update_category(&self, id: i64, input: CategoryInput) -> AppResult<Category> {
        let current = self.category(id).await?;
        let name = input.name.trim().to_string();
        let input = CategoryInput { name, ..input };
        validation::check(&input)?;

        let slug = slug_for(&input.name, input.slug.as_deref());
        if self.category_conflicts(&input.name, &slug, Some(id)).await? {
            return Err(category_taken());
        }

        let mut tx = self.db.begin().await?;

        let mut image_id = current.image_id;
        let mut stale_image = None;

        if input.remove_image {
            stale_image = image_id.take();
        }
        if let Some(image) = &input.image {
            stale_image = stale_image.or(image_id);
            image_id = Some(insert_image(&mut *tx, image).await?);
        }

        sqlx::query("UPDATE category SET name = ?1, slug = ?2, description = ?3, image_id = ?4 WHERE id = ?5")
            .bind(&input.name)
            .bind(&slug)
            .bind(validation::non_empty(input.description.clone()))
            .bind(image_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| if db::is_unique_violation(&e) { category_taken() } else { e.into() })?;

        if let Some(stale) = stale_image {
            delete_image(&mut *tx, stale).await?;
        }

        tx.commit().await?;

        tracing::info!("Updated category {}", id);

        self.category(id).await
    }

    /// Delete a category; linked articles are kept
    pub async fn delete_category(&self, id: i64) -> AppResult<()> {
        let category = self.category(id).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM article_category WHERE category_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM category WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if let Some(image_id) = category.image_id {
            delete_image(&mut *tx, image_id).await?;
        }

        tx.commit().await?;

        tracing::info!("Deleted category {} ({})", id, category.name);

        Ok(())
    }

    pub async fn tags(&self) -> AppResult<Vec<Tag>> {
        Ok(sqlx::query_as::<_, Tag>("SELECT id, name, slug, created_at FROM tag ORDER BY name")
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn tag(&self, id: i64) -> AppResult<Tag> {
        sqlx::query_as::<_, Tag>("SELECT id, name, slug, created_at FROM tag WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tag {} not found", id)))
    }

    pub async fn tag_by_slug(&self, slug: &str) -> AppResult<Tag> {
        sqlx::query_as::<_, Tag>("SELECT id, name, slug, created_at FROM tag WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tag {} not found", slug)))
    }

    pub async fn create_tag(&self, input: TagInput) -> AppResult<Tag> {
        let input = TagInput {
            name: input.name.trim().to_string(),
            ..input
        };
        validation::check(&input)?;

        let slug = slug_for(&input.name, input.slug.as_deref());

        let result = sqlx::query("INSERT INTO tag (name, slug, created_at) VALUES (?1, ?2, ?3)")
            .bind(&input.name)
            .bind(&slug)
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(|e| if db::is_unique_violation(&e) { tag_taken() } else { e.into() })?;

        tracing::info!("Created tag {} ({})", input.name, slug);

        self.tag(result.last_insert_rowid()).await
    }

    pub async fn update_tag(&self, id: i64, input: TagInput) -> AppResult<Tag> {
        self.tag(id).await?;
        let input = TagInput {
            name: input.name.trim().to_string(),
            ..input
        };
        validation::check(&input)?;

        let slug = slug_for(&input.name, input.slug.as_deref());

        sqlx::query("UPDATE tag SET name = ?1, slug = ?2 WHERE id = ?3")
            .bind(&input.name)
            .bind(&slug)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| if db::is_unique_violation(&e) { tag_taken() } else { e.into() })?;

        tracing::info!("Updated tag {}", id);

        self.tag(id).await
    }

    pub async fn delete_tag(&self, id: i64) -> AppResult<()> {
        let tag = self.tag(id).await?;

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM article_tag WHERE tag_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM tag WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Deleted tag {} ({})", id, tag.name);

        Ok(())
    }
}
