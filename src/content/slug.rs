/// URL slugs for articles, categories and tags
use crate::error::AppResult;
use sqlx::SqliteConnection;

const FALLBACK_SLUG: &str = "item";

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Lowercase ASCII slug with single dashes between words
///
/// `"Eleições 2026!"` becomes `"eleicoes-2026"`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase).map(fold_accent) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// First free slug among `base`, `base-2`, `base-3`, ...
///
/// `exclude_id` is the row being renamed, whose own slug does not count as
/// taken.
pub async fn unique_article_slug(
    conn: &mut SqliteConnection,
    base: &str,
    exclude_id: Option<i64>,
) -> AppResult<String> {
    let mut candidate = base.to_string();
    let mut suffix = 1;

    loop {
        let taken: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM article WHERE slug = ?1 AND (?2 IS NULL OR id != ?2)",
        )
        .bind(&candidate)
        .bind(exclude_id)
        .fetch_one(&mut *conn)
        .await?;

        if taken == 0 {
            return Ok(candidate);
        }

        suffix += 1;
        candidate = format!("{}-{}", base, suffix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::Role;
    use crate::db::memory_pool;
    use crate::test_support::{insert_article, insert_user};

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Eleições 2026!"), "eleicoes-2026");
        assert_eq!(slugify("  Saúde & Bem-estar  "), "saude-bem-estar");
        assert_eq!(slugify("GTA VI"), "gta-vi");
        assert_eq!(slugify("!!!"), "item");
    }

    #[tokio::test]
    async fn test_unique_slug_suffixes() {
        let pool = memory_pool().await;
        let author = insert_user(&pool, "editor", Role::Editor).await;
        let first = insert_article(&pool, author, "Story", true).await;

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(
            unique_article_slug(&mut *conn, "story", None).await.unwrap(),
            "story-2"
        );
        // the article keeps its own slug
        assert_eq!(
            unique_article_slug(&mut *conn, "story", Some(first)).await.unwrap(),
            "story"
        );
        drop(conn);

        sqlx::query("UPDATE article SET slug = 'story-2' WHERE id = ?1")
            .bind(insert_article(&pool, author, "Other", true).await)
            .execute(&pool)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(
            unique_article_slug(&mut *conn, "story", None).await.unwrap(),
            "story-3"
        );
    }
}
