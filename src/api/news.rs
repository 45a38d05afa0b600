/// Public news pages and image delivery
use crate::{
    api::{
        forms::{page_link, render},
        middleware::client_ip,
    },
    content::articles::can_manage,
    context::AppContext,
    db::{content::ArticleCard, Page},
    error::{AppResult, PageResult},
    identity::Identity,
    views::{ArticlePage, NewsListPage},
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(home))
        .route("/news", get(news_list))
        .route("/news/:article", get(article_page))
        .route("/news/category/:slug", get(category_news))
        .route("/news/tag/:slug", get(tag_news))
        .route("/search", get(search))
        .route("/image/:id", get(image))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

impl PageQuery {
    fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
}

async fn listing(
    ctx: &AppContext,
    identity: &Identity,
    heading: &str,
    articles: &Page<ArticleCard>,
    page_link: &str,
    query: &str,
) -> AppResult<Html<String>> {
    let categories = ctx.taxonomy_manager.categories().await?;

    render(&NewsListPage {
        viewer: identity.user(),
        heading,
        articles,
        page_link,
        query,
        categories: &categories,
    })
}

async fn home(State(ctx): State<AppContext>, identity: Identity) -> PageResult<Html<String>> {
    let articles = ctx.article_manager.list_published(1).await?;
    Ok(listing(&ctx, &identity, "Latest news", &articles, "/news?", "").await?)
}

async fn news_list(
    State(ctx): State<AppContext>,
    identity: Identity,
    Query(query): Query<PageQuery>,
) -> PageResult<Html<String>> {
    let articles = ctx.article_manager.list_published(query.page()).await?;
    Ok(listing(&ctx, &identity, "News", &articles, "/news?", "").await?)
}

async fn category_news(
    State(ctx): State<AppContext>,
    identity: Identity,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> PageResult<Html<String>> {
    let category = ctx.taxonomy_manager.category_by_slug(&slug).await?;
    let articles = ctx
        .article_manager
        .list_by_category(category.id, query.page())
        .await?;
    let link = format!("/news/category/{}?", category.slug);

    Ok(listing(&ctx, &identity, &category.name, &articles, &link, "").await?)
}

async fn tag_news(
    State(ctx): State<AppContext>,
    identity: Identity,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> PageResult<Html<String>> {
    let tag = ctx.taxonomy_manager.tag_by_slug(&slug).await?;
    let articles = ctx.article_manager.list_by_tag(tag.id, query.page()).await?;
    let heading = format!("#{}", tag.name);
    let link = format!("/news/tag/{}?", tag.slug);

    Ok(listing(&ctx, &identity, &heading, &articles, &link, "").await?)
}

async fn search(
    State(ctx): State<AppContext>,
    identity: Identity,
    Query(query): Query<SearchQuery>,
) -> PageResult<Html<String>> {
    let q = query.q.unwrap_or_default();
    let q = q.trim();
    let page = query.page.unwrap_or(1).max(1);

    let articles = ctx.article_manager.search(q, page).await?;
    let link = page_link("/search", &[("q", q)]);

    Ok(listing(&ctx, &identity, "Search", &articles, &link, q).await?)
}

/// Article page with its approved comments
async fn article_page(
    State(ctx): State<AppContext>,
    identity: Identity,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> PageResult<Html<String>> {
    let detail = ctx.article_manager.detail_by_slug(&slug, &identity).await?;
    let article = &detail.article;

    if article.published {
        let ip = client_ip(&headers);
        let viewer_id = identity.user().map(|u| u.id);
        if let Err(e) = ctx
            .article_manager
            .record_view(article.id, viewer_id, ip.as_deref())
            .await
        {
            tracing::warn!("Failed to record view of article {}: {}", article.id, e);
        }
    }

    let threads = ctx.comment_manager.threads(article.id).await?;
    let related = ctx.article_manager.related(article.id).await?;

    let (is_favorite, can_edit, can_comment) = match identity.user() {
        Some(user) => (
            ctx.article_manager.is_favorite(user.id, article.id).await?,
            can_manage(article, user),
            user.can_comment,
        ),
        None => (false, false, false),
    };

    Ok(render(&ArticlePage {
        viewer: identity.user(),
        detail: &detail,
        threads: &threads,
        related: &related,
        is_favorite,
        can_edit,
        can_comment,
    })?)
}

/// Stored image with its MIME type
async fn image(State(ctx): State<AppContext>, Path(id): Path<i64>) -> AppResult<impl IntoResponse> {
    let image = ctx.image_store.get(id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, image.mime_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        image.data,
    ))
}
