/// Staff pages and endpoints
///
/// Editors reach the dashboard, their own articles and the comment queue.
/// Statistics and the audit log are reserved to admins.
use crate::{
    admin::{CommentFilter, StatsPeriod},
    api::forms::{page_link, render, MultipartForm},
    auth::{Admins, Authorized, PageAuthorized, Staff},
    content::{ArticleFilter, ArticleInput},
    context::AppContext,
    db::content::Comment,
    error::{AppError, AppResult, PageResult},
    identity::SessionUser,
    views::{
        period_options, AdminArticlesPage, AdminCommentsPage, ArticleFormPage, ArticleFormValues,
        AuditPage, DashboardPage, StatsPage,
    },
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

const AUDIT_PAGE_LIMIT: i64 = 100;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin", get(dashboard))
        .route("/admin/news", get(list_articles))
        .route("/admin/news/new", get(new_article_page).post(create_article))
        .route("/admin/news/:id/edit", get(edit_article_page).post(update_article))
        .route("/admin/news/:id/delete", post(delete_article))
        .route("/admin/comments", get(comment_queue))
        .route("/admin/comments/:id/moderate", post(moderate_comment))
        .route("/admin/comments/:id/delete", post(delete_comment))
        .route("/admin/stats", get(stats))
        .route("/admin/audit", get(audit_log))
}

async fn dashboard(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Staff>,
) -> PageResult<Html<String>> {
    let author_scope = if auth.is_admin() { None } else { Some(auth.id) };
    let summary = ctx.stats_manager.dashboard(author_scope).await?;

    Ok(render(&DashboardPage {
        viewer: Some(&auth.user),
        summary: &summary,
    })?)
}

async fn list_articles(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Staff>,
    Query(filter): Query<ArticleFilter>,
) -> PageResult<Html<String>> {
    let articles = ctx
        .article_manager
        .admin_list(&auth.user, &filter, ctx.config.content.admin_page_size)
        .await?;

    let published = filter.published.unwrap_or_default();
    let q = filter.q.unwrap_or_default();
    let link = page_link("/admin/news", &[("published", &published), ("q", &q)]);

    Ok(render(&AdminArticlesPage {
        viewer: Some(&auth.user),
        articles: &articles,
        published: &published,
        q: &q,
        page_link: &link,
    })?)
}

/// Text fields of the article form; the image is validated separately
fn article_fields(form: &MultipartForm) -> ArticleInput {
    ArticleInput {
        title: form.text("title"),
        slug: form.optional("slug"),
        summary: form.text("summary"),
        body: form.text("body"),
        category_ids: form.ids("category_ids"),
        tags: form.text("tags"),
        publish: form.flag("publish"),
        comments_enabled: form.flag("comments_enabled"),
        image: None,
        remove_image: form.flag("remove_image"),
    }
}

async fn article_form(
    ctx: &AppContext,
    viewer: &SessionUser,
    heading: &str,
    action: &str,
    values: &ArticleFormValues,
    error: Option<&str>,
) -> AppResult<Html<String>> {
    let categories = ctx.taxonomy_manager.categories().await?;

    render(&ArticleFormPage {
        viewer: Some(viewer),
        heading,
        action,
        values,
        categories: &values.category_options(&categories),
        error,
    })
}

async fn new_article_page(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Staff>,
) -> PageResult<Html<String>> {
    Ok(article_form(
        &ctx,
        &auth.user,
        "New article",
        "/admin/news/new",
        &ArticleFormValues::blank(),
        None,
    )
    .await?)
}

async fn create_article(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Staff>,
    multipart: Multipart,
) -> PageResult<Response> {
    let form = MultipartForm::read(multipart).await?;
    let mut input = article_fields(&form);
    let values = ArticleFormValues::from_input(&input, None);

    let result = match form.image("image", &ctx.image_store) {
        Ok(image) => {
            input.image = image;
            ctx.article_manager.create(&auth.user, input).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(Redirect::to("/admin/news").into_response()),
        Err(AppError::Validation(message)) => {
            let page = article_form(
                &ctx,
                &auth.user,
                "New article",
                "/admin/news/new",
                &values,
                Some(&message),
            )
            .await?;
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn edit_article_page(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Staff>,
    Path(id): Path<i64>,
) -> PageResult<Html<String>> {
    let detail = ctx.article_manager.editable(&auth.user, id).await?;
    let action = format!("/admin/news/{}/edit", id);

    Ok(article_form(
        &ctx,
        &auth.user,
        "Edit article",
        &action,
        &ArticleFormValues::from_detail(&detail),
        None,
    )
    .await?)
}

async fn update_article(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Staff>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> PageResult<Response> {
    let current = ctx.article_manager.editable(&auth.user, id).await?;
    let form = MultipartForm::read(multipart).await?;
    let mut input = article_fields(&form);
    let values = ArticleFormValues::from_input(&input, current.article.image_id);

    let result = match form.image("image", &ctx.image_store) {
        Ok(image) => {
            input.image = image;
            ctx.article_manager.update(&auth.user, id, input).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(Redirect::to("/admin/news").into_response()),
        Err(AppError::Validation(message)) => {
            let action = format!("/admin/news/{}/edit", id);
            let page = article_form(&ctx, &auth.user, "Edit article", &action, &values, Some(&message)).await?;
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

async fn delete_article(
    State(ctx): State<AppContext>,
    auth: Authorized<Staff>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse>> {
    ctx.article_manager.delete(&auth.user, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn comment_queue(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Staff>,
    Query(filter): Query<CommentFilter>,
) -> PageResult<Html<String>> {
    let comments = ctx
        .comment_manager
        .queue(&filter, ctx.config.content.moderation_page_size)
        .await?;
    let pending_count = ctx.comment_manager.pending_count().await?;
    let flagged_count = ctx.comment_manager.flagged_count().await?;

    let approved = filter.approved.unwrap_or_default();
    let flagged = filter.flagged.unwrap_or_default();
    let q = filter.q.unwrap_or_default();
    let link = page_link(
        "/admin/comments",
        &[("approved", &approved), ("flagged", &flagged), ("q", &q)],
    );

    Ok(render(&AdminCommentsPage {
        viewer: Some(&auth.user),
        comments: &comments,
        approved: &approved,
        flagged: &flagged,
        q: &q,
        page_link: &link,
        pending_count,
        flagged_count,
    })?)
}

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub approve: bool,
}

#[derive(Debug, Serialize)]
pub struct ModerateResponse {
    pub success: bool,
    pub comment: Comment,
}

async fn moderate_comment(
    State(ctx): State<AppContext>,
    auth: Authorized<Staff>,
    Path(id): Path<i64>,
    Json(req): Json<ModerateRequest>,
) -> AppResult<Json<ModerateResponse>> {
    let comment = ctx.comment_manager.moderate(&auth.user, id, req.approve).await?;

    Ok(Json(ModerateResponse {
        success: true,
        comment,
    }))
}

async fn delete_comment(
    State(ctx): State<AppContext>,
    auth: Authorized<Staff>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse>> {
    ctx.comment_manager.delete(&auth.user, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub period: Option<String>,
}

async fn stats(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    Query(query): Query<StatsQuery>,
) -> PageResult<Html<String>> {
    let period = match query.period.as_deref().filter(|p| !p.is_empty()) {
        Some(period) => StatsPeriod::from_str(period)?,
        None => StatsPeriod::default(),
    };
    let stats = ctx.stats_manager.period(period).await?;

    Ok(render(&StatsPage {
        viewer: Some(&auth.user),
        stats: &stats,
        periods: &period_options(period),
    })?)
}

async fn audit_log(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
) -> PageResult<Html<String>> {
    let entries = ctx.audit_log.recent(AUDIT_PAGE_LIMIT).await?;

    Ok(render(&AuditPage {
        viewer: Some(&auth.user),
        entries: &entries,
    })?)
}
