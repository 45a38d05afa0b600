/// Askama page templates
///
/// Every page struct carries the `viewer` shown in the navigation bar. Values
/// that need comparisons (selected options, checkboxes) are precomputed here
/// so the templates stay declarative.
use crate::{
    admin::{
        stats::{DashboardSummary, PeriodStats},
        AuditLogEntry, Role, StatsPeriod,
    },
    content::{ArticleDetail, ArticleInput},
    db::{
        account::User,
        content::{ArticleCard, Category, CategoryStats, CommentThread, QueuedComment, Tag},
        Page,
    },
    identity::SessionUser,
};
use askama::Template;

/// Generic error page
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage<'a> {
    pub status: u16,
    pub title: &'a str,
    pub message: &'a str,
}

/// Paginated article listing used by the home, news, category, tag and
/// search pages
#[derive(Template)]
#[template(path = "news_list.html")]
pub struct NewsListPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub heading: &'a str,
    pub articles: &'a Page<ArticleCard>,
    /// Listing URL up to and including the separator before `page=`
    pub page_link: &'a str,
    pub query: &'a str,
    pub categories: &'a [Category],
}

#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticlePage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub detail: &'a ArticleDetail,
    pub threads: &'a [CommentThread],
    pub related: &'a [ArticleCard],
    pub is_favorite: bool,
    pub can_edit: bool,
    pub can_comment: bool,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub error: Option<&'a str>,
    pub username: &'a str,
    pub email: &'a str,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub error: Option<&'a str>,
    pub email: &'a str,
    pub next: &'a str,
}

#[derive(Template)]
#[template(path = "forgot_password.html")]
pub struct ForgotPasswordPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub message: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "reset_password.html")]
pub struct ResetPasswordPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub token: &'a str,
    pub error: Option<&'a str>,
    pub done: bool,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub user: &'a User,
    pub favorites: &'a [ArticleCard],
    pub notice: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "profile_edit.html")]
pub struct ProfileEditPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub user: &'a User,
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub summary: &'a DashboardSummary,
}

#[derive(Template)]
#[template(path = "admin/articles.html")]
pub struct AdminArticlesPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub articles: &'a Page<ArticleCard>,
    pub published: &'a str,
    pub q: &'a str,
    pub page_link: &'a str,
}

/// Checkbox entry in the article form
pub struct CategoryOption {
    pub id: i64,
    pub name: String,
    pub selected: bool,
}

/// Article form field values, from the stored article or a rejected
/// submission
#[derive(Default)]
pub struct ArticleFormValues {
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub body: String,
    pub tags: String,
    pub category_ids: Vec<i64>,
    pub publish: bool,
    pub comments_enabled: bool,
    pub image_id: Option<i64>,
}

impl ArticleFormValues {
    /// Blank form for a new article
    pub fn blank() -> Self {
        Self {
            comments_enabled: true,
            ..Default::default()
        }
    }

    pub fn from_detail(detail: &ArticleDetail) -> Self {
        let article = &detail.article;
        Self {
            title: article.title.clone(),
            slug: article.slug.clone(),
            summary: article.summary.clone(),
            body: article.body.clone(),
            tags: detail.tag_list(),
            category_ids: detail.categories.iter().map(|c| c.id).collect(),
            publish: article.published,
            comments_enabled: article.comments_enabled,
            image_id: article.image_id,
        }
    }

    /// Echo a rejected submission back into the form
    pub fn from_input(input: &ArticleInput, image_id: Option<i64>) -> Self {
        Self {
            title: input.title.clone(),
            slug: input.slug.clone().unwrap_or_default(),
            summary: input.summary.clone(),
            body: input.body.clone(),
            tags: input.tags.clone(),
            category_ids: input.category_ids.clone(),
            publish: input.publish,
            comments_enabled: input.comments_enabled,
            image_id,
        }
    }

    pub fn category_options(&self, categories: &[Category]) -> Vec<CategoryOption> {
        categories
            .iter()
            .map(|c| CategoryOption {
                id: c.id,
                name: c.name.clone(),
                selected: self.category_ids.contains(&c.id),
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "admin/article_form.html")]
pub struct ArticleFormPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub heading: &'a str,
    pub action: &'a str,
    pub values: &'a ArticleFormValues,
    pub categories: &'a [CategoryOption],
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "admin/comments.html")]
pub struct AdminCommentsPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub comments: &'a Page<QueuedComment>,
    pub approved: &'a str,
    pub flagged: &'a str,
    pub q: &'a str,
    pub page_link: &'a str,
    pub pending_count: i64,
    pub flagged_count: i64,
}

#[derive(Template)]
#[template(path = "admin/categories.html")]
pub struct CategoriesPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub categories: &'a [CategoryStats],
}

#[derive(Template)]
#[template(path = "admin/category_form.html")]
pub struct CategoryFormPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub heading: &'a str,
    pub action: &'a str,
    pub name: &'a str,
    pub slug: &'a str,
    pub description: &'a str,
    pub image_id: Option<i64>,
    pub error: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "admin/tags.html")]
pub struct TagsPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub tags: &'a [Tag],
}

#[derive(Template)]
#[template(path = "admin/tag_form.html")]
pub struct TagFormPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub heading: &'a str,
    pub action: &'a str,
    pub name: &'a str,
    pub slug: &'a str,
    pub error: Option<&'a str>,
}

/// Entry of a `<select>`
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

pub fn role_options(current: &str) -> Vec<SelectOption> {
    Role::ALL
        .iter()
        .map(|role| SelectOption {
            value: role.as_str(),
            label: role.label(),
            selected: role.as_str() == current,
        })
        .collect()
}

pub fn period_options(current: StatsPeriod) -> Vec<SelectOption> {
    StatsPeriod::ALL
        .iter()
        .map(|period| SelectOption {
            value: period.as_str(),
            label: period.label(),
            selected: *period == current,
        })
        .collect()
}

#[derive(Template)]
#[template(path = "admin/users.html")]
pub struct UsersPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub users: &'a Page<User>,
    pub q: &'a str,
    pub roles: &'a [SelectOption],
    pub page_link: &'a str,
}

#[derive(Template)]
#[template(path = "admin/user_form.html")]
pub struct UserFormPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub user: &'a User,
    pub roles: &'a [SelectOption],
    pub error: Option<&'a str>,
    pub notice: Option<&'a str>,
}

#[derive(Template)]
#[template(path = "admin/audit.html")]
pub struct AuditPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub entries: &'a [AuditLogEntry],
}

#[derive(Template)]
#[template(path = "admin/stats.html")]
pub struct StatsPage<'a> {
    pub viewer: Option<&'a SessionUser>,
    pub stats: &'a PeriodStats,
    pub periods: &'a [SelectOption],
}
