/// HTTP routes and handlers
pub mod accounts;
pub mod admin;
pub mod comments;
pub mod forms;
pub mod health;
pub mod middleware;
pub mod news;
pub mod taxonomy;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build all page and API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(news::routes())
        .merge(accounts::routes())
        .merge(comments::routes())
        .merge(admin::routes())
        .merge(taxonomy::routes())
        .merge(users::routes())
}
