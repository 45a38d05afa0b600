/// User administration
use crate::{
    account::{AdminUserUpdate, UserFilter},
    admin::Role,
    api::{
        admin::SuccessResponse,
        forms::{is_checked, page_link, render},
    },
    auth::{Admins, Authorized, PageAuthorized},
    context::AppContext,
    db::account::User,
    error::{AppError, AppResult, PageResult},
    views::{role_options, UserFormPage, UsersPage},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/edit", get(edit_user_page).post(update_user))
        .route("/admin/users/:id/delete", post(delete_user))
        .route("/admin/users/:id/comment-privilege", post(set_comment_privilege))
}

async fn list_users(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    Query(filter): Query<UserFilter>,
) -> PageResult<Html<String>> {
    let users = ctx
        .account_manager
        .list_users(&filter, ctx.config.content.moderation_page_size)
        .await?;

    let q = filter.q.unwrap_or_default();
    let role = filter.role.unwrap_or_default();
    let link = page_link("/admin/users", &[("q", &q), ("role", &role)]);

    Ok(render(&UsersPage {
        viewer: Some(&auth.user),
        users: &users,
        q: &q,
        roles: &role_options(&role),
        page_link: &link,
    })?)
}

fn user_form(
    auth: &PageAuthorized<Admins>,
    user: &User,
    error: Option<&str>,
    notice: Option<&str>,
) -> AppResult<Html<String>> {
    render(&UserFormPage {
        viewer: Some(&auth.user),
        user,
        roles: &role_options(user.role.as_str()),
        error,
        notice,
    })
}

async fn edit_user_page(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    Path(id): Path<i64>,
) -> PageResult<Html<String>> {
    let user = ctx.account_manager.get_user(id).await?;
    Ok(user_form(&auth, &user, None, None)?)
}

#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub username: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub can_comment: Option<String>,
    #[serde(default)]
    pub remove_photo: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

impl UserForm {
    fn into_update(self) -> AppResult<AdminUserUpdate> {
        Ok(AdminUserUpdate {
            role: Role::from_str(&self.role)?,
            can_comment: self.can_comment.as_deref().map(is_checked).unwrap_or(false),
            remove_photo: self.remove_photo.as_deref().map(is_checked).unwrap_or(false),
            username: self.username,
            email: self.email,
            new_password: self.new_password,
        })
    }
}

/// Save a staff edit; a refused role change is reported while the other
/// fields stay saved
async fn update_user(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    Path(id): Path<i64>,
    Form(form): Form<UserForm>,
) -> PageResult<Response> {
    let result = match form.into_update() {
        Ok(update) => ctx.account_manager.admin_update_user(&auth.user, id, update).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => match outcome.role_error {
            Some(role_error) => {
                let notice = "The other changes were saved.";
                let page = user_form(&auth, &outcome.user, Some(&role_error), Some(notice))?;
                Ok((StatusCode::BAD_REQUEST, page).into_response())
            }
            None => Ok(user_form(&auth, &outcome.user, None, Some("User updated."))?.into_response()),
        },
        Err(AppError::Validation(message)) => {
            let user = ctx.account_manager.get_user(id).await?;
            let page = user_form(&auth, &user, Some(&message), None)?;
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete_user(
    State(ctx): State<AppContext>,
    auth: Authorized<Admins>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse>> {
    ctx.account_manager.delete_user(&auth.user, id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct CommentPrivilegeRequest {
    pub can_comment: bool,
}

async fn set_comment_privilege(
    State(ctx): State<AppContext>,
    auth: Authorized<Admins>,
    Path(id): Path<i64>,
    Json(req): Json<CommentPrivilegeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.account_manager
        .set_comment_privilege(&auth.user, id, req.can_comment)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "can_comment": req.can_comment
    })))
}
