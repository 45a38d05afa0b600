/// Registration, login, password reset and profile pages
use crate::{
    account::ProfileUpdate,
    api::forms::{render, MultipartForm},
    auth::{safe_next, AnyUser, PageAuthorized},
    context::AppContext,
    error::{AppError, PageResult},
    identity::Identity,
    validation,
    views::{
        ForgotPasswordPage, LoginPage, ProfileEditPage, ProfilePage, RegisterPage,
        ResetPasswordPage,
    },
};
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

/// Shown whether or not the email belongs to an account
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a link to reset the password has been sent.";

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
        .route("/forgot-password", get(forgot_password_page).post(forgot_password))
        .route("/reset-password", get(reset_password_page).post(reset_password))
        .route("/user", get(profile))
        .route("/user/edit", get(profile_edit_page).post(profile_edit))
}

/// Re-render a form with the message of a validation failure; other errors
/// go to the error page
fn form_error(
    err: AppError,
    status: StatusCode,
    rerender: impl FnOnce(&str) -> Result<Html<String>, AppError>,
) -> PageResult<Response> {
    match err {
        AppError::Validation(message) => Ok((status, rerender(&message)?).into_response()),
        other => Err(other.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

async fn register_page(identity: Identity) -> PageResult<Response> {
    if !identity.is_anonymous() {
        return Ok(Redirect::to("/").into_response());
    }

    Ok(render(&RegisterPage {
        viewer: None,
        error: None,
        username: "",
        email: "",
    })?
    .into_response())
}

async fn register(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> PageResult<Response> {
    let registered = match validation::validate_new_password(&form.password, &form.confirm_password) {
        Ok(()) => {
            ctx.account_manager
                .register(&form.username, &form.email, &form.password)
                .await
        }
        Err(e) => Err(e),
    };

    match registered {
        Ok(user) => {
            let cookie = ctx.session_cookie(&user)?;
            Ok((jar.add(cookie), Redirect::to("/")).into_response())
        }
        Err(e) => form_error(e, StatusCode::BAD_REQUEST, |message| {
            render(&RegisterPage {
                viewer: None,
                error: Some(message),
                username: &form.username,
                email: &form.email,
            })
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

async fn login_page(identity: Identity, Query(query): Query<NextQuery>) -> PageResult<Response> {
    let next = safe_next(query.next.as_deref());
    if !identity.is_anonymous() {
        return Ok(Redirect::to(next).into_response());
    }

    Ok(render(&LoginPage {
        viewer: None,
        error: None,
        email: "",
        next,
    })?
    .into_response())
}

async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> PageResult<Response> {
    let next = safe_next(form.next.as_deref());

    match ctx.account_manager.authenticate(&form.email, &form.password).await {
        Ok(user) => {
            let cookie = ctx.session_cookie(&user)?;
            Ok((jar.add(cookie), Redirect::to(next)).into_response())
        }
        Err(AppError::Authentication(message)) => Ok((
            StatusCode::UNAUTHORIZED,
            render(&LoginPage {
                viewer: None,
                error: Some(&message),
                email: &form.email,
                next,
            })?,
        )
            .into_response()),
        Err(e) => Err(e.into()),
    }
}

async fn logout(State(ctx): State<AppContext>, jar: CookieJar, identity: Identity) -> impl IntoResponse {
    if let Some(user) = identity.user() {
        tracing::info!("Account {} logged out", user.id);
    }

    (
        jar.add(ctx.removal_cookie()),
        Json(serde_json::json!({ "success": true })),
    )
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

async fn forgot_password_page(identity: Identity) -> PageResult<Html<String>> {
    Ok(render(&ForgotPasswordPage {
        viewer: identity.user(),
        message: None,
    })?)
}

/// Issue and mail a reset link; the answer never reveals whether the email
/// is registered
async fn forgot_password(
    State(ctx): State<AppContext>,
    identity: Identity,
    Form(form): Form<ForgotPasswordForm>,
) -> PageResult<Html<String>> {
    if let Some((user, token)) = ctx.account_manager.issue_password_reset(&form.email).await? {
        if let Err(e) = ctx
            .mailer
            .send_password_reset_email(&user.email, &user.username, &token, &ctx.config.service.public_url)
            .await
        {
            tracing::warn!("Failed to send password reset email to account {}: {}", user.id, e);
        }
    }

    Ok(render(&ForgotPasswordPage {
        viewer: identity.user(),
        message: Some(RESET_REQUESTED_MESSAGE),
    })?)
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

async fn reset_password_page(
    State(ctx): State<AppContext>,
    identity: Identity,
    Query(query): Query<TokenQuery>,
) -> PageResult<Response> {
    let token = query.token.unwrap_or_default();

    let error = match ctx.account_manager.check_reset_token(&token).await {
        Ok(_) => None,
        Err(AppError::Validation(message)) => Some(message),
        Err(e) => return Err(e.into()),
    };

    let status = if error.is_some() { StatusCode::BAD_REQUEST } else { StatusCode::OK };

    Ok((
        status,
        render(&ResetPasswordPage {
            viewer: identity.user(),
            token: &token,
            error: error.as_deref(),
            done: false,
        })?,
    )
        .into_response())
}

async fn reset_password(
    State(ctx): State<AppContext>,
    identity: Identity,
    Form(form): Form<ResetPasswordForm>,
) -> PageResult<Response> {
    let result = match validation::validate_new_password(&form.password, &form.confirm_password) {
        Ok(()) => ctx.account_manager.reset_password(&form.token, &form.password).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(render(&ResetPasswordPage {
            viewer: identity.user(),
            token: "",
            error: None,
            done: true,
        })?
        .into_response()),
        Err(e) => form_error(e, StatusCode::BAD_REQUEST, |message| {
            render(&ResetPasswordPage {
                viewer: identity.user(),
                token: &form.token,
                error: Some(message),
                done: false,
            })
        }),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub updated: Option<String>,
}

async fn profile(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<AnyUser>,
    Query(query): Query<ProfileQuery>,
) -> PageResult<Html<String>> {
    let user = ctx.account_manager.get_user(auth.id).await?;
    let favorites = ctx.article_manager.favorites(auth.id).await?;

    Ok(render(&ProfilePage {
        viewer: Some(&auth.user),
        user: &user,
        favorites: &favorites,
        notice: query.updated.as_ref().map(|_| "Profile updated."),
    })?)
}

async fn profile_edit_page(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<AnyUser>,
) -> PageResult<Html<String>> {
    let user = ctx.account_manager.get_user(auth.id).await?;

    Ok(render(&ProfileEditPage {
        viewer: Some(&auth.user),
        user: &user,
        error: None,
    })?)
}

fn profile_update(form: &MultipartForm, ctx: &AppContext) -> Result<ProfileUpdate, AppError> {
    Ok(ProfileUpdate {
        username: form.text("username"),
        bio: form.optional("bio"),
        phone: form.optional("phone"),
        cep: form.optional("cep"),
        district: form.optional("district"),
        address: form.optional("address"),
        address_complement: form.optional("address_complement"),
        current_password: form.text("current_password"),
        new_password: form.optional("new_password"),
        confirm_password: form.optional("confirm_password"),
        image: form.image("image", &ctx.image_store)?,
    })
}

/// Save the profile; a password change reissues the session cookie
async fn profile_edit(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<AnyUser>,
    jar: CookieJar,
    multipart: Multipart,
) -> PageResult<Response> {
    let form = MultipartForm::read(multipart).await?;
    let changes_password = form.optional("new_password").is_some();

    let result = match profile_update(&form, &ctx) {
        Ok(update) => ctx.account_manager.update_profile(auth.id, update).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(user) => {
            let jar = if changes_password {
                jar.add(ctx.session_cookie(&user)?)
            } else {
                jar
            };
            Ok((jar, Redirect::to("/user?updated=1")).into_response())
        }
        Err(e) => {
            let user = ctx.account_manager.get_user(auth.id).await?;
            form_error(e, StatusCode::BAD_REQUEST, |message| {
                render(&ProfileEditPage {
                    viewer: Some(&auth.user),
                    user: &user,
                    error: Some(message),
                })
            })
        }
    }
}
