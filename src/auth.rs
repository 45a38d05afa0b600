/// Access guard extractors
///
/// Handlers declare the roles they accept through the extractor type:
/// `Authorized<Staff>` for JSON routes, `PageAuthorized<Staff>` for HTML
/// routes. Both read the identity placed in the request by the resolver
/// middleware.
use crate::{
    admin::RoleSet,
    error::{AppError, PageError},
    identity::{Identity, SessionUser},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use std::{marker::PhantomData, ops::Deref};

/// Allow the identity if its role is in `required`
///
/// Denials never name the sufficient roles.
pub fn guard(identity: &Identity, required: RoleSet) -> Result<SessionUser, AppError> {
    match identity {
        Identity::Anonymous => Err(AppError::Authentication(
            "Login required".to_string(),
        )),
        Identity::User(user) if required.contains(user.role) => Ok(user.clone()),
        Identity::User(user) => {
            tracing::warn!("User {} ({}) denied access", user.id, user.role);
            Err(AppError::Authorization(format!(
                "Role {} is not allowed",
                user.role
            )))
        }
    }
}

/// Role set accepted by a guarded route
pub trait Requirement: Send + Sync + 'static {
    const ROLES: RoleSet;
}

/// Any logged-in account
pub struct AnyUser;
/// Editor, admin and super-admin
pub struct Staff;
/// Admin and super-admin
pub struct Admins;
pub struct SuperAdmins;

impl Requirement for AnyUser {
    const ROLES: RoleSet = RoleSet::AUTHENTICATED;
}

impl Requirement for Staff {
    const ROLES: RoleSet = RoleSet::STAFF;
}

impl Requirement for Admins {
    const ROLES: RoleSet = RoleSet::ADMINS;
}

impl Requirement for SuperAdmins {
    const ROLES: RoleSet = RoleSet::SUPER_ADMIN;
}

fn request_identity(parts: &Parts) -> Identity {
    parts.extensions.get::<Identity>().cloned().unwrap_or_default()
}

/// Guarded user for JSON routes; rejects with 401/403 JSON
pub struct Authorized<R: Requirement = AnyUser> {
    pub user: SessionUser,
    _requirement: PhantomData<R>,
}

impl<R: Requirement> Deref for Authorized<R> {
    type Target = SessionUser;

    fn deref(&self) -> &SessionUser {
        &self.user
    }
}

#[async_trait]
impl<S, R> FromRequestParts<S> for Authorized<R>
where
    S: Send + Sync,
    R: Requirement,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = guard(&request_identity(parts), R::ROLES)?;

        Ok(Authorized {
            user,
            _requirement: PhantomData,
        })
    }
}

/// Guarded user for HTML routes; anonymous callers go to the login page
/// and return here afterwards
pub struct PageAuthorized<R: Requirement = AnyUser> {
    pub user: SessionUser,
    _requirement: PhantomData<R>,
}

impl<R: Requirement> Deref for PageAuthorized<R> {
    type Target = SessionUser;

    fn deref(&self) -> &SessionUser {
        &self.user
    }
}

/// Login URL that sends the user back to `path` afterwards
pub fn login_redirect(path: &str) -> Redirect {
    Redirect::to(&format!("/login?next={}", urlencoding::encode(path)))
}

#[async_trait]
impl<S, R> FromRequestParts<S> for PageAuthorized<R>
where
    S: Send + Sync,
    R: Requirement,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match guard(&request_identity(parts), R::ROLES) {
            Ok(user) => Ok(PageAuthorized {
                user,
                _requirement: PhantomData,
            }),
            Err(AppError::Authentication(_)) => {
                let path = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(login_redirect(path).into_response())
            }
            Err(e) => Err(PageError(e).into_response()),
        }
    }
}

/// Only allow local paths as post-login destinations
///
/// Browsers read `\` as `/` and drop tabs and newlines, so `/\host` and
/// `/\t/host` are protocol-relative too.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !matches!(path.as_bytes().get(1).copied(), Some(b'/' | b'\\'))
                && !path.chars().any(char::is_control) =>
        {
            path
        }
        _ => "/",
    }
}
