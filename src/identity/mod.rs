/// Per-request identity resolution
///
/// Turns the session cookie into an [`Identity`] before any handler runs.
/// Authorization attributes are always re-read from the store so role and
/// privilege changes apply on the next request.

pub mod resolver;
pub mod token;

pub use resolver::{IdentityResolver, Resolution};
pub use token::{SessionClaims, SessionTokens};

use crate::{admin::Role, error::AppResult};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use std::convert::Infallible;

/// Authorization and display attributes of a logged-in account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub can_comment: bool,
    pub verified: bool,
    pub profile_image_id: Option<i64>,
}

impl SessionUser {
    pub fn is_staff(&self) -> bool {
        self.role.can_act_as(Role::Editor)
    }

    pub fn is_admin(&self) -> bool {
        self.role.manages_all_content()
    }
}

/// Resolved actor of a request
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Identity {
    #[default]
    Anonymous,
    User(SessionUser),
}

impl Identity {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

/// Stored identity row plus the session version tokens must carry
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub user: SessionUser,
    pub session_version: i64,
}

/// Identity lookup used by the resolver
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity(&self, user_id: i64) -> AppResult<Option<IdentityRecord>>;
}

/// Reads the identity placed in the request extensions by the resolver
/// middleware; requests that bypassed it are anonymous
#[axum::async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_default())
    }
}
