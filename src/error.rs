/// Unified error types for NewsHub
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the portal
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Anonymous identity on a protected route
    #[error("Authentication required: {0}")]
    Authentication(String),

    /// Role is not in the required set
    #[error("Access denied: {0}")]
    Authorization(String),

    /// Malformed input, surfaced inline on the originating form
    #[error("{0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violations that cannot be resolved automatically
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The author's comment privilege has been revoked by staff
    #[error("Comment privilege suspended: {0}")]
    CommentingSuspended(String),

    /// JWT encoding errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Password hashing errors
    #[error("Password hash error: {0}")]
    PasswordHash(String),

    /// Template rendering errors
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body returned by API routes
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) | AppError::CommentingSuspended(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the JSON body
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "AuthenticationRequired",
            AppError::Authorization(_) => "Forbidden",
            AppError::CommentingSuspended(_) => "CommentingSuspended",
            AppError::Validation(_) => "InvalidRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            _ => "InternalServerError",
        }
    }

    /// Message safe to show to the client
    pub fn public_message(&self) -> String {
        match self {
            AppError::Authorization(_) => "Access denied".to_string(),
            AppError::Database(_)
            | AppError::Jwt(_)
            | AppError::PasswordHash(_)
            | AppError::Template(_)
            | AppError::Io(_)
            | AppError::Internal(_) => "Internal server error".to_string(), // Don't leak details
            _ => self.to_string(),
        }
    }

    fn log(&self) {
        if self.status().is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
    }
}

/// Convert AppError to a JSON HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message: self.public_message(),
        });

        (self.status(), body).into_response()
    }
}

/// Result type alias for portal operations
pub type AppResult<T> = Result<T, AppError>;

/// Error wrapper for HTML routes
///
/// Anonymous callers are sent to the login page, everything else is rendered
/// as an error page with the status of the underlying error.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError(err)
    }
}

impl From<sqlx::Error> for PageError {
    fn from(err: sqlx::Error) -> Self {
        PageError(AppError::Database(err))
    }
}

impl From<askama::Error> for PageError {
    fn from(err: askama::Error) -> Self {
        PageError(AppError::Template(err))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let err = self.0;
        err.log();

        let status = err.status();
        let (title, message) = match &err {
            AppError::Authentication(_) => return Redirect::to("/login").into_response(),
            AppError::Authorization(_) => ("Access denied", err.public_message()),
            AppError::CommentingSuspended(_) => ("Access denied", err.public_message()),
            AppError::NotFound(_) => (
                "Page not found",
                "The page you are looking for does not exist.".to_string(),
            ),
            AppError::Validation(_) | AppError::Conflict(_) => ("Invalid request", err.public_message()),
            _ => (
                "Something went wrong",
                "An unexpected error occurred. Please try again later.".to_string(),
            ),
        };

        (status, render_error_page(status, title, &message)).into_response()
    }
}

/// Render the generic error page, falling back to plain markup when the
/// template itself fails
pub fn render_error_page(status: StatusCode, title: &str, message: &str) -> Html<String> {
    use askama::Template;

    let page = crate::views::ErrorPage {
        status: status.as_u16(),
        title,
        message,
    };

    match page.render() {
        Ok(html) => Html(html),
        Err(e) => {
            tracing::error!("Failed to render error page: {}", e);
            Html(format!("<h1>{}</h1><p>{}</p>", status.as_u16(), title))
        }
    }
}

/// Result type alias for HTML handlers
pub type PageResult<T> = Result<T, PageError>;
