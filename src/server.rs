/// HTTP server setup and routing
use crate::{
    api::middleware::resolve_identity,
    context::AppContext,
    error::{render_error_page, AppError, AppResult},
};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

/// Room for the text fields sent next to an image upload
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let body_limit = ctx.config.storage.image_upload_limit + FORM_OVERHEAD_BYTES;

    Router::new()
        .merge(crate::api::routes())
        .nest_service("/static", ServeDir::new("static"))
        // Provide state - converts Router<AppContext> to Router<()>
        .with_state(ctx.clone())
        // Every handler sees the resolved identity
        .layer(middleware::from_fn_with_state(ctx, resolve_identity))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .fallback(not_found)
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        render_error_page(
            StatusCode::NOT_FOUND,
            "Page not found",
            "The page you are looking for does not exist.",
        ),
    )
        .into_response()
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> AppResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("NewsHub listening on {}", addr);
    info!("   Public URL: {}", ctx.config.service.public_url);

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        admin::Role,
        test_support::{insert_article, insert_user},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn set_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string())
    }

    /// Log in through the form and return the `Cookie` header value
    async fn login(app: &Router, email: &str, password: &str) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "email={}&password={}&next=%2Fuser",
                urlencoding::encode(email),
                urlencoding::encode(password)
            )))
            .unwrap();

        let response = send(app, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/user");

        let cookie = set_cookie(&response).unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(AppContext::for_tests().await);

        let response = send(&app, get("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("\"status\":\"ok\""));
    }

    #[tokio::test]
    async fn test_home_lists_only_published() {
        let ctx = AppContext::for_tests().await;
        let author = insert_user(&ctx.db, "editor", Role::Editor).await;
        insert_article(&ctx.db, author, "Visible story", true).await;
        insert_article(&ctx.db, author, "Hidden draft", false).await;
        let app = build_router(ctx);

        let response = send(&app, get("/", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_text(response).await;
        assert!(html.contains("Visible story"));
        assert!(!html.contains("Hidden draft"));
    }

    #[tokio::test]
    async fn test_draft_page_is_not_found_for_anonymous() {
        let ctx = AppContext::for_tests().await;
        let author = insert_user(&ctx.db, "editor", Role::Editor).await;
        insert_article(&ctx.db, author, "Hidden draft", false).await;
        let app = build_router(ctx);

        let response = send(&app, get("/news/hidden-draft", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Page not found"));
    }

    #[tokio::test]
    async fn test_unknown_route_renders_not_found_page() {
        let app = build_router(AppContext::for_tests().await);

        let response = send(&app, get("/nowhere", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("404"));
    }

    #[tokio::test]
    async fn test_admin_redirects_anonymous_to_login() {
        let app = build_router(AppContext::for_tests().await);

        let response = send(&app, get("/admin/news", None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login?next=%2Fadmin%2Fnews");
    }

    #[tokio::test]
    async fn test_comment_api_requires_login() {
        let app = build_router(AppContext::for_tests().await);

        let request = Request::builder()
            .method("POST")
            .uri("/comments")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"article_id":1,"body":"hello"}"#))
            .unwrap();

        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("AuthenticationRequired"));
    }

    #[tokio::test]
    async fn test_garbage_cookie_is_cleared() {
        let app = build_router(AppContext::for_tests().await);

        let response = send(&app, get("/", Some("jwt=not-a-token"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = set_cookie(&response).unwrap();
        assert!(cookie.starts_with("jwt=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_login_session_and_logout() {
        let ctx = AppContext::for_tests().await;
        ctx.account_manager
            .register("reader", "reader@newshub.com", "Secret1!")
            .await
            .unwrap();
        let app = build_router(ctx);

        let cookie = login(&app, "reader@newshub.com", "Secret1!").await;
        assert!(cookie.starts_with("jwt="));

        let response = send(&app, get("/user", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).is_none());
        assert!(body_text(response).await.contains("reader@newshub.com"));

        let request = Request::builder()
            .method("POST")
            .uri("/logout")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookie(&response).unwrap().starts_with("jwt=;"));
        assert!(body_text(response).await.contains("\"success\":true"));
    }

    #[tokio::test]
    async fn test_wrong_password_rerenders_login() {
        let ctx = AppContext::for_tests().await;
        ctx.account_manager
            .register("reader", "reader@newshub.com", "Secret1!")
            .await
            .unwrap();
        let app = build_router(ctx);

        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=reader%40newshub.com&password=wrong"))
            .unwrap();

        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookie(&response).is_none());
        assert!(body_text(response).await.contains("Invalid email or password"));
    }

    #[tokio::test]
    async fn test_reader_is_forbidden_from_admin() {
        let ctx = AppContext::for_tests().await;
        ctx.account_manager
            .register("reader", "reader@newshub.com", "Secret1!")
            .await
            .unwrap();
        let app = build_router(ctx);

        let cookie = login(&app, "reader@newshub.com", "Secret1!").await;
        let response = send(&app, get("/admin", Some(&cookie))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_text(response).await.contains("Access denied"));
    }

    #[tokio::test]
    async fn test_huge_page_number_renders_empty_listing() {
        let ctx = AppContext::for_tests().await;
        let author = insert_user(&ctx.db, "editor", Role::Editor).await;
        insert_article(&ctx.db, author, "Visible story", true).await;
        let app = build_router(ctx);

        for uri in [
            "/news?page=9223372036854775807",
            "/search?q=story&page=9223372036854775807",
        ] {
            let response = send(&app, get(uri, None)).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(!body_text(response).await.contains("Visible story"));
        }
    }

    #[tokio::test]
    async fn test_login_ignores_backslash_next() {
        let ctx = AppContext::for_tests().await;
        ctx.account_manager
            .register("reader", "reader@newshub.com", "Secret1!")
            .await
            .unwrap();
        let app = build_router(ctx);

        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                "email=reader%40newshub.com&password=Secret1%21&next=%2F%5Cevil.com",
            ))
            .unwrap();

        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }

    #[tokio::test]
    async fn test_refused_promotion_rerenders_user_form() {
        let ctx = AppContext::for_tests().await;
        ctx.account_manager
            .create_with_role("admin", "admin@newshub.com", "Admin123!", Role::Admin)
            .await
            .unwrap();
        let target = ctx
            .account_manager
            .register("reader", "reader@newshub.com", "Secret1!")
            .await
            .unwrap();
        let app = build_router(ctx.clone());

        let cookie = login(&app, "admin@newshub.com", "Admin123!").await;
        let request = Request::builder()
            .method("POST")
            .uri(format!("/admin/users/{}/edit", target.id))
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                "username=renamed&email=reader%40newshub.com&role=admin&can_comment=on",
            ))
            .unwrap();

        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let html = body_text(response).await;
        assert!(html.contains("Only a super admin can promote users to admin or super admin"));
        assert!(html.contains("The other changes were saved."));

        let user = ctx.account_manager.get_user(target.id).await.unwrap();
        assert_eq!(user.role, Role::Reader);
        assert_eq!(user.username, "renamed");
    }

    #[tokio::test]
    async fn test_forgot_password_answer_is_neutral() {
        let ctx = AppContext::for_tests().await;
        ctx.account_manager
            .register("reader", "reader@newshub.com", "Secret1!")
            .await
            .unwrap();
        let app = build_router(ctx);

        let mut pages = Vec::new();
        for email in ["reader%40newshub.com", "nobody%40newshub.com"] {
            let request = Request::builder()
                .method("POST")
                .uri("/forgot-password")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("email={}", email)))
                .unwrap();
            let response = send(&app, request).await;
            assert_eq!(response.status(), StatusCode::OK);
            pages.push(body_text(response).await);
        }

        assert_eq!(pages[0], pages[1]);
    }
}
