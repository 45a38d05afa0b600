/// Identity resolution middleware
use crate::context::AppContext;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

/// Resolve the session cookie into an `Identity` before any handler runs
///
/// Unusable credentials are removed from the browser unless the handler
/// already replaced the cookie (e.g. on login).
pub async fn resolve_identity(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_name = ctx.config.session.cookie_name.as_str();
    let credential = jar.get(cookie_name).map(|c| c.value().to_string());

    let resolution = ctx.identity_resolver.resolve(credential.as_deref()).await;
    req.extensions_mut().insert(resolution.identity);

    let mut response = next.run(req).await;

    if resolution.clear_credential && !sets_cookie(&response, cookie_name) {
        match HeaderValue::from_str(&ctx.removal_cookie().to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Could not build removal cookie: {}", e),
        }
    }

    response
}

fn sets_cookie(response: &Response, name: &str) -> bool {
    let prefix = format!("{}=", name);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Client address from the proxy headers, if any
pub fn client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
}
