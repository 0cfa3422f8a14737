//! Fixed security-header set applied to every response. CORS itself is
//! handled by `tower_http::cors::CorsLayer`, configured in `routes.rs`
//! from the allowed-origins list.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}
