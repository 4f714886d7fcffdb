//! Security headers for every storefront response.
//!
//! The only third-party origins the pages load from are the Cloudinary CDN
//! (product photos), Google profile pictures and Google's reCAPTCHA, which
//! the phone sign-in form needs.

use std::sync::LazyLock;

use axum::{
    extract::Request,
    http::{
        HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

const IMAGE_ORIGINS: &[&str] = &["https://res.cloudinary.com", "https://lh3.googleusercontent.com"];
const RECAPTCHA_SCRIPT_ORIGINS: &[&str] = &[
    "https://www.google.com/recaptcha/",
    "https://www.gstatic.com/recaptcha/",
];
const RECAPTCHA_FRAME_ORIGINS: &[&str] = &[
    "https://www.google.com/recaptcha/",
    "https://recaptcha.google.com/recaptcha/",
];

/// Browser features no page uses. Camera stays off too: receipts are picked
/// from files, not captured in the page.
const DENIED_FEATURES: &[&str] = &[
    "camera",
    "microphone",
    "geolocation",
    "payment",
    "usb",
    "serial",
    "hid",
    "display-capture",
    "browsing-topics",
    "interest-cohort",
];

/// Prefix of the static asset mount; those responses may be cached.
const STATIC_PREFIX: &str = "/static/";

static CSP: LazyLock<String> = LazyLock::new(|| {
    [
        "default-src 'none'".to_owned(),
        format!("script-src 'self' {}", RECAPTCHA_SCRIPT_ORIGINS.join(" ")),
        "style-src 'self'".to_owned(),
        format!("img-src 'self' data: {}", IMAGE_ORIGINS.join(" ")),
        "connect-src 'self'".to_owned(),
        format!("frame-src {}", RECAPTCHA_FRAME_ORIGINS.join(" ")),
        "object-src 'none'".to_owned(),
        "base-uri 'self'".to_owned(),
        // Google sign-in is a redirect, so forms only post back here.
        "form-action 'self'".to_owned(),
        "frame-ancestors 'none'".to_owned(),
    ]
    .join("; ")
});

static PERMISSIONS_POLICY: LazyLock<String> = LazyLock::new(|| {
    DENIED_FEATURES
        .iter()
        .map(|feature| format!("{feature}=()"))
        .collect::<Vec<_>>()
        .join(", ")
});

/// Add security headers to the response.
///
/// - `X-Frame-Options: DENY` and `frame-ancestors 'none'`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: strict-origin-when-cross-origin`, so Cloudinary still sees
///   an origin but never a booking path
/// - a CSP limited to the origins above
/// - `Permissions-Policy` denying unused features
/// - `Cache-Control: no-store` on everything but `/static/`, since pages carry
///   customer names, addresses and booking ids
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let cacheable = request.uri().path().starts_with(STATIC_PREFIX);
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if let Ok(csp) = HeaderValue::from_str(&CSP) {
        headers.insert(CONTENT_SECURITY_POLICY, csp);
    }
    if let Ok(policy) = HeaderValue::from_str(&PERMISSIONS_POLICY) {
        headers.insert("permissions-policy", policy);
    }

    if !cacheable {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .route("/static/css/main.css", get(|| async { "body {}" }))
            .layer(axum::middleware::from_fn(security_headers_middleware))
    }

    async fn get_headers(path: &str) -> axum::http::HeaderMap {
        router()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .headers()
            .clone()
    }

    #[tokio::test]
    async fn csp_allows_image_cdn_and_recaptcha() {
        let headers = get_headers("/").await;

        let csp = headers.get(CONTENT_SECURITY_POLICY).unwrap().to_str().unwrap();
        assert!(csp.contains("img-src 'self' data: https://res.cloudinary.com"));
        assert!(csp.contains("frame-src https://www.google.com/recaptcha/"));
        assert!(csp.contains("frame-ancestors 'none'"));
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "DENY");

        let permissions = headers.get("permissions-policy").unwrap().to_str().unwrap();
        assert!(permissions.starts_with("camera=(), microphone=()"));
    }

    #[tokio::test]
    async fn pages_are_not_cached_but_assets_are() {
        assert_eq!(get_headers("/").await.get(CACHE_CONTROL).unwrap(), "no-store");
        assert!(get_headers("/static/css/main.css").await.get(CACHE_CONTROL).is_none());
    }
}
