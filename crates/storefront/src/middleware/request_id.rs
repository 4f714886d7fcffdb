//! Request ID middleware for request tracing and correlation.
//!
//! Every request gets an id, taken from an upstream proxy when it sent a
//! usable one. The id is recorded on the tracing span, tagged on the Sentry
//! scope and echoed in the response headers so customers can quote it when
//! a booking fails.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted.
const MAX_REQUEST_ID_LEN: usize = 128;

/// An upstream id is reused only if it is short printable ASCII.
fn usable_upstream_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value.bytes().all(|b| b.is_ascii_graphic())
}

/// Middleware that ensures every request has a unique request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| usable_upstream_id(id))
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", &request_id);
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_ids_are_filtered() {
        assert!(usable_upstream_id("8f14e45f-ceea-467f-a2b3-1c2f9a3d1e77"));
        assert!(!usable_upstream_id(""));
        assert!(!usable_upstream_id("has space"));
        assert!(!usable_upstream_id(&"x".repeat(MAX_REQUEST_ID_LEN + 1)));
    }
}
