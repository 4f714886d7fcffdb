//! End-to-end tests for the MommyPump storefront.
//!
//! The tests drive the real router in-process: the same routes, middleware,
//! sessions and rate limits as production, backed by the in-memory document
//! store, image host and identity provider.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mommypump-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `storefront_pages` - Public pages, health checks, login redirects
//! - `booking_flow` - The booking wizard from sign-in to confirmation
//! - `store_consistency` - Concurrent sign-ins and draft cleanup

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use mommypump_storefront::app;
use mommypump_storefront::config::StorefrontConfig;
use mommypump_storefront::db::{DocumentStore, MemoryDocumentStore};
use mommypump_storefront::identity::{IdentityProvider, MemoryIdentityProvider, TEST_CODE};
use mommypump_storefront::images::{ImageHost, MemoryImageHost};
use mommypump_storefront::middleware::create_session_layer;
use mommypump_storefront::middleware::session::SESSION_COOKIE_NAME;
use mommypump_storefront::seed;
use mommypump_storefront::state::AppState;

/// Phone number used by [`TestApp::sign_in_with_phone`].
pub const TEST_PHONE: &str = "0812345678";

/// Client address sent with every request. The rate limiters key on it.
pub const TEST_CLIENT_IP: &str = "203.0.113.7";

const MULTIPART_BOUNDARY: &str = "mommypump-test-boundary";

/// Largest response body the tests read.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// A storefront instance plus the fakes behind it.
///
/// Carries the session cookie between requests like a browser would.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryDocumentStore>,
    pub images: Arc<MemoryImageHost>,
    pub identity: Arc<MemoryIdentityProvider>,
    cookie: Option<String>,
}

/// A buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// The `Location` header of a redirect.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    /// Start a storefront seeded with the demo catalog.
    ///
    /// # Panics
    ///
    /// Panics if the demo catalog cannot be parsed or stored.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryDocumentStore::new());
        let catalog = seed::demo_catalog().expect("demo catalog parses");
        seed::seed_products(store.as_ref(), &catalog)
            .await
            .expect("demo catalog seeds");
        Self::with_store(store)
    }

    /// Start a storefront over an existing store.
    #[must_use]
    pub fn with_store(store: Arc<MemoryDocumentStore>) -> Self {
        let images = Arc::new(MemoryImageHost::new());
        let identity = Arc::new(MemoryIdentityProvider::new());
        let config = StorefrontConfig::for_tests();

        let dyn_store: Arc<dyn DocumentStore> = store.clone();
        let dyn_images: Arc<dyn ImageHost> = images.clone();
        let dyn_identity: Arc<dyn IdentityProvider> = identity.clone();
        let state = AppState::new(config.clone(), dyn_store, dyn_images, dyn_identity);
        let router = app(
            state.clone(),
            create_session_layer(MemoryStore::default(), &config),
        );

        Self {
            router,
            state,
            store,
            images,
            identity,
            cookie: None,
        }
    }

    /// Send a request with the session cookie and read the whole response.
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body cannot be read.
    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        let headers = request.headers_mut();
        headers.insert(
            "x-forwarded-for",
            TEST_CLIENT_IP.parse().expect("valid header value"),
        );
        if let Some(cookie) = &self.cookie {
            headers.insert(header::COOKIE, cookie.parse().expect("valid cookie header"));
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        self.remember_cookie(response.headers());
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), MAX_BODY_BYTES)
            .await
            .expect("response body readable");

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// `GET` a path.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not a valid request target.
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    /// `POST` an urlencoded form.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not a valid request target.
    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("valid request");
        self.send(request).await
    }

    /// `POST` a multipart form with one file field named `receipt`.
    ///
    /// An empty `file_name` and `bytes` mimic a file input left blank.
    ///
    /// # Panics
    ///
    /// Panics if `uri` is not a valid request target.
    pub async fn post_receipt(
        &mut self,
        uri: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> TestResponse {
        let mut body = format!(
            "--{MULTIPART_BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"receipt\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("valid request");
        self.send(request).await
    }

    /// Sign in with [`TEST_PHONE`] and the fake provider's code.
    ///
    /// Returns the final redirect from the confirm step.
    pub async fn sign_in_with_phone(&mut self) -> TestResponse {
        self.sign_in_as_phone(TEST_PHONE).await
    }

    /// Sign in with `phone` and the fake provider's code.
    ///
    /// # Panics
    ///
    /// Panics if either step does not redirect.
    pub async fn sign_in_as_phone(&mut self, phone: &str) -> TestResponse {
        let sent = self.post_form("/auth/phone/send", &[("phone", phone)]).await;
        assert!(sent.status.is_redirection(), "send code: {}", sent.status);
        assert_eq!(sent.location(), Some("/auth/login"));

        let confirmed = self
            .post_form("/auth/phone/confirm", &[("code", TEST_CODE)])
            .await;
        assert!(
            confirmed.status.is_redirection(),
            "confirm code: {}",
            confirmed.status
        );
        confirmed
    }

    fn remember_cookie(&mut self, headers: &HeaderMap) {
        let prefix = format!("{SESSION_COOKIE_NAME}=");
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let Some(pair) = value.split(';').next() else { continue };
            let Some(id) = pair.strip_prefix(&prefix) else { continue };
            self.cookie = if id.is_empty() {
                None
            } else {
                Some(pair.to_owned())
            };
        }
    }
}
