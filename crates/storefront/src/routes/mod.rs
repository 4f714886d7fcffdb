//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /health                 - Health check
//! GET  /health/ready           - Readiness check (document store)
//!
//! # Products
//! GET  /products               - Product listing (?brand=&type=&sort=)
//! GET  /products/{id}          - Product detail (?rental=)
//!
//! # Booking wizard (requires auth)
//! GET  /products/{id}/booking              - Current step (?rental=)
//! POST /products/{id}/booking/shipping     - Step 1 form
//! POST /products/{id}/booking/back         - Step 2 back to step 1
//! POST /products/{id}/booking/payment      - Step 2 receipt upload (multipart)
//! GET  /products/{id}/booking/confirmation - Step 3
//!
//! # Auth
//! GET  /auth/login             - Login page (?redirect=)
//! GET  /auth/google/login      - Redirect to Google consent
//! GET  /auth/google/callback   - Handle OAuth callback
//! POST /auth/phone/send        - Send SMS code
//! POST /auth/phone/confirm     - Confirm SMS code
//! POST /auth/logout            - Logout action
//!
//! # Account (requires auth)
//! GET  /account                - Profile and booking history
//! POST /account/profile        - Update profile
//! ```

pub mod account;
pub mod auth;
pub mod booking;
pub mod home;
pub mod products;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::middleware::{auth_rate_limiter, booking_rate_limiter};
use crate::state::AppState;

/// Request body limit for the payment form. Larger than the receipt limit
/// so oversized images reach validation and get a form error.
pub const PAYMENT_BODY_LIMIT: usize = 8 * 1024 * 1024;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/google/login", get(auth::google_login))
        .route("/phone/send", post(auth::phone_send))
        .route("/phone/confirm", post(auth::phone_confirm))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/google/callback", get(auth::google_callback))
        .route("/logout", post(auth::logout))
        .merge(limited)
}

/// Create the booking wizard router, nested under a product.
pub fn booking_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/shipping", post(booking::submit_shipping))
        .route("/back", post(booking::back))
        .route(
            "/payment",
            post(booking::submit_payment).layer(DefaultBodyLimit::max(PAYMENT_BODY_LIMIT)),
        )
        .layer(booking_rate_limiter());

    Router::new()
        .route("/", get(booking::show))
        .route("/confirmation", get(booking::confirmation))
        .merge(limited)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
        .nest("/{id}/booking", booking_routes())
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/profile", post(account::update_profile))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
}
