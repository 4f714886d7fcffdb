//! Document storage for the storefront.
//!
//! All business data lives in a small document store: named collections of
//! JSON documents addressed by string ids. Two backends implement
//! [`DocumentStore`]:
//!
//! - [`PgDocumentStore`] - `PostgreSQL` `JSONB` table (production)
//! - [`MemoryDocumentStore`] - process-local map (demo mode and tests)
//!
//! Typed repositories ([`ProductRepository`], [`CustomerRepository`],
//! [`BookingRepository`]) sit on top and convert between documents and the
//! domain types in `mommypump_core`.
//!
//! # Collections
//!
//! - `products` - Rentable products (authored by staff)
//! - `customers` - One profile per identity subject
//! - `bookings` - Rental bookings, from `draft` to `returned`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p mommypump-cli -- migrate
//! ```

mod bookings;
mod customers;
mod document;
mod memory;
mod postgres;
mod products;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub use bookings::BookingRepository;
pub use customers::CustomerRepository;
pub use document::{Direction, Document, DocumentStore, Query};
pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;
pub use products::ProductRepository;

/// Collection names.
pub mod collections {
    pub const PRODUCTS: &str = "products";
    pub const CUSTOMERS: &str = "customers";
    pub const BOOKINGS: &str = "bookings";
}

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A document could not be converted to or from its domain type.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data failed validation (e.g., wrong shape in the database).
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Document not found.
    #[error("not found")]
    NotFound,

    /// Conflict (e.g., duplicate id).
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Current time truncated to whole milliseconds, the resolution documents store.
#[must_use]
pub fn now_millis() -> chrono::DateTime<chrono::Utc> {
    let now = chrono::Utc::now();
    chrono::DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
