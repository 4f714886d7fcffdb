//! Subcommand implementations.
//!
//! Every command except `migrate` works on the document store through the
//! storefront's repositories and services, so the CLI enforces the same
//! rules as the web app.

pub mod bookings;
pub mod customers;
pub mod migrate;
pub mod products;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use mommypump_storefront::db::{self, PgDocumentStore};

/// Environment variable holding the storefront database URL.
pub const DATABASE_URL_VAR: &str = "STOREFRONT_DATABASE_URL";

/// Errors shared by the commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to the storefront database named by [`DATABASE_URL_VAR`].
///
/// Loads `.env` first.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var(DATABASE_URL_VAR)
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar(DATABASE_URL_VAR))?;

    tracing::debug!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}

/// Open the document store over a fresh pool.
pub async fn document_store() -> Result<PgDocumentStore, CliError> {
    Ok(PgDocumentStore::new(connect().await?))
}
