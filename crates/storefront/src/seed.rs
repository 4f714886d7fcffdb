//! Product catalog seeding.
//!
//! Catalog files are YAML lists of product documents in their stored shape
//! (camelCase keys, amounts in satang). Every product is validated before
//! anything is written.

use mommypump_core::catalog::{Product, ProductValidationError};
use mommypump_core::ProductId;
use thiserror::Error;

use crate::db::{DocumentStore, ProductRepository, RepositoryError};

const DEMO_CATALOG: &str = include_str!("../seed/products.yaml");

/// Errors from loading or writing a catalog.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("invalid catalog YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("product {id} is invalid: {}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invalid {
        id: ProductId,
        errors: Vec<ProductValidationError>,
    },

    #[error("product id {0} appears more than once")]
    DuplicateId(ProductId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Parse and validate a catalog file.
///
/// # Errors
///
/// Returns the first invalid or duplicated product, or a YAML error.
pub fn parse_catalog(yaml: &str) -> Result<Vec<Product>, SeedError> {
    let products: Vec<Product> = serde_yaml::from_str(yaml)?;
    let mut seen: Vec<&ProductId> = Vec::with_capacity(products.len());
    for product in &products {
        if seen.contains(&&product.id) {
            return Err(SeedError::DuplicateId(product.id.clone()));
        }
        seen.push(&product.id);
        product.validate().map_err(|errors| SeedError::Invalid {
            id: product.id.clone(),
            errors,
        })?;
    }
    Ok(products)
}

/// The bundled demo catalog.
///
/// # Errors
///
/// Fails only if the bundled file is broken.
pub fn demo_catalog() -> Result<Vec<Product>, SeedError> {
    parse_catalog(DEMO_CATALOG)
}

/// Upsert products by id, keeping booking counts of existing products.
///
/// Returns the number of products written.
///
/// # Errors
///
/// Returns an error if a write fails.
pub async fn seed_products(
    store: &dyn DocumentStore,
    products: &[Product],
) -> Result<usize, SeedError> {
    let repo = ProductRepository::new(store);
    for product in products {
        repo.upsert(product).await?;
        tracing::debug!(product_id = %product.id, "Seeded product");
    }
    tracing::info!(count = products.len(), "Catalog seeded");
    Ok(products.len())
}
