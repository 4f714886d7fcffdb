//! Seed the product catalog from YAML.
//!
//! The file is a list of products in the stored document shape (camelCase
//! keys, amounts in satang). See `crates/storefront/seed/products.yaml`.
//! Products are upserted by id; booking counts of existing products are
//! kept.

use std::path::Path;

use tracing::info;

use mommypump_storefront::seed;

/// Seed products from `file_path`, or the bundled demo catalog.
///
/// The catalog is validated before connecting to the database.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the catalog is invalid, or
/// the store cannot be written.
pub async fn products(file_path: Option<&str>, demo: bool) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = match file_path {
        Some(file_path) if !demo => {
            let path = Path::new(file_path);
            if !path.exists() {
                return Err(format!("File not found: {file_path}").into());
            }
            info!(path = %file_path, "Loading catalog from file");
            let content = tokio::fs::read_to_string(path).await?;
            seed::parse_catalog(&content)?
        }
        _ => {
            info!("Using bundled demo catalog");
            seed::demo_catalog()?
        }
    };
    info!(products = catalog.len(), "Catalog validated");

    let store = super::document_store().await?;
    let written = seed::seed_products(&store, &catalog).await?;

    info!("Seeding complete!");
    info!("  Products written: {written}");
    Ok(())
}
