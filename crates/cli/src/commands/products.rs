//! Product management commands.

use mommypump_core::{ProductId, ProductStatus};
use mommypump_storefront::db::ProductRepository;

/// Print every product with its status and popularity.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = super::document_store().await?;
    let products = ProductRepository::new(&store).list_all().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{:<12} {:<32} {:<12} {:>10} {:>8}", "ID", "NAME", "STATUS", "PRICE", "BOOKED");
        for product in &products {
            println!(
                "{:<12} {:<32} {:<12} {:>10} {:>8}",
                product.id.as_str(),
                product.name,
                product.status.as_str(),
                product.rental_price.to_string(),
                product.booking_count
            );
        }
    }
    tracing::info!(count = products.len(), "Listed products");
    Ok(())
}

/// Change a product's availability.
///
/// # Errors
///
/// Returns an error if the product does not exist or the store fails.
pub async fn set_status(id: &str, status: ProductStatus) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::document_store().await?;
    let product = ProductRepository::new(&store)
        .set_status(&ProductId::new(id), status)
        .await?;

    tracing::info!(product_id = %product.id, status = %product.status, "Product status updated");
    Ok(())
}
