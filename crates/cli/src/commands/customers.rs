//! Customer commands.

use mommypump_storefront::db::CustomerRepository;

/// Print every customer profile.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = super::document_store().await?;
    let customers = CustomerRepository::new(&store).list_all().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{:<36} {:<24} {:<14} {:<32} PROVINCE", "ID", "NAME", "PHONE", "EMAIL");
        for customer in &customers {
            println!(
                "{:<36} {:<24} {:<14} {:<32} {}",
                customer.id.as_str(),
                customer.name,
                customer.phone,
                customer
                    .email
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                customer.address.province
            );
        }
    }
    tracing::info!(count = customers.len(), "Listed customers");
    Ok(())
}
