//! Booking administration commands.
//!
//! # Usage
//!
//! ```bash
//! mp-cli bookings list --status pending
//! mp-cli bookings set-status <id> confirmed --notes "Slip checked"
//! mp-cli bookings sweep-drafts --older-than-hours 24
//! ```
//!
//! Status changes follow the booking lifecycle; for example a `pending`
//! booking cannot jump to `returned`.

use chrono::Duration;

use mommypump_core::{BookingId, BookingStatus};
use mommypump_storefront::services::BookingAdmin;

/// Print bookings, newest first.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn list(status: Option<BookingStatus>) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::document_store().await?;
    let bookings = BookingAdmin::new(&store).list(status).await?;

    #[allow(clippy::print_stdout)]
    {
        println!(
            "{:<36} {:<10} {:<24} {:<10} {:<10} {:>10}  CUSTOMER",
            "ID", "STATUS", "PRODUCT", "START", "END", "TOTAL"
        );
        for booking in &bookings {
            println!(
                "{:<36} {:<10} {:<24} {:<10} {:<10} {:>10}  {} {}",
                booking.id.as_str(),
                booking.status.as_str(),
                booking.details.product_name,
                booking.details.start_date.to_string(),
                booking.details.end_date.to_string(),
                booking.details.total_amount.to_string(),
                booking.details.customer.customer_name,
                booking.details.customer.customer_phone
            );
        }
    }
    tracing::info!(count = bookings.len(), "Listed bookings");
    Ok(())
}

/// Move a booking to `status`, optionally replacing its notes.
///
/// # Errors
///
/// Returns an error for unknown bookings or transitions the lifecycle does
/// not allow.
pub async fn set_status(
    id: &str,
    status: BookingStatus,
    notes: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::document_store().await?;
    let booking = BookingAdmin::new(&store)
        .set_status(&BookingId::new(id), status, notes)
        .await?;

    tracing::info!(booking_id = %booking.id, status = %booking.status, "Booking updated");
    Ok(())
}

/// Cancel drafts older than `older_than_hours`.
///
/// # Errors
///
/// Returns an error if the store cannot be read or written.
pub async fn sweep_drafts(older_than_hours: i64) -> Result<(), Box<dyn std::error::Error>> {
    if older_than_hours < 0 {
        return Err("--older-than-hours must not be negative".into());
    }
    let store = super::document_store().await?;
    let cancelled = BookingAdmin::new(&store)
        .sweep_abandoned_drafts(Duration::hours(older_than_hours))
        .await?;

    tracing::info!(count = cancelled.len(), "Abandoned drafts cancelled");
    for id in &cancelled {
        tracing::info!("  {id}");
    }
    Ok(())
}
