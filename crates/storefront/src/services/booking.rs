//! Booking service.
//!
//! Connects the core booking flow to the document store and image host,
//! and provides the administrative operations on stored bookings.

use chrono::{Duration, NaiveDate};
use thiserror::Error;
use uuid::Uuid;

use mommypump_core::booking::{
    Booking, BookingFlow, BookingFlowError, BookingGateway, GatewayError, NewBooking, Receipt,
    ResolutionError,
};
use mommypump_core::customer::Customer;
use mommypump_core::{BookingId, BookingStatus, ContentId, CustomerId, ProductId, RentalOptionId};

use super::catalog::{CatalogService, ProductCache};
use crate::db::{BookingRepository, DocumentStore, ProductRepository, RepositoryError, now_millis};
use crate::images::{ImageHost, ImageUpload, RECEIPTS_FOLDER};

/// Drafts older than this many hours are considered abandoned.
pub const DEFAULT_DRAFT_MAX_AGE_HOURS: i64 = 24;

/// Note written on drafts cancelled by the sweeper.
const ABANDONED_NOTE: &str = "Cancelled automatically: payment was never completed";

/// Errors from booking administration.
#[derive(Debug, Error)]
pub enum BookingServiceError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("booking not found: {0}")]
    NotFound(BookingId),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("booking {0} changed while it was being updated")]
    Concurrent(BookingId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

// =============================================================================
// Gateway
// =============================================================================

/// [`BookingGateway`] over the document store and image host.
pub struct StoreBookingGateway<'a> {
    bookings: BookingRepository<'a>,
    images: &'a dyn ImageHost,
}

impl<'a> StoreBookingGateway<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore, images: &'a dyn ImageHost) -> Self {
        Self {
            bookings: BookingRepository::new(store),
            images,
        }
    }
}

impl BookingGateway for StoreBookingGateway<'_> {
    async fn reserve_draft(&self, token: Uuid, booking: &NewBooking) -> Result<BookingId, GatewayError> {
        let draft = Booking::draft(BookingId::generate(), booking.clone(), now_millis());
        let (stored, created) = self
            .bookings
            .reserve_draft(token, &draft)
            .await
            .map_err(|e| GatewayError::new(e.to_string()))?;
        if created {
            tracing::info!(booking_id = %stored.id, %token, "Draft booking reserved");
        } else {
            tracing::info!(booking_id = %stored.id, %token, "Joined existing draft booking");
        }
        Ok(stored.id)
    }

    async fn upload_receipt(
        &self,
        booking_id: &BookingId,
        receipt: &Receipt,
    ) -> Result<ContentId, GatewayError> {
        let upload = ImageUpload {
            file_name: &receipt.file_name,
            content_type: &receipt.content_type,
            bytes: &receipt.bytes,
        };
        let uploaded = self
            .images
            .upload(upload, RECEIPTS_FOLDER)
            .await
            .map_err(|e| GatewayError::new(e.to_string()))?;
        tracing::info!(%booking_id, content_id = %uploaded.content_id, "Receipt uploaded");
        Ok(uploaded.content_id)
    }

    async fn promote(&self, booking_id: &BookingId, receipt_id: &ContentId) -> Result<(), GatewayError> {
        self.bookings
            .promote(booking_id, receipt_id)
            .await
            .map_err(|e| GatewayError::new(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Service
// =============================================================================

/// Booking service.
pub struct BookingService<'a> {
    store: &'a dyn DocumentStore,
    images: &'a dyn ImageHost,
    cache: &'a ProductCache,
}

impl<'a> BookingService<'a> {
    /// Create a new booking service.
    #[must_use]
    pub const fn new(
        store: &'a dyn DocumentStore,
        images: &'a dyn ImageHost,
        cache: &'a ProductCache,
    ) -> Self {
        Self {
            store,
            images,
            cache,
        }
    }

    const fn bookings(&self) -> BookingRepository<'a> {
        BookingRepository::new(self.store)
    }

    /// Start the wizard for a product, prefilled from the customer's profile.
    ///
    /// # Errors
    ///
    /// Returns `BookingServiceError::Resolution` if the product or option
    /// does not exist.
    pub async fn start_flow(
        &self,
        product_id: &ProductId,
        option: Option<RentalOptionId>,
        customer: &Customer,
        today: NaiveDate,
    ) -> Result<BookingFlow, BookingServiceError> {
        let product = CatalogService::new(self.store, self.cache)
            .product(product_id)
            .await?
            .ok_or_else(|| ResolutionError::ProductNotFound(product_id.clone()))?;
        let mut flow = BookingFlow::start(product, option, customer.id.clone(), today)?;
        flow.prefill(customer);
        Ok(flow)
    }

    /// Submit the flow's payment step.
    ///
    /// After the booking is stored the product's booking counter is bumped.
    /// A failed bump is logged and does not fail the submission.
    ///
    /// # Errors
    ///
    /// Returns the flow's error; the flow stays at the payment step.
    pub async fn submit(
        &self,
        flow: &mut BookingFlow,
        receipt: Option<&Receipt>,
    ) -> Result<BookingId, BookingFlowError> {
        let gateway = StoreBookingGateway::new(self.store, self.images);
        let booking_id = flow.submit(receipt, &gateway).await?;

        let product_id = &flow.product().id;
        if let Err(e) = ProductRepository::new(self.store)
            .increment_booking_count(product_id)
            .await
        {
            tracing::warn!(%booking_id, %product_id, error = %e, "Failed to update booking count");
        }
        CatalogService::new(self.store, self.cache).invalidate().await;

        tracing::info!(%booking_id, %product_id, "Booking submitted");
        Ok(booking_id)
    }

    /// A customer's submitted bookings, newest first. Drafts are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn customer_bookings(&self, customer: &CustomerId) -> Result<Vec<Booking>, RepositoryError> {
        Ok(self
            .bookings()
            .for_customer(customer)
            .await?
            .into_iter()
            .filter(|b| b.status != BookingStatus::Draft)
            .collect())
    }
}

// =============================================================================
// Administration
// =============================================================================

/// Administrative operations on stored bookings.
///
/// Needs only the document store.
pub struct BookingAdmin<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> BookingAdmin<'a> {
    /// Create a new booking administration service.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    const fn bookings(&self) -> BookingRepository<'a> {
        BookingRepository::new(self.store)
    }

    /// A booking by id.
    ///
    /// # Errors
    ///
    /// Returns `BookingServiceError::NotFound` for unknown ids.
    pub async fn get(&self, id: &BookingId) -> Result<Booking, BookingServiceError> {
        self.bookings()
            .get(id)
            .await?
            .ok_or_else(|| BookingServiceError::NotFound(id.clone()))
    }

    /// All bookings, or those in one status, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn list(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>, RepositoryError> {
        match status {
            Some(status) => self.bookings().list_by_status(status).await,
            None => self.bookings().list_all().await,
        }
    }

    /// Move a booking along its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `BookingServiceError::InvalidTransition` if the status graph
    /// does not allow the move.
    pub async fn set_status(
        &self,
        id: &BookingId,
        next: BookingStatus,
        notes: Option<&str>,
    ) -> Result<Booking, BookingServiceError> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(next) {
            return Err(BookingServiceError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }
        let updated = self
            .bookings()
            .update_status(id, current.status, next, notes)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => BookingServiceError::NotFound(id.clone()),
                RepositoryError::Conflict(_) => BookingServiceError::Concurrent(id.clone()),
                other => BookingServiceError::Repository(other),
            })?;
        tracing::info!(booking_id = %id, from = %current.status, to = %next, "Booking status changed");
        Ok(updated)
    }

    /// Cancel drafts whose payment never completed.
    ///
    /// Returns the ids of the cancelled drafts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub async fn sweep_abandoned_drafts(&self, older_than: Duration) -> Result<Vec<BookingId>, RepositoryError> {
        let cutoff = now_millis() - older_than;
        let repo = self.bookings();
        let mut cancelled = Vec::new();
        for draft in repo.stale_drafts(cutoff).await? {
            match repo
                .update_status(
                    &draft.id,
                    BookingStatus::Draft,
                    BookingStatus::Cancelled,
                    Some(ABANDONED_NOTE),
                )
                .await
            {
                Ok(_) => cancelled.push(draft.id),
                // Promoted or deleted between the query and the update.
                Err(RepositoryError::NotFound | RepositoryError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        if !cancelled.is_empty() {
            tracing::info!(count = cancelled.len(), "Cancelled abandoned drafts");
        }
        Ok(cancelled)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;
    use mommypump_core::booking::ShippingDetails;
    use mommypump_core::customer::NewCustomer;
    use mommypump_core::SubjectId;

    use super::*;
    use crate::db::MemoryDocumentStore;
    use crate::images::MemoryImageHost;

    fn customer() -> Customer {
        Customer::create(
            CustomerId::new("cust-1"),
            SubjectId::new("uid-1"),
            NewCustomer {
                name: "Malee".to_owned(),
                phone: "0812345678".to_owned(),
                ..NewCustomer::default()
            },
            Utc::now(),
        )
    }

    fn shipping() -> ShippingDetails {
        ShippingDetails {
            name: "Malee".to_owned(),
            phone: "0812345678".to_owned(),
            address: "99/1 Sukhumvit Rd".to_owned(),
            district: "Khlong Toei".to_owned(),
            province: "Bangkok".to_owned(),
            postal_code: "10110".to_owned(),
            ..ShippingDetails::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn receipt() -> Receipt {
        Receipt::new("slip.jpg", "image/jpeg", vec![0xFF; 1024])
    }

    async fn seeded() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        let repo = ProductRepository::new(&store);
        for product in crate::seed::demo_catalog().unwrap() {
            repo.create(&product).await.unwrap();
        }
        store
    }

    async fn flow_at_payment(service: &BookingService<'_>) -> BookingFlow {
        let mut flow = service
            .start_flow(&ProductId::new("pump1"), None, &customer(), today())
            .await
            .unwrap();
        flow.set_shipping_details(shipping()).unwrap();
        flow.advance().unwrap();
        flow
    }

    #[tokio::test]
    async fn start_flow_prefills_and_resolves() {
        let store = seeded().await;
        let images = MemoryImageHost::new();
        let cache = ProductCache::default();
        let service = BookingService::new(&store, &images, &cache);

        let flow = service
            .start_flow(&ProductId::new("pump1"), None, &customer(), today())
            .await
            .unwrap();
        assert_eq!(flow.shipping().name, "Malee");

        let err = service
            .start_flow(&ProductId::new("nope"), None, &customer(), today())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingServiceError::Resolution(ResolutionError::ProductNotFound(_))
        ));

        let err = service
            .start_flow(&ProductId::new("pump1"), Some(RentalOptionId::new(99)), &customer(), today())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingServiceError::Resolution(ResolutionError::OptionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn submit_stores_pending_booking_with_receipt() {
        let store = seeded().await;
        let images = MemoryImageHost::new();
        let cache = ProductCache::default();
        let service = BookingService::new(&store, &images, &cache);
        let admin = BookingAdmin::new(&store);
        let mut flow = flow_at_payment(&service).await;

        let id = service.submit(&mut flow, Some(&receipt())).await.unwrap();

        let booking = admin.get(&id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        let receipt_id = booking.receipt_id.unwrap();
        assert_eq!(images.upload(&receipt_id).unwrap().0, RECEIPTS_FOLDER);
        assert_eq!(booking.details.customer.address, "99/1 Sukhumvit Rd, Khlong Toei, Bangkok, 10110");

        let product = ProductRepository::new(&store)
            .get(&ProductId::new("pump1"))
            .await
            .unwrap()
            .unwrap();
        let seeded_count = crate::seed::demo_catalog().unwrap()[0].booking_count;
        assert_eq!(product.booking_count, seeded_count + 1);
    }

    #[tokio::test]
    async fn failed_upload_leaves_a_draft_and_retry_reuses_it() {
        let store = seeded().await;
        let images = MemoryImageHost::new();
        let cache = ProductCache::default();
        let service = BookingService::new(&store, &images, &cache);
        let admin = BookingAdmin::new(&store);
        let mut flow = flow_at_payment(&service).await;

        images.set_failing(true);
        let err = service.submit(&mut flow, Some(&receipt())).await.unwrap_err();
        assert!(matches!(err, BookingFlowError::Upload(_)));
        assert!(err.is_retryable());
        let drafts = admin.list(Some(BookingStatus::Draft)).await.unwrap();
        assert_eq!(drafts.len(), 1);

        images.set_failing(false);
        let id = service.submit(&mut flow, Some(&receipt())).await.unwrap();
        assert_eq!(id, drafts[0].id);
        assert_eq!(admin.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retry_after_editing_step_one_stores_the_edited_booking() {
        let store = seeded().await;
        let images = MemoryImageHost::new();
        let cache = ProductCache::default();
        let service = BookingService::new(&store, &images, &cache);
        let admin = BookingAdmin::new(&store);
        let mut flow = flow_at_payment(&service).await;

        images.set_failing(true);
        assert!(service.submit(&mut flow, Some(&receipt())).await.is_err());
        let draft = admin.list(Some(BookingStatus::Draft)).await.unwrap().remove(0);
        assert_eq!(draft.details.rental_duration, 1);

        flow.retreat().unwrap();
        flow.select_rental_option(RentalOptionId::new(3)).unwrap();
        flow.set_start_date(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(), today())
            .unwrap();
        flow.set_shipping_details(ShippingDetails {
            notes: "Morning delivery".to_owned(),
            ..shipping()
        })
        .unwrap();
        flow.advance().unwrap();

        images.set_failing(false);
        let id = service.submit(&mut flow, Some(&receipt())).await.unwrap();
        assert_eq!(id, draft.id);

        let booking = admin.get(&id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.details, flow.to_new_booking().unwrap());
        assert_eq!(booking.details.rental_duration, 6);
        assert_eq!(booking.details.total_amount, flow.total_amount());
        assert_eq!(booking.details.total_amount.minor_units(), 1_380_000);
        assert_eq!(booking.details.end_date, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(booking.details.notes.as_deref(), Some("Morning delivery"));
        assert_eq!(booking.created_at, draft.created_at);
    }

    #[tokio::test]
    async fn draft_cancelled_during_payment_stays_cancelled() {
        let store = seeded().await;
        let images = MemoryImageHost::new();
        let cache = ProductCache::default();
        let service = BookingService::new(&store, &images, &cache);
        let admin = BookingAdmin::new(&store);
        let mut flow = flow_at_payment(&service).await;

        images.set_failing(true);
        assert!(service.submit(&mut flow, Some(&receipt())).await.is_err());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let swept = admin.sweep_abandoned_drafts(Duration::zero()).await.unwrap();
        assert_eq!(swept.len(), 1);

        // The sweep freed the token, so the retry reserves a new booking.
        images.set_failing(false);
        let id = service.submit(&mut flow, Some(&receipt())).await.unwrap();
        assert_ne!(id, swept[0]);
        assert_eq!(admin.get(&id).await.unwrap().status, BookingStatus::Pending);
        assert_eq!(
            admin.get(&swept[0]).await.unwrap().status,
            BookingStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn customer_bookings_hide_drafts() {
        let store = seeded().await;
        let images = MemoryImageHost::new();
        let cache = ProductCache::default();
        let service = BookingService::new(&store, &images, &cache);

        let mut failed = flow_at_payment(&service).await;
        images.set_failing(true);
        assert!(service.submit(&mut failed, Some(&receipt())).await.is_err());
        images.set_failing(false);

        let mut ok = flow_at_payment(&service).await;
        let id = service.submit(&mut ok, Some(&receipt())).await.unwrap();

        let mine = service.customer_bookings(&CustomerId::new("cust-1")).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, id);
    }

    #[tokio::test]
    async fn status_changes_follow_the_lifecycle() {
        let store = seeded().await;
        let images = MemoryImageHost::new();
        let cache = ProductCache::default();
        let service = BookingService::new(&store, &images, &cache);
        let admin = BookingAdmin::new(&store);
        let mut flow = flow_at_payment(&service).await;
        let id = service.submit(&mut flow, Some(&receipt())).await.unwrap();

        let err = admin
            .set_status(&id, BookingStatus::Delivered, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingServiceError::InvalidTransition { .. }));

        let booking = admin
            .set_status(&id, BookingStatus::Confirmed, Some("Paid in full"))
            .await
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.details.notes.as_deref(), Some("Paid in full"));

        assert!(matches!(
            admin
                .set_status(&BookingId::new("missing"), BookingStatus::Confirmed, None)
                .await,
            Err(BookingServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sweep_cancels_only_old_drafts() {
        let store = seeded().await;
        let images = MemoryImageHost::new();
        let cache = ProductCache::default();
        let service = BookingService::new(&store, &images, &cache);
        let admin = BookingAdmin::new(&store);
        let mut flow = flow_at_payment(&service).await;
        images.set_failing(true);
        assert!(service.submit(&mut flow, Some(&receipt())).await.is_err());

        let max_age = Duration::hours(DEFAULT_DRAFT_MAX_AGE_HOURS);
        assert!(admin.sweep_abandoned_drafts(max_age).await.unwrap().is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let swept = admin.sweep_abandoned_drafts(Duration::zero()).await.unwrap();
        assert_eq!(swept.len(), 1);
        let booking = admin.get(&swept[0]).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.details.notes.as_deref(), Some(ABANDONED_NOTE));
    }
}
