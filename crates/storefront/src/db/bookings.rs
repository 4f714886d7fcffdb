//! Booking repository.

use chrono::{DateTime, Utc};
use mommypump_core::booking::Booking;
use mommypump_core::{BookingId, BookingStatus, ContentId, CustomerId};
use serde_json::Value;
use uuid::Uuid;

use super::collections::BOOKINGS;
use super::document::{Direction, Document, DocumentStore, Query, decode, encode};
use super::{RepositoryError, now_millis};

/// Repository for booking documents.
pub struct BookingRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> BookingRepository<'a> {
    /// Create a new booking repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Store a draft booking under a submission token.
    ///
    /// If another draft still holds `token`, that draft is returned with
    /// `false`. Its details are first replaced with `booking`'s, so a
    /// submission retried after the customer edited step 1 stores what they
    /// see. The joined draft keeps its id, status and creation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails, or `RepositoryError::Conflict`
    /// if the joined draft stopped being a draft meanwhile.
    pub async fn reserve_draft(
        &self,
        token: Uuid,
        booking: &Booking,
    ) -> Result<(Booking, bool), RepositoryError> {
        let (doc, created) = self
            .store
            .create_if_absent(
                BOOKINGS,
                booking.id.as_str(),
                &token.to_string(),
                encode(booking)?,
            )
            .await?;
        let stored: Booking = decode(BOOKINGS, doc)?;
        if created || stored.details == booking.details {
            return Ok((stored, created));
        }

        let mut patch = encode(&booking.details)?;
        // Optional fields the new details leave out must not survive.
        for key in encode(&stored.details)?.keys() {
            patch.entry(key.clone()).or_insert(Value::Null);
        }
        let refreshed = self
            .patch_if_status(&stored.id, BookingStatus::Draft, patch, false)
            .await?;
        Ok((refreshed, false))
    }

    /// Get a booking by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the document is malformed.
    pub async fn get(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        self.store
            .get(BOOKINGS, id.as_str())
            .await?
            .map(|doc| decode(BOOKINGS, doc))
            .transpose()
    }

    /// A customer's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is malformed.
    pub async fn for_customer(&self, customer: &CustomerId) -> Result<Vec<Booking>, RepositoryError> {
        self.find(
            Query::new()
                .where_eq("customerId", customer.as_str())
                .order_by("createdAt", Direction::Descending),
        )
        .await
    }

    /// All bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is malformed.
    pub async fn list_all(&self) -> Result<Vec<Booking>, RepositoryError> {
        self.find(Query::new().order_by("createdAt", Direction::Descending))
            .await
    }

    /// Bookings in one status, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is malformed.
    pub async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>, RepositoryError> {
        self.find(
            Query::new()
                .where_eq("status", status.as_str())
                .order_by("createdAt", Direction::Descending),
        )
        .await
    }

    /// Drafts created before `cutoff`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is malformed.
    pub async fn stale_drafts(&self, cutoff: DateTime<Utc>) -> Result<Vec<Booking>, RepositoryError> {
        let drafts = self
            .find(
                Query::new()
                    .where_eq("status", BookingStatus::Draft.as_str())
                    .order_by("createdAt", Direction::Ascending),
            )
            .await?;
        Ok(drafts
            .into_iter()
            .take_while(|b| b.created_at < cutoff)
            .collect())
    }

    /// Move a booking from `from` to `to`, optionally replacing its notes.
    ///
    /// Transition rules are checked by the caller. The write only happens
    /// while the stored status is still `from`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown ids and
    /// `RepositoryError::Conflict` if the status changed since it was read.
    pub async fn update_status(
        &self,
        id: &BookingId,
        from: BookingStatus,
        to: BookingStatus,
        notes: Option<&str>,
    ) -> Result<Booking, RepositoryError> {
        let mut patch = Document::new();
        patch.insert("status".to_owned(), Value::from(to.as_str()));
        if let Some(notes) = notes {
            patch.insert("notes".to_owned(), Value::from(notes));
        }
        // Cancelled drafts no longer block their submission token.
        let release = to == BookingStatus::Cancelled;
        self.patch_if_status(id, from, patch, release).await
    }

    /// Attach the uploaded receipt, move the draft to `pending` and free its
    /// submission token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown ids and
    /// `RepositoryError::Conflict` if the booking is no longer a draft
    /// (e.g. the sweeper cancelled it during the upload).
    pub async fn promote(
        &self,
        id: &BookingId,
        receipt_id: &ContentId,
    ) -> Result<Booking, RepositoryError> {
        let mut patch = Document::new();
        patch.insert("receiptId".to_owned(), Value::from(receipt_id.as_str()));
        patch.insert(
            "status".to_owned(),
            Value::from(BookingStatus::Pending.as_str()),
        );
        self.patch_if_status(id, BookingStatus::Draft, patch, true).await
    }

    async fn patch_if_status(
        &self,
        id: &BookingId,
        expected: BookingStatus,
        mut patch: Document,
        release_token: bool,
    ) -> Result<Booking, RepositoryError> {
        patch.insert(
            "updatedAt".to_owned(),
            Value::from(now_millis().timestamp_millis()),
        );
        let doc = self
            .store
            .update_if(
                BOOKINGS,
                id.as_str(),
                "status",
                &Value::from(expected.as_str()),
                patch,
                release_token,
            )
            .await?;
        decode(BOOKINGS, doc)
    }

    async fn find(&self, query: Query) -> Result<Vec<Booking>, RepositoryError> {
        self.store
            .query(BOOKINGS, &query)
            .await?
            .into_iter()
            .map(|doc| decode(BOOKINGS, doc))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use mommypump_core::booking::{CustomerSnapshot, NewBooking};
    use mommypump_core::{Money, ProductId, RentalOptionId};

    use super::*;
    use crate::db::MemoryDocumentStore;

    fn booking(id: &str, customer: &str, created_at: DateTime<Utc>) -> Booking {
        Booking::draft(
            BookingId::new(id),
            NewBooking {
                customer_id: CustomerId::new(customer),
                product_id: ProductId::new("pump1"),
                product_name: "Spectra S1 Plus".to_owned(),
                rental_option_id: RentalOptionId::new(1),
                rental_duration: 1,
                start_date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
                total_amount: Money::from_baht(7500),
                customer: CustomerSnapshot {
                    customer_name: "Malee".to_owned(),
                    customer_phone: "+66812345678".to_owned(),
                    address: "Bangkok, 10110".to_owned(),
                    ..CustomerSnapshot::default()
                },
                notes: None,
            },
            created_at,
        )
    }

    #[tokio::test]
    async fn token_is_reusable_after_promotion() {
        let store = MemoryDocumentStore::new();
        let repo = BookingRepository::new(&store);
        let token = Uuid::new_v4();
        let now = now_millis();

        let (first, created) = repo.reserve_draft(token, &booking("b1", "c1", now)).await.unwrap();
        assert!(created);
        let (joined, created) = repo.reserve_draft(token, &booking("b2", "c1", now)).await.unwrap();
        assert!(!created);
        assert_eq!(joined.id, first.id);

        let promoted = repo.promote(&first.id, &ContentId::new("receipts/abc")).await.unwrap();
        assert_eq!(promoted.status, BookingStatus::Pending);
        assert_eq!(promoted.receipt_id.unwrap().as_str(), "receipts/abc");

        let (second, created) = repo.reserve_draft(token, &booking("b2", "c1", now)).await.unwrap();
        assert!(created);
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn rejoining_a_draft_replaces_its_details() {
        let store = MemoryDocumentStore::new();
        let repo = BookingRepository::new(&store);
        let token = Uuid::new_v4();
        let created_at = now_millis() - Duration::minutes(10);

        let mut original = booking("b1", "c1", created_at);
        original.details.notes = Some("call first".to_owned());
        original.details.customer.customer_line_id = Some("malee".to_owned());
        repo.reserve_draft(token, &original).await.unwrap();

        let mut edited = booking("b2", "c1", now_millis());
        edited.details.rental_option_id = RentalOptionId::new(3);
        edited.details.rental_duration = 6;
        edited.details.end_date = NaiveDate::from_ymd_opt(2025, 7, 31).unwrap();
        edited.details.total_amount = Money::from_baht(13_800);
        let (joined, created) = repo.reserve_draft(token, &edited).await.unwrap();

        assert!(!created);
        assert_eq!(joined.id.as_str(), "b1");
        assert_eq!(joined.status, BookingStatus::Draft);
        assert_eq!(joined.created_at, original.created_at);
        assert_eq!(joined.details, edited.details);
        // Fields left blank on the second attempt are gone, not stale.
        let stored = repo.get(&joined.id).await.unwrap().unwrap();
        assert_eq!(stored.details.notes, None);
        assert_eq!(stored.details.customer.customer_line_id, None);
        assert_eq!(stored.details.total_amount, Money::from_baht(13_800));
    }

    #[tokio::test]
    async fn only_drafts_can_be_promoted() {
        let store = MemoryDocumentStore::new();
        let repo = BookingRepository::new(&store);
        let (draft, _) = repo
            .reserve_draft(Uuid::new_v4(), &booking("b1", "c1", now_millis()))
            .await
            .unwrap();
        repo.update_status(
            &draft.id,
            BookingStatus::Draft,
            BookingStatus::Cancelled,
            Some("abandoned"),
        )
        .await
        .unwrap();

        assert!(matches!(
            repo.promote(&draft.id, &ContentId::new("receipts/late")).await,
            Err(RepositoryError::Conflict(_))
        ));
        let stored = repo.get(&draft.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Cancelled);
        assert!(stored.receipt_id.is_none());
    }

    #[tokio::test]
    async fn status_write_needs_the_expected_current_status() {
        let store = MemoryDocumentStore::new();
        let repo = BookingRepository::new(&store);
        let (draft, _) = repo
            .reserve_draft(Uuid::new_v4(), &booking("b1", "c1", now_millis()))
            .await
            .unwrap();
        repo.promote(&draft.id, &ContentId::new("r")).await.unwrap();

        // A sweep that read the booking before promotion must not cancel it.
        assert!(matches!(
            repo.update_status(&draft.id, BookingStatus::Draft, BookingStatus::Cancelled, None)
                .await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(
            repo.get(&draft.id).await.unwrap().unwrap().status,
            BookingStatus::Pending
        );
    }

    #[tokio::test]
    async fn listings_are_newest_first() {
        let store = MemoryDocumentStore::new();
        let repo = BookingRepository::new(&store);
        let now = now_millis();
        for (id, customer, age) in [("old", "c1", 3), ("mid", "c2", 2), ("new", "c1", 1)] {
            repo.reserve_draft(Uuid::new_v4(), &booking(id, customer, now - Duration::hours(age)))
                .await
                .unwrap();
        }
        repo.promote(&BookingId::new("mid"), &ContentId::new("r")).await.unwrap();

        let mine: Vec<_> = repo
            .for_customer(&CustomerId::new("c1"))
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.id.into_inner())
            .collect();
        assert_eq!(mine, ["new", "old"]);

        let all = repo.list_all().await.unwrap();
        assert_eq!(all[0].id.as_str(), "new");
        assert_eq!(all.len(), 3);

        let pending = repo.list_by_status(BookingStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id.as_str(), "mid");
    }

    #[tokio::test]
    async fn stale_drafts_respect_the_cutoff() {
        let store = MemoryDocumentStore::new();
        let repo = BookingRepository::new(&store);
        let now = now_millis();
        repo.reserve_draft(Uuid::new_v4(), &booking("stale", "c1", now - Duration::hours(30)))
            .await
            .unwrap();
        repo.reserve_draft(Uuid::new_v4(), &booking("fresh", "c1", now - Duration::hours(1)))
            .await
            .unwrap();

        let stale = repo.stale_drafts(now - Duration::hours(24)).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id.as_str(), "stale");

        let cancelled = repo
            .update_status(
                &stale[0].id,
                BookingStatus::Draft,
                BookingStatus::Cancelled,
                Some("abandoned"),
            )
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.details.notes.as_deref(), Some("abandoned"));
    }

    #[tokio::test]
    async fn unknown_booking_is_not_found() {
        let store = MemoryDocumentStore::new();
        let repo = BookingRepository::new(&store);
        assert!(matches!(
            repo.update_status(
                &BookingId::new("nope"),
                BookingStatus::Pending,
                BookingStatus::Confirmed,
                None,
            )
            .await,
            Err(RepositoryError::NotFound)
        ));
    }
}
