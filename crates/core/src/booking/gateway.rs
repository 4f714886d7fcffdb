//! Boundary between the booking flow and the outside world.

use std::future::Future;

use uuid::Uuid;

use super::{NewBooking, Receipt};
use crate::types::{BookingId, ContentId};

/// Failure reported by a gateway call, with a message safe to log.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct GatewayError(pub String);

impl GatewayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Side effects performed when a booking is submitted.
///
/// Submission happens in three steps so that a failure at any point leaves
/// either nothing or a `draft` booking behind:
///
/// 1. [`reserve_draft`](Self::reserve_draft) writes the booking with status
///    `draft`, keyed by the flow's submission token. A second reservation
///    with a token that is still reserved returns the existing draft, with
///    its details replaced by the ones passed in.
/// 2. [`upload_receipt`](Self::upload_receipt) stores the receipt image.
/// 3. [`promote`](Self::promote) attaches the receipt, moves the booking to
///    `pending` and frees the token. It fails if the draft was cancelled
///    meanwhile.
pub trait BookingGateway {
    fn reserve_draft(
        &self,
        token: Uuid,
        booking: &NewBooking,
    ) -> impl Future<Output = Result<BookingId, GatewayError>> + Send;

    fn upload_receipt(
        &self,
        booking_id: &BookingId,
        receipt: &Receipt,
    ) -> impl Future<Output = Result<ContentId, GatewayError>> + Send;

    fn promote(
        &self,
        booking_id: &BookingId,
        receipt_id: &ContentId,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
