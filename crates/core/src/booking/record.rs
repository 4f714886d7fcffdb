//! The persisted booking document.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BookingId, BookingStatus, ContentId, CustomerId, Money, ProductId, RentalOptionId};

/// Contact details copied onto the booking at submission time, so later
/// profile edits do not change past bookings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_line_id: Option<String>,
    /// Delivery address on one line.
    pub address: String,
}

/// Everything about a booking that the customer decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    pub rental_option_id: RentalOptionId,
    /// Months.
    pub rental_duration: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Option price plus deposit.
    pub total_amount: Money,
    #[serde(flatten)]
    pub customer: CustomerSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A stored booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    #[serde(flatten)]
    pub details: NewBooking,
    pub status: BookingStatus,
    /// Image-host id of the payment receipt. Absent while `draft`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<ContentId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// A freshly reserved booking awaiting its receipt.
    #[must_use]
    pub const fn draft(id: BookingId, details: NewBooking, now: DateTime<Utc>) -> Self {
        Self {
            id,
            details,
            status: BookingStatus::Draft,
            receipt_id: None,
            created_at: now,
            updated_at: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn document_shape() {
        let booking = Booking::draft(
            BookingId::new("b1"),
            NewBooking {
                customer_id: CustomerId::new("c1"),
                product_id: ProductId::new("pump1"),
                product_name: "Spectra S1 Plus".to_owned(),
                rental_option_id: RentalOptionId::new(1),
                rental_duration: 1,
                start_date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
                total_amount: Money::from_baht(7500),
                customer: CustomerSnapshot {
                    customer_name: "Malee".to_owned(),
                    customer_phone: "0812345678".to_owned(),
                    customer_email: None,
                    customer_line_id: Some("malee".to_owned()),
                    address: "Bangkok, 10110".to_owned(),
                },
                notes: None,
            },
            DateTime::from_timestamp_millis(1_000).unwrap(),
        );

        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["status"], "draft");
        assert_eq!(json["customerName"], "Malee");
        assert_eq!(json["startDate"], "2025-01-31");
        assert_eq!(json["totalAmount"], 750_000);
        assert_eq!(json["createdAt"], 1_000);
        assert!(json.get("receiptId").is_none());

        let back: Booking = serde_json::from_value(json).unwrap();
        assert_eq!(back, booking);
    }
}
