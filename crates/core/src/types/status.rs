//! Status enums for bookings, products and users.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a booking.
///
/// ```text
/// draft ──► pending ──► confirmed ──► delivered ──► returned
///   │          │            │             │
///   └──────────┴────────────┴─────────────┴──► cancelled
/// ```
///
/// `draft` bookings exist only while a submission is in flight: the record is
/// reserved before the receipt upload and promoted to `pending` once both the
/// upload and the record update succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Reserved by an in-flight submission, not yet visible to staff.
    Draft,
    /// Submitted with a receipt, awaiting staff review.
    #[default]
    Pending,
    /// Payment verified by staff.
    Confirmed,
    /// Product handed over to the customer.
    Delivered,
    /// Product returned and deposit settled.
    Returned,
    /// Booking cancelled.
    Cancelled,
}

impl BookingStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Draft,
        Self::Pending,
        Self::Confirmed,
        Self::Delivered,
        Self::Returned,
        Self::Cancelled,
    ];

    /// The stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Delivered => "delivered",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
        }
    }

    /// Human-readable label for pages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Submitting",
            Self::Pending => "Awaiting review",
            Self::Confirmed => "Confirmed",
            Self::Delivered => "Delivered",
            Self::Returned => "Returned",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Returned | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Pending)
                | (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Delivered)
                | (Self::Delivered, Self::Returned)
                | (
                    Self::Draft | Self::Pending | Self::Confirmed | Self::Delivered,
                    Self::Cancelled
                )
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid booking status: {s}"))
    }
}

/// Availability of a product for new rentals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Available,
    Unavailable,
    Rented,
}

impl ProductStatus {
    /// Stored string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Rented => "rented",
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "unavailable" => Ok(Self::Unavailable),
            "rented" => Ok(Self::Rented),
            other => Err(format!("unknown product status: {other}")),
        }
    }
}

/// Role of a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    /// Matches the configured administrator email.
    Admin,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        use BookingStatus::{Confirmed, Delivered, Draft, Pending, Returned};
        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Returned));
    }

    #[test]
    fn no_skipping_or_reversing() {
        use BookingStatus::{Confirmed, Delivered, Pending, Returned};
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Returned));
    }

    #[test]
    fn cancel_from_any_open_state() {
        for status in BookingStatus::ALL {
            assert_eq!(
                status.can_transition_to(BookingStatus::Cancelled),
                !status.is_terminal(),
                "{status}"
            );
        }
    }

    #[test]
    fn string_forms_round_trip() {
        for status in BookingStatus::ALL {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
        assert!("shipped".parse::<BookingStatus>().is_err());
    }
}
