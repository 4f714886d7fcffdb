//! Booking flow errors.

use chrono::NaiveDate;

use super::gateway::GatewayError;
use crate::types::{ProductId, RentalOptionId};

/// User input that cannot be accepted. Shown inline next to the form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("required fields are missing: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("start date {date} is before today ({today})")]
    StartDateInPast { date: NaiveDate, today: NaiveDate },

    #[error("rental end date is out of range")]
    EndDateOutOfRange,

    #[error("please attach a payment receipt")]
    ReceiptMissing,

    #[error("the attached receipt is empty")]
    ReceiptEmpty,

    #[error("receipt is {size} bytes, the limit is {max} bytes")]
    ReceiptTooLarge { size: usize, max: usize },

    #[error("receipt must be an image (got {content_type})")]
    ReceiptNotImage { content_type: String },
}

impl ValidationError {
    /// Form field names this error refers to.
    #[must_use]
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            Self::MissingFields(fields) => fields.clone(),
            Self::StartDateInPast { .. } | Self::EndDateOutOfRange => vec!["startDate"],
            Self::ReceiptMissing
            | Self::ReceiptEmpty
            | Self::ReceiptTooLarge { .. }
            | Self::ReceiptNotImage { .. } => vec!["receipt"],
        }
    }
}

/// The requested product or rental option does not exist.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("product {product} has no rental option {option}")]
    OptionNotFound {
        product: ProductId,
        option: RentalOptionId,
    },
}

/// Errors returned by [`BookingFlow`](super::BookingFlow) operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingFlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The receipt upload failed. The flow stays at the payment step.
    #[error("receipt upload failed: {0}")]
    Upload(GatewayError),

    /// Writing the booking failed. The flow stays at the payment step.
    #[error("saving the booking failed: {0}")]
    Persistence(GatewayError),

    #[error("cannot {action} while {step}")]
    InvalidTransition {
        step: &'static str,
        action: &'static str,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl BookingFlowError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Upload(_) | Self::Persistence(_))
    }
}
