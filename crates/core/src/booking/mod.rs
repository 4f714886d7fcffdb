//! Bookings and the three-step booking flow.
//!
//! - [`flow`] - the wizard state machine (shipping info, payment, confirmation)
//! - [`gateway`] - the trait through which submission reaches storage and the image host
//! - [`receipt`] - proof-of-payment uploads and their acceptance rules
//! - [`record`] - the persisted booking document

pub mod error;
pub mod flow;
pub mod gateway;
pub mod receipt;
pub mod record;

pub use error::{BookingFlowError, ResolutionError, ValidationError};
pub use flow::{BookingFlow, BookingStep, ShippingDetails};
pub use gateway::{BookingGateway, GatewayError};
pub use receipt::{MAX_RECEIPT_BYTES, Receipt};
pub use record::{Booking, CustomerSnapshot, NewBooking};
