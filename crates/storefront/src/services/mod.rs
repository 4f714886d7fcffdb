//! Business logic services for the storefront.
//!
//! Services borrow their collaborators from [`AppState`](crate::state::AppState)
//! for the duration of one request.
//!
//! # Services
//!
//! - `auth` - Google and phone sign-in, customer profiles, admin checks
//! - `catalog` - Cached product listing, facets and sorting
//! - `booking` - Booking submission, status changes and draft cleanup

pub mod auth;
pub mod booking;
pub mod catalog;

pub use auth::{AuthError, AuthService};
pub use booking::{BookingAdmin, BookingService, BookingServiceError, StoreBookingGateway};
pub use catalog::{CatalogService, Listing, ProductCache};
