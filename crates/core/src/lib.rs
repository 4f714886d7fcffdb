//! MommyPump Core - Shared domain library.
//!
//! This crate provides the types and rules used across all MommyPump components:
//! - `storefront` - Public rental storefront (catalog, booking wizard, login)
//! - `cli` - Command-line tools for migrations, seeding and booking administration
//!
//! # Architecture
//!
//! The core crate contains only types, pure functions and traits - no database
//! access, no HTTP clients. The booking state machine reaches the outside world
//! exclusively through the [`booking::BookingGateway`] trait, which the
//! storefront implements over its document store and image host.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, money, emails, phone numbers and statuses
//! - [`catalog`] - Products, rental options and catalog filtering/sorting
//! - [`customer`] - Customer profiles and postal addresses
//! - [`booking`] - Booking records and the three-step booking flow

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod booking;
pub mod catalog;
pub mod customer;
pub mod types;

pub use types::*;
