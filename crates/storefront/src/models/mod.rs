//! Domain models for the storefront web layer.
//!
//! Persistent records live in `mommypump_core`; this module holds the
//! types that only exist inside a browser session.

pub mod session;

pub use session::{CurrentUser, keys as session_keys, safe_redirect};
