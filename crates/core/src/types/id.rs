//! Newtype IDs for type-safe document references.
//!
//! Documents in the store are addressed by opaque string ids. Use the
//! `define_id!` macro to create wrappers that prevent accidentally mixing ids
//! from different collections.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe document ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Ord`, `Hash`
/// - Conversion methods: `new()`, `generate()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `AsRef<str>` implementations
///
/// # Example
///
/// ```rust
/// # use mommypump_core::define_id;
/// define_id!(OrderId);
/// define_id!(InvoiceId);
///
/// let order_id = OrderId::new("abc");
/// let invoice_id = InvoiceId::new("abc");
///
/// // These are different types, so this won't compile:
/// // let _: OrderId = invoice_id;
/// # let _ = (order_id, invoice_id);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing document id.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh random document id.
            #[must_use]
            pub fn generate() -> Self {
                Self($crate::types::id::generate_document_id())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Generate a random 32-character hex document id.
#[must_use]
pub fn generate_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// Document ids
define_id!(ProductId);
define_id!(CustomerId);
define_id!(BookingId);
define_id!(BrandId);
define_id!(ProductTypeId);

// Opaque identifier of an authenticated subject issued by the identity provider.
define_id!(SubjectId);

// Content identifier returned by the image host.
define_id!(ContentId);

/// Identifier of a rental option, unique within its product.
///
/// Options are numbered from 1 and appear in the `?rental=` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RentalOptionId(u32);

impl RentalOptionId {
    /// Create a new rental option id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the underlying number.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RentalOptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RentalOptionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl FromStr for RentalOptionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct() {
        let a = BookingId::generate();
        let b = BookingId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ProductId::new("pump1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"pump1\"");
        assert_eq!(id.to_string(), "pump1");
    }

    #[test]
    fn rental_option_id_parses_query_values() {
        assert_eq!("2".parse::<RentalOptionId>().unwrap(), RentalOptionId::new(2));
        assert_eq!(" 3 ".parse::<RentalOptionId>().unwrap().as_u32(), 3);
        assert!("two".parse::<RentalOptionId>().is_err());
    }
}
