//! Products, rental options and catalog listing.
//!
//! Products are authored by staff (seed files or the CLI) and read by the
//! storefront. [`Product::validate`] runs at authoring time so the storefront
//! can trust option prices; [`filter`] and [`sort`] back the `/products` page.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BrandId, ContentId, Money, ProductId, ProductStatus, ProductTypeId, RentalOptionId};

/// Query-string token meaning "no filter" on the listing page.
pub const ALL_TOKEN: &str = "all";

// =============================================================================
// Product
// =============================================================================

/// A priced rental duration a customer can pick for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RentalOption {
    pub id: RentalOptionId,
    /// Length of the rental in whole months.
    pub duration: u32,
    /// Display unit for the duration (e.g. "เดือน").
    pub unit: String,
    /// Price charged for the whole duration.
    pub price: Money,
    /// Saving against `duration × rental_price`, when advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Money>,
}

impl RentalOption {
    /// Undiscounted price for this duration, `None` on overflow.
    #[must_use]
    pub const fn list_price(&self, monthly: Money) -> Option<Money> {
        monthly.checked_mul(self.duration)
    }

    /// Label such as `3 เดือน`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.duration, self.unit)
    }
}

/// A customer review embedded in the product document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "customerName")]
    pub author: String,
    /// 1 to 5 stars.
    pub rating: u8,
    /// Free-text date as entered by staff.
    pub date: String,
    pub comment: String,
}

/// A rentable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand_id: BrandId,
    pub type_id: ProductTypeId,
    /// Monthly rental price.
    pub rental_price: Money,
    /// Refundable deposit added to every booking.
    pub deposit_amount: Money,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<ContentId>,
    #[serde(default, rename = "imageUrls")]
    pub gallery: Vec<ContentId>,
    #[serde(default)]
    pub description: String,
    /// Long description as trusted HTML authored by staff.
    #[serde(default)]
    pub full_description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    pub rental_options: Vec<RentalOption>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    /// Completed bookings, used for popularity ordering.
    #[serde(default)]
    pub booking_count: u64,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Problems found by [`Product::validate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductValidationError {
    #[error("product name cannot be empty")]
    EmptyName,
    #[error("product must have at least one rental option")]
    NoRentalOptions,
    #[error("rental option {0} appears more than once")]
    DuplicateOption(RentalOptionId),
    #[error("rental option {0} must last at least one month")]
    ZeroDuration(RentalOptionId),
    #[error("rental option {0} has a negative price or discount")]
    NegativeAmount(RentalOptionId),
    #[error("rental option {0} list price overflows")]
    Overflow(RentalOptionId),
    #[error("rental option {option}: price {price} + discount {discount} must equal list price {list}")]
    DiscountMismatch {
        option: RentalOptionId,
        price: Money,
        discount: Money,
        list: Money,
    },
    #[error("rental option {option}: price {price} exceeds list price {list} without a discount")]
    PriceAboveList {
        option: RentalOptionId,
        price: Money,
        list: Money,
    },
    #[error("review by {author} has rating {rating}, expected 1 to 5")]
    InvalidRating { author: String, rating: u8 },
}

impl Product {
    /// Look up a rental option by id.
    #[must_use]
    pub fn rental_option(&self, id: RentalOptionId) -> Option<&RentalOption> {
        self.rental_options.iter().find(|option| option.id == id)
    }

    /// The option preselected when none is requested.
    #[must_use]
    pub fn default_rental_option(&self) -> Option<&RentalOption> {
        self.rental_options.first()
    }

    /// Amount due when booking `option`: its price plus the deposit.
    #[must_use]
    pub const fn total_for(&self, option: &RentalOption) -> Money {
        option.price.saturating_add(self.deposit_amount)
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.status == ProductStatus::Available
    }

    /// Mean review rating, `None` without reviews.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let sum: u32 = self.reviews.iter().map(|r| u32::from(r.rating)).sum();
        Some(f64::from(sum) / self.reviews.len() as f64)
    }

    /// Check the authoring invariants, collecting every problem found.
    ///
    /// # Errors
    ///
    /// Returns all violations when the product has no name, no rental
    /// options, duplicate or zero-length options, option prices that do not
    /// reconcile with `duration × rental_price`, or out-of-range ratings.
    pub fn validate(&self) -> Result<(), Vec<ProductValidationError>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(ProductValidationError::EmptyName);
        }
        if self.rental_options.is_empty() {
            errors.push(ProductValidationError::NoRentalOptions);
        }

        let mut seen = Vec::with_capacity(self.rental_options.len());
        for option in &self.rental_options {
            if seen.contains(&option.id) {
                errors.push(ProductValidationError::DuplicateOption(option.id));
            }
            seen.push(option.id);

            if let Some(error) = self.check_option_price(option) {
                errors.push(error);
            }
        }

        for review in &self.reviews {
            if !(1..=5).contains(&review.rating) {
                errors.push(ProductValidationError::InvalidRating {
                    author: review.author.clone(),
                    rating: review.rating,
                });
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn check_option_price(&self, option: &RentalOption) -> Option<ProductValidationError> {
        if option.duration == 0 {
            return Some(ProductValidationError::ZeroDuration(option.id));
        }
        if option.price.is_negative() || option.discount.is_some_and(Money::is_negative) {
            return Some(ProductValidationError::NegativeAmount(option.id));
        }
        let Some(list) = option.list_price(self.rental_price) else {
            return Some(ProductValidationError::Overflow(option.id));
        };

        match option.discount {
            Some(discount) => match option.price.checked_add(discount) {
                Some(sum) if sum == list => None,
                Some(_) => Some(ProductValidationError::DiscountMismatch {
                    option: option.id,
                    price: option.price,
                    discount,
                    list,
                }),
                None => Some(ProductValidationError::Overflow(option.id)),
            },
            None if option.price > list => Some(ProductValidationError::PriceAboveList {
                option: option.id,
                price: option.price,
                list,
            }),
            None => None,
        }
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Ordering choices on the listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Most booked first.
    #[default]
    #[serde(rename = "popularity")]
    Popularity,
    #[serde(rename = "price-low")]
    PriceLow,
    #[serde(rename = "price-high")]
    PriceHigh,
}

impl SortOrder {
    pub const ALL: [Self; 3] = [Self::Popularity, Self::PriceLow, Self::PriceHigh];

    /// Query-string token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Popularity => "popularity",
            Self::PriceLow => "price-low",
            Self::PriceHigh => "price-high",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|order| order.as_str() == s)
            .ok_or_else(|| format!("unknown sort order: {s}"))
    }
}

/// Interpret a facet query value: empty or [`ALL_TOKEN`] means no filter.
#[must_use]
pub fn facet_param(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != ALL_TOKEN)
}

/// Keep products matching the given brand and type, preserving order.
#[must_use]
pub fn filter<'a>(
    products: &'a [Product],
    brand: Option<&BrandId>,
    product_type: Option<&ProductTypeId>,
) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| brand.is_none_or(|b| &p.brand_id == b))
        .filter(|p| product_type.is_none_or(|t| &p.type_id == t))
        .collect()
}

/// Order products for display. Sorting is stable: ties keep input order.
#[must_use]
pub fn sort(mut products: Vec<&Product>, order: SortOrder) -> Vec<&Product> {
    match order {
        SortOrder::Popularity => products.sort_by(|a, b| b.booking_count.cmp(&a.booking_count)),
        SortOrder::PriceLow => products.sort_by_key(|p| p.rental_price),
        SortOrder::PriceHigh => products.sort_by(|a, b| b.rental_price.cmp(&a.rental_price)),
    }
    products
}

/// Distinct brand ids in first-seen order.
#[must_use]
pub fn brands(products: &[Product]) -> Vec<BrandId> {
    let mut out: Vec<BrandId> = Vec::new();
    for product in products {
        if !out.contains(&product.brand_id) {
            out.push(product.brand_id.clone());
        }
    }
    out
}

/// Distinct product type ids in first-seen order.
#[must_use]
pub fn product_types(products: &[Product]) -> Vec<ProductTypeId> {
    let mut out: Vec<ProductTypeId> = Vec::new();
    for product in products {
        if !out.contains(&product.type_id) {
            out.push(product.type_id.clone());
        }
    }
    out
}
