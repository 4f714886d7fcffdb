//! The booking wizard.
//!
//! ```text
//!  start ──► CollectingShippingInfo ──advance──► AwaitingPayment ──submit──► Confirmed
//!                    ▲                                  │
//!                    └─────────────retreat──────────────┘
//! ```
//!
//! A flow is created once its product and rental option are resolved. It
//! carries everything the customer entered, so a web session can store it
//! between requests. `submit` is the only operation with side effects and
//! reaches them through a [`BookingGateway`].

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{BookingFlowError, ResolutionError, ValidationError};
use super::gateway::BookingGateway;
use super::receipt::Receipt;
use super::record::{CustomerSnapshot, NewBooking};
use crate::catalog::{Product, RentalOption};
use crate::customer::{Customer, PostalAddress};
use crate::types::{BookingId, CustomerId, Money, RentalOptionId};

/// Contact and delivery details entered in step 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetails {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub line_id: String,
    pub address: String,
    pub district: String,
    pub province: String,
    pub postal_code: String,
    #[serde(default)]
    pub notes: String,
}

impl ShippingDetails {
    /// Prefill from a saved profile.
    #[must_use]
    pub fn from_customer(customer: &Customer) -> Self {
        Self {
            name: customer.name.clone(),
            phone: customer.phone.clone(),
            email: customer
                .email
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            line_id: customer.line_id.clone().unwrap_or_default(),
            address: customer.address.address.clone(),
            district: customer.address.district.clone(),
            province: customer.address.province.clone(),
            postal_code: customer.address.postal_code.clone(),
            notes: String::new(),
        }
    }

    /// Required fields left blank, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("phone", &self.phone),
            ("address", &self.address),
            ("district", &self.district),
            ("province", &self.province),
            ("postalCode", &self.postal_code),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }

    #[must_use]
    pub fn postal_address(&self) -> PostalAddress {
        PostalAddress {
            address: self.address.trim().to_owned(),
            district: self.district.trim().to_owned(),
            province: self.province.trim().to_owned(),
            postal_code: self.postal_code.trim().to_owned(),
        }
    }

    fn snapshot(&self) -> CustomerSnapshot {
        CustomerSnapshot {
            customer_name: self.name.trim().to_owned(),
            customer_phone: self.phone.trim().to_owned(),
            customer_email: non_blank(&self.email),
            customer_line_id: non_blank(&self.line_id),
            address: self.postal_address().one_line(),
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

/// Where the wizard is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum BookingStep {
    CollectingShippingInfo,
    AwaitingPayment,
    Confirmed { booking_id: BookingId },
}

impl BookingStep {
    /// 1-based step number shown in the progress bar.
    #[must_use]
    pub const fn number(&self) -> u8 {
        match self {
            Self::CollectingShippingInfo => 1,
            Self::AwaitingPayment => 2,
            Self::Confirmed { .. } => 3,
        }
    }

    const fn describe(&self) -> &'static str {
        match self {
            Self::CollectingShippingInfo => "collecting shipping info",
            Self::AwaitingPayment => "awaiting payment",
            Self::Confirmed { .. } => "confirmed",
        }
    }
}

/// A booking in progress for one customer and one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFlow {
    product: Product,
    option: RentalOption,
    customer_id: CustomerId,
    shipping: ShippingDetails,
    start_date: Option<NaiveDate>,
    step: BookingStep,
    submission_token: Uuid,
}

impl BookingFlow {
    /// Enter step 1 for `product`.
    ///
    /// Without an `option_id` the first rental option is selected. The start
    /// date defaults to the day after `today`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::OptionNotFound`] if `option_id` names no
    /// option of the product (or the product has none).
    pub fn start(
        product: Product,
        option_id: Option<RentalOptionId>,
        customer_id: CustomerId,
        today: NaiveDate,
    ) -> Result<Self, ResolutionError> {
        let option = match option_id {
            Some(id) => product.rental_option(id),
            None => product.default_rental_option(),
        }
        .cloned()
        .ok_or_else(|| ResolutionError::OptionNotFound {
            product: product.id.clone(),
            option: option_id.unwrap_or(RentalOptionId::new(1)),
        })?;

        Ok(Self {
            product,
            option,
            customer_id,
            shipping: ShippingDetails::default(),
            start_date: today.checked_add_days(Days::new(1)),
            step: BookingStep::CollectingShippingInfo,
            submission_token: Uuid::new_v4(),
        })
    }

    #[must_use]
    pub const fn product(&self) -> &Product {
        &self.product
    }

    #[must_use]
    pub const fn rental_option(&self) -> &RentalOption {
        &self.option
    }

    #[must_use]
    pub const fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    #[must_use]
    pub const fn shipping(&self) -> &ShippingDetails {
        &self.shipping
    }

    #[must_use]
    pub const fn step(&self) -> &BookingStep {
        &self.step
    }

    #[must_use]
    pub const fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    /// Idempotency key of the current submission attempt.
    #[must_use]
    pub const fn submission_token(&self) -> Uuid {
        self.submission_token
    }

    /// `start_date` plus the option's duration in calendar months.
    ///
    /// Days past the end of the target month clamp to its last day, so
    /// 2025-01-31 plus one month is 2025-02-28.
    #[must_use]
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.start_date?
            .checked_add_months(Months::new(self.option.duration))
    }

    /// Option price plus the product deposit.
    #[must_use]
    pub const fn total_amount(&self) -> Money {
        self.product.total_for(&self.option)
    }

    /// Booking id once confirmed.
    #[must_use]
    pub const fn booking_id(&self) -> Option<&BookingId> {
        match &self.step {
            BookingStep::Confirmed { booking_id } => Some(booking_id),
            _ => None,
        }
    }

    /// Prefill step 1 from a saved profile without overwriting entries.
    pub fn prefill(&mut self, customer: &Customer) {
        if self.shipping == ShippingDetails::default() {
            self.shipping = ShippingDetails::from_customer(customer);
        }
    }

    /// Switch to another rental option of the same product.
    ///
    /// # Errors
    ///
    /// Fails outside step 1, or if the option does not exist.
    pub fn select_rental_option(&mut self, id: RentalOptionId) -> Result<(), BookingFlowError> {
        self.require_step(&BookingStep::CollectingShippingInfo, "change the rental option")?;
        let option = self
            .product
            .rental_option(id)
            .cloned()
            .ok_or_else(|| ResolutionError::OptionNotFound {
                product: self.product.id.clone(),
                option: id,
            })?;
        self.option = option;
        Ok(())
    }

    /// Replace the step 1 contact and address fields.
    ///
    /// # Errors
    ///
    /// Fails outside step 1.
    pub fn set_shipping_details(&mut self, details: ShippingDetails) -> Result<(), BookingFlowError> {
        self.require_step(&BookingStep::CollectingShippingInfo, "edit shipping details")?;
        self.shipping = details;
        Ok(())
    }

    /// Set the rental start date.
    ///
    /// # Errors
    ///
    /// Fails outside step 1, if `date` is before `today`, or if the end date
    /// would fall outside the supported calendar range.
    pub fn set_start_date(&mut self, date: NaiveDate, today: NaiveDate) -> Result<(), BookingFlowError> {
        self.require_step(&BookingStep::CollectingShippingInfo, "change the start date")?;
        if date < today {
            return Err(ValidationError::StartDateInPast { date, today }.into());
        }
        if date.checked_add_months(Months::new(self.option.duration)).is_none() {
            return Err(ValidationError::EndDateOutOfRange.into());
        }
        self.start_date = Some(date);
        Ok(())
    }

    /// Clear the start date, e.g. when the form field was left empty.
    pub fn clear_start_date(&mut self) {
        if self.step == BookingStep::CollectingShippingInfo {
            self.start_date = None;
        }
    }

    /// Step 1 → step 2.
    ///
    /// # Errors
    ///
    /// Fails with [`ValidationError::MissingFields`] naming every blank
    /// required field (including `startDate`), or outside step 1.
    pub fn advance(&mut self) -> Result<(), BookingFlowError> {
        self.require_step(&BookingStep::CollectingShippingInfo, "continue to payment")?;
        let mut missing = self.shipping.missing_fields();
        if self.start_date.is_none() {
            missing.push("startDate");
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing).into());
        }
        self.step = BookingStep::AwaitingPayment;
        Ok(())
    }

    /// Step 2 → step 1.
    ///
    /// # Errors
    ///
    /// Fails outside step 2. A confirmed booking cannot be reopened.
    pub fn retreat(&mut self) -> Result<(), BookingFlowError> {
        self.require_step(&BookingStep::AwaitingPayment, "go back")?;
        self.step = BookingStep::CollectingShippingInfo;
        Ok(())
    }

    /// The booking that submission would persist.
    ///
    /// # Errors
    ///
    /// Fails if the start date is missing.
    pub fn to_new_booking(&self) -> Result<NewBooking, ValidationError> {
        let start_date = self
            .start_date
            .ok_or_else(|| ValidationError::MissingFields(vec!["startDate"]))?;
        let end_date = self.end_date().ok_or(ValidationError::EndDateOutOfRange)?;

        Ok(NewBooking {
            customer_id: self.customer_id.clone(),
            product_id: self.product.id.clone(),
            product_name: self.product.name.clone(),
            rental_option_id: self.option.id,
            rental_duration: self.option.duration,
            start_date,
            end_date,
            total_amount: self.total_amount(),
            customer: self.shipping.snapshot(),
            notes: non_blank(&self.shipping.notes),
        })
    }

    /// Step 2 → step 3: upload the receipt and persist the booking.
    ///
    /// The receipt is validated before any gateway call. On any error the
    /// flow stays in step 2 and the call can be retried.
    ///
    /// # Errors
    ///
    /// - [`BookingFlowError::Validation`] for a missing, empty, oversized or
    ///   non-image receipt
    /// - [`BookingFlowError::Upload`] if the image host rejects the receipt
    /// - [`BookingFlowError::Persistence`] if the booking cannot be written
    /// - [`BookingFlowError::InvalidTransition`] outside step 2
    pub async fn submit<G>(
        &mut self,
        receipt: Option<&Receipt>,
        gateway: &G,
    ) -> Result<BookingId, BookingFlowError>
    where
        G: BookingGateway + Sync,
    {
        self.require_step(&BookingStep::AwaitingPayment, "submit payment")?;
        let receipt = Receipt::accept(receipt)?;
        let booking = self.to_new_booking()?;

        let booking_id = gateway
            .reserve_draft(self.submission_token, &booking)
            .await
            .map_err(BookingFlowError::Persistence)?;
        let receipt_id = gateway
            .upload_receipt(&booking_id, receipt)
            .await
            .map_err(BookingFlowError::Upload)?;
        gateway
            .promote(&booking_id, &receipt_id)
            .await
            .map_err(BookingFlowError::Persistence)?;

        self.step = BookingStep::Confirmed {
            booking_id: booking_id.clone(),
        };
        Ok(booking_id)
    }

    fn require_step(&self, expected: &BookingStep, action: &'static str) -> Result<(), BookingFlowError> {
        if std::mem::discriminant(&self.step) == std::mem::discriminant(expected) {
            Ok(())
        } else {
            Err(BookingFlowError::InvalidTransition {
                step: self.step.describe(),
                action,
            })
        }
    }
}
