//! Booking wizard route handlers.
//!
//! The wizard state lives in the session as a [`BookingFlow`]. Every
//! handler loads it, applies one transition and stores it back, so a page
//! reload or a retried payment picks up where the customer left off.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use mommypump_core::booking::{
    BookingFlow, BookingFlowError, MAX_RECEIPT_BYTES, Receipt, ShippingDetails, ValidationError,
};
use mommypump_core::{ProductId, RentalOptionId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::images::ImageTransform;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, session_keys};
use crate::routes::products::OptionView;
use crate::services::BookingServiceError;
use crate::state::AppState;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wizard URL for a product.
fn wizard_url(product_id: &ProductId) -> String {
    format!("/products/{product_id}/booking")
}

fn confirmation_url(product_id: &ProductId) -> String {
    format!("/products/{product_id}/booking/confirmation")
}

// =============================================================================
// Form Types
// =============================================================================

/// Step 1 form data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingForm {
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
    #[serde(default)]
    pub start_date: String,
    pub rental_option: Option<u32>,
}

impl ShippingForm {
    fn details(&self) -> ShippingDetails {
        ShippingDetails {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            line_id: self.line_id.clone(),
            address: self.address.clone(),
            district: self.district.clone(),
            province: self.province.clone(),
            postal_code: self.postal_code.clone(),
            notes: self.notes.clone(),
        }
    }
}

/// Wizard query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct WizardQuery {
    pub rental: Option<u32>,
}

// =============================================================================
// Templates
// =============================================================================

/// Booking wizard template (steps 1 and 2).
#[derive(Template, WebTemplate)]
#[template(path = "booking/wizard.html")]
pub struct WizardTemplate {
    pub user: Option<CurrentUser>,
    pub product_id: String,
    pub product_name: String,
    pub image_url: Option<String>,
    pub step: u8,
    pub options: Vec<OptionView>,
    pub rental_label: String,
    pub shipping: ShippingDetails,
    pub start_date: String,
    pub end_date: Option<String>,
    pub min_date: String,
    pub monthly_price: String,
    pub deposit: String,
    pub total: String,
    pub max_receipt_mb: usize,
    pub errors: Vec<&'static str>,
    pub message: Option<String>,
}

impl WizardTemplate {
    /// Whether a form field has an inline error.
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains(&field)
    }
}

/// Booking confirmation template (step 3).
#[derive(Template, WebTemplate)]
#[template(path = "booking/confirmation.html")]
pub struct ConfirmationTemplate {
    pub user: Option<CurrentUser>,
    pub booking_id: String,
    pub product_name: String,
    pub rental_label: String,
    pub start_date: String,
    pub end_date: String,
    pub total: String,
    pub shipping: ShippingDetails,
}

fn wizard_page(
    state: &AppState,
    user: CurrentUser,
    flow: &BookingFlow,
    errors: Vec<&'static str>,
    message: Option<String>,
) -> WizardTemplate {
    let product = flow.product();
    let option = flow.rental_option();
    WizardTemplate {
        user: Some(user),
        product_id: product.id.to_string(),
        product_name: product.name.clone(),
        image_url: product
            .featured_image
            .as_ref()
            .map(|id| state.images().image_url(id, &ImageTransform::square(200))),
        step: flow.step().number(),
        options: OptionView::list(product, option),
        rental_label: option.label(),
        shipping: flow.shipping().clone(),
        start_date: flow
            .start_date()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default(),
        end_date: flow.end_date().map(|d| d.format(DATE_FORMAT).to_string()),
        min_date: state.config().today().format(DATE_FORMAT).to_string(),
        monthly_price: product.rental_price.to_string(),
        deposit: product.deposit_amount.to_string(),
        total: flow.total_amount().to_string(),
        max_receipt_mb: MAX_RECEIPT_BYTES / (1024 * 1024),
        errors,
        message,
    }
}

/// Inline message for a validation failure.
fn validation_message(err: &ValidationError) -> String {
    match err {
        ValidationError::MissingFields(_) => "กรุณากรอกข้อมูลที่จำเป็นให้ครบถ้วน".to_owned(),
        ValidationError::StartDateInPast { .. } => "วันที่เริ่มเช่าต้องไม่ก่อนวันนี้".to_owned(),
        ValidationError::EndDateOutOfRange => "วันที่เริ่มเช่าไม่ถูกต้อง".to_owned(),
        ValidationError::ReceiptMissing => "กรุณาแนบสลิปการโอนเงิน".to_owned(),
        ValidationError::ReceiptEmpty => "ไฟล์สลิปว่างเปล่า กรุณาเลือกไฟล์ใหม่".to_owned(),
        ValidationError::ReceiptTooLarge { max, .. } => {
            format!("ไฟล์สลิปต้องมีขนาดไม่เกิน {}MB", max / (1024 * 1024))
        }
        ValidationError::ReceiptNotImage { .. } => "สลิปต้องเป็นไฟล์รูปภาพเท่านั้น".to_owned(),
    }
}

const RETRY_MESSAGE: &str = "ไม่สามารถบันทึกการจองได้ในขณะนี้ กรุณาลองใหม่อีกครั้ง";

/// Errors that do not re-render a form.
fn flow_error(err: BookingFlowError) -> AppError {
    match err {
        BookingFlowError::Resolution(e) => BookingServiceError::from(e).into(),
        other => AppError::BadRequest(other.to_string()),
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn stored_flow(session: &Session) -> Result<Option<BookingFlow>> {
    Ok(session.get::<BookingFlow>(session_keys::BOOKING_FLOW).await?)
}

async fn store_flow(session: &Session, flow: &BookingFlow) -> Result<()> {
    session.insert(session_keys::BOOKING_FLOW, flow).await?;
    Ok(())
}

/// The in-progress flow for this product and customer, if any.
async fn current_flow(
    session: &Session,
    product_id: &ProductId,
    user: &CurrentUser,
) -> Result<Option<BookingFlow>> {
    Ok(stored_flow(session).await?.filter(|flow| {
        &flow.product().id == product_id && flow.customer_id() == &user.id
    }))
}

/// Load the in-progress flow, or start a new one prefilled from the profile.
///
/// A flow for another product, another customer, or one already confirmed
/// is replaced.
async fn load_or_start(
    state: &AppState,
    session: &Session,
    product_id: &ProductId,
    user: &CurrentUser,
    rental: Option<RentalOptionId>,
) -> Result<BookingFlow> {
    if let Some(flow) = current_flow(session, product_id, user).await?
        && flow.booking_id().is_none()
    {
        return Ok(flow);
    }

    let customer = state.auth().customer(&user.id).await?;
    let flow = state
        .bookings()
        .start_flow(product_id, rental, &customer, state.config().today())
        .await?;
    tracing::debug!(product_id = %product_id, token = %flow.submission_token(), "Booking flow started");
    store_flow(session, &flow).await?;
    Ok(flow)
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the wizard at its current step.
///
/// `?rental=` selects the option while still in step 1.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    Query(query): Query<WizardQuery>,
) -> Result<Response> {
    let product_id = ProductId::new(id);
    let rental = query.rental.map(RentalOptionId::new);
    let mut flow = load_or_start(&state, &session, &product_id, &user, rental).await?;

    if let Some(option) = rental
        && flow.step().number() == 1
        && flow.rental_option().id != option
    {
        flow.select_rental_option(option).map_err(flow_error)?;
        store_flow(&session, &flow).await?;
    }

    Ok(wizard_page(&state, user, &flow, Vec::new(), None).into_response())
}

/// Handle the step 1 form: save entries, then continue to payment.
///
/// Entries are kept in the session even when validation fails, so the
/// re-rendered form shows what was typed.
#[instrument(skip(state, session, user, form))]
pub async fn submit_shipping(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    Form(form): Form<ShippingForm>,
) -> Result<Response> {
    let product_id = ProductId::new(id);
    let Some(mut flow) = current_flow(&session, &product_id, &user).await? else {
        return Ok(Redirect::to(&wizard_url(&product_id)).into_response());
    };

    if let Some(option) = form.rental_option {
        match flow.select_rental_option(RentalOptionId::new(option)) {
            Ok(()) => {}
            Err(BookingFlowError::InvalidTransition { .. }) => {
                return Ok(Redirect::to(&wizard_url(&product_id)).into_response());
            }
            Err(e) => return Err(flow_error(e)),
        }
    }
    flow.set_shipping_details(form.details()).map_err(flow_error)?;

    let mut errors = Vec::new();
    let mut message = None;

    flow.clear_start_date();
    let raw_date = form.start_date.trim();
    if !raw_date.is_empty() {
        match NaiveDate::parse_from_str(raw_date, DATE_FORMAT) {
            Ok(date) => {
                if let Err(BookingFlowError::Validation(e)) =
                    flow.set_start_date(date, state.config().today())
                {
                    errors.extend(e.fields());
                    message = Some(validation_message(&e));
                }
            }
            Err(_) => {
                errors.push("startDate");
                message = Some(validation_message(&ValidationError::EndDateOutOfRange));
            }
        }
    }

    match flow.advance() {
        Ok(()) => {
            store_flow(&session, &flow).await?;
            add_breadcrumb("booking", "Shipping details saved", Some(&[("product", product_id.as_str())]));
            Ok(Redirect::to(&wizard_url(&product_id)).into_response())
        }
        Err(BookingFlowError::Validation(e)) => {
            for field in e.fields() {
                if !errors.contains(&field) {
                    errors.push(field);
                }
            }
            let message = message.unwrap_or_else(|| validation_message(&e));
            store_flow(&session, &flow).await?;
            let page = wizard_page(&state, user, &flow, errors, Some(message));
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(flow_error(e)),
    }
}

/// Return from payment to the shipping step.
pub async fn back(
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let product_id = ProductId::new(id);
    if let Some(mut flow) = current_flow(&session, &product_id, &user).await?
        && flow.retreat().is_ok()
    {
        store_flow(&session, &flow).await?;
    }
    Ok(Redirect::to(&wizard_url(&product_id)))
}

/// Read the `receipt` part of the payment form.
///
/// An empty file input counts as no attachment.
async fn read_receipt(multipart: &mut Multipart) -> std::result::Result<Option<Receipt>, ValidationError> {
    let too_large = || ValidationError::ReceiptTooLarge {
        size: MAX_RECEIPT_BYTES + 1,
        max: MAX_RECEIPT_BYTES,
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => return Err(too_large()),
            Err(e) => {
                tracing::warn!("Malformed payment form: {e}");
                return Ok(None);
            }
        };
        if field.name() != Some("receipt") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => return Err(too_large()),
            Err(e) => {
                tracing::warn!("Failed to read receipt: {e}");
                return Ok(None);
            }
        };

        if file_name.is_empty() && bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Receipt::new(file_name, content_type, bytes.to_vec())));
    }
}

/// Handle the payment form: upload the receipt and create the booking.
#[instrument(skip(state, session, user, multipart))]
pub async fn submit_payment(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Response> {
    let product_id = ProductId::new(id);
    let Some(mut flow) = current_flow(&session, &product_id, &user).await? else {
        return Ok(Redirect::to(&wizard_url(&product_id)).into_response());
    };
    if flow.booking_id().is_some() {
        return Ok(Redirect::to(&confirmation_url(&product_id)).into_response());
    }

    let receipt = match read_receipt(&mut multipart).await {
        Ok(receipt) => receipt,
        Err(e) => {
            let page = wizard_page(&state, user, &flow, e.fields(), Some(validation_message(&e)));
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    match state.bookings().submit(&mut flow, receipt.as_ref()).await {
        Ok(booking_id) => {
            store_flow(&session, &flow).await?;
            add_breadcrumb(
                "booking",
                "Booking submitted",
                Some(&[("booking_id", booking_id.as_str()), ("product", product_id.as_str())]),
            );
            Ok(Redirect::to(&confirmation_url(&product_id)).into_response())
        }
        Err(BookingFlowError::Validation(e)) => {
            let page = wizard_page(&state, user, &flow, e.fields(), Some(validation_message(&e)));
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) if e.is_retryable() => {
            tracing::error!(product_id = %product_id, error = %e, "Booking submission failed");
            store_flow(&session, &flow).await?;
            let page = wizard_page(&state, user, &flow, Vec::new(), Some(RETRY_MESSAGE.to_owned()));
            Ok((StatusCode::SERVICE_UNAVAILABLE, page).into_response())
        }
        Err(BookingFlowError::InvalidTransition { .. }) => {
            Ok(Redirect::to(&wizard_url(&product_id)).into_response())
        }
        Err(e) => Err(flow_error(e)),
    }
}

/// Display the confirmation for the booking just submitted.
pub async fn confirmation(
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<Response> {
    let product_id = ProductId::new(id);
    let flow = current_flow(&session, &product_id, &user).await?;
    let Some((flow, booking_id)) = flow.and_then(|f| {
        let booking_id = f.booking_id()?.to_string();
        Some((f, booking_id))
    }) else {
        return Ok(Redirect::to(&wizard_url(&product_id)).into_response());
    };

    Ok(ConfirmationTemplate {
        user: Some(user),
        booking_id,
        product_name: flow.product().name.clone(),
        rental_label: flow.rental_option().label(),
        start_date: flow
            .start_date()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default(),
        end_date: flow
            .end_date()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default(),
        total: flow.total_amount().to_string(),
        shipping: flow.shipping().clone(),
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::extract::FromRequest;

    use super::*;

    #[test]
    fn receipt_limit_message_is_in_megabytes() {
        let err = ValidationError::ReceiptTooLarge {
            size: MAX_RECEIPT_BYTES + 1,
            max: MAX_RECEIPT_BYTES,
        };
        assert!(validation_message(&err).contains("5MB"));
    }

    #[tokio::test]
    async fn shipping_form_reads_camel_case_fields() {
        let request = axum::http::Request::builder()
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(
                "name=Malee&phone=0812345678&address=1+Sukhumvit&district=Watthana\
                 &province=Bangkok&postalCode=10110&startDate=2025-03-01&rentalOption=2",
            ))
            .unwrap();

        let Form(form) = Form::<ShippingForm>::from_request(request, &()).await.unwrap();

        assert_eq!(form.postal_code, "10110");
        assert_eq!(form.start_date, "2025-03-01");
        assert_eq!(form.rental_option, Some(2));
        assert!(form.details().missing_fields().is_empty());
    }
}
