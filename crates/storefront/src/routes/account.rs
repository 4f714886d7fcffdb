//! Account route handlers.
//!
//! Profile editing and booking history. All routes require a signed-in
//! customer.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use mommypump_core::Email;
use mommypump_core::booking::Booking;
use mommypump_core::customer::{Customer, PostalAddress, ProfileUpdate};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireAuth, set_current_user};
use crate::models::CurrentUser;
use crate::services::AuthError;
use crate::state::AppState;

// =============================================================================
// View Types
// =============================================================================

/// A row in the booking history table.
#[derive(Clone)]
pub struct BookingRow {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub rental_duration: u32,
    pub start_date: String,
    pub end_date: String,
    pub total: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub created_at: String,
}

impl From<&Booking> for BookingRow {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id.to_string(),
            product_id: booking.details.product_id.to_string(),
            product_name: booking.details.product_name.clone(),
            rental_duration: booking.details.rental_duration,
            start_date: booking.details.start_date.format("%Y-%m-%d").to_string(),
            end_date: booking.details.end_date.format("%Y-%m-%d").to_string(),
            total: booking.details.total_amount.to_string(),
            status: booking.status.label(),
            status_class: booking.status.as_str(),
            created_at: booking.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Profile form values as shown on the page.
#[derive(Clone, Default)]
pub struct ProfileView {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub line_id: String,
    pub address: String,
    pub district: String,
    pub province: String,
    pub postal_code: String,
}

impl From<&Customer> for ProfileView {
    fn from(customer: &Customer) -> Self {
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
        }
    }
}

// =============================================================================
// Form Types
// =============================================================================

/// Profile form data.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub line_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub postal_code: String,
}

impl ProfileForm {
    fn view(&self) -> ProfileView {
        ProfileView {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            line_id: self.line_id.clone(),
            address: self.address.clone(),
            district: self.district.clone(),
            province: self.province.clone(),
            postal_code: self.postal_code.clone(),
        }
    }

    /// Build the update. A blank email clears it.
    fn to_update(&self) -> std::result::Result<ProfileUpdate, AuthError> {
        let email = match self.email.trim() {
            "" => None,
            raw => Some(Email::parse(raw)?),
        };
        let line_id = Some(self.line_id.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_owned);

        Ok(ProfileUpdate {
            name: self.name.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            email,
            line_id,
            address: PostalAddress {
                address: self.address.trim().to_owned(),
                district: self.district.trim().to_owned(),
                province: self.province.trim().to_owned(),
                postal_code: self.postal_code.trim().to_owned(),
            },
        })
    }
}

/// Query parameters for status display.
#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    pub saved: Option<bool>,
}

// =============================================================================
// Templates
// =============================================================================

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub user: Option<CurrentUser>,
    pub profile: ProfileView,
    pub bookings: Vec<BookingRow>,
    pub saved: bool,
    pub error: Option<String>,
    pub errors: Vec<&'static str>,
}

impl AccountTemplate {
    /// Whether a form field has an inline error.
    pub fn has_error(&self, field: &str) -> bool {
        self.errors.contains(&field)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the account page: profile form and booking history.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<AccountQuery>,
) -> Result<impl IntoResponse> {
    let customer = state.auth().customer(&user.id).await?;
    let bookings = state.bookings().customer_bookings(&user.id).await?;

    Ok(AccountTemplate {
        user: Some(user),
        profile: ProfileView::from(&customer),
        bookings: bookings.iter().map(BookingRow::from).collect(),
        saved: query.saved.unwrap_or(false),
        error: None,
        errors: Vec::new(),
    })
}

/// Handle the profile form.
///
/// Invalid input re-renders the page with the typed values.
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let result = match form.to_update() {
        Ok(update) => state.auth().update_profile(&user.id, &update).await,
        Err(e) => Err(e),
    };

    let (errors, message) = match result {
        Ok(updated) => {
            set_current_user(&session, &updated).await?;
            tracing::info!(customer_id = %updated.id, "Profile updated");
            return Ok(Redirect::to("/account?saved=true").into_response());
        }
        Err(AuthError::IncompleteProfile(fields)) => {
            (fields, "กรุณากรอกชื่อและเบอร์โทรศัพท์".to_owned())
        }
        Err(AuthError::InvalidEmail(_)) => (vec!["email"], "อีเมลไม่ถูกต้อง".to_owned()),
        Err(e) => return Err(AppError::from(e)),
    };

    let bookings = state.bookings().customer_bookings(&user.id).await?;
    let page = AccountTemplate {
        user: Some(user),
        profile: form.view(),
        bookings: bookings.iter().map(BookingRow::from).collect(),
        saved: false,
        error: Some(message),
        errors,
    };
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}
