//! Session-related types.
//!
//! Types stored in the session for authentication and booking state.

use serde::{Deserialize, Serialize};

use mommypump_core::customer::Customer;
use mommypump_core::{CustomerId, SubjectId, UserRole};

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the signed-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Customer profile id.
    pub id: CustomerId,
    /// Identity-provider subject.
    pub subject: SubjectId,
    pub display_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub photo_url: Option<String>,
    pub role: UserRole,
}

impl CurrentUser {
    /// Build the session identity from a stored profile.
    #[must_use]
    pub fn from_customer(customer: &Customer, role: UserRole) -> Self {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.to_owned());
        Self {
            id: customer.id.clone(),
            subject: customer.user_id.clone(),
            display_name: customer.name.clone(),
            email: customer.email.as_ref().map(ToString::to_string),
            phone_number: non_empty(&customer.phone),
            photo_url: customer.photo_url.clone(),
            role,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Name to greet the user with.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        if !self.display_name.trim().is_empty() {
            &self.display_name
        } else if let Some(email) = &self.email {
            email
        } else if let Some(phone) = &self.phone_number {
            phone
        } else {
            "คุณแม่"
        }
    }
}

/// Accept only same-site relative paths as post-login destinations.
///
/// Returns `/` for anything else, including protocol-relative `//host` URLs.
#[must_use]
pub fn safe_redirect(target: Option<&str>) -> String {
    match target {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_owned()
        }
        _ => "/".to_owned(),
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current signed-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for Google OAuth state (CSRF protection).
    pub const OAUTH_STATE: &str = "oauth_state";

    /// Key for Google OAuth nonce (`OpenID` Connect replay protection).
    pub const OAUTH_NONCE: &str = "oauth_nonce";

    /// Key for where to go after signing in.
    pub const LOGIN_REDIRECT: &str = "login_redirect";

    /// Key for a pending phone verification.
    pub const PHONE_VERIFICATION: &str = "phone_verification";

    /// Key for the booking wizard in progress.
    pub const BOOKING_FLOW: &str = "booking_flow";
}
