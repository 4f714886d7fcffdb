//! Identity provider integration.
//!
//! Customers sign in with Google (OAuth authorization code flow, then
//! exchanged for a Firebase identity) or with a phone number and a one-time
//! code sent by SMS. Both paths end with an [`AuthSubject`]: the provider's
//! stable user id plus whatever profile data it knows.
//!
//! # Google flow
//!
//! 1. Build the consent URL with [`IdentityProvider::google_authorization_url`]
//! 2. Google redirects back to `/auth/google/callback` with a code
//! 3. [`IdentityProvider::complete_google_sign_in`] exchanges it
//!
//! # Phone flow
//!
//! 1. [`IdentityProvider::send_phone_code`] with a reCAPTCHA token from the page
//! 2. Keep the returned [`PhoneVerification`] in the session
//! 3. [`IdentityProvider::confirm_phone_code`] with the 6-digit code

mod firebase;
#[cfg(any(test, feature = "test-support"))]
mod memory;

use async_trait::async_trait;
use mommypump_core::{PhoneNumber, SubjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use firebase::FirebaseIdentityClient;
#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryIdentityProvider, TEST_CODE};

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The provider returned an error (e.g. `INVALID_CODE`).
    #[error("identity provider error: {0}")]
    Api(String),

    /// OAuth token exchange failed.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// The verification code is not six digits.
    #[error("verification code must be 6 digits")]
    InvalidCode,
}

// Provider messages caused by what the user typed rather than a fault.
const USER_ERROR_PREFIXES: &[&str] = &[
    "INVALID_CODE",
    "INVALID_SESSION_INFO",
    "SESSION_EXPIRED",
    "CODE_EXPIRED",
    "INVALID_PHONE_NUMBER",
    "CAPTCHA_CHECK_FAILED",
    "TOO_MANY_ATTEMPTS_TRY_LATER",
    "QUOTA_EXCEEDED",
];

impl IdentityError {
    /// Whether the error should be shown to the user as a form message
    /// instead of being reported as a failure.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::InvalidCode => true,
            Self::Api(message) => USER_ERROR_PREFIXES
                .iter()
                .any(|prefix| message.starts_with(prefix)),
            Self::Http(_) | Self::Parse(_) | Self::OAuth(_) => false,
        }
    }
}

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSubject {
    pub uid: SubjectId,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub photo_url: Option<String>,
}

impl AuthSubject {
    /// A subject with only an id.
    #[must_use]
    pub const fn new(uid: SubjectId) -> Self {
        Self {
            uid,
            email: None,
            display_name: None,
            phone_number: None,
            photo_url: None,
        }
    }
}

/// A pending phone sign-in, kept in the session between sending and
/// confirming the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneVerification {
    pub session_info: String,
    pub phone: PhoneNumber,
}

/// A one-time SMS code: exactly six ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Parse a code, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCode`] unless the input is six digits.
    pub fn parse(input: &str) -> Result<Self, IdentityError> {
        let code = input.trim();
        if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_owned()))
        } else {
            Err(IdentityError::InvalidCode)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Sign-in operations of the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Google consent page URL.
    fn google_authorization_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> String;

    /// Exchange a Google authorization code for a subject.
    async fn complete_google_sign_in(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AuthSubject, IdentityError>;

    /// Send a one-time code by SMS.
    async fn send_phone_code(
        &self,
        phone: &PhoneNumber,
        challenge_token: &str,
    ) -> Result<PhoneVerification, IdentityError>;

    /// Confirm the code a user typed.
    async fn confirm_phone_code(
        &self,
        verification: &PhoneVerification,
        code: &VerificationCode,
    ) -> Result<AuthSubject, IdentityError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        assert!(VerificationCode::parse("123456").is_ok());
        assert_eq!(VerificationCode::parse(" 012345 ").unwrap().as_str(), "012345");
        for bad in ["", "12345", "1234567", "12a456", "１２３４５６"] {
            assert!(matches!(VerificationCode::parse(bad), Err(IdentityError::InvalidCode)), "{bad}");
        }
    }

    #[test]
    fn user_errors_are_recognised() {
        assert!(IdentityError::Api("INVALID_CODE".to_owned()).is_user_error());
        assert!(IdentityError::Api("TOO_MANY_ATTEMPTS_TRY_LATER : wait".to_owned()).is_user_error());
        assert!(!IdentityError::Api("INTERNAL".to_owned()).is_user_error());
        assert!(!IdentityError::OAuth("bad client".to_owned()).is_user_error());
    }
}
