//! In-memory identity provider for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use mommypump_core::{PhoneNumber, SubjectId};

use super::{AuthSubject, IdentityError, IdentityProvider, PhoneVerification, VerificationCode};

/// The code every phone number accepts.
pub const TEST_CODE: &str = "123456";

/// Resolves Google codes and phone numbers from fixed tables.
///
/// Unknown phone numbers sign in as a fresh subject `phone:<number>`.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    google: Mutex<HashMap<String, AuthSubject>>,
}

impl MemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `code` complete a Google sign-in as `subject`.
    pub fn add_google_user(&self, code: &str, subject: AuthSubject) {
        if let Ok(mut google) = self.google.lock() {
            google.insert(code.to_owned(), subject);
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn google_authorization_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> String {
        format!(
            "https://accounts.test/auth?redirect_uri={}&state={}&nonce={}",
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(nonce)
        )
    }

    async fn complete_google_sign_in(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<AuthSubject, IdentityError> {
        self.google
            .lock()
            .ok()
            .and_then(|google| google.get(code).cloned())
            .ok_or_else(|| IdentityError::OAuth("invalid_grant".to_owned()))
    }

    async fn send_phone_code(
        &self,
        phone: &PhoneNumber,
        _challenge_token: &str,
    ) -> Result<PhoneVerification, IdentityError> {
        Ok(PhoneVerification {
            session_info: format!("session-{phone}"),
            phone: phone.clone(),
        })
    }

    async fn confirm_phone_code(
        &self,
        verification: &PhoneVerification,
        code: &VerificationCode,
    ) -> Result<AuthSubject, IdentityError> {
        if code.as_str() != TEST_CODE {
            return Err(IdentityError::Api("INVALID_CODE".to_owned()));
        }
        let mut subject = AuthSubject::new(SubjectId::new(format!("phone:{}", verification.phone)));
        subject.phone_number = Some(verification.phone.to_string());
        Ok(subject)
    }
}
