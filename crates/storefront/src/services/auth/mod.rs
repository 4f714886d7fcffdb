//! Authentication service.
//!
//! Provides Google and phone sign-in on top of the identity provider, and
//! keeps exactly one customer profile per identity subject.

mod error;

pub use error::AuthError;

use rand::Rng;
use rand::distr::Alphanumeric;

use mommypump_core::customer::{Customer, NewCustomer, ProfileUpdate};
use mommypump_core::{CustomerId, Email, PhoneNumber, UserRole};

use crate::db::{CustomerRepository, DocumentStore, RepositoryError, now_millis};
use crate::identity::{AuthSubject, IdentityProvider, PhoneVerification, VerificationCode};
use crate::models::CurrentUser;

/// Length of OAuth `state` and `nonce` values.
pub const OAUTH_TOKEN_LENGTH: usize = 32;

/// Generate a random alphanumeric string from the thread-local CSPRNG.
#[must_use]
pub fn generate_random_string(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Authentication service.
///
/// Handles sign-in with either method, first-sign-in profile creation and
/// profile edits.
pub struct AuthService<'a> {
    customers: CustomerRepository<'a>,
    identity: &'a dyn IdentityProvider,
    admin_email: Option<&'a Email>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(
        store: &'a dyn DocumentStore,
        identity: &'a dyn IdentityProvider,
        admin_email: Option<&'a Email>,
    ) -> Self {
        Self {
            customers: CustomerRepository::new(store),
            identity,
            admin_email,
        }
    }

    // =========================================================================
    // Google
    // =========================================================================

    /// Consent page URL for a Google sign-in.
    #[must_use]
    pub fn google_authorization_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> String {
        self.identity
            .google_authorization_url(redirect_uri, state, nonce)
    }

    /// Finish a Google sign-in and load (or create) the customer profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Identity` if the code exchange fails.
    pub async fn complete_google_sign_in(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<CurrentUser, AuthError> {
        let subject = self
            .identity
            .complete_google_sign_in(code, redirect_uri)
            .await?;
        self.sign_in(&subject).await
    }

    // =========================================================================
    // Phone
    // =========================================================================

    /// Normalize the typed number and send it a one-time code.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidPhone` for malformed numbers and
    /// `AuthError::Identity` if the provider refuses to send.
    pub async fn send_phone_code(
        &self,
        phone: &str,
        challenge_token: &str,
    ) -> Result<PhoneVerification, AuthError> {
        let phone = PhoneNumber::parse(phone)?;
        let verification = self.identity.send_phone_code(&phone, challenge_token).await?;
        tracing::info!(phone = %phone, "Verification code sent");
        Ok(verification)
    }

    /// Confirm the code a user typed and load (or create) their profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Identity` for malformed or wrong codes.
    pub async fn confirm_phone_code(
        &self,
        verification: &PhoneVerification,
        code: &str,
    ) -> Result<CurrentUser, AuthError> {
        let code = VerificationCode::parse(code)?;
        let subject = self.identity.confirm_phone_code(verification, &code).await?;
        self.sign_in(&subject).await
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    async fn sign_in(&self, subject: &AuthSubject) -> Result<CurrentUser, AuthError> {
        let customer = self.ensure_customer(subject).await?;
        let role = self.role_for(customer.email.as_ref().map(Email::as_str).or(subject.email.as_deref()));
        tracing::info!(customer_id = %customer.id, ?role, "Customer signed in");
        Ok(CurrentUser::from_customer(&customer, role))
    }

    /// Return the subject's profile, creating it on first sign-in.
    ///
    /// Concurrent first sign-ins for the same subject create one profile;
    /// the losers get the winner's.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn ensure_customer(&self, subject: &AuthSubject) -> Result<Customer, AuthError> {
        if let Some(existing) = self.customers.get_by_subject(&subject.uid).await? {
            return Ok(existing);
        }

        let seed = NewCustomer {
            name: subject.display_name.clone().unwrap_or_default(),
            phone: subject.phone_number.clone().unwrap_or_default(),
            // Providers occasionally report addresses we would reject; the
            // customer can fix it on the account page.
            email: subject.email.as_deref().and_then(|e| Email::parse(e).ok()),
            photo_url: subject.photo_url.clone(),
        };
        let candidate = Customer::create(
            CustomerId::generate(),
            subject.uid.clone(),
            seed,
            now_millis(),
        );

        let (customer, created) = self.customers.create_if_absent(&candidate).await?;
        if created {
            tracing::info!(customer_id = %customer.id, subject = %subject.uid, "Customer profile created");
        }
        Ok(customer)
    }

    /// Load a profile by id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CustomerNotFound` for unknown ids.
    pub async fn customer(&self, id: &CustomerId) -> Result<Customer, AuthError> {
        self.customers
            .get(id)
            .await?
            .ok_or(AuthError::CustomerNotFound)
    }

    /// Save account-page edits and return the refreshed session identity.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IncompleteProfile` when name or phone is blank.
    pub async fn update_profile(
        &self,
        id: &CustomerId,
        update: &ProfileUpdate,
    ) -> Result<CurrentUser, AuthError> {
        let missing = update.missing_fields();
        if !missing.is_empty() {
            return Err(AuthError::IncompleteProfile(missing));
        }
        let customer = self
            .customers
            .update_profile(id, update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::CustomerNotFound,
                other => AuthError::Repository(other),
            })?;
        let role = self.role_for(customer.email.as_ref().map(Email::as_str));
        Ok(CurrentUser::from_customer(&customer, role))
    }

    /// Administrator if the email matches the configured admin address,
    /// ignoring case.
    #[must_use]
    pub fn role_for(&self, email: Option<&str>) -> UserRole {
        match (self.admin_email, email) {
            (Some(admin), Some(email)) if admin.matches(email) => UserRole::Admin,
            _ => UserRole::Customer,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mommypump_core::SubjectId;

    use super::*;
    use crate::db::MemoryDocumentStore;
    use crate::identity::{MemoryIdentityProvider, TEST_CODE};

    fn admin() -> Email {
        Email::parse("admin@mommypump.test").unwrap()
    }

    fn google_subject() -> AuthSubject {
        AuthSubject {
            uid: SubjectId::new("google-uid-1"),
            email: Some("Malee@Example.com".to_owned()),
            display_name: Some("Malee".to_owned()),
            phone_number: None,
            photo_url: Some("https://photos.test/m.jpg".to_owned()),
        }
    }

    #[test]
    fn random_strings_are_alphanumeric() {
        let s = generate_random_string(OAUTH_TOKEN_LENGTH);
        assert_eq!(s.len(), OAUTH_TOKEN_LENGTH);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(s, generate_random_string(OAUTH_TOKEN_LENGTH));
    }

    #[tokio::test]
    async fn google_sign_in_creates_profile_once() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::new();
        identity.add_google_user("code-1", google_subject());
        let admin = admin();
        let auth = AuthService::new(&store, &identity, Some(&admin));

        let first = auth.complete_google_sign_in("code-1", "/cb").await.unwrap();
        let second = auth.complete_google_sign_in("code-1", "/cb").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.display_name, "Malee");
        assert_eq!(first.email.as_deref(), Some("Malee@Example.com"));
        assert_eq!(first.role, UserRole::Customer);
        assert_eq!(CustomerRepository::new(&store).list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_google_code_is_rejected() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::new();
        let auth = AuthService::new(&store, &identity, None);

        let err = auth.complete_google_sign_in("nope", "/cb").await.unwrap_err();
        assert!(matches!(err, AuthError::Identity(_)));
    }

    #[tokio::test]
    async fn phone_sign_in_normalizes_the_number() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::new();
        let auth = AuthService::new(&store, &identity, None);

        let verification = auth.send_phone_code("081-234-5678", "captcha").await.unwrap();
        assert_eq!(verification.phone.as_str(), "+66812345678");

        let user = auth.confirm_phone_code(&verification, TEST_CODE).await.unwrap();
        assert_eq!(user.phone_number.as_deref(), Some("+66812345678"));
        assert_eq!(user.display_name, "");
    }

    #[tokio::test]
    async fn bad_phone_input_is_a_user_error() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::new();
        let auth = AuthService::new(&store, &identity, None);

        let err = auth.send_phone_code("call me", "captcha").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidPhone(_)));
        assert!(err.is_user_error());

        let verification = auth.send_phone_code("0812345678", "captcha").await.unwrap();
        let err = auth.confirm_phone_code(&verification, "12345").await.unwrap_err();
        assert!(err.is_user_error());
        let err = auth.confirm_phone_code(&verification, "654321").await.unwrap_err();
        assert!(err.is_user_error());
    }

    #[tokio::test]
    async fn admin_email_matches_case_insensitively() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::new();
        let mut subject = google_subject();
        subject.email = Some("ADMIN@mommypump.test".to_owned());
        identity.add_google_user("admin-code", subject);
        let admin = admin();
        let auth = AuthService::new(&store, &identity, Some(&admin));

        let user = auth.complete_google_sign_in("admin-code", "/cb").await.unwrap();
        assert!(user.is_admin());
        assert_eq!(auth.role_for(None), UserRole::Customer);
    }

    #[tokio::test]
    async fn profile_update_requires_name_and_phone() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::new();
        let auth = AuthService::new(&store, &identity, None);
        let customer = auth.ensure_customer(&google_subject()).await.unwrap();

        let err = auth
            .update_profile(&customer.id, &ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::IncompleteProfile(ref f) if f.contains(&"name")));

        let update = ProfileUpdate {
            name: "Malee S.".to_owned(),
            phone: "0812345678".to_owned(),
            ..ProfileUpdate::default()
        };
        let user = auth.update_profile(&customer.id, &update).await.unwrap();
        assert_eq!(user.display_name, "Malee S.");
        assert_eq!(user.email, None);
        let stored = auth.customer(&customer.id).await.unwrap();
        assert_eq!(stored.phone, "0812345678");
    }
}
