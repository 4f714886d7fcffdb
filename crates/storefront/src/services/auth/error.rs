//! Authentication error types.

use thiserror::Error;

use mommypump_core::{EmailError, PhoneNumberError};

use crate::db::RepositoryError;
use crate::identity::IdentityError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Phone number not in Thai format.
    #[error("invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneNumberError),

    /// The identity provider refused or failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Required profile fields are blank.
    #[error("required fields are missing: {}", .0.join(", "))]
    IncompleteProfile(Vec<&'static str>),

    /// Customer profile not found.
    #[error("customer not found")]
    CustomerNotFound,

    /// Session state missing or invalid.
    #[error("invalid session state")]
    InvalidSessionState,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Whether the error comes from what the user entered.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::InvalidEmail(_)
            | Self::InvalidPhone(_)
            | Self::IncompleteProfile(_)
            | Self::InvalidSessionState => true,
            Self::Identity(e) => e.is_user_error(),
            Self::CustomerNotFound | Self::Repository(_) => false,
        }
    }
}
