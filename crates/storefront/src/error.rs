//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use mommypump_core::booking::ResolutionError;

use crate::db::RepositoryError;
use crate::filters;
use crate::models::CurrentUser;
use crate::services::{AuthError, BookingServiceError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Booking lookup or administration failed.
    #[error("Booking error: {0}")]
    Booking(#[from] BookingServiceError),

    /// Reading or writing the session failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Rendering a template failed.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Page shown for unknown products, options and paths.
#[derive(Template)]
#[template(path = "error/not_found.html")]
struct NotFoundTemplate {
    user: Option<CurrentUser>,
    message: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Template(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_)
                | AuthError::InvalidPhone(_)
                | AuthError::IncompleteProfile(_) => StatusCode::UNPROCESSABLE_ENTITY,
                AuthError::InvalidSessionState => StatusCode::UNAUTHORIZED,
                AuthError::CustomerNotFound => StatusCode::NOT_FOUND,
                AuthError::Identity(e) if e.is_user_error() => StatusCode::UNPROCESSABLE_ENTITY,
                AuthError::Identity(_) => StatusCode::BAD_GATEWAY,
                AuthError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Booking(err) => match err {
                BookingServiceError::Resolution(_) | BookingServiceError::NotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                BookingServiceError::InvalidTransition { .. } | BookingServiceError::Concurrent(_) => {
                    StatusCode::CONFLICT
                }
                BookingServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Message safe to show the visitor.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Template(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::InvalidPhone(e) => e.to_string(),
                AuthError::IncompleteProfile(_) => err.to_string(),
                AuthError::InvalidSessionState => "Session expired, please try again".to_string(),
                AuthError::Identity(e) if e.is_user_error() => {
                    "The code was not accepted, please try again".to_string()
                }
                _ => "Authentication error".to_string(),
            },
            Self::Booking(err) => match err {
                BookingServiceError::Resolution(ResolutionError::ProductNotFound(_)) => {
                    "ไม่พบสินค้าที่คุณต้องการ".to_string()
                }
                BookingServiceError::Resolution(ResolutionError::OptionNotFound { .. }) => {
                    "ไม่พบตัวเลือกการเช่าที่คุณต้องการ".to_string()
                }
                BookingServiceError::Repository(_) => "Internal server error".to_string(),
                _ => err.to_string(),
            },
            Self::NotFound(_) => "ไม่พบหน้าที่คุณต้องการ".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.public_message();

        if status == StatusCode::NOT_FOUND {
            let page = NotFoundTemplate {
                user: None,
                message: message.clone(),
            };
            if let Ok(html) = page.render() {
                return (status, Html(html)).into_response();
            }
        }

        (status, message).into_response()
    }
}

/// Fallback handler for unknown paths.
pub async fn not_found() -> AppError {
    AppError::NotFound("page".to_string())
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("booking", "Shipping details entered", Some(&[("product_id", "pump1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use mommypump_core::{BookingStatus, ProductId};

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("pump-123".to_string());
        assert_eq!(err.to_string(), "Not found: pump-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            let response = err.into_response();
            response.status()
        }

        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_booking_errors_map_to_statuses() {
        let missing = AppError::Booking(BookingServiceError::Resolution(
            ResolutionError::ProductNotFound(ProductId::new("nope")),
        ));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = AppError::Booking(BookingServiceError::InvalidTransition {
            from: BookingStatus::Returned,
            to: BookingStatus::Pending,
        });
        assert_eq!(invalid.into_response().status(), StatusCode::CONFLICT);

        let incomplete = AppError::Auth(AuthError::IncompleteProfile(vec!["name"]));
        assert_eq!(incomplete.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = AppError::Internal("connection refused to 10.0.0.3".to_string());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
