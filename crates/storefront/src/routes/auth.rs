//! Authentication route handlers.
//!
//! Customers sign in with Google (OAuth authorization code flow) or with a
//! phone number and an SMS code. Both end by storing a [`CurrentUser`] in
//! the session and returning to the page that asked for login.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::identity::PhoneVerification;
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, safe_redirect, session_keys};
use crate::services::AuthError;
use crate::services::auth::{OAUTH_TOKEN_LENGTH, generate_random_string};
use crate::state::AppState;

const GOOGLE_CALLBACK_PATH: &str = "/auth/google/callback";

// =============================================================================
// Form and Query Types
// =============================================================================

/// Login page query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    /// Where to go after signing in.
    pub redirect: Option<String>,
    /// Error code from a failed attempt.
    pub error: Option<String>,
}

/// Query parameters from the Google OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if the user denied consent.
    pub error: Option<String>,
}

/// Phone number form.
#[derive(Debug, Deserialize)]
pub struct PhoneForm {
    pub phone: String,
    /// Token from the reCAPTCHA widget.
    #[serde(rename = "g-recaptcha-response", default)]
    pub recaptcha_token: String,
}

/// Verification code form.
#[derive(Debug, Deserialize)]
pub struct CodeForm {
    pub code: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub user: Option<CurrentUser>,
    pub error: Option<&'static str>,
    pub recaptcha_site_key: Option<String>,
    /// Number a code was sent to, when waiting for the code.
    pub pending_phone: Option<String>,
}

/// Message for a login error code.
fn error_message(code: &str) -> &'static str {
    match code {
        "google_denied" => "การเข้าสู่ระบบด้วย Google ถูกยกเลิก",
        "invalid_state" | "session" => "เซสชันหมดอายุ กรุณาลองใหม่อีกครั้ง",
        "invalid_phone" => "เบอร์โทรศัพท์ไม่ถูกต้อง",
        "invalid_code" => "รหัสยืนยันไม่ถูกต้อง กรุณาลองใหม่อีกครั้ง",
        "sms_failed" => "ไม่สามารถส่งรหัสยืนยันได้ กรุณาลองใหม่อีกครั้ง",
        _ => "ไม่สามารถเข้าสู่ระบบได้ กรุณาลองใหม่อีกครั้ง",
    }
}

fn login_error(code: &str) -> Response {
    Redirect::to(&format!("/auth/login?error={code}")).into_response()
}

/// Store the user, tag Sentry and continue to the saved destination.
async fn finish_sign_in(session: &Session, user: &CurrentUser) -> Response {
    if let Err(e) = set_current_user(session, user).await {
        tracing::error!("Failed to store signed-in user: {e}");
        return login_error("session");
    }
    set_sentry_user(&user.id, user.email.as_deref());

    let target: Option<String> = session
        .remove(session_keys::LOGIN_REDIRECT)
        .await
        .ok()
        .flatten();
    Redirect::to(&safe_redirect(target.as_deref())).into_response()
}

// =============================================================================
// Login Page
// =============================================================================

/// Display the login page.
///
/// Signed-in visitors go straight to the destination.
pub async fn login_page(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    if let Some(target) = query.redirect.as_deref() {
        session
            .insert(session_keys::LOGIN_REDIRECT, safe_redirect(Some(target)))
            .await?;
    }

    if user.is_some() {
        let target: Option<String> = session.remove(session_keys::LOGIN_REDIRECT).await?;
        return Ok(Redirect::to(&safe_redirect(target.as_deref())).into_response());
    }

    let pending: Option<PhoneVerification> =
        session.get(session_keys::PHONE_VERIFICATION).await?;

    Ok(LoginTemplate {
        user,
        error: query.error.as_deref().map(error_message),
        recaptcha_site_key: state.config().identity.recaptcha_site_key.clone(),
        pending_phone: pending.map(|v| v.phone.to_string()),
    }
    .into_response())
}

// =============================================================================
// Google
// =============================================================================

/// Start a Google sign-in.
///
/// Generates state and nonce, stores them in the session and redirects to
/// Google's consent page.
///
/// # Route
///
/// `GET /auth/google/login`
pub async fn google_login(State(state): State<AppState>, session: Session) -> Response {
    let oauth_state = generate_random_string(OAUTH_TOKEN_LENGTH);
    let nonce = generate_random_string(OAUTH_TOKEN_LENGTH);

    if let Err(e) = session.insert(session_keys::OAUTH_STATE, &oauth_state).await {
        tracing::error!("Failed to store OAuth state in session: {e}");
        return login_error("session");
    }
    if let Err(e) = session.insert(session_keys::OAUTH_NONCE, &nonce).await {
        tracing::error!("Failed to store OAuth nonce in session: {e}");
        return login_error("session");
    }

    let redirect_uri = state.config().absolute_url(GOOGLE_CALLBACK_PATH);
    let auth_url = state
        .auth()
        .google_authorization_url(&redirect_uri, &oauth_state, &nonce);

    Redirect::to(&auth_url).into_response()
}

/// Handle the Google OAuth callback.
///
/// # Route
///
/// `GET /auth/google/callback`
pub async fn google_callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = query.error {
        tracing::warn!("Google OAuth error: {error}");
        return login_error("google_denied");
    }

    let Some(code) = query.code else {
        tracing::warn!("Google OAuth callback missing code");
        return login_error("google_failed");
    };

    let stored_state: Option<String> = session
        .remove(session_keys::OAUTH_STATE)
        .await
        .ok()
        .flatten();
    let _ = session.remove::<String>(session_keys::OAUTH_NONCE).await;

    if query.state.is_none() || stored_state != query.state {
        tracing::warn!("Google OAuth state mismatch");
        return login_error("invalid_state");
    }

    let redirect_uri = state.config().absolute_url(GOOGLE_CALLBACK_PATH);
    match state.auth().complete_google_sign_in(&code, &redirect_uri).await {
        Ok(user) => finish_sign_in(&session, &user).await,
        Err(e) => {
            tracing::error!("Google sign-in failed: {e}");
            login_error("google_failed")
        }
    }
}

// =============================================================================
// Phone
// =============================================================================

/// Send a verification code to the typed number.
///
/// # Route
///
/// `POST /auth/phone/send`
pub async fn phone_send(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PhoneForm>,
) -> Response {
    let verification = match state
        .auth()
        .send_phone_code(&form.phone, &form.recaptcha_token)
        .await
    {
        Ok(verification) => verification,
        Err(AuthError::InvalidPhone(e)) => {
            tracing::debug!("Rejected phone number: {e}");
            return login_error("invalid_phone");
        }
        Err(e) => {
            tracing::warn!("Failed to send verification code: {e}");
            return login_error("sms_failed");
        }
    };

    if let Err(e) = session
        .insert(session_keys::PHONE_VERIFICATION, &verification)
        .await
    {
        tracing::error!("Failed to store phone verification: {e}");
        return login_error("session");
    }

    Redirect::to("/auth/login").into_response()
}

/// Confirm the SMS code and sign in.
///
/// # Route
///
/// `POST /auth/phone/confirm`
pub async fn phone_confirm(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CodeForm>,
) -> Response {
    let verification: Option<PhoneVerification> = session
        .get(session_keys::PHONE_VERIFICATION)
        .await
        .ok()
        .flatten();
    let Some(verification) = verification else {
        return login_error("session");
    };

    match state.auth().confirm_phone_code(&verification, &form.code).await {
        Ok(user) => {
            let _ = session
                .remove::<PhoneVerification>(session_keys::PHONE_VERIFICATION)
                .await;
            finish_sign_in(&session, &user).await
        }
        Err(AuthError::Identity(e)) if e.is_user_error() => {
            tracing::debug!("Verification code rejected: {e}");
            login_error("invalid_code")
        }
        Err(e) => {
            tracing::error!("Phone sign-in failed: {e}");
            login_error("sign_in_failed")
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out and return home.
///
/// # Route
///
/// `POST /auth/logout`
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_error_codes_get_a_generic_message() {
        assert_eq!(error_message("invalid_code"), "รหัสยืนยันไม่ถูกต้อง กรุณาลองใหม่อีกครั้ง");
        assert_eq!(error_message("<script>"), error_message("sign_in_failed"));
    }
}
