//! Firebase Identity Toolkit and Google OAuth client.

use std::sync::Arc;

use async_trait::async_trait;
use mommypump_core::{PhoneNumber, SubjectId};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{AuthSubject, IdentityError, IdentityProvider, PhoneVerification, VerificationCode};
use crate::config::IdentityConfig;

const IDENTITY_TOOLKIT: &str = "https://identitytoolkit.googleapis.com/v1";
const GOOGLE_AUTHORIZE: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN: &str = "https://oauth2.googleapis.com/token";

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    id_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest<'a> {
    post_body: String,
    request_uri: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeRequest<'a> {
    phone_number: &'a str,
    recaptcha_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeResponse {
    session_info: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithPhoneRequest<'a> {
    session_info: &'a str,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

impl From<SignInResponse> for AuthSubject {
    fn from(r: SignInResponse) -> Self {
        Self {
            uid: SubjectId::new(r.local_id),
            email: r.email.filter(|e| !e.is_empty()),
            display_name: r.display_name.filter(|n| !n.is_empty()),
            phone_number: r.phone_number.filter(|p| !p.is_empty()),
            photo_url: r.photo_url.filter(|u| !u.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for Firebase Authentication's REST API, with Google as the OAuth
/// identity provider.
#[derive(Clone)]
pub struct FirebaseIdentityClient {
    inner: Arc<FirebaseIdentityClientInner>,
}

struct FirebaseIdentityClientInner {
    client: reqwest::Client,
    api_key: String,
    google_client_id: String,
    google_client_secret: String,
}

impl FirebaseIdentityClient {
    /// Create a new identity client.
    #[must_use]
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            inner: Arc::new(FirebaseIdentityClientInner {
                client: reqwest::Client::new(),
                api_key: config.firebase_api_key.expose_secret().to_string(),
                google_client_id: config.google_client_id.clone(),
                google_client_secret: config.google_client_secret.expose_secret().to_string(),
            }),
        }
    }

    /// Call an Identity Toolkit `accounts:*` method.
    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, IdentityError> {
        let url = format!(
            "{IDENTITY_TOOLKIT}/accounts:{method}?key={}",
            urlencoding::encode(&self.inner.api_key)
        );
        let response = self
            .inner
            .client
            .post(&url)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map_or_else(|_| format!("{method} failed ({status})"), |b| b.error.message);
            return Err(IdentityError::Api(message));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Exchange a Google authorization code for a Google ID token.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, IdentityError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.google_client_id.as_str()),
            ("client_secret", self.inner.google_client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .inner
            .client
            .post(GOOGLE_TOKEN)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IdentityError::OAuth(format!("Token exchange failed: {text}")));
        }

        let token: GoogleTokenResponse = response.json().await?;
        Ok(token.id_token)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityClient {
    fn google_authorization_url(&self, redirect_uri: &str, state: &str, nonce: &str) -> String {
        format!(
            "{GOOGLE_AUTHORIZE}?\
            client_id={}&\
            response_type=code&\
            redirect_uri={}&\
            scope=openid%20email%20profile&\
            prompt=select_account&\
            state={}&\
            nonce={}",
            urlencoding::encode(&self.inner.google_client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(nonce)
        )
    }

    #[tracing::instrument(skip(self, code))]
    async fn complete_google_sign_in(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AuthSubject, IdentityError> {
        let id_token = self.exchange_code(code, redirect_uri).await?;
        let request = SignInWithIdpRequest {
            post_body: format!(
                "id_token={}&providerId=google.com",
                urlencoding::encode(&id_token)
            ),
            request_uri: redirect_uri,
            return_secure_token: true,
        };
        let response: SignInResponse = self.call("signInWithIdp", &request).await?;
        Ok(response.into())
    }

    #[tracing::instrument(skip(self, challenge_token), fields(phone = %phone))]
    async fn send_phone_code(
        &self,
        phone: &PhoneNumber,
        challenge_token: &str,
    ) -> Result<PhoneVerification, IdentityError> {
        let request = SendCodeRequest {
            phone_number: phone.as_str(),
            recaptcha_token: challenge_token,
        };
        let response: SendCodeResponse = self.call("sendVerificationCode", &request).await?;
        Ok(PhoneVerification {
            session_info: response.session_info,
            phone: phone.clone(),
        })
    }

    #[tracing::instrument(skip_all, fields(phone = %verification.phone))]
    async fn confirm_phone_code(
        &self,
        verification: &PhoneVerification,
        code: &VerificationCode,
    ) -> Result<AuthSubject, IdentityError> {
        let request = SignInWithPhoneRequest {
            session_info: &verification.session_info,
            code: code.as_str(),
        };
        let response: SignInResponse = self.call("signInWithPhoneNumber", &request).await?;
        Ok(response.into())
    }
}
