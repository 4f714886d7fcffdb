//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `CLOUDINARY_CLOUD_NAME` - Cloudinary cloud hosting product photos and receipts
//! - `CLOUDINARY_UPLOAD_PRESET` - Unsigned upload preset for receipts
//! - `FIREBASE_API_KEY` - Firebase project web API key
//! - `GOOGLE_OAUTH_CLIENT_ID` - Google OAuth client ID
//! - `GOOGLE_OAUTH_CLIENT_SECRET` - Google OAuth client secret (high entropy)
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (unless the
//!   document store is `memory`; falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_DOCUMENT_STORE` - `postgres` or `memory` (default: postgres)
//! - `STOREFRONT_UTC_OFFSET_HOURS` - Offset used to decide "today" (default: 7)
//! - `ADMIN_EMAIL` - Email address granted the admin role
//! - `RECAPTCHA_SITE_KEY` - reCAPTCHA site key for phone sign-in
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name (default: development)
//! - `SENTRY_SAMPLE_RATE` - Error sample rate 0.0-1.0 (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate 0.0-1.0 (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use mommypump_core::Email;
use secrecy::SecretString;
use thiserror::Error;

const MIN_OAUTH_SECRET_LENGTH: usize = 20;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const SECONDS_PER_HOUR: i32 = 3600;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Which backend holds documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentStoreKind {
    /// `PostgreSQL` `JSONB` table.
    #[default]
    Postgres,
    /// Process memory, seeded with the demo catalog. Data is lost on restart.
    Memory,
}

impl FromStr for DocumentStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected postgres or memory, got {other}")),
        }
    }
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Document store backend
    pub document_store: DocumentStoreKind,
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront, without a trailing slash
    pub base_url: String,
    /// Offset of the shop's local time from UTC
    pub utc_offset: FixedOffset,
    /// Image host configuration
    pub cloudinary: CloudinaryConfig,
    /// Identity provider configuration
    pub identity: IdentityConfig,
    /// Signed-in users with this email are administrators
    pub admin_email: Option<Email>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: String,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of requests traced
    pub sentry_traces_sample_rate: f32,
}

/// Cloudinary configuration. Both values are public.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    /// Cloud name used in upload and delivery URLs
    pub cloud_name: String,
    /// Unsigned upload preset
    pub upload_preset: String,
}

/// Identity provider configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct IdentityConfig {
    /// Firebase web API key
    pub firebase_api_key: SecretString,
    /// Google OAuth client ID (safe to expose in browser)
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: SecretString,
    /// reCAPTCHA site key for the phone sign-in widget (public)
    pub recaptcha_site_key: Option<String>,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("firebase_api_key", &"[REDACTED]")
            .field("google_client_id", &self.google_client_id)
            .field("google_client_secret", &"[REDACTED]")
            .field("recaptcha_site_key", &self.recaptcha_site_key)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let document_store = parse_env_or_default("STOREFRONT_DOCUMENT_STORE", "postgres")?;
        let database_url = match document_store {
            DocumentStoreKind::Postgres => Some(get_database_url("STOREFRONT_DATABASE_URL")?),
            DocumentStoreKind::Memory => None,
        };
        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = validate_base_url(&get_required_env("STOREFRONT_BASE_URL")?)?;
        let utc_offset = utc_offset_from_hours(parse_env_or_default("STOREFRONT_UTC_OFFSET_HOURS", "7")?)?;

        let cloudinary = CloudinaryConfig::from_env()?;
        let identity = IdentityConfig::from_env()?;
        let admin_email = get_optional_env("ADMIN_EMAIL")
            .map(|value| {
                Email::parse(&value)
                    .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_EMAIL".to_string(), e.to_string()))
            })
            .transpose()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_env_or_default("SENTRY_ENVIRONMENT", "development");
        let sentry_sample_rate = parse_rate("SENTRY_SAMPLE_RATE", "1.0")?;
        let sentry_traces_sample_rate = parse_rate("SENTRY_TRACES_SAMPLE_RATE", "0.1")?;

        Ok(Self {
            document_store,
            database_url,
            host,
            port,
            base_url,
            utc_offset,
            cloudinary,
            identity,
            admin_email,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public URL is served over HTTPS (secure cookies).
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Today's date in the shop's timezone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.utc_offset).date_naive()
    }

    /// Absolute URL for a site path.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Configuration for tests: memory store, fake credentials.
    #[cfg(any(test, feature = "test-support"))]
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            document_store: DocumentStoreKind::Memory,
            database_url: None,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            utc_offset: FixedOffset::east_opt(7 * SECONDS_PER_HOUR).unwrap_or_else(|| Utc.fix()),
            cloudinary: CloudinaryConfig {
                cloud_name: "test".to_string(),
                upload_preset: "test-preset".to_string(),
            },
            identity: IdentityConfig {
                firebase_api_key: SecretString::from("test-api-key"),
                google_client_id: "test-client".to_string(),
                google_client_secret: SecretString::from("test-client-secret"),
                recaptcha_site_key: None,
            },
            admin_email: Email::parse("admin@mommypump.test").ok(),
            sentry_dsn: None,
            sentry_environment: "test".to_string(),
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }
}

impl CloudinaryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            cloud_name: get_required_env("CLOUDINARY_CLOUD_NAME")?,
            upload_preset: get_required_env("CLOUDINARY_UPLOAD_PRESET")?,
        })
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let google_client_secret = get_validated_secret("GOOGLE_OAUTH_CLIENT_SECRET")?;
        validate_secret_length(&google_client_secret, "GOOGLE_OAUTH_CLIENT_SECRET")?;
        Ok(Self {
            firebase_api_key: get_required_secret("FIREBASE_API_KEY")?,
            google_client_id: get_required_env("GOOGLE_OAUTH_CLIENT_ID")?,
            google_client_secret,
            recaptcha_site_key: get_optional_env("RECAPTCHA_SITE_KEY"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    // Try primary key first (e.g., STOREFRONT_DATABASE_URL)
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    // Fallback to generic DATABASE_URL (set by Fly.io postgres attach)
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a sample rate in `0.0..=1.0`.
fn parse_rate(key: &str, default: &str) -> Result<f32, ConfigError> {
    let rate: f32 = parse_env_or_default(key, default)?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ))
    }
}

/// Check the base URL is absolute http(s) and strip any trailing slash.
fn validate_base_url(value: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "STOREFRONT_BASE_URL".to_string(),
            format!("unsupported scheme {}", parsed.scheme()),
        ));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Build a fixed offset from whole hours.
fn utc_offset_from_hours(hours: i32) -> Result<FixedOffset, ConfigError> {
    hours
        .checked_mul(SECONDS_PER_HOUR)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "STOREFRONT_UTC_OFFSET_HOURS".to_string(),
                format!("{hours} is not a valid UTC offset"),
            )
        })
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    use secrecy::ExposeSecret;

    let value = secret.expose_secret();
    if value.len() < MIN_OAUTH_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_OAUTH_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
