//! MommyPump storefront - breast pump rental site.
//!
//! This binary serves the public storefront on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework with Askama templates for server-side rendering
//! - Document store over `PostgreSQL` `JSONB` (or process memory in demo mode)
//! - Cloudinary for payment receipts and product photos
//! - Firebase Authentication for Google and phone sign-in
//!
//! Migrations are NOT run on startup. Run them with `mp-cli migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use tower_sessions::MemoryStore;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mommypump_storefront::config::{DocumentStoreKind, StorefrontConfig};
use mommypump_storefront::db::{self, DocumentStore, MemoryDocumentStore, PgDocumentStore};
use mommypump_storefront::identity::FirebaseIdentityClient;
use mommypump_storefront::images::CloudinaryClient;
use mommypump_storefront::state::AppState;
use mommypump_storefront::{app, middleware, seed};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(std::borrow::Cow::Owned(config.sentry_environment.clone())),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mommypump_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let images = Arc::new(CloudinaryClient::new(&config.cloudinary));
    let identity = Arc::new(FirebaseIdentityClient::new(&config.identity));

    let router = match config.document_store {
        DocumentStoreKind::Postgres => {
            let database_url = config
                .database_url
                .as_ref()
                .expect("STOREFRONT_DATABASE_URL is required for the postgres store");
            let pool = db::create_pool(database_url)
                .await
                .expect("Failed to create database pool");
            tracing::info!("Database pool created");

            let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool.clone()));
            let state = AppState::new(config.clone(), store, images, identity);
            let sessions = PostgresStore::new(pool);
            app(state, middleware::create_session_layer(sessions, &config))
        }
        DocumentStoreKind::Memory => {
            let store = MemoryDocumentStore::new();
            let catalog = seed::demo_catalog().expect("Demo catalog is invalid");
            let count = seed::seed_products(&store, &catalog)
                .await
                .expect("Failed to seed demo catalog");
            tracing::warn!(count, "Using in-memory document store; data is lost on restart");

            let store: Arc<dyn DocumentStore> = Arc::new(store);
            let state = AppState::new(config.clone(), store, images, identity);
            app(state, middleware::create_session_layer(MemoryStore::default(), &config))
        }
    };

    // Sentry layers (outermost for full request coverage)
    let router = router
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
