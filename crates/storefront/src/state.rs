//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::db::DocumentStore;
use crate::identity::IdentityProvider;
use crate::images::ImageHost;
use crate::services::{AuthService, BookingAdmin, BookingService, CatalogService, ProductCache};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the document store, the external service clients and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn DocumentStore>,
    images: Arc<dyn ImageHost>,
    identity: Arc<dyn IdentityProvider>,
    product_cache: ProductCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Document store (Postgres or in-memory)
    /// * `images` - Image host for receipts and product photos
    /// * `identity` - Identity provider for sign-in
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn DocumentStore>,
        images: Arc<dyn ImageHost>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                images,
                identity,
                product_cache: ProductCache::default(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the image host.
    #[must_use]
    pub fn images(&self) -> &dyn ImageHost {
        self.inner.images.as_ref()
    }

    /// Get a reference to the identity provider.
    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    /// Authentication service for this request.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(
            self.store(),
            self.identity(),
            self.config().admin_email.as_ref(),
        )
    }

    /// Catalog service for this request.
    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService::new(self.store(), &self.inner.product_cache)
    }

    /// Booking service for this request.
    #[must_use]
    pub fn bookings(&self) -> BookingService<'_> {
        BookingService::new(self.store(), self.images(), &self.inner.product_cache)
    }

    /// Booking administration (listing, status changes, draft cleanup).
    #[must_use]
    pub fn booking_admin(&self) -> BookingAdmin<'_> {
        BookingAdmin::new(self.store())
    }
}
