//! Catalog service.
//!
//! Reads products through a short-lived in-memory cache. The cache is
//! dropped whenever a booking changes a product's booking count.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use mommypump_core::catalog::{self, Product, SortOrder};
use mommypump_core::{BrandId, ProductId, ProductStatus, ProductTypeId};

use crate::db::{DocumentStore, ProductRepository, RepositoryError};

const ALL_PRODUCTS: &str = "products:all";

/// Shared cache of the product list.
///
/// Cloning is cheap; clones share entries.
#[derive(Clone)]
pub struct ProductCache {
    cache: Cache<String, Arc<Vec<Product>>>,
}

impl ProductCache {
    /// Create a cache that keeps the product list for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(16).time_to_live(ttl).build(),
        }
    }
}

impl Default for ProductCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300)) // 5 minutes
    }
}

/// A filtered, sorted product listing with its facet choices.
#[derive(Debug, Clone)]
pub struct Listing {
    pub products: Vec<Product>,
    /// Brands present among available products.
    pub brands: Vec<BrandId>,
    /// Product types present among available products.
    pub product_types: Vec<ProductTypeId>,
    pub selected_brand: Option<BrandId>,
    pub selected_type: Option<ProductTypeId>,
    pub sort: SortOrder,
}

/// Catalog service.
pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    cache: &'a ProductCache,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore, cache: &'a ProductCache) -> Self {
        Self {
            products: ProductRepository::new(store),
            cache,
        }
    }

    /// Every product in store order, including unavailable ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn all_products(&self) -> Result<Arc<Vec<Product>>, RepositoryError> {
        if let Some(products) = self.cache.cache.get(ALL_PRODUCTS).await {
            tracing::debug!("Cache hit for product list");
            return Ok(products);
        }

        let products = Arc::new(self.products.list_all().await?);
        self.cache
            .cache
            .insert(ALL_PRODUCTS.to_owned(), Arc::clone(&products))
            .await;
        Ok(products)
    }

    /// Products customers can book, in store order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn available_products(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .all_products()
            .await?
            .iter()
            .filter(|p| p.status == ProductStatus::Available)
            .cloned()
            .collect())
    }

    /// A single product by id, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self
            .all_products()
            .await?
            .iter()
            .find(|p| &p.id == id)
            .cloned())
    }

    /// The product listing page.
    ///
    /// `brand` and `product_type` are raw query values; empty or `all`
    /// means no filter. Facet choices come from all available products so
    /// that selecting one never hides the others.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn browse(
        &self,
        brand: Option<&str>,
        product_type: Option<&str>,
        sort: SortOrder,
    ) -> Result<Listing, RepositoryError> {
        let available = self.available_products().await?;
        let selected_brand = catalog::facet_param(brand).map(BrandId::new);
        let selected_type = catalog::facet_param(product_type).map(ProductTypeId::new);

        let filtered = catalog::filter(&available, selected_brand.as_ref(), selected_type.as_ref());
        let products = catalog::sort(filtered, sort).into_iter().cloned().collect();

        Ok(Listing {
            products,
            brands: catalog::brands(&available),
            product_types: catalog::product_types(&available),
            selected_brand,
            selected_type,
            sort,
        })
    }

    /// The most booked available products.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn featured(&self, count: usize) -> Result<Vec<Product>, RepositoryError> {
        let available = self.available_products().await?;
        let all: Vec<&Product> = available.iter().collect();
        Ok(catalog::sort(all, SortOrder::Popularity)
            .into_iter()
            .take(count)
            .cloned()
            .collect())
    }

    /// Drop the cached product list.
    pub async fn invalidate(&self) {
        self.cache.cache.invalidate(ALL_PRODUCTS).await;
    }
}
