//! Product repository.

use mommypump_core::catalog::Product;
use mommypump_core::{BrandId, ProductId, ProductStatus, ProductTypeId};
use serde_json::Value;

use super::collections::PRODUCTS;
use super::document::{Document, DocumentStore, Query, decode, encode};
use super::{RepositoryError, now_millis};

/// Repository for product documents.
pub struct ProductRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// All products in store order, regardless of status.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is malformed.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        self.find(&Query::new()).await
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the document is malformed.
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        self.store
            .get(PRODUCTS, id.as_str())
            .await?
            .map(|doc| decode(PRODUCTS, doc))
            .transpose()
    }

    /// Available products of one type.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is malformed.
    pub async fn by_type(&self, type_id: &ProductTypeId) -> Result<Vec<Product>, RepositoryError> {
        self.find(
            &Query::new()
                .where_eq("typeId", type_id.as_str())
                .where_eq("status", ProductStatus::Available.as_str()),
        )
        .await
    }

    /// Available products of one brand.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is malformed.
    pub async fn by_brand(&self, brand_id: &BrandId) -> Result<Vec<Product>, RepositoryError> {
        self.find(
            &Query::new()
                .where_eq("brandId", brand_id.as_str())
                .where_eq("status", ProductStatus::Available.as_str()),
        )
        .await
    }

    /// Insert a new product, marking it available.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the id is taken.
    pub async fn create(&self, product: &Product) -> Result<Product, RepositoryError> {
        let mut product = product.clone();
        product.status = ProductStatus::Available;
        product.created_at = Some(now_millis());
        product.updated_at = None;
        self.store
            .create(PRODUCTS, product.id.as_str(), encode(&product)?)
            .await?;
        Ok(product)
    }

    /// Insert or replace a product as authored, keeping its counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert(&self, product: &Product) -> Result<(), RepositoryError> {
        let mut product = product.clone();
        if let Some(existing) = self.get(&product.id).await? {
            product.booking_count = existing.booking_count;
            product.created_at = existing.created_at.or(product.created_at);
            product.updated_at = Some(now_millis());
        } else if product.created_at.is_none() {
            product.created_at = Some(now_millis());
        }
        self.store
            .put(PRODUCTS, product.id.as_str(), encode(&product)?)
            .await
    }

    /// Change a product's status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown ids.
    pub async fn set_status(
        &self,
        id: &ProductId,
        status: ProductStatus,
    ) -> Result<Product, RepositoryError> {
        let mut patch = Document::new();
        patch.insert("status".to_owned(), Value::from(status.as_str()));
        patch.insert(
            "updatedAt".to_owned(),
            Value::from(now_millis().timestamp_millis()),
        );
        let doc = self.store.update(PRODUCTS, id.as_str(), patch, false).await?;
        decode(PRODUCTS, doc)
    }

    /// Add one to the product's booking counter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown ids.
    pub async fn increment_booking_count(&self, id: &ProductId) -> Result<(), RepositoryError> {
        self.store
            .increment(PRODUCTS, id.as_str(), "bookingCount", 1)
            .await
    }

    /// Delete a product, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        self.store.delete(PRODUCTS, id.as_str()).await
    }

    async fn find(&self, query: &Query) -> Result<Vec<Product>, RepositoryError> {
        self.store
            .query(PRODUCTS, query)
            .await?
            .into_iter()
            .map(|doc| decode(PRODUCTS, doc))
            .collect()
    }
}
