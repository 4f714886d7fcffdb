//! Customer repository.

use mommypump_core::customer::{Customer, ProfileUpdate};
use mommypump_core::{CustomerId, SubjectId};
use serde_json::Value;

use super::collections::CUSTOMERS;
use super::document::{DocumentStore, Query, decode, encode};
use super::{RepositoryError, now_millis};

/// Repository for customer profiles.
///
/// Each profile is reserved under its identity subject, so at most one
/// profile exists per subject even when two first sign-ins race.
pub struct CustomerRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Get a customer by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the document is malformed.
    pub async fn get(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        self.store
            .get(CUSTOMERS, id.as_str())
            .await?
            .map(|doc| decode(CUSTOMERS, doc))
            .transpose()
    }

    /// Get the profile owned by an identity subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the document is malformed.
    pub async fn get_by_subject(
        &self,
        subject: &SubjectId,
    ) -> Result<Option<Customer>, RepositoryError> {
        let query = Query::new().where_eq("userId", subject.as_str()).limit(1);
        self.store
            .query(CUSTOMERS, &query)
            .await?
            .into_iter()
            .next()
            .map(|doc| decode(CUSTOMERS, doc))
            .transpose()
    }

    /// Store `customer` unless its subject already has a profile.
    ///
    /// Returns the stored profile and whether it was created by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn create_if_absent(
        &self,
        customer: &Customer,
    ) -> Result<(Customer, bool), RepositoryError> {
        let (doc, created) = self
            .store
            .create_if_absent(
                CUSTOMERS,
                customer.id.as_str(),
                customer.user_id.as_str(),
                encode(customer)?,
            )
            .await?;
        Ok((decode(CUSTOMERS, doc)?, created))
    }

    /// Apply edits from the account page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for unknown ids.
    pub async fn update_profile(
        &self,
        id: &CustomerId,
        update: &ProfileUpdate,
    ) -> Result<Customer, RepositoryError> {
        // Cleared optional fields serialize as null, which removes them.
        let mut patch = encode(update)?;
        patch.insert(
            "updatedAt".to_owned(),
            Value::from(now_millis().timestamp_millis()),
        );
        let doc = self.store.update(CUSTOMERS, id.as_str(), patch, false).await?;
        decode(CUSTOMERS, doc)
    }

    /// All customers, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document is malformed.
    pub async fn list_all(&self) -> Result<Vec<Customer>, RepositoryError> {
        let query = Query::new().order_by("createdAt", super::Direction::Descending);
        self.store
            .query(CUSTOMERS, &query)
            .await?
            .into_iter()
            .map(|doc| decode(CUSTOMERS, doc))
            .collect()
    }
}
