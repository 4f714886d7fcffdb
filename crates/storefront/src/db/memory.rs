//! Process-local document store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::RepositoryError;
use super::document::{Document, DocumentStore, Query, merge, with_id};

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    unique_key: Option<String>,
    data: Document,
}

/// A [`DocumentStore`] held in memory.
///
/// Used when `STOREFRONT_DOCUMENT_STORE=memory` and in tests. Collections
/// keep insertion order, so unordered queries are deterministic.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Entry>>>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn position(entries: &[Entry], id: &str) -> Option<usize> {
    entries.iter().position(|e| e.id == id)
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|entries| entries.iter().find(|e| e.id == id))
            .map(|e| with_id(&e.id, e.data.clone())))
    }

    async fn create(
        &self,
        collection: &str,
        id: &str,
        mut data: Document,
    ) -> Result<(), RepositoryError> {
        data.remove("id");
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_owned()).or_default();
        if position(entries, id).is_some() {
            return Err(RepositoryError::Conflict(format!("{collection}/{id} exists")));
        }
        entries.push(Entry {
            id: id.to_owned(),
            unique_key: None,
            data,
        });
        Ok(())
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        unique_key: &str,
        mut data: Document,
    ) -> Result<(Document, bool), RepositoryError> {
        data.remove("id");
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_owned()).or_default();
        if let Some(existing) = entries
            .iter()
            .find(|e| e.unique_key.as_deref() == Some(unique_key))
        {
            return Ok((with_id(&existing.id, existing.data.clone()), false));
        }
        if position(entries, id).is_some() {
            return Err(RepositoryError::Conflict(format!("{collection}/{id} exists")));
        }
        entries.push(Entry {
            id: id.to_owned(),
            unique_key: Some(unique_key.to_owned()),
            data: data.clone(),
        });
        Ok((with_id(id, data), true))
    }

    async fn put(&self, collection: &str, id: &str, mut data: Document) -> Result<(), RepositoryError> {
        data.remove("id");
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_owned()).or_default();
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry.data = data,
            None => entries.push(Entry {
                id: id.to_owned(),
                unique_key: None,
                data,
            }),
        }
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
        release_unique_key: bool,
    ) -> Result<Document, RepositoryError> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
            .ok_or(RepositoryError::NotFound)?;
        merge(&mut entry.data, patch);
        if release_unique_key {
            entry.unique_key = None;
        }
        Ok(with_id(&entry.id, entry.data.clone()))
    }

    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        patch: Document,
        release_unique_key: bool,
    ) -> Result<Document, RepositoryError> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
            .ok_or(RepositoryError::NotFound)?;
        if entry.data.get(field) != Some(expected) {
            return Err(RepositoryError::Conflict(format!(
                "{collection}/{id}: {field} is no longer {expected}"
            )));
        }
        merge(&mut entry.data, patch);
        if release_unique_key {
            entry.unique_key = None;
        }
        Ok(with_id(&entry.id, entry.data.clone()))
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), RepositoryError> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
            .ok_or(RepositoryError::NotFound)?;
        let current = entry.data.get(field).and_then(Value::as_i64).unwrap_or(0);
        entry
            .data
            .insert(field.to_owned(), Value::from(current.saturating_add(by)));
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, RepositoryError> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let mut matched: Vec<&Entry> = entries.iter().filter(|e| query.matches(&e.data)).collect();
        matched.sort_by(|a, b| query.compare(&a.data, &b.data));
        let limit = query.max_results().unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .take(limit)
            .map(|e| with_id(&e.id, e.data.clone()))
            .collect())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, RepositoryError> {
        let mut collections = self.collections.write().await;
        let Some(entries) = collections.get_mut(collection) else {
            return Ok(false);
        };
        Ok(position(entries, id).map(|idx| entries.remove(idx)).is_some())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::db::Direction;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let store = MemoryDocumentStore::new();
        store.create("c", "a", doc(json!({"n": 1}))).await.unwrap();
        let err = store.create("c", "a", doc(json!({"n": 2}))).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let got = store.get("c", "a").await.unwrap().unwrap();
        assert_eq!(got["id"], "a");
        assert_eq!(got["n"], 1);
    }

    #[tokio::test]
    async fn guarded_update_checks_the_field_first() {
        let store = MemoryDocumentStore::new();
        store.create("b", "a", doc(json!({"status": "draft"}))).await.unwrap();

        let err = store
            .update_if("b", "a", "status", &json!("pending"), doc(json!({"status": "cancelled"})), false)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.get("b", "a").await.unwrap().unwrap()["status"], "draft");

        let updated = store
            .update_if("b", "a", "status", &json!("draft"), doc(json!({"status": "pending"})), false)
            .await
            .unwrap();
        assert_eq!(updated["status"], "pending");

        assert!(matches!(
            store
                .update_if("b", "missing", "status", &json!("draft"), Document::new(), false)
                .await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn unique_key_is_held_until_released() {
        let store = MemoryDocumentStore::new();
        let (_, created) = store
            .create_if_absent("b", "one", "token", doc(json!({"s": "draft"})))
            .await
            .unwrap();
        assert!(created);

        let (existing, created) = store
            .create_if_absent("b", "two", "token", doc(json!({"s": "draft"})))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(existing["id"], "one");

        store
            .update("b", "one", doc(json!({"s": "pending"})), true)
            .await
            .unwrap();
        let (_, created) = store
            .create_if_absent("b", "two", "token", doc(json!({"s": "draft"})))
            .await
            .unwrap();
        assert!(created);
    }

    #[tokio::test]
    async fn concurrent_reservations_create_one_document() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .create_if_absent("b", &format!("id{i}"), "same", doc(json!({})))
                    .await
                    .unwrap()
            }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().1 {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.query("b", &Query::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let store = MemoryDocumentStore::new();
        for (id, status, at) in [("a", "x", 1), ("b", "y", 2), ("c", "x", 3), ("d", "x", 2)] {
            store
                .create("c", id, doc(json!({"status": status, "at": at})))
                .await
                .unwrap();
        }
        let q = Query::new()
            .where_eq("status", "x")
            .order_by("at", Direction::Descending)
            .limit(2);
        let ids: Vec<_> = store
            .query("c", &q)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d["id"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(ids, ["c", "d"]);
    }

    #[tokio::test]
    async fn update_increment_and_delete() {
        let store = MemoryDocumentStore::new();
        assert!(matches!(
            store.update("c", "missing", Document::new(), false).await,
            Err(RepositoryError::NotFound)
        ));

        store.put("c", "a", doc(json!({"count": 1}))).await.unwrap();
        store.increment("c", "a", "count", 2).await.unwrap();
        store.increment("c", "a", "other", 1).await.unwrap();
        let got = store.get("c", "a").await.unwrap().unwrap();
        assert_eq!(got["count"], 3);
        assert_eq!(got["other"], 1);

        assert!(store.delete("c", "a").await.unwrap());
        assert!(!store.delete("c", "a").await.unwrap());
        assert!(store.get("c", "a").await.unwrap().is_none());
    }
}
