//! The document store abstraction.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::RepositoryError;

/// A stored document: a JSON object.
///
/// Documents never store their own id. Stores strip an `id` field on write
/// and inject it on read, so typed records with an `id` field round-trip.
pub type Document = Map<String, Value>;

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filters, one ordering field and a limit.
///
/// Without an ordering, results come back in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<(String, Value)>,
    order_by: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep documents whose top-level `field` equals `value`.
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Order by a top-level field. Documents missing the field sort last.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    #[must_use]
    pub fn ordering(&self) -> Option<(&str, Direction)> {
        self.order_by.as_ref().map(|(field, dir)| (field.as_str(), *dir))
    }

    #[must_use]
    pub const fn max_results(&self) -> Option<usize> {
        self.limit
    }

    /// Whether a document satisfies every filter.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }

    /// Compare two documents under this query's ordering.
    #[must_use]
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let Some((field, direction)) = &self.order_by else {
            return Ordering::Equal;
        };
        match (a.get(field), b.get(field)) {
            (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
            (None | Some(Value::Null), _) => Ordering::Greater,
            (_, None | Some(Value::Null)) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y);
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or_default()
                .total_cmp(&y.as_f64().unwrap_or_default()),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Storage for JSON documents grouped in collections.
///
/// Ids are chosen by the caller. A document may also carry a `unique_key`;
/// at most one document per collection holds a given key at a time.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError>;

    /// Insert a new document.
    ///
    /// Returns [`RepositoryError::Conflict`] if the id is taken.
    async fn create(&self, collection: &str, id: &str, data: Document)
    -> Result<(), RepositoryError>;

    /// Insert a document unless another document already holds `unique_key`.
    ///
    /// Returns the stored document and whether this call created it.
    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        unique_key: &str,
        data: Document,
    ) -> Result<(Document, bool), RepositoryError>;

    /// Insert or replace a document.
    async fn put(&self, collection: &str, id: &str, data: Document) -> Result<(), RepositoryError>;

    /// Shallow-merge `patch` into a document. `null` values remove fields.
    ///
    /// With `release_unique_key` the document gives up its unique key.
    /// Returns [`RepositoryError::NotFound`] for unknown ids.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
        release_unique_key: bool,
    ) -> Result<Document, RepositoryError>;

    /// [`update`](Self::update), applied only while the top-level `field`
    /// still equals `expected`.
    ///
    /// Returns [`RepositoryError::NotFound`] for unknown ids and
    /// [`RepositoryError::Conflict`] when the field holds another value.
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        patch: Document,
        release_unique_key: bool,
    ) -> Result<Document, RepositoryError>;

    /// Atomically add `by` to a numeric field, treating a missing field as 0.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), RepositoryError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, RepositoryError>;

    /// Delete a document, returning whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, RepositoryError>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Serialize a record into a document, dropping its `id` field.
///
/// # Errors
///
/// Returns an error if the value does not serialize to a JSON object.
pub fn encode<T: Serialize>(record: &T) -> Result<Document, RepositoryError> {
    match serde_json::to_value(record)? {
        Value::Object(mut doc) => {
            doc.remove("id");
            Ok(doc)
        }
        other => Err(RepositoryError::DataCorruption(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Deserialize a document (with its injected id) into a record.
///
/// # Errors
///
/// Returns `RepositoryError::DataCorruption` naming the collection and id
/// when the document does not have the expected shape.
pub fn decode<T: DeserializeOwned>(collection: &str, doc: Document) -> Result<T, RepositoryError> {
    let id = doc
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("?")
        .to_owned();
    serde_json::from_value(Value::Object(doc)).map_err(|e| {
        RepositoryError::DataCorruption(format!("{collection}/{id}: {e}"))
    })
}

/// Return `doc` with its id injected.
#[must_use]
pub fn with_id(id: &str, mut doc: Document) -> Document {
    doc.insert("id".to_owned(), Value::String(id.to_owned()));
    doc
}

/// Apply a shallow patch in place.
pub fn merge(doc: &mut Document, patch: Document) {
    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        if value.is_null() {
            doc.remove(&key);
        } else {
            doc.insert(key, value);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn query_filters_on_equality() {
        let q = Query::new().where_eq("status", "available");
        assert!(q.matches(&doc(json!({"status": "available", "x": 1}))));
        assert!(!q.matches(&doc(json!({"status": "rented"}))));
        assert!(!q.matches(&doc(json!({}))));
    }

    #[test]
    fn ordering_puts_missing_fields_last() {
        let q = Query::new().order_by("createdAt", Direction::Descending);
        let old = doc(json!({"createdAt": 1}));
        let new = doc(json!({"createdAt": 2}));
        let none = doc(json!({}));
        assert_eq!(q.compare(&new, &old), Ordering::Less);
        assert_eq!(q.compare(&none, &old), Ordering::Greater);
        assert_eq!(q.compare(&old, &none), Ordering::Less);
    }

    #[test]
    fn merge_is_shallow_and_null_removes() {
        let mut base = doc(json!({"a": 1, "b": {"c": 2}, "d": true}));
        merge(&mut base, doc(json!({"b": {"e": 3}, "d": null, "id": "ignored"})));
        assert_eq!(Value::Object(base), json!({"a": 1, "b": {"e": 3}}));
    }

    #[test]
    fn encode_strips_id_and_decode_reports_location() {
        #[derive(Serialize, serde::Deserialize, Debug)]
        struct Rec {
            id: String,
            n: u32,
        }
        let encoded = encode(&Rec { id: "r1".into(), n: 1 }).unwrap();
        assert!(!encoded.contains_key("id"));

        let err = decode::<Rec>("things", with_id("r2", doc(json!({"n": "x"})))).unwrap_err();
        assert!(err.to_string().contains("things/r2"));
    }
}
