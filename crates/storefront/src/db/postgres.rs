//! `PostgreSQL` document store.
//!
//! Every collection shares the `storefront.document` table:
//!
//! ```text
//! seq        BIGINT IDENTITY   insertion order
//! collection TEXT              \ primary key
//! id         TEXT              /
//! unique_key TEXT NULL         unique per collection while set
//! data       JSONB             the document, without its id
//! ```

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::RepositoryError;
use super::document::{Direction, Document, DocumentStore, Query, with_id};

/// A [`DocumentStore`] backed by a `JSONB` table.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn conflict_or(e: sqlx::Error, what: impl FnOnce() -> String) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(what());
    }
    RepositoryError::Database(e)
}

/// Split a patch into the object to merge and the keys to remove.
fn split_patch(patch: Document) -> (Document, Vec<String>) {
    let mut set = Document::new();
    let mut remove = Vec::new();
    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        if value.is_null() {
            remove.push(key);
        } else {
            set.insert(key, value);
        }
    }
    (set, remove)
}

// A reservation can lose its key between our insert and lookup; retry a few times.
const RESERVE_ATTEMPTS: usize = 3;

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError> {
        let row: Option<(Json<Document>,)> = sqlx::query_as(
            "SELECT data FROM storefront.document WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(Json(data),)| with_id(id, data)))
    }

    async fn create(
        &self,
        collection: &str,
        id: &str,
        mut data: Document,
    ) -> Result<(), RepositoryError> {
        data.remove("id");
        sqlx::query("INSERT INTO storefront.document (collection, id, data) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id)
            .bind(Json(data))
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or(e, || format!("{collection}/{id} exists")))?;
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
        for _ in 0..RESERVE_ATTEMPTS {
            let inserted: Option<(String, Json<Document>)> = sqlx::query_as(
                r"
                INSERT INTO storefront.document (collection, id, unique_key, data)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (collection, unique_key) WHERE unique_key IS NOT NULL DO NOTHING
                RETURNING id, data
                ",
            )
            .bind(collection)
            .bind(id)
            .bind(unique_key)
            .bind(Json(&data))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_or(e, || format!("{collection}/{id} exists")))?;

            if let Some((id, Json(doc))) = inserted {
                return Ok((with_id(&id, doc), true));
            }

            let existing: Option<(String, Json<Document>)> = sqlx::query_as(
                "SELECT id, data FROM storefront.document WHERE collection = $1 AND unique_key = $2",
            )
            .bind(collection)
            .bind(unique_key)
            .fetch_optional(&self.pool)
            .await?;

            if let Some((id, Json(doc))) = existing {
                return Ok((with_id(&id, doc), false));
            }
        }
        Err(RepositoryError::Conflict(format!(
            "{collection}: key {unique_key} kept changing hands"
        )))
    }

    async fn put(&self, collection: &str, id: &str, mut data: Document) -> Result<(), RepositoryError> {
        data.remove("id");
        sqlx::query(
            r"
            INSERT INTO storefront.document (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()
            ",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Document,
        release_unique_key: bool,
    ) -> Result<Document, RepositoryError> {
        let (set, remove) = split_patch(patch);
        let row: Option<(Json<Document>,)> = sqlx::query_as(
            r"
            UPDATE storefront.document
            SET data = (data || $3) - $4::text[],
                unique_key = CASE WHEN $5 THEN NULL ELSE unique_key END,
                updated_at = now()
            WHERE collection = $1 AND id = $2
            RETURNING data
            ",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(set))
        .bind(remove)
        .bind(release_unique_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(Json(data),)| with_id(id, data))
            .ok_or(RepositoryError::NotFound)
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
        let (set, remove) = split_patch(patch);
        let row: Option<(Json<Document>,)> = sqlx::query_as(
            r"
            UPDATE storefront.document
            SET data = (data || $3) - $4::text[],
                unique_key = CASE WHEN $5 THEN NULL ELSE unique_key END,
                updated_at = now()
            WHERE collection = $1 AND id = $2 AND data -> $6::text = $7
            RETURNING data
            ",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(set))
        .bind(remove)
        .bind(release_unique_key)
        .bind(field)
        .bind(Json(expected))
        .fetch_optional(&self.pool)
        .await?;

        if let Some((Json(data),)) = row {
            return Ok(with_id(id, data));
        }
        match self.get(collection, id).await? {
            Some(_) => Err(RepositoryError::Conflict(format!(
                "{collection}/{id}: {field} is no longer {expected}"
            ))),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.document
            SET data = jsonb_set(
                    data,
                    ARRAY[$3::text],
                    to_jsonb(COALESCE((data ->> $3::text)::bigint, 0) + $4)
                ),
                updated_at = now()
            WHERE collection = $1 AND id = $2
            ",
        )
        .bind(collection)
        .bind(id)
        .bind(field)
        .bind(by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, RepositoryError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT id, data FROM storefront.document WHERE collection = ");
        qb.push_bind(collection.to_owned());

        if !query.filters().is_empty() {
            let containment: Document = query
                .filters()
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect();
            qb.push(" AND data @> ");
            qb.push_bind(Json(Value::Object(containment)));
        }

        match query.ordering() {
            Some((field, direction)) => {
                qb.push(" ORDER BY data -> ");
                qb.push_bind(field.to_owned());
                qb.push(match direction {
                    Direction::Ascending => "::text ASC NULLS LAST, seq",
                    Direction::Descending => "::text DESC NULLS LAST, seq",
                });
            }
            None => {
                qb.push(" ORDER BY seq");
            }
        }

        if let Some(limit) = query.max_results() {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<(String, Json<Document>)> =
            qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(data))| with_id(&id, data))
            .collect())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.document WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
