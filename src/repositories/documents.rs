use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::{Map, Value};
use sqlx::{types::Json, PgPool, Postgres, Transaction};

use super::RepositoryError;

mod memory;

pub use memory::MemoryDocumentStore;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub data: Value,
    pub version: i64,
}

/// Sets a single, possibly nested, field of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldUpdate {
    pub path: Vec<String>,
    pub value: Value,
}

impl FieldUpdate {
    pub fn new<I, S>(path: I, value: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            value,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError>;

    /// Missing ids are absent from the returned map.
    async fn get_many(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Document>, RepositoryError> {
        let reads = ids.iter().map(|id| async move {
            self.get(collection, id)
                .await
                .map(|document| (id.clone(), document))
        });

        Ok(try_join_all(reads)
            .await?
            .into_iter()
            .filter_map(|(id, document)| document.map(|document| (id, document)))
            .collect())
    }

    /// Fails with `AlreadyExists` when the id is taken.
    async fn insert(&self, collection: &str, id: &str, data: Value)
        -> Result<Document, RepositoryError>;

    /// Applies `updates` and bumps the version. With `expected_version`, the
    /// write only happens if the stored version still matches. With `upsert`,
    /// a missing document is created from the updates alone.
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        updates: &[FieldUpdate],
        expected_version: Option<i64>,
        upsert: bool,
    ) -> Result<i64, RepositoryError>;

    /// Writes `value` at `path` only if nothing is stored there yet. Returns
    /// whether the write happened.
    async fn set_if_absent(
        &self,
        collection: &str,
        id: &str,
        update: FieldUpdate,
    ) -> Result<bool, RepositoryError>;
}

pub fn field_at<'a>(data: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(data, |value, segment| value.get(segment))
        .filter(|value| !value.is_null())
}

/// Applies field updates in place, creating intermediate objects as needed.
pub fn apply_field_updates(data: &mut Value, updates: &[FieldUpdate]) -> Result<(), String> {
    if !data.is_object() {
        return Err("document root is not an object".to_string());
    }

    for update in updates {
        let Some((last, parents)) = update.path.split_last() else {
            return Err("empty field path".to_string());
        };

        let mut target = &mut *data;
        for segment in parents {
            if !target.get(segment).is_some_and(Value::is_object) {
                target[segment.as_str()] = Value::Object(Map::new());
            }
            target = &mut target[segment.as_str()];
        }
        target[last.as_str()] = update.value.clone();
    }

    Ok(())
}

#[derive(Clone)]
pub struct PgDocumentStore {
    conn: PgPool,
}

impl PgDocumentStore {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    async fn lock_document(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        let row: Option<(Json<Value>, i64)> = sqlx::query_as(
            "SELECT data, version FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(|(Json(data), version)| Document { data, version }))
    }

    async fn write_locked(
        tx: &mut Transaction<'_, Postgres>,
        collection: &str,
        id: &str,
        data: &Value,
        version: i64,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"UPDATE documents SET data = $3, version = $4, updated_at = CURRENT_TIMESTAMP
            WHERE collection = $1 AND id = $2"#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(data))
        .bind(version)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError> {
        let row: Option<(Json<Value>, i64)> =
            sqlx::query_as("SELECT data, version FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.conn)
                .await?;

        Ok(row.map(|(Json(data), version)| Document { data, version }))
    }

    async fn get_many(
        &self,
        collection: &str,
        ids: &[String],
    ) -> Result<HashMap<String, Document>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, Json<Value>, i64)> = sqlx::query_as(
            "SELECT id, data, version FROM documents WHERE collection = $1 AND id = ANY($2)",
        )
        .bind(collection)
        .bind(ids)
        .fetch_all(&self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(data), version)| (id, Document { data, version }))
            .collect())
    }

    async fn insert(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, RepositoryError> {
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"INSERT INTO documents (collection, id, data, version)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (collection, id) DO NOTHING
            RETURNING version"#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&data))
        .fetch_optional(&self.conn)
        .await?;

        match inserted {
            Some(version) => Ok(Document { data, version }),
            None => Err(RepositoryError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        updates: &[FieldUpdate],
        expected_version: Option<i64>,
        upsert: bool,
    ) -> Result<i64, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let Some(mut document) = Self::lock_document(&mut tx, collection, id).await? else {
            if !upsert {
                return Err(RepositoryError::not_found(collection, id));
            }
            if let Some(expected) = expected_version.filter(|expected| *expected != 0) {
                return Err(RepositoryError::StaleWrite {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected,
                    found: 0,
                });
            }

            tx.rollback().await?;

            let mut data = Value::Object(Map::new());
            apply_field_updates(&mut data, updates)
                .map_err(|reason| RepositoryError::malformed(collection, id, reason))?;

            // A concurrent upsert may have created the row since the lock attempt.
            return match self.insert(collection, id, data).await {
                Ok(document) => Ok(document.version),
                Err(RepositoryError::AlreadyExists { .. }) => Err(RepositoryError::StaleWrite {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected: 0,
                    found: 1,
                }),
                Err(e) => Err(e),
            };
        };

        if let Some(expected) = expected_version {
            if expected != document.version {
                return Err(RepositoryError::StaleWrite {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    expected,
                    found: document.version,
                });
            }
        }

        apply_field_updates(&mut document.data, updates)
            .map_err(|reason| RepositoryError::malformed(collection, id, reason))?;
        let version = document.version + 1;
        Self::write_locked(&mut tx, collection, id, &document.data, version).await?;
        tx.commit().await?;

        Ok(version)
    }

    async fn set_if_absent(
        &self,
        collection: &str,
        id: &str,
        update: FieldUpdate,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.conn.begin().await?;

        let mut document = Self::lock_document(&mut tx, collection, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(collection, id))?;

        if field_at(&document.data, &update.path).is_some() {
            return Ok(false);
        }

        apply_field_updates(&mut document.data, std::slice::from_ref(&update))
            .map_err(|reason| RepositoryError::malformed(collection, id, reason))?;
        Self::write_locked(&mut tx, collection, id, &document.data, document.version + 1).await?;
        tx.commit().await?;

        Ok(true)
    }
}
