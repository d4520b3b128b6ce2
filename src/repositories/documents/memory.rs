use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::{Map, Value};

use super::{apply_field_updates, field_at, Document, DocumentStore, FieldUpdate};
use crate::repositories::RepositoryError;

/// Process-local document store. Each entry is locked for the duration of a
/// write, so conditional updates behave like their database counterparts.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<DashMap<(String, String), Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(collection: &str, id: &str) -> (String, String) {
        (collection.to_string(), id.to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, RepositoryError> {
        Ok(self
            .documents
            .get(&Self::key(collection, id))
            .map(|document| document.value().clone()))
    }

    async fn insert(
        &self,
        collection: &str,
        id: &str,
        data: Value,
    ) -> Result<Document, RepositoryError> {
        match self.documents.entry(Self::key(collection, id)) {
            Entry::Occupied(_) => Err(RepositoryError::AlreadyExists {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            Entry::Vacant(entry) => {
                let document = Document { data, version: 1 };
                entry.insert(document.clone());
                Ok(document)
            }
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
        let mut entry = match self.documents.entry(Self::key(collection, id)) {
            Entry::Occupied(entry) => entry,
            Entry::Vacant(entry) => {
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

                let mut data = Value::Object(Map::new());
                apply_field_updates(&mut data, updates)
                    .map_err(|reason| RepositoryError::malformed(collection, id, reason))?;
                entry.insert(Document { data, version: 1 });
                return Ok(1);
            }
        };

        let document = entry.get_mut();
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

        let mut data = document.data.clone();
        apply_field_updates(&mut data, updates)
            .map_err(|reason| RepositoryError::malformed(collection, id, reason))?;
        document.data = data;
        document.version += 1;

        Ok(document.version)
    }

    async fn set_if_absent(
        &self,
        collection: &str,
        id: &str,
        update: FieldUpdate,
    ) -> Result<bool, RepositoryError> {
        let Some(mut document) = self.documents.get_mut(&Self::key(collection, id)) else {
            return Err(RepositoryError::not_found(collection, id));
        };

        if field_at(&document.data, &update.path).is_some() {
            return Ok(false);
        }

        let mut data = document.data.clone();
        apply_field_updates(&mut data, std::slice::from_ref(&update))
            .map_err(|reason| RepositoryError::malformed(collection, id, reason))?;
        document.data = data;
        document.version += 1;

        Ok(true)
    }
}
