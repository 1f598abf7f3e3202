//! In-process document store.
//!
//! Used when no Firestore project is configured and throughout the tests.
//! Failures can be injected per path prefix to exercise fallback behaviour.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};

use super::{
    Document, DocumentPath, DocumentStore, DocumentWrite, FieldFilter, StoreError, auto_id,
};

/// Document store held in memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<BTreeMap<String, Map<String, Value>>>,
    failing: Mutex<BTreeSet<String>>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document directly, bypassing failure injection.
    pub fn insert(&self, path: &DocumentPath, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.documents().insert(path.as_str().to_string(), fields);
    }

    /// Current contents of a document, bypassing failure injection.
    #[must_use]
    pub fn document(&self, path: &DocumentPath) -> Option<Map<String, Value>> {
        self.documents().get(path.as_str()).cloned()
    }

    /// Every document directly inside `collection`.
    #[must_use]
    pub fn collection(&self, collection: &str) -> Vec<Document> {
        self.documents()
            .iter()
            .filter_map(|(path, fields)| {
                let (parent, id) = path.rsplit_once('/')?;
                (parent == collection).then(|| Document {
                    id: id.to_string(),
                    fields: fields.clone(),
                })
            })
            .collect()
    }

    /// Make every operation on paths starting with `prefix` fail.
    pub fn fail_prefix(&self, prefix: &str) {
        self.failing_set().insert(prefix.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_set().clear();
    }

    fn documents(&self) -> MutexGuard<'_, BTreeMap<String, Map<String, Value>>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failing_set(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, path: &str) -> Result<(), StoreError> {
        if self
            .failing_set()
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return Err(StoreError::Unavailable(path.to_string()));
        }
        Ok(())
    }

    fn apply(write: DocumentWrite, mut target: Map<String, Value>) -> Map<String, Value> {
        target.extend(write.fields);
        let now = Utc::now().to_rfc3339();
        for field in write.server_timestamps {
            target.insert(field, Value::String(now.clone()));
        }
        target
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        self.check(path.as_str())?;
        Ok(self.document(path).map(|fields| Document {
            id: path.id().to_string(),
            fields,
        }))
    }

    async fn set(&self, path: &DocumentPath, write: DocumentWrite) -> Result<(), StoreError> {
        self.check(path.as_str())?;
        let fields = Self::apply(write, Map::new());
        self.documents().insert(path.as_str().to_string(), fields);
        Ok(())
    }

    async fn merge(&self, path: &DocumentPath, write: DocumentWrite) -> Result<(), StoreError> {
        self.check(path.as_str())?;
        let mut documents = self.documents();
        let existing = documents.remove(path.as_str()).unwrap_or_default();
        documents.insert(path.as_str().to_string(), Self::apply(write, existing));
        Ok(())
    }

    async fn add(&self, collection: &str, write: DocumentWrite) -> Result<String, StoreError> {
        self.check(collection)?;
        let id = auto_id();
        let path = DocumentPath::new([collection, id.as_str()]);
        let fields = Self::apply(write, Map::new());
        self.documents().insert(path.as_str().to_string(), fields);
        Ok(id)
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        self.check(collection)?;
        Ok(self
            .collection(collection)
            .into_iter()
            .filter(|doc| {
                filters
                    .iter()
                    .all(|filter| doc.fields.get(&filter.field) == Some(&filter.value))
            })
            .take(limit)
            .collect())
    }

    async fn increment(
        &self,
        path: &DocumentPath,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        self.check(path.as_str())?;
        let mut documents = self.documents();
        let fields = documents.entry(path.as_str().to_string()).or_default();
        let current = fields.get(field).and_then(Value::as_i64).unwrap_or(0);
        fields.insert(field.to_string(), Value::from(current.saturating_add(delta)));
        Ok(())
    }
}
