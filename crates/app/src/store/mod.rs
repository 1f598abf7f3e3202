//! Document store access.
//!
//! The app reads and writes a small set of documents:
//!
//! | path | contents |
//! |------|----------|
//! | `users/{uid}` | `coinBalance`, `isPremium`, `zodiacSign` / `selectedZodiac` |
//! | `users/{uid}/dailyCache/daily_{sign}_{date}` | `horoscope` (JSON string or object), `zodiac`, `date`, `createdAt` |
//! | `daily_horoscopes/{auto}` | shared payloads queried by `zodiacSign` label and `date` |
//! | `app_config/web` | `geminiKey` |
//!
//! [`DocumentStore`] is the seam; [`MemoryDocumentStore`] backs tests and
//! offline use, [`FirestoreClient`] talks to Firestore over REST.

mod firestore;
mod memory;

use core::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use firestore::FirestoreClient;
pub use memory::MemoryDocumentStore;

/// Top-level user documents.
pub const USERS: &str = "users";
/// Per-user horoscope cache subcollection.
pub const DAILY_CACHE: &str = "dailyCache";
/// Shared horoscope collection, readable by every client.
pub const SHARED_HOROSCOPES: &str = "daily_horoscopes";
/// Client configuration documents.
pub const APP_CONFIG: &str = "app_config";

/// Errors returned by a [`DocumentStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Document does not exist (only for operations that require it).
    #[error("document not found: {0}")]
    NotFound(String),

    /// Security rules rejected the request.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Backend returned an error status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the backend.
        message: String,
    },

    /// Failed to encode or decode a document.
    #[error("codec error: {0}")]
    Codec(String),

    /// Backend cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Slash-separated path to a document, e.g. `users/abc/dailyCache/daily_leo_2024-06-01`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// Build a path from alternating collection / document segments.
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().trim_matches('/').to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    /// `users/{uid}`
    #[must_use]
    pub fn user(uid: &str) -> Self {
        Self::new([USERS, uid])
    }

    /// `users/{uid}/dailyCache/{id}`
    #[must_use]
    pub fn user_daily_cache(uid: &str, id: &str) -> Self {
        Self::new([USERS, uid, DAILY_CACHE, id])
    }

    /// `app_config/web`
    #[must_use]
    pub fn web_config() -> Self {
        Self::new([APP_CONFIG, "web"])
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the collection containing this document.
    #[must_use]
    pub fn collection(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(parent, _)| parent)
    }

    /// Last path segment.
    #[must_use]
    pub fn id(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, id)| id)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Fields to write, plus fields the server fills with its own timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
    pub fields: Map<String, Value>,
    pub server_timestamps: Vec<String>,
}

impl DocumentWrite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the entries of a JSON object. Non-objects contribute nothing.
    #[must_use]
    pub fn from_object(value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            fields,
            server_timestamps: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn server_timestamp(mut self, name: &str) -> Self {
        self.server_timestamps.push(name.to_string());
        self
    }
}

/// Equality filter for [`DocumentStore::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    #[must_use]
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

/// Remote document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document; `Ok(None)` when it does not exist.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError>;

    /// Create or replace a document.
    async fn set(&self, path: &DocumentPath, write: DocumentWrite) -> Result<(), StoreError>;

    /// Create the document or update only the listed fields.
    async fn merge(&self, path: &DocumentPath, write: DocumentWrite) -> Result<(), StoreError>;

    /// Create a document with a generated id, returning the id.
    async fn add(&self, collection: &str, write: DocumentWrite) -> Result<String, StoreError>;

    /// Documents of a collection matching every filter, at most `limit`.
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;

    /// Atomically add `delta` to an integer field on the server.
    async fn increment(
        &self,
        path: &DocumentPath,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError>;
}

/// Generate a 20-character alphanumeric document id.
pub(crate) fn auto_id() -> String {
    use rand::Rng;
    use rand::distr::Alphanumeric;

    rand::rng()
        .sample_iter(Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}
