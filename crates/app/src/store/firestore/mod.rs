//! Firestore REST client.
//!
//! Speaks the v1 REST surface directly with `reqwest`:
//!
//! - `GET documents/{path}` for reads
//! - `documents:commit` for every write (set, merge, add, increment), so
//!   server timestamps and increments are applied as field transforms
//! - `documents:runQuery` for equality queries
//!
//! Requests carry the signed-in user's ID token as a bearer token when one is
//! available, plus the web API key when configured.

mod codec;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use tracing::{debug, instrument};
use url::Url;

use crate::config::FirebaseConfig;
use crate::identity::AuthenticatedUser;

use super::{
    Document, DocumentPath, DocumentStore, DocumentWrite, FieldFilter, StoreError, auto_id,
};

use codec::{decode_fields, encode_fields, encode_value};

const FIRESTORE_API_URL: &str = "https://firestore.googleapis.com/v1";

/// Firestore client.
#[derive(Clone)]
pub struct FirestoreClient {
    inner: Arc<FirestoreClientInner>,
}

struct FirestoreClientInner {
    client: reqwest::Client,
    /// `projects/{project}/databases/(default)`
    database: String,
    api_key: Option<SecretString>,
    identity: Option<watch::Receiver<Option<AuthenticatedUser>>>,
}

/// Precondition attached to a commit write.
#[derive(Debug, Clone, Copy)]
enum Precondition {
    None,
    MustNotExist,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    ///
    /// # Arguments
    ///
    /// * `config` - Project id and optional web API key
    /// * `identity` - Identity updates; the current user's ID token authorizes requests
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &FirebaseConfig,
        identity: Option<watch::Receiver<Option<AuthenticatedUser>>>,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            inner: Arc::new(FirestoreClientInner {
                client,
                database: format!("projects/{}/databases/(default)", config.project_id),
                api_key: config.api_key.clone(),
                identity,
            }),
        })
    }

    fn document_name(&self, path: &str) -> String {
        format!("{}/documents/{path}", self.inner.database)
    }

    fn url(&self, resource: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(&format!("{FIRESTORE_API_URL}/{resource}"))
            .map_err(|e| StoreError::Codec(format!("invalid URL for {resource}: {e}")))?;
        if let Some(key) = &self.inner.api_key {
            url.query_pairs_mut().append_pair("key", key.expose_secret());
        }
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self
            .inner
            .identity
            .as_ref()
            .and_then(|rx| rx.borrow().as_ref().and_then(|user| user.id_token.clone()));
        match token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    /// Send a request and decode the JSON body, mapping error statuses.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<Option<Value>, StoreError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.pointer("/error/message")?.as_str().map(String::from))
                .unwrap_or_else(|| body.chars().take(200).collect());

            return Err(match status {
                StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                    StoreError::PermissionDenied(format!("{resource}: {message}"))
                }
                _ => StoreError::Api {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        if body.trim().is_empty() {
            return Ok(Some(Value::Null));
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| StoreError::Codec(format!("failed to parse response: {e}")))
    }

    async fn commit(&self, writes: Vec<Value>, resource: &str) -> Result<(), StoreError> {
        let url = self.url(&format!("{}/documents:commit", self.inner.database))?;
        let request = self
            .inner
            .client
            .post(url)
            .json(&json!({ "writes": writes }));

        match self.send(request, resource).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(resource.to_string())),
        }
    }

    fn update_write(
        &self,
        path: &str,
        write: DocumentWrite,
        mask: bool,
        precondition: Precondition,
    ) -> Value {
        let mut entry = Map::new();
        let field_paths: Vec<String> = write.fields.keys().cloned().collect();

        entry.insert(
            "update".to_string(),
            json!({
                "name": self.document_name(path),
                "fields": encode_fields(&write.fields),
            }),
        );
        if mask {
            entry.insert(
                "updateMask".to_string(),
                json!({ "fieldPaths": field_paths }),
            );
        }
        if !write.server_timestamps.is_empty() {
            let transforms: Vec<Value> = write
                .server_timestamps
                .iter()
                .map(|field| json!({ "fieldPath": field, "setToServerValue": "REQUEST_TIME" }))
                .collect();
            entry.insert("updateTransforms".to_string(), Value::Array(transforms));
        }
        if matches!(precondition, Precondition::MustNotExist) {
            entry.insert("currentDocument".to_string(), json!({ "exists": false }));
        }
        Value::Object(entry)
    }

    fn parse_document(value: &Value) -> Result<Document, StoreError> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Codec("document without name".to_string()))?;
        let id = name.rsplit('/').next().unwrap_or(name).to_string();
        let fields = value
            .get("fields")
            .and_then(Value::as_object)
            .map(decode_fields)
            .transpose()?
            .unwrap_or_default();
        Ok(Document { id, fields })
    }

    fn structured_query(collection_id: &str, filters: &[FieldFilter], limit: usize) -> Value {
        let field_filters: Vec<Value> = filters
            .iter()
            .map(|filter| {
                json!({
                    "fieldFilter": {
                        "field": { "fieldPath": filter.field },
                        "op": "EQUAL",
                        "value": encode_value(&filter.value),
                    }
                })
            })
            .collect();

        let mut query = Map::new();
        query.insert(
            "from".to_string(),
            json!([{ "collectionId": collection_id }]),
        );
        match field_filters.len() {
            0 => {}
            1 => {
                if let Some(only) = field_filters.into_iter().next() {
                    query.insert("where".to_string(), only);
                }
            }
            _ => {
                query.insert(
                    "where".to_string(),
                    json!({ "compositeFilter": { "op": "AND", "filters": field_filters } }),
                );
            }
        }
        query.insert("limit".to_string(), json!(limit));
        json!({ "structuredQuery": query })
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self), fields(path = %path))]
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError> {
        let url = self.url(&self.document_name(path.as_str()))?;
        let request = self.inner.client.get(url);

        match self.send(request, path.as_str()).await? {
            Some(body) => Self::parse_document(&body).map(Some),
            None => {
                debug!("document does not exist");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, write), fields(path = %path))]
    async fn set(&self, path: &DocumentPath, write: DocumentWrite) -> Result<(), StoreError> {
        let entry = self.update_write(path.as_str(), write, false, Precondition::None);
        self.commit(vec![entry], path.as_str()).await
    }

    #[instrument(skip(self, write), fields(path = %path))]
    async fn merge(&self, path: &DocumentPath, write: DocumentWrite) -> Result<(), StoreError> {
        let entry = self.update_write(path.as_str(), write, true, Precondition::None);
        self.commit(vec![entry], path.as_str()).await
    }

    #[instrument(skip(self, write))]
    async fn add(&self, collection: &str, write: DocumentWrite) -> Result<String, StoreError> {
        let id = auto_id();
        let path = DocumentPath::new([collection, id.as_str()]);
        let entry = self.update_write(path.as_str(), write, false, Precondition::MustNotExist);
        self.commit(vec![entry], path.as_str()).await?;
        Ok(id)
    }

    #[instrument(skip(self, filters), fields(filters = filters.len()))]
    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        // Subcollections are queried from their parent document.
        let (parent, collection_id) = match collection.rsplit_once('/') {
            Some((parent, id)) => (self.document_name(parent), id),
            None => (format!("{}/documents", self.inner.database), collection),
        };
        let url = self.url(&format!("{parent}:runQuery"))?;
        let request = self
            .inner
            .client
            .post(url)
            .json(&Self::structured_query(collection_id, filters, limit));

        let Some(body) = self.send(request, collection).await? else {
            return Ok(Vec::new());
        };
        let rows = body
            .as_array()
            .ok_or_else(|| StoreError::Codec("runQuery response is not an array".to_string()))?;

        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(Self::parse_document)
            .collect()
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn increment(
        &self,
        path: &DocumentPath,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        let entry = json!({
            "transform": {
                "document": self.document_name(path.as_str()),
                "fieldTransforms": [{
                    "fieldPath": field,
                    "increment": { "integerValue": delta.to_string() },
                }],
            }
        });
        self.commit(vec![entry], path.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> FirestoreClient {
        let config = FirebaseConfig {
            project_id: "demo-project".to_string(),
            api_key: Some(SecretString::from("web-key".to_string())),
        };
        FirestoreClient::new(&config, None).expect("client")
    }

    #[test]
    fn test_urls_include_database_and_key() {
        let client = client();
        let url = client
            .url(&client.document_name("users/u1"))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/demo-project/databases/(default)/documents/users/u1?key=web-key"
        );
    }

    #[test]
    fn test_merge_write_has_mask_and_transforms() {
        let client = client();
        let write = DocumentWrite::new()
            .field("zodiacSign", "leo")
            .server_timestamp("updatedAt");
        let entry = client.update_write("users/u1", write, true, Precondition::None);

        assert_eq!(
            entry["update"]["name"],
            "projects/demo-project/databases/(default)/documents/users/u1"
        );
        assert_eq!(
            entry["update"]["fields"]["zodiacSign"],
            json!({"stringValue": "leo"})
        );
        assert_eq!(entry["updateMask"]["fieldPaths"], json!(["zodiacSign"]));
        assert_eq!(
            entry["updateTransforms"][0],
            json!({"fieldPath": "updatedAt", "setToServerValue": "REQUEST_TIME"})
        );
        assert!(entry.get("currentDocument").is_none());
    }

    #[test]
    fn test_add_write_requires_absence() {
        let client = client();
        let entry = client.update_write(
            "daily_horoscopes/abc",
            DocumentWrite::new(),
            false,
            Precondition::MustNotExist,
        );
        assert_eq!(entry["currentDocument"], json!({"exists": false}));
        assert!(entry.get("updateMask").is_none());
    }

    #[test]
    fn test_structured_query_shapes() {
        let single = FirestoreClient::structured_query(
            "daily_horoscopes",
            &[FieldFilter::eq("date", "2024-06-01")],
            1,
        );
        assert_eq!(
            single["structuredQuery"]["where"]["fieldFilter"]["op"],
            "EQUAL"
        );
        assert_eq!(single["structuredQuery"]["limit"], 1);

        let composite = FirestoreClient::structured_query(
            "daily_horoscopes",
            &[
                FieldFilter::eq("zodiacSign", "Koc"),
                FieldFilter::eq("date", "2024-06-01"),
            ],
            1,
        );
        let filters = &composite["structuredQuery"]["where"]["compositeFilter"]["filters"];
        assert_eq!(filters.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_parse_document() {
        let doc = FirestoreClient::parse_document(&json!({
            "name": "projects/p/databases/(default)/documents/users/u1",
            "fields": {"coinBalance": {"integerValue": "12"}}
        }))
        .expect("parse");
        assert_eq!(doc.id, "u1");
        assert_eq!(doc.get("coinBalance"), Some(&json!(12)));
    }
}
