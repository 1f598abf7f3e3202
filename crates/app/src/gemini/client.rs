//! Gemini API client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::GeminiConfig;
use crate::store::{DocumentPath, DocumentStore};

use super::TextGenerator;
use super::error::GenerationError;
use super::types::{GenerateRequest, GenerateResponse};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const WEB_CONFIG_KEY_FIELD: &str = "geminiKey";
const MAX_ERROR_BODY: usize = 500;

/// Gemini `generateContent` client.
///
/// The API key is taken from configuration when present, otherwise read once
/// from `app_config/web` and kept for the life of the client. A failed read
/// is not remembered, so the next call tries again.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    client: reqwest::Client,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    api_key: OnceCell<SecretString>,
    store: Arc<dyn DocumentStore>,
}

impl GeminiClient {
    /// Create a new Gemini client.
    ///
    /// # Arguments
    ///
    /// * `config` - Model settings and optional API key
    /// * `store` - Document store holding `app_config/web`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &GeminiConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().build()?;
        let api_key = config
            .api_key
            .clone()
            .map_or_else(OnceCell::new, |key| OnceCell::new_with(Some(key)));

        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                client,
                model: config.model.clone(),
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
                api_key,
                store,
            }),
        })
    }

    /// Fetch the API key ahead of the first generation.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is configured and none can be read.
    pub async fn preload_key(&self) -> Result<(), GenerationError> {
        self.api_key().await.map(|_| ())
    }

    async fn api_key(&self) -> Result<&SecretString, GenerationError> {
        self.inner
            .api_key
            .get_or_try_init(|| async {
                let doc = self.inner.store.get(&DocumentPath::web_config()).await?;
                let key = doc
                    .as_ref()
                    .and_then(|doc| doc.str(WEB_CONFIG_KEY_FIELD))
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .ok_or(GenerationError::MissingApiKey)?;
                debug!("loaded generation API key from app config");
                Ok(SecretString::from(key.to_string()))
            })
            .await
    }

    fn endpoint(&self, api_key: &SecretString) -> Result<Url, GenerationError> {
        let mut url = Url::parse(&format!(
            "{GEMINI_API_URL}/{}:generateContent",
            self.inner.model
        ))
        .map_err(|e| GenerationError::Parse(format!("invalid endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", api_key.expose_secret());
        Ok(url)
    }

    /// Handle an error status code.
    async fn handle_error_status(status: StatusCode, response: reqwest::Response) -> GenerationError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return GenerationError::RateLimited;
        }
        let body = match response.text().await {
            Ok(body) => body.chars().take(MAX_ERROR_BODY).collect(),
            Err(e) => return GenerationError::Http(e),
        };
        GenerationError::Api {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip(self, prompt), fields(model = %self.inner.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self.api_key().await?;
        let request = GenerateRequest::prompt(
            prompt,
            self.inner.temperature,
            self.inner.max_output_tokens,
        );

        let response = self
            .inner
            .client
            .post(self.endpoint(api_key)?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let err = Self::handle_error_status(status, response).await;
            warn!(status = status.as_u16(), "generation request failed");
            return Err(err);
        }

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::Parse(format!("Failed to parse response: {e}")))?;
        parsed
            .first_text()
            .map(str::to_string)
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::{DocumentWrite, MemoryDocumentStore};

    fn config(api_key: Option<&str>) -> GeminiConfig {
        GeminiConfig {
            api_key: api_key.map(|k| SecretString::from(k.to_string())),
            ..GeminiConfig::default()
        }
    }

    #[tokio::test]
    async fn test_configured_key_wins() {
        let store = Arc::new(MemoryDocumentStore::new());
        let client = GeminiClient::new(&config(Some("configured")), store).expect("client");

        let key = client.api_key().await.expect("key");
        assert_eq!(key.expose_secret(), "configured");
    }

    #[tokio::test]
    async fn test_key_loaded_from_app_config_once() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .set(
                &DocumentPath::web_config(),
                DocumentWrite::from_object(json!({"geminiKey": "stored-key"})),
            )
            .await
            .expect("seed");
        let client = GeminiClient::new(&config(None), store.clone()).expect("client");

        client.preload_key().await.expect("preload");

        // Changing the document afterwards does not affect the cached key.
        store
            .set(
                &DocumentPath::web_config(),
                DocumentWrite::from_object(json!({"geminiKey": "rotated"})),
            )
            .await
            .expect("update");
        let key = client.api_key().await.expect("key");
        assert_eq!(key.expose_secret(), "stored-key");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_memoised() {
        let store = Arc::new(MemoryDocumentStore::new());
        let client = GeminiClient::new(&config(None), store.clone()).expect("client");

        assert!(matches!(
            client.api_key().await,
            Err(GenerationError::MissingApiKey)
        ));

        store
            .set(
                &DocumentPath::web_config(),
                DocumentWrite::from_object(json!({"geminiKey": "late-key"})),
            )
            .await
            .expect("seed");
        let key = client.api_key().await.expect("key");
        assert_eq!(key.expose_secret(), "late-key");
    }

    #[tokio::test]
    async fn test_key_lookup_failure_is_reported() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.fail_prefix("app_config");
        let client = GeminiClient::new(&config(None), store).expect("client");

        assert!(matches!(
            client.generate("hi").await,
            Err(GenerationError::KeyLookup(_))
        ));
    }

    #[test]
    fn test_endpoint_url() {
        let store = Arc::new(MemoryDocumentStore::new());
        let client = GeminiClient::new(&config(None), store).expect("client");
        let url = client
            .endpoint(&SecretString::from("k1".to_string()))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent?key=k1"
        );
    }

    #[test]
    fn test_gemini_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<GeminiClient>();
    }
}
