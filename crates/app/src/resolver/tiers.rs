//! Tiers shared by every resolver.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use astro_dozi_core::{CacheKey, FeatureResult, HoroscopePayload};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::gemini::{TextGenerator, extract_json_object};
use crate::local::LocalStore;
use crate::prompts;

use super::{Miss, Request, Tier, TierError, TierKind};

/// A value the tiers can cache and generate.
pub trait Payload: Clone + Send + Sync + 'static {
    /// JSON text stored in caches.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    fn encode(&self) -> Result<String, serde_json::Error>;

    /// Read a payload back from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a description of why the text is not a valid payload.
    fn decode(key: &CacheKey, text: &str) -> Result<Self, String>;

    /// Generation prompt, or `None` when the request cannot be generated.
    fn prompt(request: &Request) -> Option<String>;
}

impl Payload for HoroscopePayload {
    fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn decode(_key: &CacheKey, text: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        Self::from_value(&value).map_err(|e| e.to_string())
    }

    fn prompt(request: &Request) -> Option<String> {
        match request.key {
            CacheKey::Horoscope { sign, date } => Some(prompts::horoscope(sign, date)),
            CacheKey::Feature { .. } => None,
        }
    }
}

impl Payload for FeatureResult {
    fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.data)
    }

    fn decode(key: &CacheKey, text: &str) -> Result<Self, String> {
        let CacheKey::Feature { feature, .. } = *key else {
            return Err(format!("{key} is not a feature key"));
        };
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        Self::from_value(feature, value).map_err(|e| e.to_string())
    }

    fn prompt(request: &Request) -> Option<String> {
        match request.key {
            CacheKey::Feature { feature, .. } => Some(prompts::feature(feature, request.sign)),
            CacheKey::Horoscope { .. } => None,
        }
    }
}

/// Device-local cache under [`CacheKey::local_key`].
///
/// An entry that cannot be decoded is deleted so it cannot block later
/// resolutions.
pub struct LocalTier<P> {
    store: Arc<dyn LocalStore>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> LocalTier<P> {
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<P: Payload> Tier<P> for LocalTier<P> {
    fn name(&self) -> &'static str {
        "local"
    }

    fn kind(&self) -> TierKind {
        TierKind::Device
    }

    async fn lookup(&self, request: &Request) -> Result<P, Miss> {
        let key = request.key.local_key();
        let Some(text) = self.store.get(&key) else {
            return Err(Miss::Absent);
        };
        P::decode(&request.key, &text).map_err(|reason| {
            if let Err(e) = self.store.remove(&key) {
                warn!(key = %key, error = %e, "failed to remove corrupt cache entry");
            }
            Miss::Corrupt(format!("{key}: {reason}"))
        })
    }

    async fn store(&self, request: &Request, payload: &P) -> Result<(), TierError> {
        let text = payload.encode()?;
        self.store.set(&request.key.local_key(), &text)?;
        Ok(())
    }
}

/// Asks the text generator for a new payload.
///
/// Only signed-in users may generate; guests get [`Miss::Denied`]. Each
/// call is bounded by a timeout.
pub struct GenerationTier<P> {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    _payload: PhantomData<fn() -> P>,
}

impl<P> GenerationTier<P> {
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            generator,
            timeout,
            _payload: PhantomData,
        }
    }
}

#[async_trait]
impl<P: Payload> Tier<P> for GenerationTier<P> {
    fn name(&self) -> &'static str {
        "generation"
    }

    fn kind(&self) -> TierKind {
        TierKind::Origin
    }

    #[instrument(skip(self, request), fields(key = %request.key))]
    async fn lookup(&self, request: &Request) -> Result<P, Miss> {
        if request.user.is_none() {
            return Err(Miss::Denied);
        }
        let Some(prompt) = P::prompt(request) else {
            return Err(Miss::Absent);
        };

        let text = match tokio::time::timeout(self.timeout, self.generator.generate(&prompt)).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(Miss::Failed(e.to_string())),
            Err(_) => {
                return Err(Miss::Failed(format!(
                    "generation timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        P::decode(&request.key, extract_json_object(&text))
            .map_err(|reason| Miss::Corrupt(format!("generated text: {reason}")))
    }
}
