//! Daily horoscope resolution.
//!
//! Tier order: device cache, the user's `dailyCache`, the shared
//! `daily_horoscopes` collection, then generation. Guests may read the three
//! caches; generation needs an account.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use astro_dozi_core::{CacheKey, DateKey, HoroscopePayload, ZodiacSign};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::gemini::TextGenerator;
use crate::local::LocalStore;
use crate::store::{
    Document, DocumentPath, DocumentStore, DocumentWrite, FieldFilter, SHARED_HOROSCOPES,
};

use super::{
    Cascade, GenerationTier, LocalTier, Miss, Request, Resolver, Tier, TierError, TierKind,
};

/// Value of `source` on shared documents written by this client.
const SHARED_SOURCE_TAG: &str = "desktop";

/// Resolver for daily horoscopes.
pub type HoroscopeResolver = Resolver<HoroscopePayload>;

/// Build the four-tier horoscope resolver.
#[must_use]
pub fn resolver(
    local: Arc<dyn LocalStore>,
    documents: Arc<dyn DocumentStore>,
    generator: Arc<dyn TextGenerator>,
    generation_timeout: Duration,
) -> HoroscopeResolver {
    let tiers: Vec<Arc<dyn Tier<HoroscopePayload>>> = vec![
        Arc::new(LocalTier::new(local)),
        Arc::new(UserCacheTier::new(Arc::clone(&documents))),
        Arc::new(SharedCacheTier::new(documents)),
        Arc::new(GenerationTier::new(generator, generation_timeout)),
    ];
    Resolver::new(Cascade::new(tiers))
}

fn horoscope_key(request: &Request) -> Option<(ZodiacSign, DateKey)> {
    match request.key {
        CacheKey::Horoscope { sign, date } => Some((sign, date)),
        CacheKey::Feature { .. } => None,
    }
}

/// `users/{uid}/dailyCache/{id}`, written by every client of the account.
///
/// The current document id is `daily_{sign}_{date}`; older clients wrote
/// `{sign}_{date}`, which is still read.
pub struct UserCacheTier {
    store: Arc<dyn DocumentStore>,
}

impl UserCacheTier {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn parse(doc: &Document) -> Result<Option<HoroscopePayload>, String> {
        let value = match doc.get("horoscope") {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(text)) => {
                serde_json::from_str::<Value>(text).map_err(|e| e.to_string())?
            }
            Some(embedded) => embedded.clone(),
        };
        HoroscopePayload::from_value(&value)
            .map(Some)
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Tier<HoroscopePayload> for UserCacheTier {
    fn name(&self) -> &'static str {
        "user-cache"
    }

    fn kind(&self) -> TierKind {
        TierKind::Remote
    }

    #[instrument(skip(self, request), fields(key = %request.key))]
    async fn lookup(&self, request: &Request) -> Result<HoroscopePayload, Miss> {
        let Some(uid) = &request.user else {
            return Err(Miss::Absent);
        };

        let mut problem = None;
        for id in request.key.user_cache_ids() {
            let path = DocumentPath::user_daily_cache(uid.as_str(), &id);
            match self.store.get(&path).await {
                Ok(Some(doc)) => match Self::parse(&doc) {
                    Ok(Some(payload)) => return Ok(payload),
                    Ok(None) => debug!(%path, "cache document has no horoscope"),
                    Err(reason) => {
                        warn!(%path, %reason, "unreadable cached horoscope");
                        problem = Some(Miss::Corrupt(reason));
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!(%path, error = %e, "user cache read failed");
                    problem = Some(Miss::Failed(e.to_string()));
                }
            }
        }
        Err(problem.unwrap_or(Miss::Absent))
    }

    async fn store(&self, request: &Request, payload: &HoroscopePayload) -> Result<(), TierError> {
        let (Some(uid), Some((sign, date))) = (&request.user, horoscope_key(request)) else {
            return Ok(());
        };
        let Some(id) = request.key.user_cache_ids().into_iter().next() else {
            return Ok(());
        };

        let write = DocumentWrite::new()
            .field("horoscope", serde_json::to_string(payload)?)
            .field("zodiac", sign.id())
            .field("date", date.to_string())
            .server_timestamp("createdAt");
        self.store
            .set(&DocumentPath::user_daily_cache(uid.as_str(), &id), write)
            .await?;
        Ok(())
    }
}

/// The `daily_horoscopes` collection shared by all users, keyed by the sign's
/// display label and the date.
pub struct SharedCacheTier {
    store: Arc<dyn DocumentStore>,
}

impl SharedCacheTier {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tier<HoroscopePayload> for SharedCacheTier {
    fn name(&self) -> &'static str {
        "shared-cache"
    }

    fn kind(&self) -> TierKind {
        TierKind::Remote
    }

    #[instrument(skip(self, request), fields(key = %request.key))]
    async fn lookup(&self, request: &Request) -> Result<HoroscopePayload, Miss> {
        let Some((sign, date)) = horoscope_key(request) else {
            return Err(Miss::Absent);
        };
        let filters = [
            FieldFilter::eq("zodiacSign", sign.display_name()),
            FieldFilter::eq("date", date.to_string()),
        ];

        let docs = self
            .store
            .query(SHARED_HOROSCOPES, &filters, 1)
            .await
            .map_err(|e| Miss::Failed(e.to_string()))?;
        let Some(doc) = docs.into_iter().next() else {
            return Err(Miss::Absent);
        };

        HoroscopePayload::from_value(&Value::Object(doc.fields))
            .map_err(|e| Miss::Corrupt(format!("shared document {}: {e}", doc.id)))
    }

    async fn store(&self, request: &Request, payload: &HoroscopePayload) -> Result<(), TierError> {
        let Some((sign, date)) = horoscope_key(request) else {
            return Ok(());
        };

        let write = DocumentWrite::from_object(serde_json::to_value(payload)?)
            .field("zodiacSign", sign.display_name())
            .field("date", date.to_string())
            .field("source", SHARED_SOURCE_TAG)
            .server_timestamp("generatedAt");
        let id = self.store.add(SHARED_HOROSCOPES, write).await?;
        debug!(id = %id, "shared horoscope saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use astro_dozi_core::UserId;
    use serde_json::json;

    use super::*;
    use crate::store::MemoryDocumentStore;

    fn date() -> DateKey {
        DateKey::parse("2024-06-01").expect("valid")
    }

    fn request(user: Option<&str>) -> Request {
        Request::new(CacheKey::horoscope(ZodiacSign::Aries, date()))
            .for_user(user.map(UserId::new))
    }

    #[tokio::test]
    async fn test_user_cache_skipped_for_guests() {
        let store = Arc::new(MemoryDocumentStore::new());
        let tier = UserCacheTier::new(store);
        assert_eq!(tier.lookup(&request(None)).await, Err(Miss::Absent));
    }

    #[tokio::test]
    async fn test_user_cache_reads_string_and_legacy_ids() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert(
            &DocumentPath::user_daily_cache("u1", "aries_2024-06-01"),
            json!({"horoscope": {"motto": "Eski", "love": 40}}),
        );
        let tier = UserCacheTier::new(store.clone());

        let legacy = tier.lookup(&request(Some("u1"))).await.expect("legacy hit");
        assert_eq!(legacy.motto, "Eski");

        store.insert(
            &DocumentPath::user_daily_cache("u1", "daily_aries_2024-06-01"),
            json!({"horoscope": "{\"motto\":\"Yeni\"}", "zodiac": "aries"}),
        );
        let current = tier.lookup(&request(Some("u1"))).await.expect("hit");
        assert_eq!(current.motto, "Yeni");
    }

    #[tokio::test]
    async fn test_user_cache_unreadable_is_corrupt() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert(
            &DocumentPath::user_daily_cache("u1", "daily_aries_2024-06-01"),
            json!({"horoscope": "{oops"}),
        );
        let tier = UserCacheTier::new(store);
        assert!(matches!(
            tier.lookup(&request(Some("u1"))).await,
            Err(Miss::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_user_cache_write_shape() {
        let store = Arc::new(MemoryDocumentStore::new());
        let tier = UserCacheTier::new(store.clone());
        let payload = HoroscopePayload {
            motto: "X".to_string(),
            ..HoroscopePayload::default()
        };

        tier.store(&request(Some("u1")), &payload).await.expect("store");

        let doc = store
            .document(&DocumentPath::user_daily_cache("u1", "daily_aries_2024-06-01"))
            .expect("written");
        assert_eq!(doc["zodiac"], "aries");
        assert_eq!(doc["date"], "2024-06-01");
        assert!(doc.contains_key("createdAt"));
        let stored = doc["horoscope"].as_str().expect("string-encoded");
        assert_eq!(HoroscopePayload::from_json_str(stored), Some(payload));
    }

    #[tokio::test]
    async fn test_shared_cache_normalises_aliases() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert(
            &DocumentPath::new([SHARED_HOROSCOPES, "a1"]),
            json!({
                "zodiacSign": "Koc",
                "date": "2024-06-01",
                "motto": "Test",
                "generalComment": "Uzun yorum",
                "loveScore": "70",
                "lucky_number": 3
            }),
        );
        let tier = SharedCacheTier::new(store);

        let payload = tier.lookup(&request(None)).await.expect("hit");
        assert_eq!(payload.motto, "Test");
        assert_eq!(payload.commentary, "Uzun yorum");
        assert_eq!(payload.love, 70);
        assert_eq!(payload.lucky_number, 3);
    }

    #[tokio::test]
    async fn test_shared_cache_query_failure_is_failed() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.fail_prefix(SHARED_HOROSCOPES);
        let tier = SharedCacheTier::new(store);
        assert!(matches!(
            tier.lookup(&request(None)).await,
            Err(Miss::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_shared_cache_write_tags_document() {
        let store = Arc::new(MemoryDocumentStore::new());
        let tier = SharedCacheTier::new(store.clone());
        let payload = HoroscopePayload {
            motto: "X".to_string(),
            love: 80,
            ..HoroscopePayload::default()
        };

        tier.store(&request(Some("u1")), &payload).await.expect("store");

        let docs = store.collection(SHARED_HOROSCOPES);
        assert_eq!(docs.len(), 1);
        let doc = docs.first().expect("doc");
        assert_eq!(doc.str("zodiacSign"), Some("Koc"));
        assert_eq!(doc.str("date"), Some("2024-06-01"));
        assert_eq!(doc.get("love"), Some(&json!(80)));
        assert!(doc.get("generatedAt").is_some());
    }

    #[test]
    fn test_tier_order() {
        struct Never;

        #[async_trait]
        impl TextGenerator for Never {
            async fn generate(
                &self,
                _prompt: &str,
            ) -> Result<String, crate::gemini::GenerationError> {
                Err(crate::gemini::GenerationError::EmptyResponse)
            }
        }

        let resolver = resolver(
            Arc::new(crate::local::MemoryLocalStore::new()),
            Arc::new(MemoryDocumentStore::new()),
            Arc::new(Never),
            Duration::from_secs(1),
        );
        assert_eq!(
            resolver.cascade().tier_names(),
            vec!["local", "user-cache", "shared-cache", "generation"]
        );
    }
}
