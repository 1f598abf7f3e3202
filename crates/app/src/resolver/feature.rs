//! Mystic feature resolution.
//!
//! Features have no remote cache: the device cache is tried, then
//! generation. Readings are keyed by feature and date, not by sign, and
//! every request requires a signed-in user.

use std::sync::Arc;
use std::time::Duration;

use astro_dozi_core::FeatureResult;

use crate::gemini::TextGenerator;
use crate::local::LocalStore;

use super::{Cascade, GenerationTier, LocalTier, Resolver, Tier};

/// Resolver for feature readings.
pub type FeatureResolver = Resolver<FeatureResult>;

/// Build the two-tier feature resolver.
#[must_use]
pub fn resolver(
    local: Arc<dyn LocalStore>,
    generator: Arc<dyn TextGenerator>,
    generation_timeout: Duration,
) -> FeatureResolver {
    let tiers: Vec<Arc<dyn Tier<FeatureResult>>> = vec![
        Arc::new(LocalTier::new(local)),
        Arc::new(GenerationTier::new(generator, generation_timeout)),
    ];
    Resolver::new(Cascade::new(tiers)).requiring_sign_in()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use astro_dozi_core::{CacheKey, DateKey, FeatureKind, UserId, ZodiacSign};

    use super::*;
    use crate::gemini::GenerationError;
    use crate::local::MemoryLocalStore;
    use crate::resolver::{Request, Resolution};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for Counting {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("Kullanicinin burcu: Balik"));
            Ok(r#"{"cards":[{"name":"Ay","meaning":"Sezgi"}],"summary":"Sabir"}"#.to_string())
        }
    }

    fn key() -> CacheKey {
        CacheKey::feature(
            FeatureKind::Tarot,
            DateKey::parse("2024-06-01").expect("valid"),
        )
    }

    #[tokio::test]
    async fn test_guest_is_refused_without_generation() {
        let generator = Arc::new(Counting::default());
        let resolver = resolver(
            Arc::new(MemoryLocalStore::new()),
            generator.clone(),
            Duration::from_secs(5),
        );

        let resolution = resolver.resolve(Request::new(key())).await;

        assert_eq!(resolution, Resolution::SignInRequired);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generated_reading_is_cached_locally() {
        let local = Arc::new(MemoryLocalStore::new());
        let generator = Arc::new(Counting::default());
        let resolver = resolver(local.clone(), generator.clone(), Duration::from_secs(5));
        let request = Request::new(key())
            .for_user(Some(UserId::new("u1")))
            .with_sign(Some(ZodiacSign::Pisces));

        let first = resolver.resolve(request.clone()).await;
        assert_eq!(first.source(), Some("generation"));
        assert!(local.get("feature_tarot_2024-06-01").is_some());

        // A fresh resolver (new process) hits the device cache.
        let again = super::resolver(local, generator.clone(), Duration::from_secs(5));
        let second = again.resolve(request).await;
        assert_eq!(second.source(), Some("local"));
        assert_eq!(first.payload(), second.payload());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }
}
