//! Integration tests for horoscope resolution.
//!
//! These tests drive `AstroApp::horoscope` through every cache tier with
//! in-memory stores and a scripted generator.

use std::time::Duration;

use astro_dozi_app::Presentation;
use astro_dozi_app::local::LocalStore;
use astro_dozi_app::store::{DocumentPath, SHARED_HOROSCOPES};
use astro_dozi_core::{HoroscopePayload, ZodiacSign};
use astro_dozi_integration_tests::{Harness, ScriptedGenerator, USER_ID, horoscope_reply};
use serde_json::json;

const ARIES_KEY: &str = "horoscope_aries_2024-06-01";

fn seed_shared(harness: &Harness, label: &str, motto: &str) {
    harness.documents.insert(
        &DocumentPath::new([SHARED_HOROSCOPES, "shared1"]),
        json!({
            "zodiacSign": label,
            "date": "2024-06-01",
            "motto": motto,
            "commentary": "Paylasilan yorum",
            "love": 60
        }),
    );
}

fn motto(presentation: &Presentation) -> Option<&str> {
    match presentation {
        Presentation::Horoscope(view) => Some(view.motto.as_str()),
        Presentation::Feature(_) | Presentation::Fallback(_) => None,
    }
}

fn fallback(presentation: &Presentation) -> &astro_dozi_app::view::FallbackView {
    match presentation {
        Presentation::Fallback(view) => view,
        other => panic!("expected a fallback, got {other:?}"),
    }
}

// =============================================================================
// Cascade
// =============================================================================

#[tokio::test]
async fn test_shared_cache_hit_is_written_to_local_cache() {
    let harness = Harness::new();
    harness.app.start().await;
    seed_shared(&harness, "Koc", "Test");

    let rendered = harness
        .app
        .horoscope(Some(ZodiacSign::Aries))
        .await
        .expect("sign given");

    assert_eq!(rendered.source, Some("shared-cache"));
    assert_eq!(motto(&rendered.presentation), Some("Test"));
    let cached = harness.local.get(ARIES_KEY).expect("written through");
    assert_eq!(
        HoroscopePayload::from_json_str(&cached).map(|p| p.motto),
        Some("Test".to_string())
    );
    assert_eq!(harness.generator.calls(), 0);
}

#[tokio::test]
async fn test_resolving_twice_generates_at_most_once_per_sign() {
    let harness = Harness::signed_in().await;

    for sign in ZodiacSign::ALL {
        let first = harness.app.horoscope(Some(sign)).await.expect("first");
        let cached = harness
            .local
            .get(&format!("horoscope_{}_2024-06-01", sign.id()))
            .expect("cached");
        let second = harness.app.horoscope(Some(sign)).await.expect("second");

        assert_eq!(first.source, Some("generation"));
        assert_eq!(second.source, Some("memory"));
        assert_eq!(first.presentation, second.presentation);
        assert_eq!(
            harness.local.get(&format!("horoscope_{}_2024-06-01", sign.id())),
            Some(cached)
        );
    }
    assert_eq!(harness.generator.calls(), ZodiacSign::ALL.len());

    // A new process reads the device cache instead of generating.
    let restarted = harness.restart();
    let again = restarted
        .horoscope(Some(ZodiacSign::Virgo))
        .await
        .expect("restart");
    assert_eq!(again.source, Some("local"));
    assert_eq!(harness.generator.calls(), ZodiacSign::ALL.len());
}

#[tokio::test]
async fn test_corrupt_local_entry_is_removed_and_skipped() {
    let harness = Harness::new();
    harness.local.set(ARIES_KEY, "{\"motto\": ").expect("seed");
    seed_shared(&harness, "Koc", "Temiz");

    let rendered = harness
        .app
        .horoscope(Some(ZodiacSign::Aries))
        .await
        .expect("resolves");

    assert_eq!(rendered.source, Some("shared-cache"));
    let repaired = harness.local.get(ARIES_KEY).expect("rewritten");
    assert!(HoroscopePayload::from_json_str(&repaired).is_some());
}

#[tokio::test]
async fn test_user_cache_hit_is_copied_to_device_only() {
    let harness = Harness::signed_in().await;
    harness.documents.insert(
        &DocumentPath::user_daily_cache(USER_ID, "daily_aries_2024-06-01"),
        json!({"horoscope": horoscope_reply("Kisisel"), "zodiac": "aries"}),
    );

    let rendered = harness
        .app
        .horoscope(Some(ZodiacSign::Aries))
        .await
        .expect("resolves");

    assert_eq!(rendered.source, Some("user-cache"));
    assert_eq!(motto(&rendered.presentation), Some("Kisisel"));
    assert!(harness.local.get(ARIES_KEY).is_some());
    assert!(harness.documents.collection(SHARED_HOROSCOPES).is_empty());
}

#[tokio::test]
async fn test_generated_horoscope_is_written_to_every_tier() {
    let harness = Harness::signed_in().await;

    let rendered = harness
        .app
        .horoscope(Some(ZodiacSign::Aries))
        .await
        .expect("resolves");
    assert_eq!(rendered.source, Some("generation"));

    assert!(harness.local.get(ARIES_KEY).is_some());
    let user_doc = harness
        .documents
        .document(&DocumentPath::user_daily_cache(
            USER_ID,
            "daily_aries_2024-06-01",
        ))
        .expect("user cache written");
    assert_eq!(user_doc["zodiac"], "aries");

    let shared = harness.documents.collection(SHARED_HOROSCOPES);
    assert_eq!(shared.len(), 1);
    let doc = shared.first().expect("shared doc");
    assert_eq!(doc.str("zodiacSign"), Some("Koc"));
    assert_eq!(doc.str("source"), Some("desktop"));

    let prompt = harness.generator.prompts().pop().expect("prompt");
    assert!(prompt.contains("Koc"));
    assert!(prompt.contains("1 Haziran 2024"));
}

#[tokio::test]
async fn test_remote_outage_does_not_block_generation() {
    let harness = Harness::signed_in().await;
    harness.documents.fail_prefix("users");
    harness.documents.fail_prefix(SHARED_HOROSCOPES);

    let rendered = harness
        .app
        .horoscope(Some(ZodiacSign::Leo))
        .await
        .expect("resolves");

    assert_eq!(rendered.source, Some("generation"));
    assert!(harness.local.get("horoscope_leo_2024-06-01").is_some());
}

// =============================================================================
// Fallback and retry
// =============================================================================

#[tokio::test]
async fn test_guest_without_cached_horoscope_is_asked_to_sign_in() {
    let harness = Harness::new();
    harness.app.continue_as_guest().expect("guest");

    let rendered = harness
        .app
        .horoscope(Some(ZodiacSign::Aries))
        .await
        .expect("resolves");

    let view = fallback(&rendered.presentation);
    assert!(view.sign_in);
    assert_eq!(view.retry_sign, Some("aries"));
    assert_eq!(harness.generator.calls(), 0);
}

#[tokio::test]
async fn test_generation_failure_falls_back_and_retry_runs_full_cascade() {
    let harness = Harness::builder()
        .generator(ScriptedGenerator::failing(500))
        .build()
        .sign_in()
        .await;

    let first = harness
        .app
        .horoscope(Some(ZodiacSign::Aries))
        .await
        .expect("resolves");
    let view = fallback(&first.presentation);
    assert_eq!(view.message, "Bugunun Koc burcu yorumu hazirlaniyor...");
    assert_eq!(view.retry_sign, Some("aries"));
    assert!(harness.local.get(ARIES_KEY).is_none());
    assert_eq!(harness.generator.calls(), 1);

    // Retry: local cache is still empty, so generation is attempted again.
    let retry = harness
        .app
        .horoscope(Some(ZodiacSign::Aries))
        .await
        .expect("resolves");
    assert!(retry.presentation.is_fallback());
    assert_eq!(harness.generator.calls(), 2);

    harness.generator.reply_with(horoscope_reply("Sonunda"));
    let recovered = harness
        .app
        .horoscope(Some(ZodiacSign::Aries))
        .await
        .expect("resolves");
    assert_eq!(motto(&recovered.presentation), Some("Sonunda"));
    assert_eq!(harness.generator.calls(), 3);
}

#[tokio::test]
async fn test_hung_generation_times_out_into_fallback() {
    let generator = ScriptedGenerator::replying(horoscope_reply("Gec"));
    generator.delay_prompts_containing("", Duration::from_secs(30));
    let harness = Harness::builder()
        .generator(generator)
        .generation_timeout(Duration::from_millis(50))
        .build()
        .sign_in()
        .await;

    let rendered = harness
        .app
        .horoscope(Some(ZodiacSign::Gemini))
        .await
        .expect("resolves");

    assert!(rendered.presentation.is_fallback());
}

#[tokio::test]
async fn test_fenced_reply_omits_zero_scores() {
    let harness = Harness::builder()
        .generator(ScriptedGenerator::replying(
            "Iste yorumun:\n```json\n{\"motto\":\"X\",\"commentary\":\"Y\",\"love\":80,\"money\":0}\n```",
        ))
        .build()
        .sign_in()
        .await;

    let rendered = harness
        .app
        .horoscope(Some(ZodiacSign::Aries))
        .await
        .expect("resolves");

    let Presentation::Horoscope(view) = rendered.presentation else {
        panic!("expected a horoscope");
    };
    let labels: Vec<_> = view.scores.iter().map(|m| m.label.as_str()).collect();
    assert_eq!(labels, vec!["Ask"]);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_identical_requests_share_one_generation() {
    let generator = ScriptedGenerator::replying(horoscope_reply("Tek"));
    generator.delay_prompts_containing("", Duration::from_millis(100));
    let harness = Harness::with_generator(generator).sign_in().await;

    let (a, b) = tokio::join!(
        harness.app.horoscope(Some(ZodiacSign::Leo)),
        harness.app.horoscope(Some(ZodiacSign::Leo)),
    );

    let (a, b) = (a.expect("a"), b.expect("b"));
    assert_eq!(a.presentation, b.presentation);
    assert_eq!(harness.generator.calls(), 1);
}

#[tokio::test]
async fn test_slow_result_never_replaces_newer_selection() {
    let generator = ScriptedGenerator::replying(horoscope_reply("Yorum"));
    generator.delay_prompts_containing("Burc: Koc", Duration::from_millis(200));
    let harness = Harness::with_generator(generator).sign_in().await;

    let (slow, fast) = tokio::join!(
        harness.app.horoscope(Some(ZodiacSign::Aries)),
        harness.app.horoscope(Some(ZodiacSign::Taurus)),
    );

    let (slow, fast) = (slow.expect("aries"), fast.expect("taurus"));
    assert!(!slow.shown);
    assert!(fast.shown);
    match harness.app.displayed() {
        Some(Presentation::Horoscope(view)) => assert_eq!(view.sign_name, "Boga"),
        other => panic!("expected the Taurus horoscope, got {other:?}"),
    }
}
