//! Generation prompts.
//!
//! Output is Turkish: the shared cache is keyed by the Turkish sign labels and
//! every client reads the same documents. Each prompt ends with the exact JSON
//! template the model must fill in.

use astro_dozi_core::{DateKey, FeatureKind, ZodiacSign};

const PERSONA: &str = "Sen Astro Dozi'nin astroloji asistanisin. Sicak, bilge ve hafif gizemli bir dille, Turkce yaziyorsun.";
const JSON_ONLY: &str = "Cevabi YALNIZCA su JSON bicimiyle ver, JSON disinda hicbir sey yazma:";

const HOROSCOPE_TEMPLATE: &str = r#"{"motto":"Gunun mottosu","commentary":"2-3 paragraf, 150-200 kelimelik yorum","love":75,"money":60,"health":80,"career":70,"luckyColor":"Renk","luckyNumber":7}"#;

/// Prompt for the daily horoscope of `sign` on `date`.
#[must_use]
pub fn horoscope(sign: ZodiacSign, date: DateKey) -> String {
    format!(
        "{PERSONA}\n\nBurc: {}\nTarih: {}\nBu burc icin bugunun yorumunu yaz. Skorlar 0 ile 100 arasinda tam sayi olsun.\n\n{JSON_ONLY}\n{HOROSCOPE_TEMPLATE}",
        sign.display_name(),
        date.long_turkish(),
    )
}

/// Prompt for a feature reading, personalised when a sign is selected.
#[must_use]
pub fn feature(kind: FeatureKind, sign: Option<ZodiacSign>) -> String {
    let (task, template) = feature_parts(kind);
    let mut prompt = format!("{PERSONA}\n\n{task}\n\n{JSON_ONLY}\n{template}");
    if let Some(sign) = sign {
        prompt.push_str("\nKullanicinin burcu: ");
        prompt.push_str(sign.display_name());
    }
    prompt
}

const fn feature_parts(kind: FeatureKind) -> (&'static str, &'static str) {
    match kind {
        FeatureKind::Tarot => (
            "Uc kartlik bir tarot acilimi yap ve her kartin anlamini acikla.",
            r#"{"cards":[{"name":"Kart adi","meaning":"Anlami"},{"name":"Kart adi","meaning":"Anlami"},{"name":"Kart adi","meaning":"Anlami"}],"summary":"Genel mesaj"}"#,
        ),
        FeatureKind::Compatibility => (
            "Burcun genel ask ve arkadaslik uyumunu degerlendir.",
            r#"{"title":"Baslik","compatibility":"2-3 paragraflik uyum analizi","bestMatch":"En uyumlu burc","score":85}"#,
        ),
        FeatureKind::Aura => (
            "Kisinin aura renklerini ve enerjisini yorumla.",
            r#"{"color":"Ana renk","secondaryColor":"Ikincil renk","meaning":"Anlami","energy":"Enerji durumu","advice":"Tavsiye"}"#,
        ),
        FeatureKind::PastLife => (
            "Kisinin gecmis yasamina dair kisa bir hikaye anlat.",
            r#"{"era":"Donem","role":"Rol","story":"2 paragraflik hikaye","karmaLesson":"Karmik ders","connection":"Bugunku hayatla baglantisi"}"#,
        ),
        FeatureKind::Chakra => (
            "Yedi cakranin her birinin dengesini yuzde olarak degerlendir.",
            r#"{"chakras":[{"name":"Kok Cakra","status":75,"note":"Not"},{"name":"Sakral Cakra","status":60,"note":"Not"},{"name":"Solar Pleksus","status":80,"note":"Not"},{"name":"Kalp Cakra","status":70,"note":"Not"},{"name":"Bogaz Cakra","status":65,"note":"Not"},{"name":"Ucuncu Goz","status":85,"note":"Not"},{"name":"Tac Cakra","status":55,"note":"Not"}],"overall":"Genel durum","advice":"Tavsiye"}"#,
        ),
        FeatureKind::LifePath => (
            "Numerolojiye gore yasam yolu sayisini ve anlamini acikla.",
            r#"{"number":7,"title":"Baslik","meaning":"1 paragraflik anlam","strengths":["Guc 1","Guc 2","Guc 3"],"challenges":["Zorluk 1","Zorluk 2","Zorluk 3"],"advice":"Tavsiye"}"#,
        ),
    }
}
