//! Presentation: payloads projected into view models.
//!
//! Views render to escaped HTML through askama templates and to plain text
//! through `Display`, which the CLI prints.

use core::fmt;

use askama::Template;
use astro_dozi_core::{
    DateKey, FeatureKind, FeatureResult, FeatureShape, HoroscopePayload, ScoreKind, ZodiacSign,
};
use serde_json::Value;

/// Bars are drawn as percentages.
const METER_MAX: u32 = 100;

const CHAKRA_COLORS: [&str; 7] = [
    "#EF4444", "#F97316", "#EAB308", "#22C55E", "#06B6D4", "#6366F1", "#A855F7",
];
const CHAKRA_FALLBACK_COLOR: &str = "#888888";

/// Aura palette by colour keyword, checked in order.
const AURA_PALETTE: [(&str, Rgb); 9] = [
    ("mor", Rgb(124, 58, 237)),
    ("mavi", Rgb(59, 130, 246)),
    ("yesil", Rgb(34, 197, 94)),
    ("sari", Rgb(234, 179, 8)),
    ("turuncu", Rgb(249, 115, 22)),
    ("kirmizi", Rgb(239, 68, 68)),
    ("pembe", Rgb(236, 72, 153)),
    ("beyaz", Rgb(200, 200, 200)),
    ("altin", Rgb(245, 158, 11)),
];
const AURA_DEFAULT: Rgb = Rgb(124, 58, 237);

const fn score_color(kind: ScoreKind) -> &'static str {
    match kind {
        ScoreKind::Love => "#EC4899",
        ScoreKind::Money => "#F59E0B",
        ScoreKind::Health => "#10B981",
        ScoreKind::Career => "#7C3AED",
    }
}

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// CSS `rgba()` with the given opacity.
    #[must_use]
    pub fn css(&self, alpha: f32) -> String {
        format!("rgba({},{},{},{alpha})", self.0, self.1, self.2)
    }
}

/// Palette colour for an aura colour name such as "Mor" or "Altin Sarisi".
#[must_use]
pub fn aura_rgb(color: &str) -> Rgb {
    let folded = fold_turkish(color);
    AURA_PALETTE
        .iter()
        .find(|(keyword, _)| folded.contains(keyword))
        .map_or(AURA_DEFAULT, |(_, rgb)| *rgb)
}

/// Lowercase with Turkish letters mapped to their ASCII base.
fn fold_turkish(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'ç' | 'Ç' => 'c',
            'ğ' | 'Ğ' => 'g',
            'ı' | 'I' | 'İ' => 'i',
            'ö' | 'Ö' => 'o',
            'ş' | 'Ş' => 's',
            'ü' | 'Ü' => 'u',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// A labelled percentage bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meter {
    pub label: String,
    pub value: u32,
    pub color: &'static str,
    pub note: Option<String>,
}

impl Meter {
    fn new(label: impl Into<String>, value: u32, color: &'static str) -> Self {
        Self {
            label: label.into(),
            value: value.min(METER_MAX),
            color,
            note: None,
        }
    }
}

/// A block of reading text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub heading: Option<String>,
    pub text: String,
    pub items: Vec<String>,
}

impl Section {
    fn text(heading: Option<&str>, text: &str) -> Option<Self> {
        let text = text.trim();
        (!text.is_empty()).then(|| Self {
            heading: heading.map(str::to_string),
            text: text.to_string(),
            items: Vec::new(),
        })
    }

    fn list(heading: &str, items: &[String]) -> Option<Self> {
        (!items.is_empty()).then(|| Self {
            heading: Some(heading.to_string()),
            text: String::new(),
            items: items.to_vec(),
        })
    }
}

/// The aura colour disc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swatch {
    pub label: String,
    pub secondary: Option<String>,
    pub rgb: Rgb,
}

/// Daily horoscope panel.
#[derive(Debug, Clone, PartialEq, Eq, Template)]
#[template(path = "horoscope.html")]
pub struct HoroscopeView {
    pub sign_name: &'static str,
    pub emoji: &'static str,
    pub date: String,
    pub motto: String,
    pub paragraphs: Vec<String>,
    /// Only scores above zero.
    pub scores: Vec<Meter>,
    pub lucky_number: Option<u32>,
    pub lucky_color: Option<String>,
}

impl HoroscopeView {
    #[must_use]
    pub fn new(sign: ZodiacSign, date: DateKey, payload: &HoroscopePayload) -> Self {
        Self {
            sign_name: sign.display_name(),
            emoji: sign.emoji(),
            date: date.long_turkish(),
            motto: payload.motto.trim().to_string(),
            paragraphs: payload
                .commentary
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            scores: payload
                .scores()
                .map(|(kind, value)| Meter::new(kind.label(), value, score_color(kind)))
                .collect(),
            lucky_number: (payload.lucky_number > 0).then_some(payload.lucky_number),
            lucky_color: non_empty(&payload.lucky_color),
        }
    }
}

impl HoroscopeView {
    /// Plain-text rendering; the template derive owns `Display`.
    fn write_text(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} - {}", self.emoji, self.sign_name, self.date)?;
        if !self.motto.is_empty() {
            writeln!(f, "\n\"{}\"", self.motto)?;
        }
        for paragraph in &self.paragraphs {
            writeln!(f, "\n{paragraph}")?;
        }
        if !self.scores.is_empty() {
            writeln!(f)?;
            for meter in &self.scores {
                write_meter(f, meter)?;
            }
        }
        if let Some(number) = self.lucky_number {
            writeln!(f, "\nSans Sayisi: {number}")?;
        }
        if let Some(color) = &self.lucky_color {
            writeln!(f, "Sans Rengi: {color}")?;
        }
        Ok(())
    }
}

/// Mystic feature panel.
#[derive(Debug, Clone, PartialEq, Eq, Template)]
#[template(path = "feature.html")]
pub struct FeatureView {
    pub title: &'static str,
    pub headline: Option<String>,
    /// Life path number.
    pub badge: Option<u32>,
    pub swatch: Option<Swatch>,
    pub meters: Vec<Meter>,
    pub sections: Vec<Section>,
}

impl FeatureView {
    #[must_use]
    pub fn new(result: &FeatureResult) -> Self {
        let mut view = Self {
            title: result.kind.display_name(),
            headline: None,
            badge: None,
            swatch: None,
            meters: Vec::new(),
            sections: Vec::new(),
        };

        match result.shape() {
            FeatureShape::Tarot(reading) => {
                view.sections.extend(
                    reading
                        .cards
                        .iter()
                        .filter_map(|card| Section::text(Some(&card.name), &card.meaning)),
                );
                view.sections.extend(Section::text(None, &reading.summary));
            }
            FeatureShape::Compatibility(reading) => {
                view.headline = non_empty(&reading.title);
                view.sections.extend(Section::text(None, &reading.compatibility));
                view.sections
                    .extend(Section::text(Some("En uyumlu burc"), &reading.best_match));
                if reading.score > 0 {
                    view.meters.push(Meter::new("Uyum puani", reading.score, "#7C3AED"));
                }
            }
            FeatureShape::Aura(reading) => {
                view.swatch = non_empty(&reading.color).map(|label| Swatch {
                    rgb: aura_rgb(&label),
                    label,
                    secondary: non_empty(&reading.secondary_color),
                });
                view.sections.extend(
                    [
                        Section::text(Some("Anlami"), &reading.meaning),
                        Section::text(Some("Enerji"), &reading.energy),
                        Section::text(None, &reading.advice),
                    ]
                    .into_iter()
                    .flatten(),
                );
            }
            FeatureShape::PastLife(reading) => {
                view.headline = match (non_empty(&reading.era), non_empty(&reading.role)) {
                    (Some(era), Some(role)) => Some(format!("{era} - {role}")),
                    (era, role) => era.or(role),
                };
                view.sections.extend(
                    [
                        Section::text(None, &reading.story),
                        Section::text(Some("Karmik Ders"), &reading.karma_lesson),
                        Section::text(Some("Baglanti"), &reading.connection),
                    ]
                    .into_iter()
                    .flatten(),
                );
            }
            FeatureShape::Chakra(reading) => {
                view.meters = reading
                    .chakras
                    .iter()
                    .enumerate()
                    .map(|(i, chakra)| Meter {
                        note: non_empty(&chakra.note),
                        ..Meter::new(
                            chakra.name.clone(),
                            chakra.status,
                            CHAKRA_COLORS.get(i).copied().unwrap_or(CHAKRA_FALLBACK_COLOR),
                        )
                    })
                    .collect();
                view.sections.extend(
                    [
                        Section::text(Some("Genel"), &reading.overall),
                        Section::text(None, &reading.advice),
                    ]
                    .into_iter()
                    .flatten(),
                );
            }
            FeatureShape::LifePath(reading) => {
                view.badge = (reading.number > 0).then_some(reading.number);
                view.headline = non_empty(&reading.title);
                view.sections.extend(
                    [
                        Section::text(None, &reading.meaning),
                        Section::list("Guclu Yonler", &reading.strengths),
                        Section::list("Zorluklar", &reading.challenges),
                        Section::text(None, &reading.advice),
                    ]
                    .into_iter()
                    .flatten(),
                );
            }
            FeatureShape::Raw(data) => {
                view.sections = data
                    .iter()
                    .filter_map(|(key, value)| {
                        let text = match value {
                            Value::String(text) => text.clone(),
                            other => other.to_string(),
                        };
                        Section::text(Some(key), &text)
                    })
                    .collect();
            }
        }
        view
    }
}

impl FeatureView {
    /// Plain-text rendering; the template derive owns `Display`.
    fn write_text(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if let Some(badge) = self.badge {
            writeln!(f, "\n[{badge}]")?;
        }
        if let Some(headline) = &self.headline {
            writeln!(f, "\n{headline}")?;
        }
        if let Some(swatch) = &self.swatch {
            let Rgb(r, g, b) = swatch.rgb;
            writeln!(f, "\nAura: {} ({r},{g},{b})", swatch.label)?;
            if let Some(secondary) = &swatch.secondary {
                writeln!(f, "Ikincil: {secondary}")?;
            }
        }
        if !self.meters.is_empty() {
            writeln!(f)?;
            for meter in &self.meters {
                write_meter(f, meter)?;
                if let Some(note) = &meter.note {
                    writeln!(f, "    {note}")?;
                }
            }
        }
        for section in &self.sections {
            writeln!(f)?;
            match (&section.heading, section.text.is_empty()) {
                (Some(heading), true) => writeln!(f, "{heading}:")?,
                (Some(heading), false) => writeln!(f, "{heading}: {}", section.text)?,
                (None, _) => writeln!(f, "{}", section.text)?,
            }
            for item in &section.items {
                writeln!(f, "  - {item}")?;
            }
        }
        Ok(())
    }
}

/// Shown instead of a reading that could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Template)]
#[template(path = "fallback.html")]
pub struct FallbackView {
    pub emoji: &'static str,
    pub message: String,
    pub hint: &'static str,
    /// Sign id to resolve again when the user retries.
    pub retry_sign: Option<&'static str>,
    pub sign_in: bool,
}

impl FallbackView {
    /// Horoscope not available right now; offers a retry.
    #[must_use]
    pub fn horoscope(sign: ZodiacSign) -> Self {
        Self {
            emoji: sign.emoji(),
            message: format!("Bugunun {} burcu yorumu hazirlaniyor...", sign.display_name()),
            hint: "Lutfen biraz sonra tekrar deneyin.",
            retry_sign: Some(sign.id()),
            sign_in: false,
        }
    }

    #[must_use]
    pub fn feature(kind: FeatureKind) -> Self {
        Self {
            emoji: "\u{2728}",
            message: format!("{} simdi kullanilamiyor.", kind.display_name()),
            hint: "Biraz sonra tekrar deneyin.",
            retry_sign: None,
            sign_in: false,
        }
    }

    /// Also offer signing in, which unlocks generation.
    #[must_use]
    pub const fn with_sign_in(mut self) -> Self {
        self.sign_in = true;
        self
    }
}

impl FallbackView {
    /// Plain-text rendering; the template derive owns `Display`.
    fn write_text(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.emoji, self.message)?;
        writeln!(f, "{}", self.hint)?;
        if self.sign_in {
            writeln!(f, "Yorum uretmek icin giris yapin: astro sign-in")?;
        }
        if let Some(sign) = self.retry_sign {
            writeln!(f, "Tekrar Dene: astro horoscope {sign}")?;
        }
        Ok(())
    }
}

/// What a panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    Horoscope(HoroscopeView),
    Feature(FeatureView),
    Fallback(FallbackView),
}

impl Presentation {
    /// Render as an HTML fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if the template fails to render.
    pub fn to_html(&self) -> askama::Result<String> {
        match self {
            Self::Horoscope(view) => view.render(),
            Self::Feature(view) => view.render(),
            Self::Fallback(view) => view.render(),
        }
    }

    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Plain text for terminals. HTML comes from [`Presentation::to_html`].
impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Horoscope(view) => view.write_text(f),
            Self::Feature(view) => view.write_text(f),
            Self::Fallback(view) => view.write_text(f),
        }
    }
}

fn write_meter(f: &mut fmt::Formatter<'_>, meter: &Meter) -> fmt::Result {
    let filled = usize::try_from(meter.value / 10).unwrap_or(0);
    writeln!(
        f,
        "  {:<12} {:<10} {}",
        meter.label,
        "#".repeat(filled),
        meter.value
    )
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn date() -> DateKey {
        DateKey::parse("2024-06-01").expect("valid")
    }

    fn feature(kind: FeatureKind, value: Value) -> FeatureResult {
        FeatureResult::from_value(kind, value).expect("object")
    }

    #[test]
    fn test_zero_scores_are_omitted() {
        let payload = HoroscopePayload {
            motto: "X".to_string(),
            commentary: "Y".to_string(),
            love: 80,
            money: 0,
            ..HoroscopePayload::default()
        };
        let view = HoroscopeView::new(ZodiacSign::Aries, date(), &payload);

        let labels: Vec<_> = view.scores.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["Ask"]);
        assert_eq!(view.scores.first().map(|m| m.color), Some("#EC4899"));
        assert_eq!(view.lucky_number, None);
    }

    #[test]
    fn test_scores_are_clamped() {
        let payload = HoroscopePayload {
            career: 140,
            ..HoroscopePayload::default()
        };
        let view = HoroscopeView::new(ZodiacSign::Leo, date(), &payload);
        assert_eq!(view.scores.first().map(|m| m.value), Some(100));
    }

    #[test]
    fn test_commentary_paragraphs_and_extras() {
        let payload = HoroscopePayload {
            commentary: "Birinci.\n\n  Ikinci.  \n".to_string(),
            lucky_number: 7,
            lucky_color: "Mavi".to_string(),
            ..HoroscopePayload::default()
        };
        let view = HoroscopeView::new(ZodiacSign::Pisces, date(), &payload);
        assert_eq!(view.paragraphs, vec!["Birinci.", "Ikinci."]);
        assert_eq!(view.lucky_number, Some(7));
        assert_eq!(view.lucky_color.as_deref(), Some("Mavi"));

        let text = Presentation::Horoscope(view).to_string();
        assert!(text.contains("Sans Sayisi: 7"));
        assert!(text.contains("Balik"));
    }

    #[test]
    fn test_horoscope_html_is_escaped() {
        let payload = HoroscopePayload {
            motto: "<script>alert(1)</script>".to_string(),
            love: 60,
            ..HoroscopePayload::default()
        };
        let html = HoroscopeView::new(ZodiacSign::Aries, date(), &payload)
            .render()
            .expect("render");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&#60;script&#62;alert(1)&#60;/script&#62;"));
        assert!(html.contains("width:60%"));
        assert!(!html.contains("Para"));
    }

    #[test]
    fn test_aura_palette() {
        assert_eq!(aura_rgb("Mor"), Rgb(124, 58, 237));
        assert_eq!(aura_rgb("Yeşil"), Rgb(34, 197, 94));
        assert_eq!(aura_rgb("KIRMIZI"), Rgb(239, 68, 68));
        assert_eq!(aura_rgb("Altin"), Rgb(245, 158, 11));
        assert_eq!(aura_rgb("gece siyahi"), AURA_DEFAULT);
        assert_eq!(Rgb(1, 2, 3).css(0.3), "rgba(1,2,3,0.3)");
    }

    #[test]
    fn test_aura_view() {
        let view = FeatureView::new(&feature(
            FeatureKind::Aura,
            json!({"color": "Turuncu", "secondaryColor": "Pembe", "meaning": "Yaraticilik"}),
        ));
        let swatch = view.swatch.expect("swatch");
        assert_eq!(swatch.rgb, Rgb(249, 115, 22));
        assert_eq!(swatch.secondary.as_deref(), Some("Pembe"));
        assert_eq!(view.sections.len(), 1);
    }

    #[test]
    fn test_chakra_meters() {
        let chakras: Vec<_> = (0..8)
            .map(|i| json!({"name": format!("C{i}"), "status": 120, "note": ""}))
            .collect();
        let view = FeatureView::new(&feature(
            FeatureKind::Chakra,
            json!({"chakras": chakras, "overall": "Dengeli"}),
        ));
        assert_eq!(view.meters.len(), 8);
        assert!(view.meters.iter().all(|m| m.value == 100 && m.note.is_none()));
        assert_eq!(view.meters.first().map(|m| m.color), Some("#EF4444"));
        assert_eq!(view.meters.last().map(|m| m.color), Some(CHAKRA_FALLBACK_COLOR));
    }

    #[test]
    fn test_life_path_lists() {
        let view = FeatureView::new(&feature(
            FeatureKind::LifePath,
            json!({
                "number": 7,
                "title": "Arayici",
                "strengths": ["Sezgi", "Derinlik"],
                "challenges": []
            }),
        ));
        assert_eq!(view.badge, Some(7));
        assert_eq!(view.headline.as_deref(), Some("Arayici"));
        assert_eq!(view.sections.len(), 1);
        assert_eq!(
            view.sections.first().map(|s| s.items.clone()),
            Some(vec!["Sezgi".to_string(), "Derinlik".to_string()])
        );
    }

    #[test]
    fn test_unexpected_shape_shows_raw_fields() {
        let view = FeatureView::new(&feature(
            FeatureKind::Tarot,
            json!({"cards": "not a list", "mood": "sakin"}),
        ));
        assert!(view.sections.iter().any(|s| s.text == "sakin"));
        let html = view.render().expect("render");
        assert!(html.contains("Tarot Fali"));
    }

    #[test]
    fn test_fallbacks() {
        let horoscope = FallbackView::horoscope(ZodiacSign::Leo);
        assert_eq!(horoscope.message, "Bugunun Aslan burcu yorumu hazirlaniyor...");
        assert_eq!(horoscope.retry_sign, Some("leo"));
        let html = horoscope.render().expect("render");
        assert!(html.contains("Tekrar Dene"));
        assert!(html.contains("data-retry=\"leo\""));

        let feature = FallbackView::feature(FeatureKind::Aura).with_sign_in();
        assert_eq!(feature.message, "Aura Okuma simdi kullanilamiyor.");
        assert!(feature.retry_sign.is_none());
        let presentation = Presentation::Fallback(feature);
        assert!(presentation.is_fallback());
        let text = presentation.to_string();
        assert!(text.contains("giris yapin"));
        assert!(!text.contains("<"));
    }
}
