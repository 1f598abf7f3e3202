//! Daily horoscope payload.
//!
//! Payloads arrive from several sources whose schemas drifted over time (the
//! shared collection in particular used several names for the same field), so
//! construction from JSON goes through [`HoroscopePayload::from_value`], which
//! accepts every known alias and tolerates numbers encoded as strings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::feature::json_type;

/// Errors produced when a JSON value cannot be read as a payload.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The value is not a JSON object.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),
    /// The object carries none of the payload fields.
    #[error("payload has no motto, commentary or scores")]
    Empty,
}

const MOTTO: &[&str] = &["motto"];
const COMMENTARY: &[&str] = &["commentary", "generalComment", "general"];
const LOVE: &[&str] = &["love", "loveScore"];
const MONEY: &[&str] = &["money", "moneyScore"];
const HEALTH: &[&str] = &["health", "healthScore"];
const CAREER: &[&str] = &["career", "careerScore"];
const LUCKY_COLOR: &[&str] = &["luckyColor", "lucky_color"];
const LUCKY_NUMBER: &[&str] = &["luckyNumber", "lucky_number"];

/// One of the four daily score bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreKind {
    Love,
    Money,
    Health,
    Career,
}

impl ScoreKind {
    pub const ALL: [Self; 4] = [Self::Love, Self::Money, Self::Health, Self::Career];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Love => "Ask",
            Self::Money => "Para",
            Self::Health => "Saglik",
            Self::Career => "Kariyer",
        }
    }
}

/// A resolved daily horoscope.
///
/// Score fields use `0` for "absent": a zero score is never shown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HoroscopePayload {
    pub motto: String,
    pub commentary: String,
    pub love: u32,
    pub money: u32,
    pub health: u32,
    pub career: u32,
    pub lucky_color: String,
    pub lucky_number: u32,
}

impl HoroscopePayload {
    /// Build a payload from any known schema variant.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::NotAnObject`] for non-objects and
    /// [`PayloadError::Empty`] when no payload field carries a value.
    pub fn from_value(value: &Value) -> Result<Self, PayloadError> {
        let Value::Object(map) = value else {
            return Err(PayloadError::NotAnObject(json_type(value)));
        };

        let payload = Self {
            motto: text_field(map, MOTTO),
            commentary: text_field(map, COMMENTARY),
            love: number_field(map, LOVE),
            money: number_field(map, MONEY),
            health: number_field(map, HEALTH),
            career: number_field(map, CAREER),
            lucky_color: text_field(map, LUCKY_COLOR),
            lucky_number: number_field(map, LUCKY_NUMBER),
        };

        if payload.motto.is_empty()
            && payload.commentary.is_empty()
            && payload.scores().next().is_none()
        {
            return Err(PayloadError::Empty);
        }
        Ok(payload)
    }

    /// Parse a JSON string (as stored in caches) into a payload.
    ///
    /// # Errors
    ///
    /// Returns `None` when the text is not JSON or not a payload.
    #[must_use]
    pub fn from_json_str(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        Self::from_value(&value).ok()
    }

    /// Raw score for a bar, `0` when absent.
    #[must_use]
    pub const fn score(&self, kind: ScoreKind) -> u32 {
        match kind {
            ScoreKind::Love => self.love,
            ScoreKind::Money => self.money,
            ScoreKind::Health => self.health,
            ScoreKind::Career => self.career,
        }
    }

    /// Scores that should be displayed, in bar order.
    pub fn scores(&self) -> impl Iterator<Item = (ScoreKind, u32)> + '_ {
        ScoreKind::ALL
            .into_iter()
            .map(|kind| (kind, self.score(kind)))
            .filter(|(_, value)| *value > 0)
    }
}

/// First non-empty string among the aliases. Numbers are stringified.
fn text_field(map: &Map<String, Value>, aliases: &[&str]) -> String {
    aliases
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

/// First alias that reads as a non-negative number; `0` otherwise.
///
/// Text that does not parse as a number (e.g. a legacy per-area comment
/// stored under the score's name) counts as absent.
fn number_field(map: &Map<String, Value>, aliases: &[&str]) -> u32 {
    aliases
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        })
        .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_value_canonical() {
        let payload = HoroscopePayload::from_value(&json!({
            "motto": "X",
            "commentary": "Y",
            "love": 80,
            "money": 0,
            "health": 55,
            "career": 70,
            "luckyColor": "Mor",
            "luckyNumber": 7
        }))
        .expect("payload");

        assert_eq!(payload.motto, "X");
        assert_eq!(payload.love, 80);
        assert_eq!(payload.lucky_number, 7);
        let shown: Vec<_> = payload.scores().map(|(kind, _)| kind).collect();
        assert_eq!(
            shown,
            vec![ScoreKind::Love, ScoreKind::Health, ScoreKind::Career]
        );
    }

    #[test]
    fn test_from_value_legacy_aliases() {
        let payload = HoroscopePayload::from_value(&json!({
            "motto": "Eski",
            "generalComment": "Genel yorum",
            "love": "Ask hayatin hareketli",
            "loveScore": "65",
            "money": 40.4,
            "lucky_number": "3"
        }))
        .expect("payload");

        assert_eq!(payload.commentary, "Genel yorum");
        assert_eq!(payload.love, 65);
        assert_eq!(payload.money, 40);
        assert_eq!(payload.health, 0);
        assert_eq!(payload.lucky_number, 3);
    }

    #[test]
    fn test_general_alias_used_when_commentary_blank() {
        let payload = HoroscopePayload::from_value(&json!({
            "commentary": "  ",
            "general": "Bugun sakin"
        }))
        .expect("payload");
        assert_eq!(payload.commentary, "Bugun sakin");
    }

    #[test]
    fn test_from_value_rejects_non_payloads() {
        assert_eq!(
            HoroscopePayload::from_value(&json!("text")),
            Err(PayloadError::NotAnObject("string"))
        );
        assert_eq!(
            HoroscopePayload::from_value(&json!({"unrelated": true})),
            Err(PayloadError::Empty)
        );
    }

    #[test]
    fn test_negative_scores_are_absent() {
        let payload =
            HoroscopePayload::from_value(&json!({"motto": "m", "career": -5})).expect("payload");
        assert_eq!(payload.career, 0);
    }

    #[test]
    fn test_serialization_is_camel_case() {
        let payload = HoroscopePayload {
            motto: "m".into(),
            lucky_color: "Mavi".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["luckyColor"], "Mavi");
        assert_eq!(
            HoroscopePayload::from_json_str(&value.to_string()),
            Some(payload)
        );
    }
}
