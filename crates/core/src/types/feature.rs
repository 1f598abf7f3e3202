//! Paid "mystic" features and their result shapes.
//!
//! A feature result is stored and cached as the raw JSON object the generator
//! returned; the typed readings below are views used by presentation and are
//! deliberately lenient (every field defaults when missing).

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::horoscope::PayloadError;

/// Error returned when a token does not name a feature.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown feature: {0}")]
pub struct UnknownFeature(pub String);

/// A paid feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureKind {
    Tarot,
    Compatibility,
    Aura,
    PastLife,
    Chakra,
    LifePath,
}

impl FeatureKind {
    pub const ALL: [Self; 6] = [
        Self::Tarot,
        Self::Compatibility,
        Self::Aura,
        Self::PastLife,
        Self::Chakra,
        Self::LifePath,
    ];

    /// Stable key used in cache keys.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Tarot => "tarot",
            Self::Compatibility => "compatibility",
            Self::Aura => "aura",
            Self::PastLife => "past-life",
            Self::Chakra => "chakra",
            Self::LifePath => "life-path",
        }
    }

    /// Short tokens used by earlier releases of the app.
    const fn legacy_id(self) -> Option<&'static str> {
        match self {
            Self::Compatibility => Some("uyum"),
            Self::PastLife => Some("gecmis"),
            Self::Chakra => Some("cakra"),
            Self::LifePath => Some("yasam"),
            Self::Tarot | Self::Aura => None,
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Tarot => "Tarot Fali",
            Self::Compatibility => "Burc Uyumu",
            Self::Aura => "Aura Okuma",
            Self::PastLife => "Gecmis Yasam",
            Self::Chakra => "Cakra Analizi",
            Self::LifePath => "Yasam Yolu",
        }
    }

    /// Coin price when the user is not premium.
    #[must_use]
    pub const fn default_cost(self) -> u32 {
        match self {
            Self::Tarot => 10,
            Self::Compatibility | Self::LifePath => 15,
            Self::Aura | Self::Chakra => 20,
            Self::PastLife => 25,
        }
    }

    /// Parse a feature id, accepting legacy tokens and ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownFeature`] for any other token.
    pub fn parse(token: &str) -> Result<Self, UnknownFeature> {
        let needle = token.trim();
        Self::ALL
            .into_iter()
            .find(|kind| {
                kind.id().eq_ignore_ascii_case(needle)
                    || kind
                        .legacy_id()
                        .is_some_and(|legacy| legacy.eq_ignore_ascii_case(needle))
            })
            .ok_or_else(|| UnknownFeature(token.to_string()))
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for FeatureKind {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A generated feature reading: the raw JSON object, tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureResult {
    pub kind: FeatureKind,
    pub data: Map<String, Value>,
}

impl FeatureResult {
    /// Wrap a parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::NotAnObject`] unless the value is a JSON object.
    pub fn from_value(kind: FeatureKind, value: Value) -> Result<Self, PayloadError> {
        match value {
            Value::Object(data) => Ok(Self { kind, data }),
            other => Err(PayloadError::NotAnObject(json_type(&other))),
        }
    }

    /// Interpret the raw object as the reading for this kind.
    ///
    /// Falls back to [`FeatureShape::Raw`] when the object cannot be read as
    /// the expected shape at all (e.g. a field has an incompatible type).
    #[must_use]
    pub fn shape(&self) -> FeatureShape {
        let value = Value::Object(self.data.clone());
        let typed = match self.kind {
            FeatureKind::Tarot => serde_json::from_value(value).map(FeatureShape::Tarot),
            FeatureKind::Compatibility => {
                serde_json::from_value(value).map(FeatureShape::Compatibility)
            }
            FeatureKind::Aura => serde_json::from_value(value).map(FeatureShape::Aura),
            FeatureKind::PastLife => serde_json::from_value(value).map(FeatureShape::PastLife),
            FeatureKind::Chakra => serde_json::from_value(value).map(FeatureShape::Chakra),
            FeatureKind::LifePath => serde_json::from_value(value).map(FeatureShape::LifePath),
        };
        typed.unwrap_or_else(|_| FeatureShape::Raw(self.data.clone()))
    }
}

pub(crate) const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Typed view over a [`FeatureResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureShape {
    Tarot(TarotReading),
    Compatibility(CompatibilityReading),
    Aura(AuraReading),
    PastLife(PastLifeReading),
    Chakra(ChakraReading),
    LifePath(LifePathReading),
    Raw(Map<String, Value>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TarotCard {
    pub name: String,
    pub meaning: String,
}

/// Three-card spread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TarotReading {
    pub cards: Vec<TarotCard>,
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompatibilityReading {
    pub title: String,
    pub compatibility: String,
    pub best_match: String,
    pub score: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuraReading {
    pub color: String,
    pub secondary_color: String,
    pub meaning: String,
    pub energy: String,
    pub advice: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PastLifeReading {
    pub era: String,
    pub role: String,
    pub story: String,
    pub karma_lesson: String,
    pub connection: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chakra {
    pub name: String,
    /// Balance percentage, 0-100.
    pub status: u32,
    pub note: String,
}

/// Seven-chakra analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChakraReading {
    pub chakras: Vec<Chakra>,
    pub overall: String,
    pub advice: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifePathReading {
    pub number: u32,
    pub title: String,
    pub meaning: String,
    pub strengths: Vec<String>,
    pub challenges: Vec<String>,
    pub advice: String,
}
