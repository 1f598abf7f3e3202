//! Zodiac sign catalog.
//!
//! The catalog is static: twelve signs, one per zodiac position. The [`id`]
//! of a sign is the stable key used in cache keys, user documents and local
//! storage; the [`display_name`] is the Turkish label shown to users and used
//! as the lookup key of the shared daily horoscope collection.
//!
//! [`id`]: ZodiacSign::id
//! [`display_name`]: ZodiacSign::display_name

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a token does not name a sign in the catalog.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown zodiac sign: {0}")]
pub struct UnknownSign(pub String);

/// A zodiac sign.
///
/// Serializes as its lowercase id (`"aries"`, `"taurus"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    /// Every sign, in zodiac order.
    pub const ALL: [Self; 12] = [
        Self::Aries,
        Self::Taurus,
        Self::Gemini,
        Self::Cancer,
        Self::Leo,
        Self::Virgo,
        Self::Libra,
        Self::Scorpio,
        Self::Sagittarius,
        Self::Capricorn,
        Self::Aquarius,
        Self::Pisces,
    ];

    /// Stable internal key.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Aries => "aries",
            Self::Taurus => "taurus",
            Self::Gemini => "gemini",
            Self::Cancer => "cancer",
            Self::Leo => "leo",
            Self::Virgo => "virgo",
            Self::Libra => "libra",
            Self::Scorpio => "scorpio",
            Self::Sagittarius => "sagittarius",
            Self::Capricorn => "capricorn",
            Self::Aquarius => "aquarius",
            Self::Pisces => "pisces",
        }
    }

    /// User-facing label.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Aries => "Koc",
            Self::Taurus => "Boga",
            Self::Gemini => "Ikizler",
            Self::Cancer => "Yengec",
            Self::Leo => "Aslan",
            Self::Virgo => "Basak",
            Self::Libra => "Terazi",
            Self::Scorpio => "Akrep",
            Self::Sagittarius => "Yay",
            Self::Capricorn => "Oglak",
            Self::Aquarius => "Kova",
            Self::Pisces => "Balik",
        }
    }

    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Aries => "\u{2648}",
            Self::Taurus => "\u{2649}",
            Self::Gemini => "\u{264A}",
            Self::Cancer => "\u{264B}",
            Self::Leo => "\u{264C}",
            Self::Virgo => "\u{264D}",
            Self::Libra => "\u{264E}",
            Self::Scorpio => "\u{264F}",
            Self::Sagittarius => "\u{2650}",
            Self::Capricorn => "\u{2651}",
            Self::Aquarius => "\u{2652}",
            Self::Pisces => "\u{2653}",
        }
    }

    /// Tropical date range as `(start, end)` in `MM-DD` form.
    #[must_use]
    pub const fn date_range(self) -> (&'static str, &'static str) {
        match self {
            Self::Aries => ("03-21", "04-19"),
            Self::Taurus => ("04-20", "05-20"),
            Self::Gemini => ("05-21", "06-20"),
            Self::Cancer => ("06-21", "07-22"),
            Self::Leo => ("07-23", "08-22"),
            Self::Virgo => ("08-23", "09-22"),
            Self::Libra => ("09-23", "10-22"),
            Self::Scorpio => ("10-23", "11-21"),
            Self::Sagittarius => ("11-22", "12-21"),
            Self::Capricorn => ("12-22", "01-19"),
            Self::Aquarius => ("01-20", "02-18"),
            Self::Pisces => ("02-19", "03-20"),
        }
    }

    /// Look up a sign by its id, ignoring ASCII case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownSign`] if the token is not a catalog id.
    pub fn parse(token: &str) -> Result<Self, UnknownSign> {
        let needle = token.trim();
        Self::ALL
            .into_iter()
            .find(|sign| sign.id().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownSign(token.to_string()))
    }

    /// Look up a sign by its display label (exact match).
    #[must_use]
    pub fn from_display_name(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sign| sign.display_name() == label)
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for ZodiacSign {
    type Err = UnknownSign;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
