//! Calendar date keys.
//!
//! A [`DateKey`] is the local calendar date at resolution time and is the unit
//! of cache validity: a new day implicitly invalidates every cached entry,
//! because the date is part of every cache key.

use core::fmt;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

const FORMAT: &str = "%Y-%m-%d";

const TURKISH_MONTHS: [&str; 12] = [
    "Ocak", "Subat", "Mart", "Nisan", "Mayis", "Haziran", "Temmuz", "Agustos", "Eylul", "Ekim",
    "Kasim", "Aralik",
];

/// Error returned when a string is not a `YYYY-MM-DD` date.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid date key: {0}")]
pub struct DateKeyError(pub String);

/// A local calendar date, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    #[must_use]
    pub const fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Today's date in the local timezone.
    #[must_use]
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Parse a `YYYY-MM-DD` string.
    ///
    /// # Errors
    ///
    /// Returns [`DateKeyError`] if the string is not a valid calendar date.
    pub fn parse(s: &str) -> Result<Self, DateKeyError> {
        NaiveDate::parse_from_str(s, FORMAT)
            .map(Self)
            .map_err(|_| DateKeyError(s.to_string()))
    }

    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.0
    }

    /// Long-form date for prompts, e.g. `1 Haziran 2024`.
    #[must_use]
    pub fn long_turkish(&self) -> String {
        let month = TURKISH_MONTHS
            .get(self.0.month0() as usize)
            .copied()
            .unwrap_or_default();
        format!("{} {} {}", self.0.day(), month, self.0.year())
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(FORMAT))
    }
}

impl std::str::FromStr for DateKey {
    type Err = DateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DateKey {
    type Error = DateKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}
