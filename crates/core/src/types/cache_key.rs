//! Composite cache keys.
//!
//! Every cached payload is addressed by `(scope, subject, date)`. Keys are
//! rendered to strings only at the storage boundary, so the different string
//! layouts used by the device cache and the per-user remote cache cannot be
//! confused with one another.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::date::DateKey;
use super::feature::FeatureKind;
use super::sign::ZodiacSign;

const HOROSCOPE_PREFIX: &str = "horoscope_";
const FEATURE_PREFIX: &str = "feature_";

/// Address of a cached payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum CacheKey {
    /// Daily horoscope for one sign.
    Horoscope { sign: ZodiacSign, date: DateKey },
    /// Daily feature reading, shared across signs.
    Feature { feature: FeatureKind, date: DateKey },
}

impl CacheKey {
    #[must_use]
    pub const fn horoscope(sign: ZodiacSign, date: DateKey) -> Self {
        Self::Horoscope { sign, date }
    }

    #[must_use]
    pub const fn feature(feature: FeatureKind, date: DateKey) -> Self {
        Self::Feature { feature, date }
    }

    #[must_use]
    pub const fn date(&self) -> DateKey {
        match self {
            Self::Horoscope { date, .. } | Self::Feature { date, .. } => *date,
        }
    }

    /// Key in the device-local store: `horoscope_{sign}_{date}` or
    /// `feature_{feature}_{date}`.
    #[must_use]
    pub fn local_key(&self) -> String {
        match self {
            Self::Horoscope { sign, date } => format!("{HOROSCOPE_PREFIX}{}_{date}", sign.id()),
            Self::Feature { feature, date } => format!("{FEATURE_PREFIX}{}_{date}", feature.id()),
        }
    }

    /// Document ids in the per-user `dailyCache` collection, preferred first.
    ///
    /// Horoscopes are written as `daily_{sign}_{date}`; the bare
    /// `{sign}_{date}` layout is still read. Features have no per-user tier.
    #[must_use]
    pub fn user_cache_ids(&self) -> Vec<String> {
        match self {
            Self::Horoscope { sign, date } => vec![
                format!("daily_{}_{date}", sign.id()),
                format!("{}_{date}", sign.id()),
            ],
            Self::Feature { .. } => Vec::new(),
        }
    }

    /// Parse a device-local key back into a cache key.
    ///
    /// Returns `None` for keys that are not cache entries.
    #[must_use]
    pub fn from_local_key(key: &str) -> Option<Self> {
        // Dates contain no underscore, so the last one separates subject and date.
        let (head, date) = key.rsplit_once('_')?;
        let date = DateKey::parse(date).ok()?;

        if let Some(sign) = head.strip_prefix(HOROSCOPE_PREFIX) {
            return ZodiacSign::parse(sign)
                .ok()
                .map(|sign| Self::horoscope(sign, date));
        }
        if let Some(feature) = head.strip_prefix(FEATURE_PREFIX) {
            return FeatureKind::parse(feature)
                .ok()
                .map(|feature| Self::feature(feature, date));
        }
        None
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.local_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> DateKey {
        DateKey::parse("2024-06-01").expect("valid")
    }

    #[test]
    fn test_local_keys() {
        assert_eq!(
            CacheKey::horoscope(ZodiacSign::Aries, date()).local_key(),
            "horoscope_aries_2024-06-01"
        );
        assert_eq!(
            CacheKey::feature(FeatureKind::PastLife, date()).local_key(),
            "feature_past-life_2024-06-01"
        );
    }

    #[test]
    fn test_user_cache_ids() {
        let ids = CacheKey::horoscope(ZodiacSign::Leo, date()).user_cache_ids();
        assert_eq!(ids, vec!["daily_leo_2024-06-01", "leo_2024-06-01"]);
        assert!(
            CacheKey::feature(FeatureKind::Tarot, date())
                .user_cache_ids()
                .is_empty()
        );
    }

    #[test]
    fn test_from_local_key_round_trip() {
        for key in [
            CacheKey::horoscope(ZodiacSign::Sagittarius, date()),
            CacheKey::feature(FeatureKind::LifePath, date()),
        ] {
            assert_eq!(CacheKey::from_local_key(&key.local_key()), Some(key));
        }
    }

    #[test]
    fn test_from_local_key_ignores_other_keys() {
        assert_eq!(CacheKey::from_local_key("astro_dozi_data"), None);
        assert_eq!(CacheKey::from_local_key("astro_dozi_guest"), None);
        assert_eq!(CacheKey::from_local_key("horoscope_aries_today"), None);
        assert_eq!(CacheKey::from_local_key("horoscope_pluto_2024-06-01"), None);
    }

    #[test]
    fn test_keys_distinguish_scope() {
        let a = CacheKey::horoscope(ZodiacSign::Aries, date());
        let b = CacheKey::feature(FeatureKind::Aura, date());
        assert_ne!(a.local_key(), b.local_key());
    }
}
