//! Core types for Astro Dozi.
//!
//! This module provides type-safe wrappers for the domain concepts shared by
//! the resolver, the session manager and the coin ledger.

pub mod cache_key;
pub mod date;
pub mod feature;
pub mod horoscope;
pub mod session;
pub mod sign;

pub use cache_key::CacheKey;
pub use date::{DateKey, DateKeyError};
pub use feature::{
    AuraReading, Chakra, ChakraReading, CompatibilityReading, FeatureKind, FeatureResult,
    FeatureShape, LifePathReading, PastLifeReading, TarotCard, TarotReading, UnknownFeature,
};
pub use horoscope::{HoroscopePayload, PayloadError, ScoreKind};
pub use session::{
    DEFAULT_COIN_BALANCE, Identity, InsufficientCoins, Session, UserId, UserIdentity,
};
pub use sign::{UnknownSign, ZodiacSign};
