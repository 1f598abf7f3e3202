//! Unified error handling.
//!
//! Provides a unified `AppError` type for the facade and front ends. Resolution
//! itself never fails: tiers report misses and the caller gets a fallback view.

use astro_dozi_core::{UnknownFeature, UnknownSign};
use thiserror::Error;

use crate::config::ConfigError;
use crate::gemini::GenerationError;
use crate::identity::IdentityError;
use crate::ledger::LedgerError;
use crate::local::LocalStoreError;
use crate::session::SessionError;
use crate::store::StoreError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Document store operation failed.
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    /// Local storage operation failed.
    #[error("Local storage error: {0}")]
    Local(#[from] LocalStoreError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Template rendering failed.
    #[error("Render error: {0}")]
    Render(#[from] askama::Error),

    #[error(transparent)]
    UnknownSign(#[from] UnknownSign),

    #[error(transparent)]
    UnknownFeature(#[from] UnknownFeature),

    /// No sign chosen yet.
    #[error("No zodiac sign selected")]
    NoSignSelected,
}

/// Result alias for facade operations.
pub type Result<T, E = AppError> = std::result::Result<T, E>;
