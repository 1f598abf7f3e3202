//! Error types for text generation.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur when generating text.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No API key is configured or stored.
    #[error("no generation API key available")]
    MissingApiKey,

    /// Reading the stored API key failed.
    #[error("failed to load API key: {0}")]
    KeyLookup(#[from] StoreError),

    /// Rate limited by the API.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error status.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The response carried no text.
    #[error("empty response")]
    EmptyResponse,

    /// Failed to parse response.
    #[error("parse error: {0}")]
    Parse(String),

    /// The call did not finish in time.
    #[error("generation timed out after {0} seconds")]
    Timeout(u64),
}
