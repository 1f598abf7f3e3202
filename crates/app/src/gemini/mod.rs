//! Generative text integration.
//!
//! [`TextGenerator`] is the seam the resolvers call; [`GeminiClient`] is the
//! production implementation. Generated text is expected to contain a JSON
//! object somewhere inside it, see [`extract_json_object`].

mod client;
mod error;
mod extract;
mod types;

use async_trait::async_trait;

pub use client::GeminiClient;
pub use error::GenerationError;
pub use extract::extract_json_object;

/// Free-form text generation from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
