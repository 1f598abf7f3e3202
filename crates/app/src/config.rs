//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! ## Storage
//! - `ASTRO_DATA_DIR` - Directory for the local key-value file (default: .astro-dozi)
//! - `FIREBASE_PROJECT_ID` - Use Firestore for documents; in-process store when unset
//! - `FIREBASE_API_KEY` - Web API key sent with Firestore requests
//!
//! ## Generation
//! - `GEMINI_API_KEY` - Overrides the key stored in `app_config/web`
//! - `GEMINI_MODEL` - Model name (default: gemini-2.0-flash)
//! - `GEMINI_TEMPERATURE` - Sampling temperature (default: 0.9)
//! - `GEMINI_MAX_OUTPUT_TOKENS` - Output token cap (default: 1024)
//! - `ASTRO_GENERATION_TIMEOUT_SECS` - Per-call timeout (default: 30)
//!
//! ## Identity
//! - `ASTRO_USER_ID` - User the identity provider signs in as
//! - `ASTRO_USER_EMAIL` - Email reported for that user
//! - `ASTRO_USER_NAME` - Display name reported for that user
//! - `ASTRO_ID_TOKEN` - ID token used to authorize Firestore requests

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_DATA_DIR: &str = ".astro-dozi";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the local key-value file
    pub data_dir: PathBuf,
    /// Firestore settings; `None` selects the in-process document store
    pub firebase: Option<FirebaseConfig>,
    /// Text generation settings
    pub gemini: GeminiConfig,
    /// Identity the provider signs in as
    pub identity: IdentityConfig,
}

/// Firestore project settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Google Cloud project id
    pub project_id: String,
    /// Web API key appended to REST calls
    pub api_key: Option<SecretString>,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Gemini text generation settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct GeminiConfig {
    /// Explicit API key; fetched from the document store when `None`
    pub api_key: Option<SecretString>,
    /// Model name, e.g. gemini-2.0-flash
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token cap
    pub max_output_tokens: u32,
    /// Upper bound on a single generation call
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: 0.9,
            max_output_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Identity reported by the static identity provider.
///
/// Implements `Debug` manually to redact the ID token.
#[derive(Clone, Default)]
pub struct IdentityConfig {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub id_token: Option<SecretString>,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let data_dir = PathBuf::from(get_env_or_default("ASTRO_DATA_DIR", DEFAULT_DATA_DIR));
        let firebase = get_optional_env("FIREBASE_PROJECT_ID").map(|project_id| FirebaseConfig {
            project_id,
            api_key: get_optional_secret("FIREBASE_API_KEY"),
        });

        Ok(Self {
            data_dir,
            firebase,
            gemini: GeminiConfig::from_env()?,
            identity: IdentityConfig::from_env(),
        })
    }
}

impl GeminiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = get_parsed_env("ASTRO_GENERATION_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ASTRO_GENERATION_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_key: get_optional_secret("GEMINI_API_KEY"),
            model: get_env_or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            temperature: get_parsed_env("GEMINI_TEMPERATURE", 0.9)?,
            max_output_tokens: get_parsed_env("GEMINI_MAX_OUTPUT_TOKENS", 1024)?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl IdentityConfig {
    fn from_env() -> Self {
        Self {
            user_id: get_optional_env("ASTRO_USER_ID"),
            email: get_optional_env("ASTRO_USER_EMAIL"),
            display_name: get_optional_env("ASTRO_USER_NAME"),
            id_token: get_optional_secret("ASTRO_ID_TOKEN"),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an optional environment variable as a secret.
fn get_optional_secret(key: &str) -> Option<SecretString> {
    get_optional_env(key).map(SecretString::from)
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_reports_variable() {
        let err = parse_value::<u32>("GEMINI_MAX_OUTPUT_TOKENS", "lots").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "GEMINI_MAX_OUTPUT_TOKENS"));

        assert_eq!(parse_value::<f32>("GEMINI_TEMPERATURE", " 0.5 ").ok(), Some(0.5));
    }

    #[test]
    fn test_gemini_defaults() {
        let config = GeminiConfig::default();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert!((config.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.max_output_tokens, 1024);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let gemini = GeminiConfig {
            api_key: Some(SecretString::from("super_secret_gemini_key".to_string())),
            ..GeminiConfig::default()
        };
        let firebase = FirebaseConfig {
            project_id: "astro-dozi".to_string(),
            api_key: Some(SecretString::from("super_secret_web_key".to_string())),
        };
        let identity = IdentityConfig {
            user_id: Some("u1".to_string()),
            id_token: Some(SecretString::from("super_secret_token".to_string())),
            ..IdentityConfig::default()
        };

        let output = format!("{gemini:?} {firebase:?} {identity:?}");

        assert!(output.contains("gemini-2.0-flash"));
        assert!(output.contains("astro-dozi"));
        assert!(output.contains("u1"));
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("super_secret"));
    }
}
