//! Integration tests for Astro Dozi.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p astro-dozi-integration-tests
//! ```
//!
//! Everything runs in process: documents and local storage are in memory,
//! the identity provider signs in as `u1` on request, and generation is a
//! [`ScriptedGenerator`] that counts its calls.
//!
//! # Test Categories
//!
//! - `horoscope_resolution` - the cache cascade, fallback and retry, coalescing
//! - `features` - the coin gate and feature readings
//! - `session_flow` - sign-in, guest mode, sign-out and restarts

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use astro_dozi_app::gemini::{GenerationError, TextGenerator};
use astro_dozi_app::identity::{AuthenticatedUser, StaticIdentityProvider};
use astro_dozi_app::local::{LocalStore, MemoryLocalStore};
use astro_dozi_app::store::{DocumentPath, MemoryDocumentStore};
use astro_dozi_app::{AstroApp, Collaborators};
use astro_dozi_core::{DateKey, UserIdentity};
use async_trait::async_trait;
use serde_json::Value;

/// The date every harness app runs on.
pub const TODAY: &str = "2024-06-01";

/// Id of the account the identity provider signs in as.
pub const USER_ID: &str = "u1";

/// Generation deadline used unless a test sets its own.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(5);

#[must_use]
pub fn today() -> DateKey {
    DateKey::parse(TODAY).unwrap_or_else(|e| panic!("{TODAY} is a date: {e}"))
}

/// A generation reply in the horoscope shape.
#[must_use]
pub fn horoscope_reply(motto: &str) -> String {
    serde_json::json!({
        "motto": motto,
        "commentary": "Yildizlar bugun senden yana.\nCesur ol.",
        "love": 80,
        "money": 55,
        "health": 70,
        "career": 65,
        "luckyColor": "Mor",
        "luckyNumber": 7
    })
    .to_string()
}

/// Text generator with a scripted reply.
pub struct ScriptedGenerator {
    reply: Mutex<Result<String, u16>>,
    delays: Mutex<Vec<(String, Duration)>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    /// Answer every prompt with `text`.
    #[must_use]
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Mutex::new(Ok(text.into())),
            delays: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every prompt with an HTTP `status`.
    #[must_use]
    pub fn failing(status: u16) -> Self {
        let generator = Self::replying(String::new());
        generator.fail_with(status);
        generator
    }

    pub fn reply_with(&self, text: impl Into<String>) {
        *self.reply.lock().unwrap_or_else(PoisonError::into_inner) = Ok(text.into());
    }

    pub fn fail_with(&self, status: u16) {
        *self.reply.lock().unwrap_or_else(PoisonError::into_inner) = Err(status);
    }

    /// Hold replies to prompts containing `needle` for `delay`.
    pub fn delay_prompts_containing(&self, needle: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((needle.to_string(), delay));
    }

    /// Number of generation calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        let delay = self
            .delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        reply.map_err(|status| GenerationError::Api {
            status,
            body: "scripted failure".to_string(),
        })
    }
}

/// An app wired to in-memory collaborators.
pub struct Harness {
    pub documents: Arc<MemoryDocumentStore>,
    pub local: Arc<dyn LocalStore>,
    pub identity: Arc<StaticIdentityProvider>,
    pub generator: Arc<ScriptedGenerator>,
    pub app: AstroApp,
}

impl Harness {
    /// Signed out, generating [`horoscope_reply`]`("Test")`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_generator(ScriptedGenerator::replying(horoscope_reply("Test")))
    }

    #[must_use]
    pub fn with_generator(generator: ScriptedGenerator) -> Self {
        HarnessBuilder::default().generator(generator).build()
    }

    #[must_use]
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Started and signed in as [`USER_ID`].
    pub async fn signed_in() -> Self {
        Self::new().sign_in().await
    }

    /// Start the app and sign in as [`USER_ID`].
    pub async fn sign_in(self) -> Self {
        self.app.start().await;
        self.app
            .sign_in()
            .await
            .unwrap_or_else(|e| panic!("sign-in failed: {e}"));
        self
    }

    /// Seed `users/u1`.
    pub fn seed_user(&self, fields: Value) {
        self.documents.insert(&DocumentPath::user(USER_ID), fields);
    }

    /// A second app over the same stores, like a new process.
    #[must_use]
    pub fn restart(&self) -> AstroApp {
        AstroApp::new(Collaborators {
            documents: self.documents.clone(),
            local: Arc::clone(&self.local),
            identity: self.identity.clone(),
            generator: self.generator.clone(),
            generation_timeout: GENERATION_TIMEOUT,
            today: Some(today()),
        })
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Customise a [`Harness`] before building it.
#[derive(Default)]
pub struct HarnessBuilder {
    generator: Option<ScriptedGenerator>,
    local: Option<Arc<dyn LocalStore>>,
    timeout: Option<Duration>,
}

impl HarnessBuilder {
    #[must_use]
    pub fn generator(mut self, generator: ScriptedGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn local(mut self, local: Arc<dyn LocalStore>) -> Self {
        self.local = Some(local);
        self
    }

    #[must_use]
    pub const fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn build(self) -> Harness {
        let documents = Arc::new(MemoryDocumentStore::new());
        let local = self
            .local
            .unwrap_or_else(|| Arc::new(MemoryLocalStore::new()));
        let identity = Arc::new(StaticIdentityProvider::new(Some(AuthenticatedUser::new(
            UserIdentity::new(USER_ID),
        ))));
        let generator = Arc::new(
            self.generator
                .unwrap_or_else(|| ScriptedGenerator::replying(horoscope_reply("Test"))),
        );

        let app = AstroApp::new(Collaborators {
            documents: documents.clone(),
            local: Arc::clone(&local),
            identity: identity.clone(),
            generator: generator.clone(),
            generation_timeout: self.timeout.unwrap_or(GENERATION_TIMEOUT),
            today: Some(today()),
        });

        Harness {
            documents,
            local,
            identity,
            generator,
            app,
        }
    }
}
