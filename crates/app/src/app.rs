//! Application facade shared by the front ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use astro_dozi_core::{CacheKey, DateKey, FeatureKind, Session, UserIdentity, ZodiacSign};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::gemini::{GeminiClient, TextGenerator};
use crate::identity::{IdentityProvider, StaticIdentityProvider};
use crate::ledger::{CoinLedger, Gate};
use crate::local::{self, FileLocalStore, LocalStore};
use crate::notice::{Notice, Notifier};
use crate::resolver::feature::{self, FeatureResolver};
use crate::resolver::horoscope::{self, HoroscopeResolver};
use crate::resolver::{Request, Resolution};
use crate::session::SessionManager;
use crate::store::{DocumentStore, FirestoreClient, MemoryDocumentStore};
use crate::view::{FallbackView, FeatureView, HoroscopeView, Presentation};

/// Everything the app talks to.
pub struct Collaborators {
    pub documents: Arc<dyn DocumentStore>,
    pub local: Arc<dyn LocalStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub generator: Arc<dyn TextGenerator>,
    pub generation_timeout: Duration,
    /// Fixed date instead of the local calendar day.
    pub today: Option<DateKey>,
}

/// A resolution result and whether it reached the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub presentation: Presentation,
    /// Tier that produced the payload; `None` for fallbacks.
    pub source: Option<&'static str>,
    /// `false` when a newer request took the panel first.
    pub shown: bool,
}

/// Result of asking for a feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureFlow {
    /// Waiting on the user: sign in, top up, or confirm the spend.
    Gated(Gate),
    /// Premium users get the reading straight away.
    Shown(Rendered),
}

/// The display panel. Each request takes a ticket and only the holder of the
/// latest ticket may replace what is shown.
#[derive(Default)]
struct Panel {
    latest: AtomicU64,
    shown: Mutex<Option<Presentation>>,
}

impl Panel {
    fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn present(&self, ticket: u64, presentation: &Presentation) -> bool {
        let mut shown = self.shown.lock().unwrap_or_else(PoisonError::into_inner);
        if self.latest.load(Ordering::SeqCst) != ticket {
            return false;
        }
        *shown = Some(presentation.clone());
        true
    }

    fn current(&self) -> Option<Presentation> {
        self.shown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Astro Dozi client.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AstroApp {
    inner: Arc<AstroAppInner>,
}

struct AstroAppInner {
    sessions: Arc<SessionManager>,
    ledger: CoinLedger,
    horoscopes: Arc<HoroscopeResolver>,
    features: Arc<FeatureResolver>,
    notices: Notifier,
    local: Arc<dyn LocalStore>,
    gemini: Option<GeminiClient>,
    panel: Panel,
    today: Option<DateKey>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for AstroAppInner {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

impl AstroApp {
    /// Build the app from configuration.
    ///
    /// Uses Firestore when a Firebase project is configured and an in-process
    /// document store otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be opened or an HTTP client
    /// cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let local: Arc<dyn LocalStore> = Arc::new(FileLocalStore::open(&config.data_dir)?);
        let identity = Arc::new(StaticIdentityProvider::from_config(&config.identity));

        let documents: Arc<dyn DocumentStore> = match &config.firebase {
            Some(firebase) => {
                info!(project = %firebase.project_id, "using Firestore document store");
                Arc::new(FirestoreClient::new(firebase, Some(identity.subscribe()))?)
            }
            None => {
                info!("no Firebase project configured, using in-process document store");
                Arc::new(MemoryDocumentStore::new())
            }
        };
        let gemini = GeminiClient::new(&config.gemini, Arc::clone(&documents))?;

        let collaborators = Collaborators {
            documents,
            local,
            identity,
            generator: Arc::new(gemini.clone()),
            generation_timeout: config.gemini.timeout,
            today: None,
        };
        Ok(Self::assemble(collaborators, Some(gemini)))
    }

    /// Build the app from explicit collaborators.
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self::assemble(collaborators, None)
    }

    fn assemble(collaborators: Collaborators, gemini: Option<GeminiClient>) -> Self {
        let Collaborators {
            documents,
            local,
            identity,
            generator,
            generation_timeout,
            today,
        } = collaborators;

        let notices = Notifier::new();
        let sessions = Arc::new(SessionManager::new(
            identity,
            Arc::clone(&documents),
            Arc::clone(&local),
            notices.clone(),
        ));
        let ledger = CoinLedger::new(
            Arc::clone(&sessions),
            Arc::clone(&documents),
            notices.clone(),
        );
        let horoscopes = Arc::new(horoscope::resolver(
            Arc::clone(&local),
            documents,
            Arc::clone(&generator),
            generation_timeout,
        ));
        let features = Arc::new(feature::resolver(
            Arc::clone(&local),
            generator,
            generation_timeout,
        ));

        Self {
            inner: Arc::new(AstroAppInner {
                sessions,
                ledger,
                horoscopes,
                features,
                notices,
                local,
                gemini,
                panel: Panel::default(),
                today,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Prepare for use: prune stale cache entries, preload the generation
    /// key, load the session and start following identity changes.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Session {
        let pruned = local::prune_stale_entries(self.inner.local.as_ref(), self.today());
        if pruned > 0 {
            info!(pruned, "removed stale cache entries");
        }

        if let Some(gemini) = &self.inner.gemini {
            if let Err(e) = gemini.preload_key().await {
                warn!(error = %e, "could not preload generation key");
            }
        }

        let session = self.inner.sessions.refresh().await;

        let mut tasks = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if tasks.is_empty() {
            tasks.push(self.inner.sessions.observe_identity());
            tasks.push(self.spawn_memo_reset());
        }
        session
    }

    /// Drop memoised payloads whenever the signed-in user goes away.
    fn spawn_memo_reset(&self) -> JoinHandle<()> {
        let mut sessions = self.inner.sessions.subscribe();
        let horoscopes = Arc::clone(&self.inner.horoscopes);
        let features = Arc::clone(&self.inner.features);

        tokio::spawn(async move {
            let mut user = sessions.borrow_and_update().user().map(|u| u.uid.clone());
            while sessions.changed().await.is_ok() {
                let current = sessions.borrow_and_update().user().map(|u| u.uid.clone());
                if user.is_some() && current != user {
                    debug!("user changed, clearing memoised payloads");
                    horoscopes.clear();
                    features.clear();
                }
                user = current;
            }
        })
    }

    /// Today's date key.
    #[must_use]
    pub fn today(&self) -> DateKey {
        self.inner.today.unwrap_or_else(DateKey::today)
    }

    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.sessions.session()
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    #[must_use]
    pub fn ledger(&self) -> &CoinLedger {
        &self.inner.ledger
    }

    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    /// What the panel currently shows.
    #[must_use]
    pub fn displayed(&self) -> Option<Presentation> {
        self.inner.panel.current()
    }

    /// # Errors
    ///
    /// Returns an error if the identity provider fails.
    pub async fn sign_in(&self) -> Result<Option<UserIdentity>> {
        Ok(self.inner.sessions.sign_in().await?)
    }

    /// Sign out and forget everything cached for the session.
    ///
    /// # Errors
    ///
    /// Returns an error if local state cannot be removed.
    pub async fn sign_out(&self) -> Result<()> {
        self.inner.sessions.sign_out().await?;
        self.inner.horoscopes.clear();
        self.inner.features.clear();
        self.inner.ledger.cancel();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the guest flag cannot be stored.
    pub fn continue_as_guest(&self) -> Result<Session> {
        Ok(self.inner.sessions.continue_as_guest()?)
    }

    /// Select and persist a sign; unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if guest state cannot be written.
    pub async fn select_sign(&self, token: &str) -> Result<Option<ZodiacSign>> {
        Ok(self.inner.sessions.select_sign(token).await?)
    }

    pub fn preselect_sign(&self, token: &str) -> Option<ZodiacSign> {
        self.inner.sessions.preselect_sign(token)
    }

    /// Resolve and present today's horoscope for `sign`, or for the selected
    /// sign. Calling this again after a fallback is the retry path: failures
    /// are not memoised, so the whole cascade runs again.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NoSignSelected`] when no sign is given or selected.
    #[instrument(skip(self), fields(sign = sign.map(ZodiacSign::id)))]
    pub async fn horoscope(&self, sign: Option<ZodiacSign>) -> Result<Rendered> {
        let session = self.session();
        let sign = sign
            .or_else(|| session.selected_sign())
            .ok_or(AppError::NoSignSelected)?;
        let date = self.today();

        let ticket = self.inner.panel.issue();
        let request = Request::new(CacheKey::horoscope(sign, date))
            .for_user(session.user().map(|user| user.uid.clone()));
        let resolution = self.inner.horoscopes.resolve(request).await;

        let source = resolution.source();
        let presentation = match resolution {
            Resolution::Ready { payload, .. } => {
                Presentation::Horoscope(HoroscopeView::new(sign, date, &payload))
            }
            Resolution::SignInRequired => {
                Presentation::Fallback(FallbackView::horoscope(sign).with_sign_in())
            }
            Resolution::Unavailable { reason } => {
                warn!(%reason, "horoscope unavailable");
                Presentation::Fallback(FallbackView::horoscope(sign))
            }
        };
        Ok(self.present(ticket, presentation, source))
    }

    /// Ask for a feature; premium users get the reading immediately.
    #[instrument(skip(self), fields(feature = kind.id()))]
    pub async fn request_feature(&self, kind: FeatureKind) -> FeatureFlow {
        match self.inner.ledger.request_feature(kind, None) {
            Gate::Granted => FeatureFlow::Shown(self.run_feature(kind).await),
            gate => FeatureFlow::Gated(gate),
        }
    }

    /// Charge the pending feature and present its reading.
    ///
    /// The charge stands even when the reading falls back.
    ///
    /// # Errors
    ///
    /// Returns a ledger error when nothing is pending or the balance is short.
    pub async fn confirm_feature(&self) -> Result<Rendered> {
        let spend = self.inner.ledger.confirm_spend().await?;
        Ok(self.run_feature(spend.feature).await)
    }

    pub fn buy_coins(&self) {
        self.inner.ledger.buy_coins();
    }

    async fn run_feature(&self, kind: FeatureKind) -> Rendered {
        let session = self.session();
        let ticket = self.inner.panel.issue();
        let request = Request::new(CacheKey::feature(kind, self.today()))
            .for_user(session.user().map(|user| user.uid.clone()))
            .with_sign(session.selected_sign());
        let resolution = self.inner.features.resolve(request).await;

        let source = resolution.source();
        let presentation = match resolution {
            Resolution::Ready { payload, .. } => Presentation::Feature(FeatureView::new(&payload)),
            Resolution::SignInRequired => {
                Presentation::Fallback(FallbackView::feature(kind).with_sign_in())
            }
            Resolution::Unavailable { reason } => {
                warn!(%reason, "feature unavailable");
                Presentation::Fallback(FallbackView::feature(kind))
            }
        };
        self.present(ticket, presentation, source)
    }

    fn present(
        &self,
        ticket: u64,
        presentation: Presentation,
        source: Option<&'static str>,
    ) -> Rendered {
        let shown = self.inner.panel.present(ticket, &presentation);
        if !shown {
            debug!(ticket, "result superseded by a newer request");
        }
        Rendered {
            presentation,
            source,
            shown,
        }
    }
}
