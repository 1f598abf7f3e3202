//! Session manager.
//!
//! Owns the process-wide [`Session`] and keeps it in step with the identity
//! provider:
//!
//! - signed-in user: state comes from `users/{uid}`
//! - guest (local flag set): state comes from local storage
//! - neither: signed out, the user must sign in or continue as a guest
//!
//! Observers read the session through a [`watch::Receiver`].

use std::sync::{Arc, Mutex, PoisonError};

use astro_dozi_core::{
    DEFAULT_COIN_BALANCE, Identity, InsufficientCoins, Session, UnknownSign, UserId, UserIdentity,
    ZodiacSign,
};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::identity::{AuthenticatedUser, IdentityError, IdentityProvider};
use crate::local::{self, GUEST_DATA_KEY, GUEST_FLAG_KEY, LocalStore, LocalStoreError};
use crate::notice::{Notice, Notifier};
use crate::store::{Document, DocumentPath, DocumentStore, DocumentWrite, StoreError};

/// Session manager errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("local storage error: {0}")]
    Local(#[from] LocalStoreError),

    #[error(transparent)]
    UnknownSign(#[from] UnknownSign),
}

/// Tracks who is using the app and what they own.
pub struct SessionManager {
    identity: Arc<dyn IdentityProvider>,
    documents: Arc<dyn DocumentStore>,
    local: Arc<dyn LocalStore>,
    notices: Notifier,
    state: watch::Sender<Session>,
    preselected: Mutex<Option<ZodiacSign>>,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStore>,
        local: Arc<dyn LocalStore>,
        notices: Notifier,
    ) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            identity,
            documents,
            local,
            notices,
            state,
            preselected: Mutex::new(None),
        }
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Signed-in user id, `None` for guests and signed-out sessions.
    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.state.borrow().user().map(|user| user.uid.clone())
    }

    /// Apply identity changes as they happen, starting with the current one.
    pub fn observe_identity(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut changes = manager.identity.subscribe();
        tokio::spawn(async move {
            loop {
                let user = changes.borrow_and_update().clone();
                manager.apply_identity(user.as_ref()).await;
                if changes.changed().await.is_err() {
                    debug!("identity provider dropped");
                    break;
                }
            }
        })
    }

    /// Load the session for the provider's current user.
    pub async fn refresh(&self) -> Session {
        let user = self.identity.subscribe().borrow().clone();
        self.apply_identity(user.as_ref()).await
    }

    /// Rebuild the session for `user`, or for a guest / signed-out state.
    #[instrument(skip(self, user), fields(uid = user.map(|u| u.identity.uid.as_str())))]
    pub async fn apply_identity(&self, user: Option<&AuthenticatedUser>) -> Session {
        let mut session = match user {
            Some(user) => Session::new(Identity::User(user.identity.clone())),
            None if self.local.get(GUEST_FLAG_KEY).is_some() => Session::new(Identity::Guest),
            None => Session::new(Identity::SignedOut),
        };
        if let Some(sign) = self.preselected() {
            session.select_sign(Some(sign));
        }

        match user {
            Some(user) => self.load_user(&user.identity, &mut session).await,
            None if session.identity() == &Identity::Guest => self.load_guest(&mut session),
            None => debug!("no user and no guest flag, sign-in needed"),
        }

        info!(
            identity = identity_label(session.identity()),
            coins = session.coin_balance(),
            premium = session.is_premium(),
            sign = session.selected_sign().map(ZodiacSign::id),
            "session loaded"
        );
        self.state.send_replace(session.clone());
        session
    }

    /// Start the interactive sign-in.
    ///
    /// Returns `Ok(None)` when the user cancels. Other failures post a
    /// notice and are returned; nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when sign-in fails.
    #[instrument(skip(self))]
    pub async fn sign_in(&self) -> Result<Option<UserIdentity>, SessionError> {
        match self.identity.sign_in().await {
            Ok(user) => {
                self.refresh().await;
                Ok(Some(user))
            }
            Err(IdentityError::Cancelled) => {
                debug!("sign-in cancelled");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "sign-in failed");
                self.notices.post(Notice::SignInFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Enter guest mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the guest flag cannot be stored.
    pub fn continue_as_guest(&self) -> Result<Session, SessionError> {
        self.local.set(GUEST_FLAG_KEY, "true")?;

        let mut session = Session::new(Identity::Guest);
        if let Some(sign) = self.preselected() {
            session.select_sign(Some(sign));
        }
        self.load_guest(&mut session);
        self.state.send_replace(session.clone());
        self.notices.post(Notice::ContinuingAsGuest);
        Ok(session)
    }

    /// End the provider session and forget all local state.
    ///
    /// # Errors
    ///
    /// Returns an error if local state cannot be removed.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        if let Err(e) = self.identity.sign_out().await {
            warn!(error = %e, "provider sign-out failed");
        }
        self.local.remove(GUEST_FLAG_KEY)?;
        self.local.remove(GUEST_DATA_KEY)?;
        local::clear_cached_payloads(self.local.as_ref());
        *self
            .preselected
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;

        self.state.send_replace(Session::default());
        self.notices.post(Notice::SignedOut);
        Ok(())
    }

    /// Remember a sign requested at launch. Invalid tokens are ignored.
    pub fn preselect_sign(&self, token: &str) -> Option<ZodiacSign> {
        let sign = match ZodiacSign::parse(token) {
            Ok(sign) => sign,
            Err(e) => {
                warn!(error = %e, "ignoring preselected sign");
                return None;
            }
        };
        *self
            .preselected
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(sign);
        self.state.send_modify(|session| session.select_sign(Some(sign)));
        Some(sign)
    }

    /// Select a sign and persist the choice.
    ///
    /// Unknown tokens are a no-op returning `Ok(None)`. Signed-in users are
    /// saved to their document, everyone else to local storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the local guest state cannot be written.
    #[instrument(skip(self))]
    pub async fn select_sign(&self, token: &str) -> Result<Option<ZodiacSign>, SessionError> {
        let sign = match ZodiacSign::parse(token) {
            Ok(sign) => sign,
            Err(e) => {
                warn!(error = %e, "ignoring sign selection");
                return Ok(None);
            }
        };

        self.state.send_modify(|session| session.select_sign(Some(sign)));
        let session = self.session();

        match session.user() {
            Some(user) => {
                let write = DocumentWrite::new()
                    .field("zodiacSign", sign.id())
                    .server_timestamp("updatedAt");
                if let Err(e) = self
                    .documents
                    .merge(&DocumentPath::user(user.uid.as_str()), write)
                    .await
                {
                    warn!(error = %e, "failed to save selected sign");
                }
            }
            None => self.save_guest_data(&session)?,
        }
        Ok(Some(sign))
    }

    /// Debit the in-memory balance. Only the coin ledger calls this.
    pub(crate) fn debit(&self, cost: u32) -> Result<u32, InsufficientCoins> {
        let mut outcome = Err(InsufficientCoins {
            balance: self.state.borrow().coin_balance(),
            cost,
        });
        self.state.send_if_modified(|session| {
            outcome = session.debit(cost);
            outcome.is_ok()
        });
        outcome
    }

    /// Write balance and sign to local storage for non-authenticated sessions.
    pub(crate) fn save_guest_data(&self, session: &Session) -> Result<(), LocalStoreError> {
        if session.is_authenticated() {
            return Ok(());
        }
        let data = json!({
            "coins": session.coin_balance(),
            "selectedSign": session.selected_sign().map(ZodiacSign::id),
        });
        self.local.set(GUEST_DATA_KEY, &data.to_string())
    }

    fn preselected(&self) -> Option<ZodiacSign> {
        *self
            .preselected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn load_user(&self, user: &UserIdentity, session: &mut Session) {
        let path = DocumentPath::user(user.uid.as_str());
        match self.documents.get(&path).await {
            Ok(Some(doc)) => apply_user_document(&doc, session),
            Ok(None) => debug!(%path, "user document does not exist, using defaults"),
            Err(e) => warn!(%path, error = %e, "failed to load user document, using defaults"),
        }
    }

    fn load_guest(&self, session: &mut Session) {
        let Some(text) = self.local.get(GUEST_DATA_KEY) else {
            return;
        };
        let data = match serde_json::from_str::<Value>(&text) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "unreadable guest data, using defaults");
                return;
            }
        };
        session.set_coin_balance(
            data.get("coins")
                .and_then(coin_value)
                .unwrap_or(DEFAULT_COIN_BALANCE),
        );
        if let Some(token) = data.get("selectedSign").and_then(Value::as_str) {
            apply_sign_token(token, session);
        }
    }
}

fn apply_user_document(doc: &Document, session: &mut Session) {
    if let Some(balance) = doc.get("coinBalance").and_then(coin_value) {
        session.set_coin_balance(balance);
    }
    session.set_premium(doc.get("isPremium").and_then(Value::as_bool).unwrap_or(false));

    match doc.str("zodiacSign").or_else(|| doc.str("selectedZodiac")) {
        Some(token) => apply_sign_token(token, session),
        None => debug!("user document has no sign"),
    }
}

/// Stored signs are ids, or display labels written by older clients.
fn apply_sign_token(token: &str, session: &mut Session) {
    match ZodiacSign::parse(token) {
        Ok(sign) => session.select_sign(Some(sign)),
        Err(e) => match ZodiacSign::from_display_name(token.trim()) {
            Some(sign) => session.select_sign(Some(sign)),
            None => warn!(error = %e, "ignoring stored sign"),
        },
    }
}

/// Non-negative coin count from an integer or float field.
fn coin_value(value: &Value) -> Option<u32> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to u32 range first
    let from_float = |f: f64| f.round().clamp(0.0, f64::from(u32::MAX)) as u32;

    if let Some(n) = value.as_i64() {
        return Some(u32::try_from(n.max(0)).unwrap_or(u32::MAX));
    }
    value.as_f64().map(from_float)
}

const fn identity_label(identity: &Identity) -> &'static str {
    match identity {
        Identity::SignedOut => "signed-out",
        Identity::Guest => "guest",
        Identity::User(_) => "user",
    }
}
