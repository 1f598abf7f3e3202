//! Coin ledger.
//!
//! Gates paid features behind the session's balance or premium flag. The
//! ledger is the only writer of the balance after it has been loaded.

use std::sync::{Arc, Mutex, PoisonError};

use astro_dozi_core::{FeatureKind, InsufficientCoins};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::local::LocalStoreError;
use crate::notice::{Notice, Notifier};
use crate::session::SessionManager;
use crate::store::{DocumentPath, DocumentStore};

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no feature is waiting for confirmation")]
    NoPendingRequest,

    #[error(transparent)]
    Insufficient(#[from] InsufficientCoins),

    #[error("local storage error: {0}")]
    Local(#[from] LocalStoreError),
}

/// What the user sees after asking for a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Features need an account.
    SignInRequired,
    /// Premium: run the feature without charge.
    Granted,
    /// Upsell surface; the spend action is disabled.
    Insufficient { balance: u32, cost: u32 },
    /// Spend confirmation surface; call [`CoinLedger::confirm_spend`].
    Confirm { cost: u32 },
}

/// A feature waiting for the user to confirm the spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSpend {
    pub feature: FeatureKind,
    pub cost: u32,
}

pub struct CoinLedger {
    sessions: Arc<SessionManager>,
    documents: Arc<dyn DocumentStore>,
    notices: Notifier,
    pending: Mutex<Option<PendingSpend>>,
}

impl CoinLedger {
    #[must_use]
    pub fn new(
        sessions: Arc<SessionManager>,
        documents: Arc<dyn DocumentStore>,
        notices: Notifier,
    ) -> Self {
        Self {
            sessions,
            documents,
            notices,
            pending: Mutex::new(None),
        }
    }

    /// Decide how a feature request proceeds. `cost` defaults to the
    /// feature's catalog price.
    ///
    /// Only [`Gate::Confirm`] leaves a pending spend behind; any other outcome
    /// drops an earlier one.
    #[instrument(skip(self), fields(feature = feature.id()))]
    pub fn request_feature(&self, feature: FeatureKind, cost: Option<u32>) -> Gate {
        let cost = cost.unwrap_or_else(|| feature.default_cost());
        let session = self.sessions.session();

        let (gate, pending) = if !session.is_authenticated() {
            (Gate::SignInRequired, None)
        } else if session.is_premium() {
            (Gate::Granted, None)
        } else if session.coin_balance() < cost {
            (
                Gate::Insufficient {
                    balance: session.coin_balance(),
                    cost,
                },
                None,
            )
        } else {
            (Gate::Confirm { cost }, Some(PendingSpend { feature, cost }))
        };

        *self.lock_pending() = pending;
        debug!(?gate, "feature gate");
        gate
    }

    /// The spend awaiting confirmation, if any.
    #[must_use]
    pub fn pending(&self) -> Option<PendingSpend> {
        *self.lock_pending()
    }

    /// Drop the pending spend without charging.
    pub fn cancel(&self) {
        *self.lock_pending() = None;
    }

    /// Charge the pending spend and return it for resolution.
    ///
    /// The pending spend is consumed, so a second confirmation without a new
    /// request fails and never charges twice. The balance is checked again
    /// here. The remote balance is updated best-effort with an atomic
    /// server-side decrement.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NoPendingRequest`] without a pending spend,
    /// [`LedgerError::Insufficient`] when the balance dropped below the cost,
    /// or a local storage error for non-authenticated sessions.
    #[instrument(skip(self))]
    pub async fn confirm_spend(&self) -> Result<PendingSpend, LedgerError> {
        let spend = self
            .lock_pending()
            .take()
            .ok_or(LedgerError::NoPendingRequest)?;

        let balance = self.sessions.debit(spend.cost)?;
        let session = self.sessions.session();
        info!(
            feature = spend.feature.id(),
            cost = spend.cost,
            balance,
            "coins spent"
        );

        match session.user() {
            Some(user) => {
                let path = DocumentPath::user(user.uid.as_str());
                if let Err(e) = self
                    .documents
                    .increment(&path, "coinBalance", -i64::from(spend.cost))
                    .await
                {
                    warn!(%path, error = %e, "failed to persist coin balance");
                }
            }
            None => self.sessions.save_guest_data(&session)?,
        }

        self.notices.post(Notice::CoinsSpent(spend.cost));
        Ok(spend)
    }

    /// Coin purchase is not available yet.
    pub fn buy_coins(&self) {
        self.notices.post(Notice::TopUpComingSoon);
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<PendingSpend>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use astro_dozi_core::UserIdentity;
    use serde_json::json;

    use super::*;
    use crate::identity::{AuthenticatedUser, StaticIdentityProvider};
    use crate::local::MemoryLocalStore;
    use crate::store::MemoryDocumentStore;

    struct Fixture {
        sessions: Arc<SessionManager>,
        documents: Arc<MemoryDocumentStore>,
        notices: Notifier,
        ledger: CoinLedger,
    }

    async fn signed_in(user_doc: serde_json::Value) -> Fixture {
        let provider = Arc::new(StaticIdentityProvider::restored(AuthenticatedUser::new(
            UserIdentity::new("u1"),
        )));
        let documents = Arc::new(MemoryDocumentStore::new());
        documents.insert(&DocumentPath::user("u1"), user_doc);
        let notices = Notifier::new();
        let sessions = Arc::new(SessionManager::new(
            provider,
            documents.clone(),
            Arc::new(MemoryLocalStore::new()),
            notices.clone(),
        ));
        sessions.refresh().await;
        let ledger = CoinLedger::new(sessions.clone(), documents.clone(), notices.clone());
        Fixture {
            sessions,
            documents,
            notices,
            ledger,
        }
    }

    #[tokio::test]
    async fn test_spend_once_per_confirmation() {
        let f = signed_in(json!({"coinBalance": 50})).await;
        let mut notices = f.notices.subscribe();

        assert_eq!(
            f.ledger.request_feature(FeatureKind::Tarot, Some(20)),
            Gate::Confirm { cost: 20 }
        );
        let spend = f.ledger.confirm_spend().await.expect("confirm");
        assert_eq!(spend.feature, FeatureKind::Tarot);
        assert_eq!(f.sessions.session().coin_balance(), 30);

        assert!(matches!(
            f.ledger.confirm_spend().await,
            Err(LedgerError::NoPendingRequest)
        ));
        assert_eq!(f.sessions.session().coin_balance(), 30);

        let doc = f.documents.document(&DocumentPath::user("u1")).expect("doc");
        assert_eq!(doc["coinBalance"], 30);
        assert_eq!(notices.try_recv().ok(), Some(Notice::CoinsSpent(20)));
    }

    #[tokio::test]
    async fn test_insufficient_balance_disables_spend() {
        let f = signed_in(json!({"coinBalance": 5})).await;

        assert_eq!(
            f.ledger.request_feature(FeatureKind::Aura, None),
            Gate::Insufficient {
                balance: 5,
                cost: 20
            }
        );
        assert_eq!(f.ledger.pending(), None);
    }

    #[tokio::test]
    async fn test_premium_is_not_charged() {
        let f = signed_in(json!({"coinBalance": 0, "isPremium": true})).await;

        assert_eq!(
            f.ledger.request_feature(FeatureKind::Chakra, None),
            Gate::Granted
        );
        assert!(f.ledger.confirm_spend().await.is_err());
        assert_eq!(f.sessions.session().coin_balance(), 0);
    }

    #[tokio::test]
    async fn test_guest_must_sign_in() {
        let provider = Arc::new(StaticIdentityProvider::new(None));
        let local = Arc::new(MemoryLocalStore::new());
        let sessions = Arc::new(SessionManager::new(
            provider,
            Arc::new(MemoryDocumentStore::new()),
            local,
            Notifier::new(),
        ));
        sessions.continue_as_guest().expect("guest");
        let ledger = CoinLedger::new(
            sessions,
            Arc::new(MemoryDocumentStore::new()),
            Notifier::new(),
        );

        assert_eq!(
            ledger.request_feature(FeatureKind::Tarot, None),
            Gate::SignInRequired
        );
    }

    #[tokio::test]
    async fn test_balance_rechecked_at_confirmation() {
        let f = signed_in(json!({"coinBalance": 25})).await;

        assert_eq!(
            f.ledger.request_feature(FeatureKind::PastLife, None),
            Gate::Confirm { cost: 25 }
        );
        // Balance spent elsewhere between request and confirmation.
        f.sessions.debit(10).expect("debit");

        assert!(matches!(
            f.ledger.confirm_spend().await,
            Err(LedgerError::Insufficient(InsufficientCoins {
                balance: 15,
                cost: 25
            }))
        ));
        assert_eq!(f.sessions.session().coin_balance(), 15);
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_local_balance() {
        let f = signed_in(json!({"coinBalance": 50})).await;
        f.documents.fail_prefix("users");

        f.ledger.request_feature(FeatureKind::LifePath, None);
        f.ledger.confirm_spend().await.expect("confirm");

        assert_eq!(f.sessions.session().coin_balance(), 35);
    }

    #[tokio::test]
    async fn test_cancel_and_top_up() {
        let f = signed_in(json!({"coinBalance": 50})).await;
        let mut notices = f.notices.subscribe();

        f.ledger.request_feature(FeatureKind::Tarot, None);
        f.ledger.cancel();
        assert!(f.ledger.confirm_spend().await.is_err());

        f.ledger.buy_coins();
        assert_eq!(notices.try_recv().ok(), Some(Notice::TopUpComingSoon));
    }
}
