//! Identity provider seam.
//!
//! The provider owns the authentication state. Consumers never ask "who is
//! signed in" directly: they hold a [`watch::Receiver`] from
//! [`IdentityProvider::subscribe`] and react to changes, the same way the
//! session manager does.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use astro_dozi_core::UserIdentity;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::config::IdentityConfig;

/// Identity provider errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The user dismissed the sign-in flow. Not reported to the user.
    #[error("sign-in cancelled")]
    Cancelled,

    /// No identity is available to sign in with.
    #[error("identity unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the request.
    #[error("identity provider error: {0}")]
    Provider(String),
}

/// A signed-in user plus the token that authorizes backend calls.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct AuthenticatedUser {
    pub identity: UserIdentity,
    pub id_token: Option<SecretString>,
}

impl AuthenticatedUser {
    #[must_use]
    pub const fn new(identity: UserIdentity) -> Self {
        Self {
            identity,
            id_token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.id_token = Some(token);
        self
    }
}

impl std::fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("identity", &self.identity)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Interactive authentication.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the interactive sign-in flow.
    ///
    /// On success the new user is also published to every subscriber.
    async fn sign_in(&self) -> Result<UserIdentity, IdentityError>;

    /// End the provider session and publish `None`.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Receive the current user and every later change.
    fn subscribe(&self) -> watch::Receiver<Option<AuthenticatedUser>>;
}

/// Provider that signs in as one preconfigured user.
#[derive(Debug)]
pub struct StaticIdentityProvider {
    user: Option<AuthenticatedUser>,
    state: watch::Sender<Option<AuthenticatedUser>>,
    next_failure: Mutex<Option<IdentityError>>,
}

impl StaticIdentityProvider {
    /// Start signed out; [`IdentityProvider::sign_in`] signs in as `user`.
    #[must_use]
    pub fn new(user: Option<AuthenticatedUser>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            user,
            state,
            next_failure: Mutex::new(None),
        }
    }

    /// Start already signed in as `user`, like a restored provider session.
    #[must_use]
    pub fn restored(user: AuthenticatedUser) -> Self {
        let provider = Self::new(Some(user.clone()));
        provider.state.send_replace(Some(user));
        provider
    }

    /// Build from configuration. A configured user id yields a restored session.
    #[must_use]
    pub fn from_config(config: &IdentityConfig) -> Self {
        let Some(uid) = &config.user_id else {
            return Self::new(None);
        };
        let identity = UserIdentity {
            email: config.email.clone(),
            display_name: config.display_name.clone(),
            ..UserIdentity::new(uid.clone())
        };
        let mut user = AuthenticatedUser::new(identity);
        user.id_token.clone_from(&config.id_token);
        Self::restored(user)
    }

    /// Make the next sign-in attempt fail with `error`.
    pub fn fail_next_sign_in(&self, error: IdentityError) {
        *self
            .next_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    #[instrument(skip(self))]
    async fn sign_in(&self) -> Result<UserIdentity, IdentityError> {
        let failure = self
            .next_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(error) = failure {
            return Err(error);
        }

        let user = self
            .user
            .clone()
            .ok_or_else(|| IdentityError::Unavailable("no user configured".to_string()))?;
        debug!(uid = %user.identity.uid, "signed in");
        let identity = user.identity.clone();
        self.state.send_replace(Some(user));
        Ok(identity)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.state.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthenticatedUser>> {
        self.state.subscribe()
    }
}
