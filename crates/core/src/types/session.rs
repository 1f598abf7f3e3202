//! Session state.
//!
//! A [`Session`] is the process-lifetime view of who is using the app and
//! what they own. It is created when identity settles, mutated only through
//! the accessor methods below, and reset to defaults on sign-out.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::sign::ZodiacSign;

/// Coin balance granted to a session with no stored balance.
pub const DEFAULT_COIN_BALANCE: u32 = 50;

/// Identity provider user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: UserId,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl UserIdentity {
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: UserId::new(uid),
            email: None,
            display_name: None,
        }
    }
}

/// Who is using the app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    /// No session yet; the user must sign in or continue as a guest.
    #[default]
    SignedOut,
    /// State lives only in local storage.
    Guest,
    /// State lives in the user's document.
    User(UserIdentity),
}

impl Identity {
    #[must_use]
    pub const fn user(&self) -> Option<&UserIdentity> {
        match self {
            Self::User(user) => Some(user),
            Self::SignedOut | Self::Guest => None,
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

/// Returned when a debit exceeds the balance.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("insufficient coins: balance {balance}, cost {cost}")]
pub struct InsufficientCoins {
    pub balance: u32,
    pub cost: u32,
}

/// Per-process session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    identity: Identity,
    coin_balance: u32,
    is_premium: bool,
    selected_sign: Option<ZodiacSign>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            identity: Identity::SignedOut,
            coin_balance: DEFAULT_COIN_BALANCE,
            is_premium: false,
            selected_sign: None,
        }
    }
}

impl Session {
    /// A fresh session for the given identity with default balances.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub const fn user(&self) -> Option<&UserIdentity> {
        self.identity.user()
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.identity.is_authenticated()
    }

    #[must_use]
    pub const fn coin_balance(&self) -> u32 {
        self.coin_balance
    }

    #[must_use]
    pub const fn is_premium(&self) -> bool {
        self.is_premium
    }

    #[must_use]
    pub const fn selected_sign(&self) -> Option<ZodiacSign> {
        self.selected_sign
    }

    pub const fn set_coin_balance(&mut self, balance: u32) {
        self.coin_balance = balance;
    }

    pub const fn set_premium(&mut self, premium: bool) {
        self.is_premium = premium;
    }

    pub const fn select_sign(&mut self, sign: Option<ZodiacSign>) {
        self.selected_sign = sign;
    }

    /// Subtract `cost` from the balance, returning the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientCoins`] and leaves the balance untouched when
    /// `cost` exceeds it.
    pub const fn debit(&mut self, cost: u32) -> Result<u32, InsufficientCoins> {
        match self.coin_balance.checked_sub(cost) {
            Some(remaining) => {
                self.coin_balance = remaining;
                Ok(remaining)
            }
            None => Err(InsufficientCoins {
                balance: self.coin_balance,
                cost,
            }),
        }
    }

    /// Drop everything and return to the signed-out defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
