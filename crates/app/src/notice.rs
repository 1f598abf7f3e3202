//! Transient user notifications.

use core::fmt;

use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 32;

/// A short message shown to the user and then dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SignInFailed(String),
    SignedOut,
    ContinuingAsGuest,
    CoinsSpent(u32),
    TopUpComingSoon,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignInFailed(reason) => write!(f, "Giris yapilamadi: {reason}"),
            Self::SignedOut => f.write_str("Cikis yapildi."),
            Self::ContinuingAsGuest => f.write_str("Misafir olarak devam ediyorsun."),
            Self::CoinsSpent(amount) => write!(f, "{amount} Yildiz Tozu harcandi."),
            Self::TopUpComingSoon => f.write_str("Odeme sistemi yakin zamanda aktif olacak!"),
        }
    }
}

/// Fan-out of notices to every subscriber.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Post a notice. Dropped silently when nobody is listening.
    pub fn post(&self, notice: Notice) {
        debug!(%notice, "notice");
        let _ = self.sender.send(notice);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }
}
