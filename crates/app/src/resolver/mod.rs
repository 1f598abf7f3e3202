//! Tiered payload resolution.
//!
//! A [`Cascade`] walks an ordered list of [`Tier`]s, cheapest first, and
//! returns the first payload any of them produces. Tiers never fail the
//! cascade: every problem is reported as a [`Miss`] and the next tier is
//! tried. On a hit, the payload is written back to the faster tiers:
//!
//! - a hit from a cache tier is copied to [`TierKind::Device`] tiers only
//! - a hit from the [`TierKind::Origin`] is copied to every faster tier
//!
//! Device writes are [`WriteClass::Required`]; remote writes are
//! [`WriteClass::BestEffort`] and are bounded by a short deadline, logged on
//! failure and never retried.
//!
//! [`Resolver`] puts an in-process memo in front of a cascade so concurrent
//! requests for the same [`CacheKey`] share one run.

pub mod feature;
pub mod horoscope;
mod tiers;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use astro_dozi_core::{CacheKey, UserId, ZodiacSign};
use moka::future::Cache;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::local::LocalStoreError;
use crate::store::StoreError;

pub use tiers::{GenerationTier, LocalTier, Payload};

/// Source name reported for memo hits.
pub const MEMO_SOURCE: &str = "memory";

const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const MEMO_CAPACITY: u64 = 256;
const MEMO_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Where a tier keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierKind {
    /// On this device.
    Device,
    /// A remote cache.
    Remote,
    /// Produces new payloads; nothing to write back to.
    Origin,
}

impl TierKind {
    #[must_use]
    pub const fn write_class(self) -> WriteClass {
        match self {
            Self::Device => WriteClass::Required,
            Self::Remote | Self::Origin => WriteClass::BestEffort,
        }
    }
}

/// How a write-back is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteClass {
    /// Awaited; a failure is logged as an error.
    Required,
    /// Awaited under a deadline; a failure is logged as a warning and dropped.
    BestEffort,
}

/// Why a tier produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Miss {
    /// Nothing stored. The normal case, not a failure.
    Absent,
    /// The backend could not be reached or refused the request.
    Failed(String),
    /// Something was stored but could not be read; it has been discarded.
    Corrupt(String),
    /// The caller is not allowed to use this tier.
    Denied,
}

/// Failure to write a payload back to a tier.
#[derive(Debug, Error)]
pub enum TierError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Local(#[from] LocalStoreError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What is being resolved, and for whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub key: CacheKey,
    /// Signed-in user; `None` for guests.
    pub user: Option<UserId>,
    /// Sign used to personalise feature prompts.
    pub sign: Option<ZodiacSign>,
}

impl Request {
    #[must_use]
    pub const fn new(key: CacheKey) -> Self {
        Self {
            key,
            user: None,
            sign: None,
        }
    }

    #[must_use]
    pub fn for_user(mut self, user: Option<UserId>) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub const fn with_sign(mut self, sign: Option<ZodiacSign>) -> Self {
        self.sign = sign;
        self
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<P> {
    /// A payload, and the name of the tier that produced it.
    Ready { payload: P, source: &'static str },
    /// Generation is gated behind an account.
    SignInRequired,
    /// Every tier missed; show the fallback.
    Unavailable { reason: String },
}

impl<P> Resolution<P> {
    #[must_use]
    pub const fn payload(&self) -> Option<&P> {
        match self {
            Self::Ready { payload, .. } => Some(payload),
            Self::SignInRequired | Self::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub const fn source(&self) -> Option<&'static str> {
        match self {
            Self::Ready { source, .. } => Some(*source),
            Self::SignInRequired | Self::Unavailable { .. } => None,
        }
    }
}

/// One lookup strategy in a cascade.
#[async_trait]
pub trait Tier<P>: Send + Sync {
    /// Short name used in logs and reported as the payload source.
    fn name(&self) -> &'static str;

    fn kind(&self) -> TierKind;

    async fn lookup(&self, request: &Request) -> Result<P, Miss>;

    /// Store a payload found by a slower tier.
    async fn store(&self, _request: &Request, _payload: &P) -> Result<(), TierError> {
        Ok(())
    }
}

/// First-success combinator over tiers.
pub struct Cascade<P> {
    tiers: Vec<Arc<dyn Tier<P>>>,
    write_timeout: Duration,
}

impl<P> Cascade<P>
where
    P: Send + Sync,
{
    #[must_use]
    pub fn new(tiers: Vec<Arc<dyn Tier<P>>>) -> Self {
        Self {
            tiers,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Deadline for best-effort write-backs.
    #[must_use]
    pub const fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Tier names in lookup order.
    #[must_use]
    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|tier| tier.name()).collect()
    }

    /// Try each tier in order until one produces a payload.
    #[instrument(skip(self, request), fields(key = %request.key))]
    pub async fn resolve(&self, request: &Request) -> Resolution<P> {
        let mut last_problem = None;

        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.lookup(request).await {
                Ok(payload) => {
                    debug!(tier = tier.name(), "hit");
                    self.write_back(index, tier.kind(), request, &payload).await;
                    return Resolution::Ready {
                        payload,
                        source: tier.name(),
                    };
                }
                Err(Miss::Absent) => debug!(tier = tier.name(), "miss"),
                Err(Miss::Failed(reason)) => {
                    warn!(tier = tier.name(), %reason, "tier failed, trying next");
                    last_problem = Some(reason);
                }
                Err(Miss::Corrupt(reason)) => {
                    warn!(tier = tier.name(), %reason, "discarded unreadable payload");
                    last_problem = Some(reason);
                }
                Err(Miss::Denied) => {
                    debug!(tier = tier.name(), "sign-in required");
                    return Resolution::SignInRequired;
                }
            }
        }

        Resolution::Unavailable {
            reason: last_problem.unwrap_or_else(|| "no source had a payload".to_string()),
        }
    }

    async fn write_back(&self, hit_index: usize, hit_kind: TierKind, request: &Request, payload: &P) {
        let faster = self.tiers.iter().take(hit_index);
        for tier in faster {
            if hit_kind != TierKind::Origin && tier.kind() != TierKind::Device {
                continue;
            }
            match tier.kind().write_class() {
                WriteClass::Required => {
                    if let Err(e) = tier.store(request, payload).await {
                        error!(tier = tier.name(), error = %e, "required write-back failed");
                    }
                }
                WriteClass::BestEffort => {
                    match tokio::time::timeout(self.write_timeout, tier.store(request, payload))
                        .await
                    {
                        Ok(Ok(())) => debug!(tier = tier.name(), "written back"),
                        Ok(Err(e)) => {
                            warn!(tier = tier.name(), error = %e, "best-effort write-back skipped");
                        }
                        Err(_) => {
                            warn!(tier = tier.name(), "best-effort write-back timed out");
                        }
                    }
                }
            }
        }
    }
}

#[derive(Clone)]
struct Memo<P> {
    payload: P,
    source: &'static str,
}

/// Memo entries belong to one user and one epoch; [`Resolver::clear`]
/// starts a new epoch so runs already in flight cannot be joined or stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    epoch: u64,
    user: Option<UserId>,
    key: CacheKey,
}

/// A cascade behind an in-process memo.
///
/// Concurrent requests for one key share a single cascade run. Only payloads
/// are memoised: a miss or a sign-in gate is recomputed on the next request.
pub struct Resolver<P> {
    cascade: Cascade<P>,
    memo: Cache<MemoKey, Memo<P>>,
    epoch: AtomicU64,
    require_sign_in: bool,
}

impl<P> Resolver<P>
where
    P: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(cascade: Cascade<P>) -> Self {
        Self {
            cascade,
            memo: Cache::builder()
                .max_capacity(MEMO_CAPACITY)
                .time_to_live(MEMO_TTL)
                .build(),
            epoch: AtomicU64::new(0),
            require_sign_in: false,
        }
    }

    /// Refuse guests before touching any tier.
    #[must_use]
    pub const fn requiring_sign_in(mut self) -> Self {
        self.require_sign_in = true;
        self
    }

    #[must_use]
    pub const fn cascade(&self) -> &Cascade<P> {
        &self.cascade
    }

    #[instrument(skip(self, request), fields(key = %request.key, signed_in = request.user.is_some()))]
    pub async fn resolve(&self, request: Request) -> Resolution<P> {
        if self.require_sign_in && request.user.is_none() {
            debug!("guest request refused");
            return Resolution::SignInRequired;
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let memo_key = MemoKey {
            epoch,
            user: request.user.clone(),
            key: request.key,
        };
        let outcome = self
            .memo
            .entry(memo_key)
            .or_try_insert_with(async {
                let resolution = self.cascade.resolve(&request).await;
                match resolution {
                    Resolution::Ready { payload, source }
                        if self.epoch.load(Ordering::SeqCst) == epoch =>
                    {
                        Ok(Memo { payload, source })
                    }
                    other => Err(other),
                }
            })
            .await;

        match outcome {
            Ok(entry) => {
                let fresh = entry.is_fresh();
                let memo = entry.into_value();
                Resolution::Ready {
                    payload: memo.payload,
                    source: if fresh { memo.source } else { MEMO_SOURCE },
                }
            }
            Err(unresolved) => (*unresolved).clone(),
        }
    }

    /// Drop every memoised payload, including those still being resolved.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.memo.invalidate_all();
    }
}
