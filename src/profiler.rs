//! Connection profiling: network characteristics → quality tier.
//!
//! | Effective type | Data saver | Tier |
//! |---|---|---|
//! | `4g` | off | `High` |
//! | `4g` | on | `Medium` |
//! | `3g` | any | `Medium` |
//! | `2g`, `slow-2g`, unrecognised | any | `Low` |
//! | unavailable | - | configured fallback (`Medium` by default) |
//!
//! Data saver caps the tier at `Medium`; it never produces `High`.
//!
//! The profiler is an explicit service object. The host calls
//! [`ConnectionProfiler::refresh`] when it observes a network change; every
//! other component reads the tier through [`ConnectionProfiler::current_tier`]
//! or a [`subscribe`](ConnectionProfiler::subscribe)d receiver.

use crate::config::QualityConfig;
use crate::platform::{ConnectionInfo, NetworkInfo};
use crate::types::QualityTier;
use tokio::sync::watch;
use tracing::{debug, info};

/// Map a connection snapshot to a tier. `None` means the host exposed nothing.
pub fn tier_for(info: Option<&ConnectionInfo>, fallback: QualityTier) -> QualityTier {
    let Some(info) = info else {
        return fallback;
    };
    let link = info
        .effective_type
        .as_deref()
        .map(|t| t.trim().to_ascii_lowercase());
    match link.as_deref() {
        Some("4g") if !info.save_data => QualityTier::High,
        Some("4g") | Some("3g") => QualityTier::Medium,
        // 2g, slow-2g, and anything unrecognised
        _ => QualityTier::Low,
    }
}

#[derive(Debug)]
pub struct ConnectionProfiler {
    fallback: QualityTier,
    tier: watch::Sender<QualityTier>,
}

impl ConnectionProfiler {
    /// Profiler starting at `fallback` until the first refresh.
    pub fn new(fallback: QualityTier) -> Self {
        let (tier, _) = watch::channel(fallback);
        Self { fallback, tier }
    }

    pub fn from_config(config: &QualityConfig) -> Self {
        Self::new(config.fallback_tier)
    }

    /// Profiler initialised from the host's current snapshot.
    pub fn detect(network: &impl NetworkInfo, fallback: QualityTier) -> Self {
        let profiler = Self::new(fallback);
        profiler.refresh(network);
        profiler
    }

    pub fn current_tier(&self) -> QualityTier {
        *self.tier.borrow()
    }

    pub fn fallback_tier(&self) -> QualityTier {
        self.fallback
    }

    /// Receiver notified whenever the tier changes.
    pub fn subscribe(&self) -> watch::Receiver<QualityTier> {
        self.tier.subscribe()
    }

    /// Re-read the host's connection info. Returns the new tier if it changed.
    pub fn refresh(&self, network: &impl NetworkInfo) -> Option<QualityTier> {
        let info = match network.connection() {
            Ok(info) => Some(info),
            Err(e) => {
                debug!(error = %e, fallback = %self.fallback, "no connection info");
                None
            }
        };
        let next = tier_for(info.as_ref(), self.fallback);
        let changed = self.tier.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            info!(tier = %next, "quality tier changed");
        }
        changed.then_some(next)
    }
}
