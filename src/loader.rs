//! Visibility-gated media loading for one mount point.
//!
//! ```text
//!            visible            CanPlay
//!   Idle ───────────▶ Pending ─────────▶ Ready
//!    ▲                  │  ▲
//!    │ set_url/unmount  │  │ retry
//!    │                  ▼  │
//!    └──────────────── Failed
//! ```
//!
//! Every load is an *attempt* identified by a token. Hosts report
//! `CanPlay`/`Error` tagged with the attempt they belong to; the first one
//! settles the attempt and anything tagged with a settled or cancelled
//! attempt is dropped. That is what makes URL changes and unmounts safe
//! against late callbacks. Tokens are unique for the whole process, so two
//! loaders bound to the same element one after another never accept each
//! other's outcomes.
//!
//! No source is assigned to the element (and so nothing is fetched) before
//! the loader has been told the mount point is visible.

use crate::config::LoaderConfig;
use crate::platform::{ElementId, MediaElement, PreloadPolicy};
use crate::sources::{preload_for, source_candidates};
use crate::types::{MediaKind, QualityTier};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("media URL must not be empty")]
    EmptyUrl,
}

/// Token of one load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Attempt(pub u64);

static NEXT_ATTEMPT: AtomicU64 = AtomicU64::new(1);

impl Attempt {
    fn fresh() -> Self {
        Attempt(NEXT_ATTEMPT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Diagnostic payload of a failed load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to load {url}: {reason}")]
pub struct LoadFailure {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Pending,
    Ready,
    Failed(LoadFailure),
}

impl LoadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Idle => write!(f, "idle"),
            LoadState::Pending => write!(f, "pending"),
            LoadState::Ready => write!(f, "ready"),
            LoadState::Failed(_) => write!(f, "failed"),
        }
    }
}

/// Outcome reported by the host for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEventKind {
    CanPlay,
    Error(String),
}

/// A host media callback, tagged with the element and attempt it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEvent {
    pub element: ElementId,
    pub attempt: Attempt,
    pub kind: MediaEventKind,
}

impl MediaEvent {
    pub fn can_play(element: ElementId, attempt: Attempt) -> Self {
        Self {
            element,
            attempt,
            kind: MediaEventKind::CanPlay,
        }
    }

    pub fn error(element: ElementId, attempt: Attempt, reason: impl Into<String>) -> Self {
        Self {
            element,
            attempt,
            kind: MediaEventKind::Error(reason.into()),
        }
    }
}

/// What to load and how.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub kind: MediaKind,
    pub quality: QualityTier,
    pub config: LoaderConfig,
    /// Preload policy for this mount, overriding the tier and the config.
    pub preload: Option<PreloadPolicy>,
}

impl LoadOptions {
    pub fn new(kind: MediaKind, quality: QualityTier, config: &LoaderConfig) -> Self {
        Self {
            kind,
            quality,
            config: config.clone(),
            preload: None,
        }
    }

    pub fn with_preload(mut self, policy: PreloadPolicy) -> Self {
        self.preload = Some(policy);
        self
    }
}

#[derive(Debug)]
pub struct MediaLoader {
    element: ElementId,
    url: String,
    options: LoadOptions,
    visible: bool,
    active: Option<Attempt>,
    started_at: Option<Instant>,
    state: watch::Sender<LoadState>,
}

impl MediaLoader {
    pub fn new(
        element: ElementId,
        url: impl Into<String>,
        options: LoadOptions,
    ) -> Result<Self, LoaderError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(LoaderError::EmptyUrl);
        }
        let (state, _) = watch::channel(LoadState::Idle);
        Ok(Self {
            element,
            url,
            options,
            visible: false,
            active: None,
            started_at: None,
            state,
        })
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    /// The attempt currently awaiting a host outcome, if any.
    pub fn active_attempt(&self) -> Option<Attempt> {
        self.active
    }

    /// Receiver for state transitions. Starts at the current state.
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    /// Tier used for the next attempt. An attempt in progress is not restarted.
    pub fn set_quality(&mut self, quality: QualityTier) {
        self.options.quality = quality;
    }

    /// Feed the mount point's visibility. Starts loading on the first
    /// visible signal while idle.
    pub fn on_visibility(&mut self, visible: bool, media: &impl MediaElement) -> Option<Attempt> {
        self.visible = visible;
        if visible && self.state() == LoadState::Idle {
            Some(self.start(media))
        } else {
            None
        }
    }

    /// Apply a host outcome. Returns the new state, or `None` if the event
    /// was stale.
    pub fn handle(&mut self, event: &MediaEvent) -> Option<LoadState> {
        if event.element != self.element || self.active != Some(event.attempt) {
            debug!(
                element = self.element.0,
                attempt = event.attempt.0,
                "dropping stale media event"
            );
            return None;
        }
        let next = match &event.kind {
            MediaEventKind::CanPlay => LoadState::Ready,
            MediaEventKind::Error(reason) => self.failure(reason.clone()),
        };
        self.settle();
        self.transition(next.clone());
        Some(next)
    }

    /// Retry a failed load. Refused (returns `None`) unless the loader is
    /// failed and the mount point is still visible.
    pub fn retry(&mut self, media: &impl MediaElement) -> Option<Attempt> {
        if !self.state().is_failed() {
            return None;
        }
        if !self.visible {
            debug!(element = self.element.0, "retry refused while not visible");
            return None;
        }
        Some(self.start(media))
    }

    /// Rebind to a new URL. The outstanding attempt is cancelled, the state
    /// resets to idle, and loading restarts only if `visible` is true.
    pub fn set_url(
        &mut self,
        url: impl Into<String>,
        visible: bool,
        media: &impl MediaElement,
    ) -> Result<Option<Attempt>, LoaderError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(LoaderError::EmptyUrl);
        }
        if url == self.url {
            return Ok(None);
        }
        self.cancel(media);
        self.url = url;
        Ok(self.on_visibility(visible, media))
    }

    /// Release the element: cancel any attempt, detach sources, reset to idle.
    pub fn unmount(&mut self, media: &impl MediaElement) {
        self.cancel(media);
        self.visible = false;
    }

    /// Fail a pending attempt that has outlived the configured timeout.
    /// Without a configured timeout this never fires.
    pub fn check_timeout(&mut self, now: Instant, media: &impl MediaElement) -> Option<LoadState> {
        let timeout = self.options.config.timeout()?;
        let started = self.started_at?;
        if now.saturating_duration_since(started) < timeout {
            return None;
        }
        media.clear_sources(self.element);
        let next = self.failure(format!("timed out after {} ms", timeout.as_millis()));
        self.settle();
        self.transition(next.clone());
        Some(next)
    }

    fn start(&mut self, media: &impl MediaElement) -> Attempt {
        let attempt = Attempt::fresh();
        let sources = source_candidates(
            &self.url,
            self.options.kind,
            self.options.quality,
            &self.options.config,
        );
        let preload = self
            .options
            .preload
            .unwrap_or_else(|| preload_for(self.options.quality, self.options.config.preload));

        media.set_preload(self.element, preload);
        media.set_sources(self.element, &sources);
        media.load(self.element);

        debug!(
            element = self.element.0,
            attempt = attempt.0,
            url = %self.url,
            candidates = sources.len(),
            preload = preload.as_str(),
            "load started"
        );
        self.active = Some(attempt);
        self.started_at = Some(Instant::now());
        self.transition(LoadState::Pending);
        attempt
    }

    fn cancel(&mut self, media: &impl MediaElement) {
        if self.state() != LoadState::Idle {
            media.clear_sources(self.element);
        }
        if let Some(attempt) = self.active {
            debug!(element = self.element.0, attempt = attempt.0, "load cancelled");
        }
        self.settle();
        self.transition(LoadState::Idle);
    }

    fn settle(&mut self) {
        self.active = None;
        self.started_at = None;
    }

    fn failure(&self, reason: String) -> LoadState {
        warn!(element = self.element.0, url = %self.url, %reason, "media load failed");
        LoadState::Failed(LoadFailure {
            url: self.url.clone(),
            reason,
        })
    }

    fn transition(&self, next: LoadState) {
        self.state.send_replace(next);
    }
}
