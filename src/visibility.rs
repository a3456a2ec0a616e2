//! Visibility sensing for a single mount point.
//!
//! A [`VisibilitySensor`] wraps one host element and turns the host's
//! intersection callbacks into a boolean "is this element within the margin
//! of the viewport" signal. The signal is published on a
//! [`tokio::sync::watch`] channel so any number of consumers can read the
//! latest value or await a change.
//!
//! ## Once vs. continuous
//!
//! With `once = true` (the default) the sensor disconnects its observer after
//! the first visible entry; the signal then stays `true` for the lifetime of
//! the mount. With `once = false` the signal follows the element in and out.
//!
//! ## Degradation
//!
//! If the host cannot observe intersections at all, the sensor reports the
//! element as visible immediately. Lazy loading is lost; media is never
//! withheld.

use crate::config::VisibilityConfig;
use crate::platform::{
    ElementId, IntersectionEntry, MarginParseError, ObserveOptions, ObserverId, PlatformError,
    RootMargin, Threshold, Viewport,
};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Options for one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityOptions {
    pub root_margin: RootMargin,
    pub threshold: Threshold,
    pub once: bool,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            root_margin: RootMargin::default(),
            threshold: Threshold::default(),
            once: true,
        }
    }
}

impl VisibilityOptions {
    pub fn from_config(config: &VisibilityConfig) -> Result<Self, MarginParseError> {
        Ok(Self {
            root_margin: config.root_margin()?,
            threshold: Threshold::new(config.threshold),
            once: config.once,
        })
    }

    fn observe_options(&self) -> ObserveOptions {
        ObserveOptions {
            root_margin: self.root_margin,
            threshold: self.threshold,
        }
    }
}

#[derive(Debug)]
pub struct VisibilitySensor {
    element: ElementId,
    options: VisibilityOptions,
    observer: Option<ObserverId>,
    /// Set once the sensor has settled for good (`once` fired, or degraded).
    settled: bool,
    signal: watch::Sender<bool>,
}

impl VisibilitySensor {
    pub fn new(element: ElementId, options: VisibilityOptions) -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            element,
            options,
            observer: None,
            settled: false,
            signal,
        }
    }

    pub fn element(&self) -> ElementId {
        self.element
    }

    pub fn options(&self) -> &VisibilityOptions {
        &self.options
    }

    pub fn is_visible(&self) -> bool {
        *self.signal.borrow()
    }

    /// Whether an observation is currently registered with the host.
    pub fn is_observing(&self) -> bool {
        self.observer.is_some()
    }

    /// Receiver for the visibility signal. Starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.signal.subscribe()
    }

    /// Start observing. No-op if already observing or settled.
    ///
    /// Returns `Some(true)` when the host cannot observe and the sensor
    /// degraded to always-visible; the caller should forward that like any
    /// other emitted value.
    pub fn attach(&mut self, viewport: &impl Viewport) -> Option<bool> {
        if self.observer.is_some() || self.settled {
            return None;
        }
        match viewport.observe(self.element, &self.options.observe_options()) {
            Ok(observer) => {
                debug!(element = self.element.0, observer = observer.0, "observing");
                self.observer = Some(observer);
                None
            }
            Err(PlatformError::VisibilityUnavailable) => {
                warn!(
                    element = self.element.0,
                    "intersection observation unavailable, treating element as visible"
                );
                self.settled = true;
                self.emit(true)
            }
            Err(e) => {
                warn!(element = self.element.0, error = %e, "observe failed, treating element as visible");
                self.settled = true;
                self.emit(true)
            }
        }
    }

    /// Feed one host intersection callback. Returns the new value if the
    /// signal changed.
    ///
    /// Entries from an observer other than the current one (released by
    /// `detach`, or replaced by a remount) are ignored.
    pub fn on_intersection(
        &mut self,
        entry: &IntersectionEntry,
        viewport: &impl Viewport,
    ) -> Option<bool> {
        if self.observer != Some(entry.observer) || entry.element != self.element {
            debug!(
                element = self.element.0,
                observer = entry.observer.0,
                "ignoring intersection from stale observer"
            );
            return None;
        }

        let intersecting =
            entry.is_intersecting && entry.ratio >= self.options.threshold.value();

        if intersecting {
            if self.options.once {
                self.release(viewport);
                self.settled = true;
            }
            self.emit(true)
        } else if !self.options.once {
            self.emit(false)
        } else {
            None
        }
    }

    /// Release the observation (unmount). The last value persists.
    pub fn detach(&mut self, viewport: &impl Viewport) {
        self.release(viewport);
    }

    /// Reset and observe again, as when the element is mounted anew.
    pub fn remount(&mut self, viewport: &impl Viewport) -> Option<bool> {
        self.release(viewport);
        self.settled = false;
        self.emit(false);
        self.attach(viewport)
    }

    fn release(&mut self, viewport: &impl Viewport) {
        if let Some(observer) = self.observer.take() {
            viewport.disconnect(observer);
        }
    }

    fn emit(&self, value: bool) -> Option<bool> {
        let changed = self.signal.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
        changed.then_some(value)
    }
}
