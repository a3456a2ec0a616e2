//! Host platform traits and shared error type.
//!
//! The pipeline never touches a DOM, a decoder, or a network stack directly.
//! Everything it needs from the host is expressed by four traits:
//!
//! | Trait | Host capability |
//! |---|---|
//! | [`Viewport`] | intersection observation (observe / disconnect) |
//! | [`MediaElement`] | source assignment, load, play / pause / seek, mute / loop |
//! | [`NetworkInfo`] | effective connection type + data-saver snapshot |
//! | [`FrameSource`] | off-screen metadata load and frame capture (async) |
//!
//! Hosts report asynchronous outcomes (intersections, can-play, load errors)
//! by feeding events back into the owning component, so none of the traits
//! take callbacks. Implementations are passed in explicitly; there is no
//! ambient global connection or observer state.

use super::params::{
    ConnectionInfo, ElementId, Frame, ObserveOptions, ObserverId, PreloadPolicy,
    SourceCandidate, VideoMetadata,
};
use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("intersection observation is not available")]
    VisibilityUnavailable,
    #[error("connection information is not available")]
    ConnectionInfoUnavailable,
    #[error("media error: {0}")]
    Media(String),
    #[error("playback rejected: {0}")]
    PlaybackRejected(String),
    #[error("frame capture failed: {0}")]
    FrameCapture(String),
}

/// Intersection observation against the host viewport.
pub trait Viewport {
    /// Start observing `element`. The host reports changes as
    /// [`IntersectionEntry`](super::params::IntersectionEntry) values tagged
    /// with the returned observer id.
    fn observe(
        &self,
        element: ElementId,
        options: &ObserveOptions,
    ) -> Result<ObserverId, PlatformError>;

    /// Release an observation. Unknown or already released ids are ignored.
    fn disconnect(&self, observer: ObserverId);
}

/// A playable media element owned by the host.
pub trait MediaElement {
    fn set_preload(&self, element: ElementId, policy: PreloadPolicy);

    /// Replace the element's sources. Candidates are in preference order.
    fn set_sources(&self, element: ElementId, sources: &[SourceCandidate]);

    /// Issue the network request for the currently assigned sources.
    fn load(&self, element: ElementId);

    /// Detach all sources, aborting any in-flight fetch.
    fn clear_sources(&self, element: ElementId);

    fn play(&self, element: ElementId) -> Result<(), PlatformError>;

    fn pause(&self, element: ElementId);

    /// Move the playback position, in seconds.
    fn seek(&self, element: ElementId, position: f64);

    fn set_muted(&self, element: ElementId, muted: bool);

    fn set_loop(&self, element: ElementId, looping: bool);
}

/// Read-only view of the client's network characteristics.
pub trait NetworkInfo {
    /// Current snapshot, or [`PlatformError::ConnectionInfoUnavailable`] when
    /// the host exposes nothing.
    fn connection(&self) -> Result<ConnectionInfo, PlatformError>;
}

/// Off-screen video access used for poster derivation.
pub trait FrameSource {
    /// Open `url` without displaying it and resolve once metadata is known.
    fn open_metadata(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<VideoMetadata, PlatformError>>;

    /// Seek to `at` seconds and capture the displayed frame.
    fn capture_frame(&self, url: &str, at: f64)
    -> impl Future<Output = Result<Frame, PlatformError>>;
}

impl<T: FrameSource + ?Sized> FrameSource for &T {
    fn open_metadata(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<VideoMetadata, PlatformError>> {
        (**self).open_metadata(url)
    }

    fn capture_frame(&self, url: &str, at: f64)
    -> impl Future<Output = Result<Frame, PlatformError>> {
        (**self).capture_frame(url, at)
    }
}
