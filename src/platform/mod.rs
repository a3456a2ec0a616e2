//! Host platform seam.
//!
//! | Concern | Trait | Reported back as |
//! |---|---|---|
//! | **Visibility** | [`Viewport`] | [`IntersectionEntry`] |
//! | **Media loading / playback** | [`MediaElement`] | [`MediaEvent`](crate::loader::MediaEvent) |
//! | **Network profile** | [`NetworkInfo`] | polled on change notifications |
//! | **Poster capture** | [`FrameSource`] | awaited |
//!
//! The module is split into:
//! - **Backend**: the four traits + [`PlatformError`] (and, under test, a
//!   recording mock)
//! - **Parameters**: the plain data handed across the seam

pub mod backend;
mod params;

pub use backend::{FrameSource, MediaElement, NetworkInfo, PlatformError, Viewport};
pub use params::{
    ConnectionInfo, ElementId, Frame, IntersectionEntry, MarginParseError, ObserveOptions,
    ObserverId, PreloadPolicy, RootMargin, SourceCandidate, Threshold, VideoMetadata,
};
