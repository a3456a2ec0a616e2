//! # Showreel
//!
//! Visibility-gated, network-aware media delivery for a portfolio gallery.
//! Nothing is fetched until it is about to scroll into view, renditions are
//! chosen for the viewer's connection, and a still frame stands in for each
//! video until the real thing can play.
//!
//! # Architecture: Signals Between Small State Machines
//!
//! ```text
//!   Viewport ──intersection──▶ VisibilitySensor ──visible──▶ MediaLoader ──▶ MediaElement
//!                                                               ▲
//!   NetworkInfo ──▶ ConnectionProfiler ──tier───────────────────┘
//!
//!   FrameSource ──▶ PosterGenerator ──poster──┐
//!                                             ▼
//!   Gallery ──select/dismiss──▶ PlaybackController ──▶ MediaElement (overlay)
//! ```
//!
//! Every component is a plain struct driven by explicit calls. The host
//! (a browser shell, a native UI, a test) implements the traits in
//! [`platform`] and feeds its callbacks back in as events: intersection
//! entries, can-play/error outcomes tagged with the load attempt they belong
//! to, time updates. Components publish their state on
//! [`tokio::sync::watch`] channels so any number of observers can follow
//! along.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`visibility`] | Per-element visibility signal with once/continuous modes and degradation |
//! | [`profiler`] | Connection snapshot → `Low`/`Medium`/`High` quality tier |
//! | [`loader`] | `Idle → Pending → Ready/Failed` loading gated on visibility, with retry and cancellation |
//! | [`poster`] | Memoized still-frame derivation encoded as a JPEG data URL |
//! | [`playback`] | Overlay session lifecycle: open, autoplay, toggle, close |
//! | [`gallery`] | Category filter, lazy grid tiles, and overlay routing |
//! | [`sources`] | URL normalization and ordered source candidates per tier |
//! | [`catalog`] | `catalog.toml` loading and validation |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`platform`] | Host traits (`Viewport`, `MediaElement`, `NetworkInfo`, `FrameSource`) |
//! | [`types`] | Shared value types (`MediaAsset`, `QualityTier`, `MediaKind`) |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Events, Not Callbacks
//!
//! Host callbacks arrive late, out of order, or for work that was already
//! cancelled. Rather than registering closures, components hand out
//! generation tokens ([`loader::Attempt`], observer ids) and drop any event
//! whose token is no longer current. A URL change or unmount can never be
//! overwritten by a stale can-play.
//!
//! ## Degrade Toward Showing Media
//!
//! A host without intersection observation gets every element reported as
//! visible; a host without connection info gets the configured fallback
//! tier; a poster that cannot be derived becomes a grey placeholder. None of
//! these are errors to the caller.
//!
//! ## One Poster Derivation Per URL
//!
//! [`poster::PosterCache`] is shared by clone and keeps a
//! [`tokio::sync::OnceCell`] per URL, so concurrent requests for the same
//! video await a single off-screen capture. The gallery queues a
//! [`gallery::PosterRequest`] when a video opens or a thumbnail-less tile
//! scrolls into view; the host awaits it and hands the result back.

pub mod catalog;
pub mod config;
pub mod gallery;
pub mod loader;
pub mod output;
pub mod platform;
pub mod playback;
pub mod poster;
pub mod profiler;
pub mod sources;
pub mod types;
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_helpers;
