//! Parameter types exchanged with the host platform.
//!
//! These structs describe *what* the pipeline asks of the host (observe this
//! element with these options, assign these sources, capture a frame at this
//! time) and what the host reports back (intersection entries, connection
//! snapshots, decoded frames). They are the interface between the pipeline
//! components and the [`backend`](super::backend) traits, which lets tests
//! swap the host for a recording mock.
//!
//! ## Types
//!
//! - [`ElementId`] / [`ObserverId`]: opaque handles issued by the host.
//! - [`Threshold`]: intersection ratio in `[0, 1]`. Clamped on construction.
//! - [`RootMargin`]: CSS-style offset list grown around the viewport.
//! - [`ObserveOptions`]: margin + threshold for one observation.
//! - [`IntersectionEntry`]: one intersection callback from the host.
//! - [`PreloadPolicy`]: how eagerly the element may fetch once sources are set.
//! - [`SourceCandidate`]: one `<source>`-style entry, in preference order.
//! - [`ConnectionInfo`]: effective link type + data-saver flag.
//! - [`VideoMetadata`] / [`Frame`]: results of off-screen poster capture.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Handle of a mounted, measurable UI element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u64);

/// Handle of a live intersection observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Visible fraction of an element required to count as intersecting (0.0-1.0).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(0.1)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MarginParseError {
    #[error("root margin is empty")]
    Empty,
    #[error("invalid root margin component: {0:?}")]
    InvalidComponent(String),
    #[error("root margin takes 1 to 4 components, got {0}")]
    TooManyComponents(usize),
}

/// Offsets (in CSS pixels) that grow or shrink the viewport before
/// intersection is computed. Positive values trigger earlier.
///
/// Parsed with CSS shorthand rules:
/// - `"200px"` → all four sides
/// - `"10px 20px"` → vertical, horizontal
/// - `"10px 20px 30px"` → top, horizontal, bottom
/// - `"1px 2px 3px 4px"` → top, right, bottom, left
///
/// A bare `0` is accepted without a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RootMargin {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

impl RootMargin {
    pub fn uniform(px: i32) -> Self {
        Self {
            top: px,
            right: px,
            bottom: px,
            left: px,
        }
    }
}

fn parse_margin_component(raw: &str) -> Result<i32, MarginParseError> {
    if raw == "0" {
        return Ok(0);
    }
    raw.strip_suffix("px")
        .and_then(|n| n.parse::<i32>().ok())
        .ok_or_else(|| MarginParseError::InvalidComponent(raw.to_string()))
}

impl FromStr for RootMargin {
    type Err = MarginParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split_whitespace()
            .map(parse_margin_component)
            .collect::<Result<Vec<_>, _>>()?;
        match parts.as_slice() {
            [] => Err(MarginParseError::Empty),
            [all] => Ok(Self::uniform(*all)),
            [v, h] => Ok(Self {
                top: *v,
                right: *h,
                bottom: *v,
                left: *h,
            }),
            [t, h, b] => Ok(Self {
                top: *t,
                right: *h,
                bottom: *b,
                left: *h,
            }),
            [t, r, b, l] => Ok(Self {
                top: *t,
                right: *r,
                bottom: *b,
                left: *l,
            }),
            _ => Err(MarginParseError::TooManyComponents(parts.len())),
        }
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}px {}px {}px {}px",
            self.top, self.right, self.bottom, self.left
        )
    }
}

/// Options for a single intersection observation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObserveOptions {
    pub root_margin: RootMargin,
    pub threshold: Threshold,
}

/// One intersection callback delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    pub observer: ObserverId,
    pub element: ElementId,
    pub is_intersecting: bool,
    /// Visible fraction of the element, 0.0-1.0.
    pub ratio: f32,
}

/// How much of a media resource the element may fetch before playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadPolicy {
    None,
    Metadata,
    Auto,
}

impl PreloadPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Metadata => "metadata",
            Self::Auto => "auto",
        }
    }
}

/// One playable source, assigned to an element in preference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub url: String,
    /// MIME type hint, e.g. `video/webm`. `None` when the extension is unknown.
    pub mime: Option<&'static str>,
}

/// Snapshot of the client's network characteristics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionInfo {
    /// Effective link type as reported by the host (`"4g"`, `"3g"`, `"2g"`, `"slow-2g"`).
    pub effective_type: Option<String>,
    /// Whether the user asked for reduced data usage.
    pub save_data: bool,
}

/// Metadata available once an off-screen video has loaded enough to seek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoMetadata {
    /// Duration in seconds. May be non-finite for live or unknown streams.
    pub duration: f64,
}

/// A decoded still frame as tightly packed 8-bit RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}
