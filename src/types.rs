//! Shared types used across the pipeline components.
//!
//! These are the values every component agrees on: what an asset is, which
//! quality bucket the session is in. They are plain data, cheap to clone,
//! and serializable so the CLI can print them as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an asset is played or merely shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Image => write!(f, "image"),
        }
    }
}

/// Discrete bucket of acceptable media bitrate/resolution for the current
/// network conditions. Ordered `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityTier::Low => write!(f, "low"),
            QualityTier::Medium => write!(f, "medium"),
            QualityTier::High => write!(f, "high"),
        }
    }
}

/// One entry of the static portfolio catalog.
///
/// Immutable once loaded. Video assets open the overlay player when
/// selected; image assets are inert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: u32,
    pub title: String,
    /// Filter bucket, e.g. `residential` or `commercial`.
    pub category: String,
    /// Fetchable URL of the media itself.
    pub url: String,
    pub kind: MediaKind,
    /// Grid still shown in place of the video, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl MediaAsset {
    pub fn is_playable(&self) -> bool {
        self.kind == MediaKind::Video
    }

    /// URL of the still shown in the grid tile: the thumbnail for videos that
    /// have one, the image itself for image assets. Blank URLs count as none.
    pub fn grid_still(&self) -> Option<&str> {
        let still = match self.kind {
            MediaKind::Image => Some(self.url.as_str()),
            MediaKind::Video => self.thumbnail.as_deref(),
        };
        still.filter(|url| !url.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(kind: MediaKind, thumbnail: Option<&str>) -> MediaAsset {
        MediaAsset {
            id: 1,
            title: "Gym".into(),
            category: "commercial".into(),
            url: "/videos/GYM.mp4".into(),
            kind,
            thumbnail: thumbnail.map(String::from),
        }
    }

    #[test]
    fn quality_tiers_are_ordered() {
        assert!(QualityTier::Low < QualityTier::Medium);
        assert!(QualityTier::Medium < QualityTier::High);
    }

    #[test]
    fn quality_tier_serializes_lowercase() {
        let json = serde_json::to_string(&QualityTier::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        assert_eq!(QualityTier::High.to_string(), "high");
    }

    #[test]
    fn only_videos_are_playable() {
        assert!(asset(MediaKind::Video, None).is_playable());
        assert!(!asset(MediaKind::Image, None).is_playable());
    }

    #[test]
    fn grid_still_prefers_thumbnail_for_video() {
        assert_eq!(
            asset(MediaKind::Video, Some("/img/gym.jpg")).grid_still(),
            Some("/img/gym.jpg")
        );
        assert_eq!(asset(MediaKind::Video, None).grid_still(), None);
        assert_eq!(
            asset(MediaKind::Image, Some("/ignored.jpg")).grid_still(),
            Some("/videos/GYM.mp4")
        );
    }

    #[test]
    fn blank_thumbnail_is_no_still() {
        assert_eq!(asset(MediaKind::Video, Some("  ")).grid_still(), None);
        assert_eq!(asset(MediaKind::Video, Some("")).grid_still(), None);
    }
}
