//! Media URL handling: normalization, extension parsing, and the ordered
//! source candidates assigned to an element.
//!
//! ## Normalization
//!
//! Catalog paths may be written relative (`photos/kitchen.jpg`). Anything
//! that is not already absolute gets a leading slash so it resolves from the
//! site root regardless of the current route:
//! - `photos/kitchen.jpg` → `/photos/kitchen.jpg`
//! - `/videos/GYM.mp4` → unchanged
//! - `https://cdn.example.com/a.mp4` → unchanged
//! - `data:image/svg+xml;base64,...` → unchanged
//!
//! ## Source Candidates
//!
//! A video is offered as several encodings in preference order, with the
//! catalog URL itself always last as the fallback. The quality tier selects
//! an optional filename suffix for pre-transcoded renditions:
//!
//! ```text
//! url = /videos/GYM.mp4, encodings = [webm, mp4], medium suffix = "-720p"
//!   /videos/GYM-720p.webm
//!   /videos/GYM-720p.mp4
//!   /videos/GYM.mp4
//! ```
//!
//! Images always get exactly one candidate.

use crate::config::LoaderConfig;
use crate::platform::{PreloadPolicy, SourceCandidate};
use crate::types::{MediaKind, QualityTier};

/// Extensions recognised as video containers.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "webm", "mov", "ogv"];

/// Extensions recognised as still images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "gif", "svg"];

/// A media URL split around its file extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUrl {
    /// Everything before the extension's dot.
    pub base: String,
    /// Lowercased extension without the dot, if the last path segment has one.
    pub extension: Option<String>,
    /// Query string and/or fragment, including the leading `?` or `#`.
    pub suffix: String,
}

/// Split a URL into base, extension, and query/fragment suffix.
///
/// Only the last path segment is inspected, so dots in directory or host
/// names are never mistaken for an extension:
/// - `"/videos/GYM.mp4"` → base `"/videos/GYM"`, extension `"mp4"`
/// - `"/v/clip.MP4?t=3"` → base `"/v/clip"`, extension `"mp4"`, suffix `"?t=3"`
/// - `"https://cdn.example.com/stream"` → no extension
/// - `"/videos/.hidden"` → no extension (leading dot is part of the name)
pub fn parse_media_url(url: &str) -> ParsedUrl {
    if url.starts_with("data:") {
        return ParsedUrl {
            base: url.to_string(),
            extension: None,
            suffix: String::new(),
        };
    }
    let split = url.find(['?', '#']).unwrap_or(url.len());
    let (path, suffix) = url.split_at(split);
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = segment_start + dot;
            ParsedUrl {
                base: path[..dot].to_string(),
                extension: Some(path[dot + 1..].to_ascii_lowercase()),
                suffix: suffix.to_string(),
            }
        }
        _ => ParsedUrl {
            base: path.to_string(),
            extension: None,
            suffix: suffix.to_string(),
        },
    }
}

/// Prefix relative paths with `/`. Absolute URLs and data URLs pass through.
pub fn normalize_path(url: &str) -> String {
    let url = url.trim();
    if url.is_empty()
        || url.starts_with('/')
        || url.starts_with("data:")
        || url.starts_with("blob:")
        || url.contains("://")
    {
        url.to_string()
    } else {
        format!("/{url}")
    }
}

/// MIME type hint for a (lowercase) extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "mp4" | "m4v" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        "mov" => Some("video/quicktime"),
        "ogv" => Some("video/ogg"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Infer the media kind from a URL's extension.
pub fn kind_for_url(url: &str) -> Option<MediaKind> {
    let ext = parse_media_url(url).extension?;
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else {
        None
    }
}

fn candidate(url: String) -> SourceCandidate {
    let mime = parse_media_url(&url)
        .extension
        .and_then(|ext| mime_for_extension(&ext));
    SourceCandidate { url, mime }
}

/// Build the ordered source list for `url` at the given quality tier.
///
/// Duplicates are dropped, keeping the first (most preferred) occurrence.
pub fn source_candidates(
    url: &str,
    kind: MediaKind,
    tier: QualityTier,
    config: &LoaderConfig,
) -> Vec<SourceCandidate> {
    let normalized = normalize_path(url);
    if kind == MediaKind::Image {
        return vec![candidate(normalized)];
    }

    let parsed = parse_media_url(&normalized);
    let mut urls: Vec<String> = Vec::new();
    if parsed.extension.is_some() {
        let tier_suffix = config.tier_suffixes.for_tier(tier);
        for encoding in &config.encodings {
            urls.push(format!(
                "{}{}.{}{}",
                parsed.base, tier_suffix, encoding, parsed.suffix
            ));
        }
    }
    urls.push(normalized);

    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.clone()))
        .map(candidate)
        .collect()
}

/// Preload policy for a tier, unless the configuration pins one.
///
/// - `Low` → `none` (fetch nothing until playback is requested)
/// - `Medium` → `metadata`
/// - `High` → `auto`
pub fn preload_for(tier: QualityTier, pinned: Option<PreloadPolicy>) -> PreloadPolicy {
    if let Some(policy) = pinned {
        return policy;
    }
    match tier {
        QualityTier::Low => PreloadPolicy::None,
        QualityTier::Medium => PreloadPolicy::Metadata,
        QualityTier::High => PreloadPolicy::Auto,
    }
}

/// Preload policy for the overlay player, which the viewer has asked to see.
///
/// Never `none`: an element that fetches nothing never reports it can play.
/// Autoplay wants the whole resource; otherwise metadata is the floor.
pub fn overlay_preload(
    tier: QualityTier,
    pinned: Option<PreloadPolicy>,
    autoplay: bool,
) -> PreloadPolicy {
    if autoplay {
        return PreloadPolicy::Auto;
    }
    match preload_for(tier, pinned) {
        PreloadPolicy::None => PreloadPolicy::Metadata,
        policy => policy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierSuffixes;

    fn urls(candidates: &[SourceCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.url.as_str()).collect()
    }

    #[test]
    fn parse_simple_path() {
        let p = parse_media_url("/videos/GYM.mp4");
        assert_eq!(p.base, "/videos/GYM");
        assert_eq!(p.extension.as_deref(), Some("mp4"));
        assert_eq!(p.suffix, "");
    }

    #[test]
    fn parse_keeps_query_and_lowercases_extension() {
        let p = parse_media_url("/v/clip.MP4?t=3#start");
        assert_eq!(p.base, "/v/clip");
        assert_eq!(p.extension.as_deref(), Some("mp4"));
        assert_eq!(p.suffix, "?t=3#start");
    }

    #[test]
    fn parse_ignores_dots_outside_last_segment() {
        let p = parse_media_url("https://cdn.example.com/stream");
        assert_eq!(p.extension, None);
        assert_eq!(p.base, "https://cdn.example.com/stream");
    }

    #[test]
    fn parse_leading_dot_is_not_an_extension() {
        assert_eq!(parse_media_url("/videos/.hidden").extension, None);
    }

    #[test]
    fn parse_data_url_is_opaque() {
        let p = parse_media_url("data:image/svg+xml;base64,AAAA");
        assert_eq!(p.extension, None);
        assert_eq!(p.base, "data:image/svg+xml;base64,AAAA");
    }

    #[test]
    fn normalize_adds_leading_slash_to_relative_paths() {
        assert_eq!(
            normalize_path("01-channel-flagship-store.jpg"),
            "/01-channel-flagship-store.jpg"
        );
        assert_eq!(normalize_path("/videos/GYM.mp4"), "/videos/GYM.mp4");
        assert_eq!(
            normalize_path("https://images.pexels.com/photos/1.jpeg"),
            "https://images.pexels.com/photos/1.jpeg"
        );
        assert_eq!(normalize_path("data:image/png;base64,AA"), "data:image/png;base64,AA");
    }

    #[test]
    fn kind_inferred_from_extension() {
        assert_eq!(kind_for_url("/videos/dbre.mp4"), Some(MediaKind::Video));
        assert_eq!(kind_for_url("/a/b.WEBM"), Some(MediaKind::Video));
        assert_eq!(kind_for_url("photo.jpeg"), Some(MediaKind::Image));
        assert_eq!(kind_for_url("/doc.pdf"), None);
        assert_eq!(kind_for_url("/noext"), None);
    }

    #[test]
    fn video_candidates_prefer_configured_encodings() {
        let config = LoaderConfig::default();
        let c = source_candidates("/videos/GYM.mp4", MediaKind::Video, QualityTier::High, &config);
        assert_eq!(urls(&c), vec!["/videos/GYM.webm", "/videos/GYM.mp4"]);
        assert_eq!(c[0].mime, Some("video/webm"));
        assert_eq!(c[1].mime, Some("video/mp4"));
    }

    #[test]
    fn video_candidates_apply_tier_suffix_and_keep_fallback() {
        let config = LoaderConfig {
            tier_suffixes: TierSuffixes {
                low: "-480p".into(),
                medium: "-720p".into(),
                high: String::new(),
            },
            ..LoaderConfig::default()
        };
        let c = source_candidates(
            "videos/Modular Kitchen.mp4",
            MediaKind::Video,
            QualityTier::Medium,
            &config,
        );
        assert_eq!(
            urls(&c),
            vec![
                "/videos/Modular Kitchen-720p.webm",
                "/videos/Modular Kitchen-720p.mp4",
                "/videos/Modular Kitchen.mp4",
            ]
        );
    }

    #[test]
    fn video_without_extension_gets_single_candidate() {
        let config = LoaderConfig::default();
        let c = source_candidates(
            "https://cdn.example.com/stream",
            MediaKind::Video,
            QualityTier::High,
            &config,
        );
        assert_eq!(urls(&c), vec!["https://cdn.example.com/stream"]);
        assert_eq!(c[0].mime, None);
    }

    #[test]
    fn image_gets_exactly_one_candidate() {
        let config = LoaderConfig::default();
        let c = source_candidates("kitchen.jpg", MediaKind::Image, QualityTier::Low, &config);
        assert_eq!(urls(&c), vec!["/kitchen.jpg"]);
        assert_eq!(c[0].mime, Some("image/jpeg"));
    }

    #[test]
    fn overlay_preload_never_fetches_nothing() {
        assert_eq!(overlay_preload(QualityTier::Low, None, true), PreloadPolicy::Auto);
        assert_eq!(overlay_preload(QualityTier::Low, None, false), PreloadPolicy::Metadata);
        assert_eq!(
            overlay_preload(QualityTier::High, Some(PreloadPolicy::None), false),
            PreloadPolicy::Metadata
        );
        assert_eq!(overlay_preload(QualityTier::High, None, false), PreloadPolicy::Auto);
    }

    #[test]
    fn preload_follows_tier_unless_pinned() {
        assert_eq!(preload_for(QualityTier::Low, None), PreloadPolicy::None);
        assert_eq!(preload_for(QualityTier::Medium, None), PreloadPolicy::Metadata);
        assert_eq!(preload_for(QualityTier::High, None), PreloadPolicy::Auto);
        assert_eq!(
            preload_for(QualityTier::High, Some(PreloadPolicy::Metadata)),
            PreloadPolicy::Metadata
        );
    }
}
