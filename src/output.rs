//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every asset leads with its id and title; URLs and kind are indented
//! context lines underneath. This keeps `list` output readable as a
//! portfolio inventory while still showing exactly what would be fetched.
//!
//! # Output Format
//!
//! ## Catalog
//!
//! ```text
//! Assets (commercial)
//! 003 Mobile Store Design in Pathsala [video]
//!     Source: /videos/pathshala.mp4
//!     Still: /01-channel-flagship-interior-store-bangalore-1-720x395.jpg
//! 007 Luxury GYM Design in Guwahati [video]
//!     Source: /videos/GYM.mp4
//!
//! Categories: residential, commercial, residential2
//! ```
//!
//! ## Tier
//!
//! ```text
//! Connection: 3g
//! Tier: medium
//!     Preload: metadata
//!     Sources: /videos/clip.webm, /videos/clip.mp4
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::config::ReelConfig;
use crate::gallery::CategoryFilter;
use crate::platform::{ConnectionInfo, SourceCandidate};
use crate::sources::{normalize_path, preload_for, source_candidates};
use crate::types::{MediaAsset, MediaKind, QualityTier};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format an asset id as 3-digit zero-padded.
fn format_index(id: u32) -> String {
    format!("{:0>3}", id)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Asset header: id, title, kind.
///
/// ```text
/// 007 Luxury GYM Design in Guwahati [video]
/// ```
fn asset_header(asset: &MediaAsset) -> String {
    format!("{} {} [{}]", format_index(asset.id), asset.title, asset.kind)
}

fn join_urls(candidates: &[SourceCandidate]) -> String {
    candidates
        .iter()
        .map(|c| c.url.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Catalog
// ============================================================================

/// Format the filtered asset list followed by the catalog's categories.
pub fn format_catalog(
    assets: &[&MediaAsset],
    filter: &CategoryFilter,
    categories: &[&str],
) -> Vec<String> {
    let mut lines = vec![format!("Assets ({filter})")];
    if assets.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for asset in assets {
        lines.push(asset_header(asset));
        lines.push(format!("{}Source: {}", indent(1), normalize_path(&asset.url)));
        if asset.kind == MediaKind::Video
            && let Some(still) = asset.grid_still()
        {
            lines.push(format!("{}Still: {}", indent(1), normalize_path(still)));
        }
    }
    lines.push(String::new());
    lines.push(format!("Categories: {}", categories.join(", ")));
    lines
}

pub fn print_catalog(assets: &[&MediaAsset], filter: &CategoryFilter, categories: &[&str]) {
    for line in format_catalog(assets, filter, categories) {
        println!("{}", line);
    }
}

// ============================================================================
// Config
// ============================================================================

/// One line per config section, as resolved.
pub fn format_config(config: &ReelConfig) -> Vec<String> {
    let v = &config.visibility;
    let l = &config.loader;
    let p = &config.poster;
    let pb = &config.playback;

    let margin = v
        .root_margin()
        .map(|m| m.to_string())
        .unwrap_or_else(|_| v.root_margin.clone());
    let preload = l.preload.map_or("by tier", |p| p.as_str());
    let timeout = l
        .timeout_ms
        .map_or_else(|| "none".to_string(), |ms| format!("{ms} ms"));

    vec![
        "Config".to_string(),
        format!(
            "{}Visibility: margin {}, threshold {}, {}",
            indent(1),
            margin,
            v.threshold,
            if v.once { "once" } else { "continuous" }
        ),
        format!(
            "{}Loader: encodings {}, preload {}, timeout {}",
            indent(1),
            l.encodings.join(", "),
            preload,
            timeout
        ),
        format!("{}Quality: fallback {}", indent(1), config.quality.fallback_tier),
        format!(
            "{}Poster: at min({}s, {}%), JPEG q{}, max {}px",
            indent(1),
            p.max_seek_secs,
            p.seek_fraction * 100.0,
            p.quality,
            p.max_width
        ),
        format!(
            "{}Playback: autoplay {}, muted {}, loop {}, hidden {:?}",
            indent(1),
            on_off(pb.autoplay),
            on_off(pb.muted),
            on_off(pb.looping),
            pb.hidden_policy
        ),
    ]
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

pub fn print_config(config: &ReelConfig) {
    for line in format_config(config) {
        println!("{}", line);
    }
}

// ============================================================================
// Tier
// ============================================================================

/// Describe a connection snapshot, its tier, and what a video would load at
/// that tier.
pub fn format_tier(
    info: Option<&ConnectionInfo>,
    tier: QualityTier,
    sample_url: &str,
    config: &ReelConfig,
) -> Vec<String> {
    let connection = match info {
        None => "unavailable (fallback)".to_string(),
        Some(info) => {
            let link = info.effective_type.as_deref().unwrap_or("unknown");
            if info.save_data {
                format!("{link} (data saver on)")
            } else {
                link.to_string()
            }
        }
    };
    let candidates = source_candidates(sample_url, MediaKind::Video, tier, &config.loader);
    vec![
        format!("Connection: {connection}"),
        format!("Tier: {tier}"),
        format!(
            "{}Preload: {}",
            indent(1),
            preload_for(tier, config.loader.preload).as_str()
        ),
        format!("{}Sources: {}", indent(1), join_urls(&candidates)),
    ]
}

pub fn print_tier(
    info: Option<&ConnectionInfo>,
    tier: QualityTier,
    sample_url: &str,
    config: &ReelConfig,
) {
    for line in format_tier(info, tier, sample_url, config) {
        println!("{}", line);
    }
}

// ============================================================================
// Poster
// ============================================================================

/// Summary of an encoded poster written to `output`.
///
/// ```text
/// Poster kitchen.jpg (1920x1080)
///     Encoded: 48213 bytes
///     Written: kitchen.poster.txt
/// ```
pub fn format_poster(
    source: &Path,
    dimensions: (u32, u32),
    data_url: &str,
    output: &Path,
) -> Vec<String> {
    let name = source
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string());
    vec![
        format!("Poster {} ({}x{})", name, dimensions.0, dimensions.1),
        format!("{}Encoded: {} bytes", indent(1), data_url.len()),
        format!("{}Written: {}", indent(1), output.display()),
    ]
}

pub fn print_poster(source: &Path, dimensions: (u32, u32), data_url: &str, output: &Path) {
    for line in format_poster(source, dimensions, data_url, output) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TierSuffixes;
    use crate::test_helpers::*;

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn index_is_zero_padded() {
        assert_eq!(format_index(7), "007");
        assert_eq!(format_index(1234), "1234");
    }

    #[test]
    fn indent_four_spaces_per_level() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    #[test]
    fn catalog_lists_filtered_assets() {
        let catalog = fixture_catalog();
        let filter = CategoryFilter::parse("residential2");
        let assets: Vec<&MediaAsset> =
            catalog.assets().iter().filter(|a| filter.matches(a)).collect();
        let lines = format_catalog(&assets, &filter, &catalog.categories());

        assert_eq!(
            lines,
            vec![
                "Assets (residential2)",
                "005 Full Modular Kitchen in Golaghat [video]",
                "    Source: /videos/Modular Kitchen.mp4",
                "    Still: https://images.pexels.com/photos/1571460/pexels-photo-1571460.jpeg",
                "",
                "Categories: residential, commercial, residential2",
            ]
        );
    }

    #[test]
    fn image_assets_have_no_still_line() {
        let catalog = fixture_catalog();
        let image = catalog.get(10).unwrap();
        let lines = format_catalog(&[image], &CategoryFilter::All, &[]);
        assert_eq!(lines[1], "010 Living Room Before and After [image]");
        assert!(!lines.iter().any(|l| l.contains("Still:")));
    }

    #[test]
    fn empty_catalog_says_none() {
        let lines = format_catalog(&[], &CategoryFilter::parse("x"), &[]);
        assert_eq!(lines[0], "Assets (x)");
        assert_eq!(lines[1], "    (none)");
    }

    // =========================================================================
    // Config
    // =========================================================================

    #[test]
    fn config_summary_of_defaults() {
        let lines = format_config(&ReelConfig::default());
        assert_eq!(lines[0], "Config");
        assert_eq!(
            lines[1],
            "    Visibility: margin 200px 200px 200px 200px, threshold 0.01, once"
        );
        assert_eq!(
            lines[2],
            "    Loader: encodings webm, mp4, preload by tier, timeout none"
        );
        assert_eq!(lines[3], "    Quality: fallback medium");
        assert!(lines[5].contains("hidden Continue"));
    }

    // =========================================================================
    // Tier
    // =========================================================================

    #[test]
    fn tier_output_shows_sources() {
        let mut config = ReelConfig::default();
        config.loader.tier_suffixes = TierSuffixes {
            low: "-480p".into(),
            ..TierSuffixes::default()
        };
        let info = ConnectionInfo {
            effective_type: Some("2g".into()),
            save_data: false,
        };
        let lines = format_tier(Some(&info), QualityTier::Low, "/videos/GYM.mp4", &config);
        assert_eq!(
            lines,
            vec![
                "Connection: 2g",
                "Tier: low",
                "    Preload: none",
                "    Sources: /videos/GYM-480p.webm, /videos/GYM-480p.mp4, /videos/GYM.mp4",
            ]
        );
    }

    #[test]
    fn tier_output_without_connection_info() {
        let lines = format_tier(None, QualityTier::Medium, "/v.mp4", &ReelConfig::default());
        assert_eq!(lines[0], "Connection: unavailable (fallback)");
        assert_eq!(lines[2], "    Preload: metadata");
    }

    #[test]
    fn tier_output_marks_data_saver() {
        let info = ConnectionInfo {
            effective_type: Some("4g".into()),
            save_data: true,
        };
        let lines = format_tier(Some(&info), QualityTier::Medium, "/v.mp4", &ReelConfig::default());
        assert_eq!(lines[0], "Connection: 4g (data saver on)");
    }

    // =========================================================================
    // Poster
    // =========================================================================

    #[test]
    fn poster_summary() {
        let lines = format_poster(
            Path::new("/tmp/in/kitchen.jpg"),
            (1920, 1080),
            "data:image/jpeg;base64,AAAA",
            Path::new("kitchen.poster.txt"),
        );
        assert_eq!(
            lines,
            vec![
                "Poster kitchen.jpg (1920x1080)",
                "    Encoded: 27 bytes",
                "    Written: kitchen.poster.txt",
            ]
        );
    }
}
