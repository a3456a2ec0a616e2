//! Pipeline configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. User values are
//! layered over stock defaults, so a config file only needs the keys it
//! wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [visibility]
//! root_margin = "200px"     # CSS-style margin grown around the viewport
//! threshold = 0.01          # Visible fraction that counts as "in view" (0-1)
//! once = true               # Stop observing after the first "in view"
//!
//! [loader]
//! # preload = "metadata"    # none | metadata | auto (omit: derived from tier)
//! encodings = ["webm", "mp4"]  # Preferred encodings, tried before the catalog URL
//! # timeout_ms = 15000      # Fail a pending load after this long (omit: never)
//!
//! [loader.tier_suffixes]
//! low = ""                  # Filename suffix of pre-transcoded renditions
//! medium = ""
//! high = ""
//!
//! [quality]
//! fallback_tier = "medium"  # Tier when the host reports no connection info
//!
//! [poster]
//! max_seek_secs = 1.0       # Poster frame is taken at min(max_seek_secs,
//! seek_fraction = 0.1       #   seek_fraction * duration)
//! quality = 80              # JPEG quality (1-100)
//! max_width = 640           # Downscale wider frames to this width
//!
//! [playback]
//! autoplay = true           # Start playing as soon as the overlay can play
//! muted = true
//! loop = false
//! hidden_policy = "continue"  # continue | pause | pause-and-resume
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::platform::{MarginParseError, PreloadPolicy, RootMargin};
use crate::playback::HiddenPolicy;
use crate::types::QualityTier;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the config file looked up in the config directory.
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Bad syntax, an unknown key, or a wrongly typed value in a config file.
    #[error("{}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `config.toml`.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReelConfig {
    /// When a mount point counts as visible.
    pub visibility: VisibilityConfig,
    /// Source candidates, preload policy, optional timeout.
    pub loader: LoaderConfig,
    /// Connection profiling.
    pub quality: QualityConfig,
    /// Poster frame derivation and encoding.
    pub poster: PosterConfig,
    /// Overlay player behaviour.
    pub playback: PlaybackConfig,
}

impl ReelConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.visibility.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Validation(
                "visibility.threshold must be 0-1".into(),
            ));
        }
        self.visibility.root_margin().map_err(|e| {
            ConfigError::Validation(format!("visibility.root_margin: {e}"))
        })?;
        if let Some(bad) = self
            .loader
            .encodings
            .iter()
            .find(|e| e.is_empty() || !e.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(ConfigError::Validation(format!(
                "loader.encodings entry {bad:?} must be a bare extension like \"webm\""
            )));
        }
        if self.loader.timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "loader.timeout_ms must be positive (omit it to disable)".into(),
            ));
        }
        let fraction = self.poster.seek_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::Validation(
                "poster.seek_fraction must be in (0, 1]".into(),
            ));
        }
        if !self.poster.max_seek_secs.is_finite() || self.poster.max_seek_secs < 0.0 {
            return Err(ConfigError::Validation(
                "poster.max_seek_secs must be a non-negative number".into(),
            ));
        }
        if self.poster.quality == 0 || self.poster.quality > 100 {
            return Err(ConfigError::Validation(
                "poster.quality must be 1-100".into(),
            ));
        }
        if self.poster.max_width == 0 {
            return Err(ConfigError::Validation(
                "poster.max_width must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Visibility sensing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisibilityConfig {
    /// CSS-style margin, e.g. `"200px"` or `"0px 100px"`.
    pub root_margin: String,
    /// Visible fraction (0-1) that counts as in view.
    pub threshold: f32,
    /// Report only the first transition to visible.
    pub once: bool,
}

impl VisibilityConfig {
    pub fn root_margin(&self) -> Result<RootMargin, MarginParseError> {
        self.root_margin.parse()
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            root_margin: "200px".to_string(),
            threshold: 0.01,
            once: true,
        }
    }
}

/// Media loading settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Pinned preload policy. When absent, derived from the quality tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preload: Option<PreloadPolicy>,
    /// Encodings offered before the catalog URL, most preferred first.
    pub encodings: Vec<String>,
    /// Move a pending load to failed after this many milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Per-tier filename suffix for pre-transcoded renditions.
    pub tier_suffixes: TierSuffixes,
}

impl LoaderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            preload: None,
            encodings: vec!["webm".to_string(), "mp4".to_string()],
            timeout_ms: None,
            tier_suffixes: TierSuffixes::default(),
        }
    }
}

/// Filename suffixes inserted before the extension, one per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierSuffixes {
    pub low: String,
    pub medium: String,
    pub high: String,
}

impl TierSuffixes {
    pub fn for_tier(&self, tier: QualityTier) -> &str {
        match tier {
            QualityTier::Low => &self.low,
            QualityTier::Medium => &self.medium,
            QualityTier::High => &self.high,
        }
    }
}

/// Connection profiling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Tier used when the host exposes no connection information.
    pub fallback_tier: QualityTier,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            fallback_tier: QualityTier::Medium,
        }
    }
}

/// Poster derivation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PosterConfig {
    /// Upper bound of the capture time, in seconds.
    pub max_seek_secs: f64,
    /// Capture time as a fraction of the duration, before the upper bound.
    pub seek_fraction: f64,
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Frames wider than this are downscaled, preserving aspect ratio.
    pub max_width: u32,
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self {
            max_seek_secs: 1.0,
            seek_fraction: 0.1,
            quality: 80,
            max_width: 640,
        }
    }
}

/// Overlay player settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    pub autoplay: bool,
    pub muted: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    /// What happens to a playing element that leaves the viewport.
    pub hidden_policy: HiddenPolicy,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            muted: true,
            looping: false,
            hidden_policy: HiddenPolicy::Continue,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a TOML table, the base layer user values merge onto.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ReelConfig::default()).expect("default config must serialize")
}

/// Merge `overlay` onto `base`, table by table. Overlay scalars and arrays
/// replace base values wholesale.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a user config file. A missing file is `Ok(None)`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ReelConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ReelConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load [`CONFIG_FILE`] from `dir` over the stock defaults.
///
/// Deserialization errors (unknown keys, wrong types) name the file they
/// came from.
pub fn load_config(dir: &Path) -> Result<ReelConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE);
    let overlay = load_raw_config(&path)?;
    let from_file = overlay.is_some();
    resolve_config(stock_defaults_value(), overlay).map_err(|e| match e {
        ConfigError::Toml(source) if from_file => ConfigError::Parse { path, source },
        other => other,
    })
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Showreel Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Visibility sensing
# ---------------------------------------------------------------------------
[visibility]
# Margin grown around the viewport before intersection is computed.
# CSS shorthand with px units: "200px", "0px 100px", "10px 0px 40px 0px".
# A positive margin starts loading media shortly before it scrolls into view.
root_margin = "200px"

# Fraction of the element (0-1) that must be inside the margin to count
# as visible. 0.01 means "any pixel".
threshold = 0.01

# Stop observing after the first time the element becomes visible.
# Set to false for signals that should follow the element in and out.
once = true

# ---------------------------------------------------------------------------
# Media loading
# ---------------------------------------------------------------------------
[loader]
# Pin the preload policy for grid stills: "none", "metadata" or "auto".
# When omitted, it follows the connection tier:
#   low -> none, medium -> metadata, high -> auto
# The overlay player never uses "none": it preloads "auto" with autoplay
# and at least "metadata" without.
# preload = "metadata"

# Encodings offered before the catalog URL, most preferred first.
# "/videos/a.mp4" becomes /videos/a.webm, /videos/a.mp4.
encodings = ["webm", "mp4"]

# Give up on a pending load after this many milliseconds.
# When omitted, a stalled load stays pending until retried.
# timeout_ms = 15000

[loader.tier_suffixes]
# Filename suffix of pre-transcoded renditions per connection tier,
# inserted before the extension: "-720p" turns a.mp4 into a-720p.webm.
low = ""
medium = ""
high = ""

# ---------------------------------------------------------------------------
# Connection profiling
# ---------------------------------------------------------------------------
[quality]
# Tier assumed when the browser exposes no connection information:
# "low", "medium" or "high".
fallback_tier = "medium"

# ---------------------------------------------------------------------------
# Poster frames
# ---------------------------------------------------------------------------
[poster]
# The poster frame is captured at min(max_seek_secs, seek_fraction * duration).
max_seek_secs = 1.0
seek_fraction = 0.1

# JPEG quality (1-100).
quality = 80

# Frames wider than this are downscaled before encoding.
max_width = 640

# ---------------------------------------------------------------------------
# Overlay player
# ---------------------------------------------------------------------------
[playback]
autoplay = true
muted = true
loop = false

# What a playing element does when it leaves the viewport:
#   "continue"          keep playing
#   "pause"             pause, stay paused
#   "pause-and-resume"  pause, resume when it comes back
hidden_policy = "continue"
"##
}
