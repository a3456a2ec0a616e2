//! Poster derivation: a still frame from a video, encoded as a data URL.
//!
//! ```text
//! get_poster(url)
//!   ├─ cache hit ─────────────────────────────▶ Poster
//!   └─ miss → open_metadata → capture_frame(t) → downscale → JPEG → base64
//!             t = min(max_seek_secs, seek_fraction × duration)
//! ```
//!
//! Derivations are memoized per URL in a [`PosterCache`]. The cache holds one
//! [`tokio::sync::OnceCell`] per URL; the cell doubles as the in-flight
//! marker, so concurrent callers for the same URL await the first caller's
//! derivation instead of starting their own.
//!
//! Derivation never fails from the caller's point of view. Any error along
//! the way is logged and resolves to [`Poster::Placeholder`], which is cached
//! like any other outcome for the rest of the session.

use crate::config::PosterConfig;
use crate::platform::{Frame, FrameSource, PlatformError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Neutral grey SVG shown while no real still is available.
pub const PLACEHOLDER_SRC: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iMTAwJSIgaGVpZ2h0PSIxMDAlIiB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciPjxyZWN0IHdpZHRoPSIxMDAlIiBoZWlnaHQ9IjEwMCUiIGZpbGw9IiNlZWVlZWUiLz48L3N2Zz4=";

#[derive(Error, Debug)]
pub enum PosterError {
    #[error("frame buffer of {len} bytes does not match {width}x{height} RGBA")]
    InvalidFrame { width: u32, height: u32, len: usize },
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poster {
    /// A `data:image/jpeg;base64,` URL.
    Image(Arc<str>),
    Placeholder,
}

impl Poster {
    /// Value for an `src`/`poster` attribute.
    pub fn src(&self) -> &str {
        match self {
            Poster::Image(url) => url,
            Poster::Placeholder => PLACEHOLDER_SRC,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Poster::Placeholder)
    }
}

/// Capture and encoding parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosterOptions {
    pub max_seek_secs: f64,
    pub seek_fraction: f64,
    pub quality: u8,
    pub max_width: u32,
}

impl Default for PosterOptions {
    fn default() -> Self {
        Self::from(&PosterConfig::default())
    }
}

impl From<&PosterConfig> for PosterOptions {
    fn from(config: &PosterConfig) -> Self {
        Self {
            max_seek_secs: config.max_seek_secs,
            seek_fraction: config.seek_fraction,
            quality: config.quality,
            max_width: config.max_width,
        }
    }
}

/// Capture position for a video of `duration` seconds.
///
/// Unknown (NaN, infinite) or non-positive durations capture the first frame.
pub fn capture_time(duration: f64, options: &PosterOptions) -> f64 {
    if !duration.is_finite() || duration <= 0.0 {
        return 0.0;
    }
    (options.seek_fraction * duration).min(options.max_seek_secs)
}

/// Encode an RGBA frame as a JPEG data URL, downscaling to `max_width`.
pub fn encode_poster(frame: &Frame, options: &PosterOptions) -> Result<String, PosterError> {
    let invalid = || PosterError::InvalidFrame {
        width: frame.width,
        height: frame.height,
        len: frame.rgba.len(),
    };
    if frame.width == 0 || frame.height == 0 {
        return Err(invalid());
    }
    let raster =
        RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()).ok_or_else(invalid)?;

    let mut img = DynamicImage::ImageRgba8(raster);
    if options.max_width > 0 && img.width() > options.max_width {
        let height = (u64::from(img.height()) * u64::from(options.max_width)
            / u64::from(img.width()))
        .max(1) as u32;
        img = img.resize_exact(options.max_width, height, FilterType::Lanczos3);
    }
    let rgb = img.to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, options.quality.clamp(1, 100)).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)))
}

/// Session-wide poster memo, shared by cloning.
#[derive(Debug, Clone, Default)]
pub struct PosterCache {
    slots: Arc<Mutex<HashMap<String, Arc<OnceCell<Poster>>>>>,
}

impl PosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settled poster for `url`, if any.
    pub fn get(&self, url: &str) -> Option<Poster> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(url).and_then(|cell| cell.get().cloned())
    }

    /// Whether a derivation for `url` has started but not settled.
    pub fn is_in_flight(&self, url: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(url).is_some_and(|cell| !cell.initialized())
    }

    /// Number of settled entries.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, url: &str) -> Arc<OnceCell<Poster>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(url.to_string()).or_default().clone()
    }
}

pub struct PosterGenerator<F> {
    frames: F,
    cache: PosterCache,
    options: PosterOptions,
}

impl<F: FrameSource> PosterGenerator<F> {
    pub fn new(frames: F, cache: PosterCache, options: PosterOptions) -> Self {
        Self {
            frames,
            cache,
            options,
        }
    }

    pub fn cache(&self) -> &PosterCache {
        &self.cache
    }

    /// Poster for `url`, derived at most once per cache.
    pub async fn get_poster(&self, url: &str) -> Poster {
        let slot = self.cache.slot(url);
        if let Some(poster) = slot.get() {
            debug!(url, "poster cache hit");
            return poster.clone();
        }
        slot.get_or_init(|| async {
            match self.derive(url).await {
                Ok(data_url) => {
                    info!(url, bytes = data_url.len(), "poster derived");
                    Poster::Image(Arc::from(data_url))
                }
                Err(e) => {
                    warn!(url, error = %e, "poster derivation failed, using placeholder");
                    Poster::Placeholder
                }
            }
        })
        .await
        .clone()
    }

    async fn derive(&self, url: &str) -> Result<String, PosterError> {
        let metadata = self.frames.open_metadata(url).await?;
        let at = capture_time(metadata.duration, &self.options);
        debug!(url, duration = metadata.duration, at, "capturing poster frame");
        let frame = self.frames.capture_frame(url, at).await?;
        encode_poster(&frame, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::backend::tests::{MockPlatform, RecordedOp, solid_frame};
    use std::sync::atomic::Ordering;

    fn decode(data_url: &str) -> image::DynamicImage {
        let payload = data_url
            .strip_prefix("data:image/jpeg;base64,")
            .expect("not a JPEG data URL");
        let bytes = STANDARD.decode(payload).unwrap();
        image::load_from_memory_with_format(&bytes, image::ImageFormat::Jpeg).unwrap()
    }

    // =========================================================================
    // capture_time
    // =========================================================================

    #[test]
    fn short_video_captures_at_ten_percent() {
        let t = capture_time(5.0, &PosterOptions::default());
        assert!((t - 0.5).abs() < 1e-9);
    }

    #[test]
    fn long_video_capped_at_max_seek() {
        assert_eq!(capture_time(120.0, &PosterOptions::default()), 1.0);
    }

    #[test]
    fn unknown_duration_captures_first_frame() {
        let opts = PosterOptions::default();
        assert_eq!(capture_time(f64::NAN, &opts), 0.0);
        assert_eq!(capture_time(f64::INFINITY, &opts), 0.0);
        assert_eq!(capture_time(0.0, &opts), 0.0);
        assert_eq!(capture_time(-3.0, &opts), 0.0);
    }

    // =========================================================================
    // encode_poster
    // =========================================================================

    #[test]
    fn encodes_jpeg_data_url() {
        let url = encode_poster(&solid_frame(64, 36), &PosterOptions::default()).unwrap();
        let img = decode(&url);
        assert_eq!((img.width(), img.height()), (64, 36));
    }

    #[test]
    fn wide_frames_are_downscaled_preserving_aspect() {
        let opts = PosterOptions {
            max_width: 32,
            ..PosterOptions::default()
        };
        let url = encode_poster(&solid_frame(128, 72), &opts).unwrap();
        let img = decode(&url);
        assert_eq!((img.width(), img.height()), (32, 18));
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let frame = Frame {
            width: 10,
            height: 10,
            rgba: vec![0; 12],
        };
        assert!(matches!(
            encode_poster(&frame, &PosterOptions::default()),
            Err(PosterError::InvalidFrame { len: 12, .. })
        ));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let frame = Frame {
            width: 0,
            height: 0,
            rgba: Vec::new(),
        };
        assert!(encode_poster(&frame, &PosterOptions::default()).is_err());
    }

    // =========================================================================
    // PosterGenerator
    // =========================================================================

    #[tokio::test]
    async fn derives_and_caches() {
        let mock = MockPlatform::new();
        mock.add_video("/videos/GYM.mp4", 30.0, Some(solid_frame(16, 9)));
        let cache = PosterCache::new();
        let generator = PosterGenerator::new(&mock, cache.clone(), PosterOptions::default());

        let first = generator.get_poster("/videos/GYM.mp4").await;
        assert!(first.src().starts_with("data:image/jpeg;base64,"));
        assert_eq!(cache.get("/videos/GYM.mp4"), Some(first.clone()));

        let second = generator.get_poster("/videos/GYM.mp4").await;
        assert_eq!(first, second);
        assert_eq!(mock.derivations.load(Ordering::SeqCst), 1);
        assert!(
            mock.get_operations()
                .contains(&RecordedOp::Capture("/videos/GYM.mp4".into(), 1.0))
        );
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_derivation() {
        let mock = MockPlatform::new();
        mock.add_video("/videos/dbre.mp4", 4.0, Some(solid_frame(8, 8)));
        let generator = PosterGenerator::new(&mock, PosterCache::new(), PosterOptions::default());

        let (a, b) = tokio::join!(
            generator.get_poster("/videos/dbre.mp4"),
            generator.get_poster("/videos/dbre.mp4"),
        );
        assert_eq!(a, b);
        assert!(!a.is_placeholder());
        assert_eq!(mock.derivations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_is_shared_between_generators() {
        let mock = MockPlatform::new();
        mock.add_video("/videos/a.mp4", 2.0, Some(solid_frame(8, 8)));
        let cache = PosterCache::new();
        let g1 = PosterGenerator::new(&mock, cache.clone(), PosterOptions::default());
        let g2 = PosterGenerator::new(&mock, cache.clone(), PosterOptions::default());

        let a = g1.get_poster("/videos/a.mp4").await;
        let b = g2.get_poster("/videos/a.mp4").await;
        assert_eq!(a, b);
        assert_eq!(mock.derivations.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn missing_video_resolves_to_placeholder() {
        let mock = MockPlatform::new();
        let generator = PosterGenerator::new(&mock, PosterCache::new(), PosterOptions::default());
        let poster = generator.get_poster("/videos/missing.mp4").await;
        assert_eq!(poster, Poster::Placeholder);
        assert_eq!(poster.src(), PLACEHOLDER_SRC);
    }

    #[tokio::test]
    async fn capture_failure_resolves_to_placeholder_once() {
        let mock = MockPlatform::new();
        mock.add_video("/videos/broken.mp4", 10.0, None);
        let cache = PosterCache::new();
        let generator = PosterGenerator::new(&mock, cache.clone(), PosterOptions::default());

        assert!(generator.get_poster("/videos/broken.mp4").await.is_placeholder());
        assert!(generator.get_poster("/videos/broken.mp4").await.is_placeholder());
        assert_eq!(mock.derivations.load(Ordering::SeqCst), 1);
        assert!(!cache.is_in_flight("/videos/broken.mp4"));
    }

    #[test]
    fn empty_cache() {
        let cache = PosterCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get("/x.mp4"), None);
        assert!(!cache.is_in_flight("/x.mp4"));
    }
}
