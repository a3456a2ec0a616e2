//! Gallery orchestration: filtered grid, lazy tiles, and the overlay player.
//!
//! ```text
//!  Catalog ──filter──▶ visible assets ──mount──▶ Tile { sensor, loader }
//!                                                   │ intersection
//!                                                   ▼
//!                                              grid still loads
//!
//!  select(video) ──▶ PlaybackController (overlay element)
//!  dismiss(..)   ──▶ close session
//! ```
//!
//! Each mounted tile pairs a [`VisibilitySensor`] with a [`MediaLoader`] for
//! the asset's grid still. Tiles for assets removed by a filter change are
//! unmounted on the next [`Gallery::mount`]: observers are released and
//! in-flight loads cancelled.
//!
//! Tile element ids are derived from asset ids ([`tile_element`]); the
//! overlay uses its own element from [`GalleryOptions::overlay`]. Platform
//! events are routed by element.
//!
//! ## Posters
//!
//! Selecting a video and scrolling a thumbnail-less video tile into view
//! both queue a [`PosterRequest`]. The host drains the queue with
//! [`Gallery::take_poster_requests`], awaits each request against its
//! [`FrameSource`], and hands the result back through
//! [`Gallery::set_poster`]. Requests share the gallery's [`PosterCache`], so
//! a video is captured once however many tiles and sessions ask for it.

use crate::catalog::Catalog;
use crate::config::{LoaderConfig, ReelConfig};
use crate::loader::{Attempt, LoadOptions, LoadState, MediaEvent, MediaLoader};
use crate::platform::{
    ElementId, FrameSource, IntersectionEntry, MarginParseError, MediaElement, Viewport,
};
use crate::playback::{PlaybackController, PlaybackError, PlaybackOptions, SessionId};
use crate::poster::{Poster, PosterCache, PosterGenerator, PosterOptions};
use crate::types::{MediaAsset, MediaKind, QualityTier};
use crate::visibility::{VisibilityOptions, VisibilitySensor};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GalleryError {
    #[error("no asset with id {0}")]
    UnknownAsset(u32),
    #[error("overlay element {0} is also the tile element of asset {0}")]
    OverlayCollision(u32),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Which assets the grid shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Category(String),
}

impl CategoryFilter {
    /// `"all"` (any case) is [`CategoryFilter::All`]; anything else names a category.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("all") {
            CategoryFilter::All
        } else {
            CategoryFilter::Category(s.to_string())
        }
    }

    pub fn matches(&self, asset: &MediaAsset) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Category(c) => asset.category == *c,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => write!(f, "all"),
            CategoryFilter::Category(c) => write!(f, "{c}"),
        }
    }
}

/// How the viewer closed the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    CloseButton,
    OutsideClick,
    Escape,
}

impl fmt::Display for DismissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DismissReason::CloseButton => write!(f, "close button"),
            DismissReason::OutsideClick => write!(f, "outside click"),
            DismissReason::Escape => write!(f, "escape"),
        }
    }
}

/// Element id of the grid tile for `asset_id`.
pub fn tile_element(asset_id: u32) -> ElementId {
    ElementId(u64::from(asset_id))
}

/// Where a derived poster is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterTarget {
    /// Interim visual of an overlay session.
    Session(SessionId),
    /// Grid tile of a video without a thumbnail.
    Tile(u32),
}

/// A queued poster derivation, resolved by the host.
#[derive(Debug, Clone)]
pub struct PosterRequest {
    target: PosterTarget,
    url: String,
    cache: PosterCache,
    options: PosterOptions,
}

impl PosterRequest {
    pub fn target(&self) -> PosterTarget {
        self.target
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Derive (or reuse) the poster through the gallery's cache.
    pub async fn fetch(&self, frames: impl FrameSource) -> Poster {
        PosterGenerator::new(frames, self.cache.clone(), self.options)
            .get_poster(&self.url)
            .await
    }
}

#[derive(Debug, Clone)]
pub struct GalleryOptions {
    pub visibility: VisibilityOptions,
    pub loader: LoaderConfig,
    pub playback: PlaybackOptions,
    /// Tier used for grid stills until [`Gallery::set_tier`] is called.
    pub tier: QualityTier,
    /// Element hosting the overlay player. Must not be the
    /// [`tile_element`] of any catalog asset.
    pub overlay: ElementId,
    pub poster: PosterOptions,
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self {
            visibility: VisibilityOptions::default(),
            loader: LoaderConfig::default(),
            playback: PlaybackOptions::default(),
            tier: QualityTier::Medium,
            overlay: ElementId(u64::MAX),
            poster: PosterOptions::default(),
        }
    }
}

impl GalleryOptions {
    pub fn from_config(config: &ReelConfig) -> Result<Self, MarginParseError> {
        Ok(Self {
            visibility: VisibilityOptions::from_config(&config.visibility)?,
            loader: config.loader.clone(),
            playback: PlaybackOptions::from_config(&config.playback, &config.loader),
            tier: config.quality.fallback_tier,
            poster: PosterOptions::from(&config.poster),
            ..Self::default()
        })
    }
}

#[derive(Debug)]
struct Tile {
    sensor: VisibilitySensor,
    /// `None` for videos without a thumbnail.
    still: Option<MediaLoader>,
    /// Video URL to derive a poster from when there is no still.
    poster_source: Option<String>,
    poster: Option<Poster>,
    poster_requested: bool,
}

impl Tile {
    fn unmount(&mut self, viewport: &impl Viewport, media: &impl MediaElement) {
        self.sensor.detach(viewport);
        if let Some(loader) = self.still.as_mut() {
            loader.unmount(media);
        }
    }

    fn forward(&mut self, visible: bool, media: &impl MediaElement) {
        if let Some(loader) = self.still.as_mut() {
            loader.on_visibility(visible, media);
        }
    }
}

#[derive(Debug)]
pub struct Gallery {
    catalog: Catalog,
    options: GalleryOptions,
    filter: CategoryFilter,
    tier: QualityTier,
    tiles: BTreeMap<u32, Tile>,
    playback: PlaybackController,
    posters: PosterCache,
    poster_requests: Vec<PosterRequest>,
}

impl Gallery {
    pub fn new(catalog: Catalog, options: GalleryOptions) -> Result<Self, GalleryError> {
        Self::with_poster_cache(catalog, options, PosterCache::new())
    }

    /// Build a gallery whose posters live in `posters`, shared with any
    /// other gallery holding a clone of the same cache.
    pub fn with_poster_cache(
        catalog: Catalog,
        options: GalleryOptions,
        posters: PosterCache,
    ) -> Result<Self, GalleryError> {
        if let Ok(id) = u32::try_from(options.overlay.0)
            && catalog.get(id).is_some()
        {
            return Err(GalleryError::OverlayCollision(id));
        }
        let playback = PlaybackController::new(options.playback.clone());
        Ok(Self {
            catalog,
            tier: options.tier,
            options,
            filter: CategoryFilter::All,
            tiles: BTreeMap::new(),
            playback,
            posters,
            poster_requests: Vec::new(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn filter(&self) -> &CategoryFilter {
        &self.filter
    }

    /// Change the filter. Tiles follow on the next [`mount`](Self::mount).
    /// Returns whether the filter changed.
    pub fn set_filter(&mut self, filter: CategoryFilter) -> bool {
        if self.filter == filter {
            return false;
        }
        debug!(from = %self.filter, to = %filter, "filter changed");
        self.filter = filter;
        true
    }

    /// Assets passing the current filter, in catalog order.
    pub fn visible_assets(&self) -> Vec<&MediaAsset> {
        self.catalog
            .assets()
            .iter()
            .filter(|a| self.filter.matches(a))
            .collect()
    }

    pub fn categories(&self) -> Vec<&str> {
        self.catalog.categories()
    }

    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    /// Tier for grid-still loads started from now on.
    pub fn set_tier(&mut self, tier: QualityTier) {
        self.tier = tier;
        for loader in self.tiles.values_mut().filter_map(|t| t.still.as_mut()) {
            loader.set_quality(tier);
        }
    }

    /// Reconcile tiles with the filtered asset list.
    pub fn mount(&mut self, viewport: &impl Viewport, media: &impl MediaElement) {
        let wanted: Vec<(u32, Option<String>, Option<String>)> = self
            .visible_assets()
            .into_iter()
            .map(|a| {
                let still = a.grid_still().map(str::to_string);
                let poster_source = (still.is_none() && a.is_playable()).then(|| a.url.clone());
                (a.id, still, poster_source)
            })
            .collect();

        let stale: Vec<u32> = self
            .tiles
            .keys()
            .copied()
            .filter(|id| !wanted.iter().any(|(w, _, _)| w == id))
            .collect();
        for id in stale {
            if let Some(mut tile) = self.tiles.remove(&id) {
                tile.unmount(viewport, media);
                debug!(asset = id, "tile unmounted");
            }
        }

        for (id, still_url, poster_source) in wanted {
            if self.tiles.contains_key(&id) {
                continue;
            }
            let element = tile_element(id);
            let still = still_url.and_then(|url| {
                let options = LoadOptions::new(MediaKind::Image, self.tier, &self.options.loader);
                match MediaLoader::new(element, url, options) {
                    Ok(loader) => Some(loader),
                    Err(e) => {
                        warn!(asset = id, error = %e, "grid still unusable, tile left blank");
                        None
                    }
                }
            });
            let mut tile = Tile {
                sensor: VisibilitySensor::new(element, self.options.visibility),
                still,
                poster_source,
                poster: None,
                poster_requested: false,
            };
            let visible = tile.sensor.attach(viewport);
            if let Some(visible) = visible {
                tile.forward(visible, media);
            }
            debug!(asset = id, "tile mounted");
            self.tiles.insert(id, tile);
            if visible == Some(true) {
                self.queue_tile_poster(id);
            }
        }
    }

    /// Tear down every tile and close the overlay.
    pub fn unmount_all(&mut self, viewport: &impl Viewport, media: &impl MediaElement) {
        for (_, mut tile) in std::mem::take(&mut self.tiles) {
            tile.unmount(viewport, media);
        }
        self.playback.close(media);
    }

    /// Ids of mounted tiles, ascending.
    pub fn mounted(&self) -> Vec<u32> {
        self.tiles.keys().copied().collect()
    }

    /// Route an intersection callback to its tile. Returns the visibility
    /// value if the tile's signal changed.
    pub fn on_intersection(
        &mut self,
        entry: &IntersectionEntry,
        viewport: &impl Viewport,
        media: &impl MediaElement,
    ) -> Option<bool> {
        let id = u32::try_from(entry.element.0).ok()?;
        let tile = self.tiles.get_mut(&id)?;
        let visible = tile.sensor.on_intersection(entry, viewport)?;
        tile.forward(visible, media);
        if visible {
            self.queue_tile_poster(id);
        }
        Some(visible)
    }

    /// Route a media callback to the overlay session or a tile's still
    /// loader. Returns whether anything consumed it.
    pub fn on_media_event(&mut self, event: &MediaEvent, media: &impl MediaElement) -> bool {
        if event.element == self.options.overlay {
            return self.playback.handle(event, media).is_some();
        }
        self.tile_for(event.element)
            .and_then(|tile| tile.still.as_mut())
            .and_then(|loader| loader.handle(event))
            .is_some()
    }

    /// Load state of a tile's grid still. `None` if not mounted or stillless.
    pub fn tile_state(&self, asset_id: u32) -> Option<LoadState> {
        self.tiles
            .get(&asset_id)?
            .still
            .as_ref()
            .map(MediaLoader::state)
    }

    /// Load attempt of a tile's grid still awaiting a host outcome.
    pub fn tile_attempt(&self, asset_id: u32) -> Option<Attempt> {
        self.tiles.get(&asset_id)?.still.as_ref()?.active_attempt()
    }

    pub fn is_tile_visible(&self, asset_id: u32) -> bool {
        self.tiles
            .get(&asset_id)
            .is_some_and(|t| t.sensor.is_visible())
    }

    /// Retry a failed grid still.
    pub fn retry_tile(&mut self, asset_id: u32, media: &impl MediaElement) -> Option<Attempt> {
        self.tiles.get_mut(&asset_id)?.still.as_mut()?.retry(media)
    }

    /// Viewer tapped a tile. Videos open the overlay; images are inert.
    pub fn select(
        &mut self,
        asset_id: u32,
        tier: QualityTier,
        media: &impl MediaElement,
    ) -> Result<Option<SessionId>, GalleryError> {
        let asset = self
            .catalog
            .get(asset_id)
            .ok_or(GalleryError::UnknownAsset(asset_id))?;
        if !asset.is_playable() {
            debug!(asset = asset_id, "image selected, nothing to play");
            return Ok(None);
        }
        let url = asset.url.clone();
        let session = self
            .playback
            .open(asset, self.options.overlay, tier, media)?;
        self.poster_requests
            .retain(|r| !matches!(r.target, PosterTarget::Session(_)));
        self.queue_poster(PosterTarget::Session(session), url);
        Ok(Some(session))
    }

    /// Hand over the poster derivations queued since the last call.
    pub fn take_poster_requests(&mut self) -> Vec<PosterRequest> {
        std::mem::take(&mut self.poster_requests)
    }

    /// Deliver a derived poster. Returns false if its session closed or its
    /// tile was unmounted in the meantime.
    pub fn set_poster(&mut self, target: PosterTarget, poster: Poster) -> bool {
        match target {
            PosterTarget::Session(id) => self.playback.set_poster(id, poster),
            PosterTarget::Tile(id) => match self.tiles.get_mut(&id) {
                Some(tile) => {
                    tile.poster = Some(poster);
                    true
                }
                None => {
                    debug!(asset = id, "dropping poster for unmounted tile");
                    false
                }
            },
        }
    }

    /// Resolve every queued poster request in turn.
    pub async fn resolve_posters(&mut self, frames: &impl FrameSource) -> usize {
        let requests = self.take_poster_requests();
        let mut delivered = 0;
        for request in requests {
            let poster = request.fetch(frames).await;
            if self.set_poster(request.target, poster) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Poster shown on a thumbnail-less video tile, once derived.
    pub fn tile_poster(&self, asset_id: u32) -> Option<&Poster> {
        self.tiles.get(&asset_id)?.poster.as_ref()
    }

    pub fn poster_cache(&self) -> &PosterCache {
        &self.posters
    }

    /// Close the overlay. Returns the closed session, if one was open.
    pub fn dismiss(&mut self, reason: DismissReason, media: &impl MediaElement) -> Option<SessionId> {
        let closed = self.playback.close(media);
        if let Some(id) = closed {
            info!(session = id.0, %reason, "overlay dismissed");
        }
        closed
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackController {
        &mut self.playback
    }

    fn queue_tile_poster(&mut self, id: u32) {
        let Some(tile) = self.tiles.get_mut(&id) else {
            return;
        };
        if tile.poster_requested || tile.poster.is_some() {
            return;
        }
        let Some(url) = tile.poster_source.clone() else {
            return;
        };
        tile.poster_requested = true;
        self.queue_poster(PosterTarget::Tile(id), url);
    }

    /// Queue a derivation, or deliver straight from the cache when the
    /// poster is already known.
    fn queue_poster(&mut self, target: PosterTarget, url: String) {
        if let Some(poster) = self.posters.get(&url) {
            self.set_poster(target, poster);
            return;
        }
        debug!(?target, %url, "poster requested");
        self.poster_requests.push(PosterRequest {
            target,
            url,
            cache: self.posters.clone(),
            options: self.options.poster,
        });
    }

    fn tile_for(&mut self, element: ElementId) -> Option<&mut Tile> {
        let id = u32::try_from(element.0).ok()?;
        self.tiles.get_mut(&id)
    }
}
