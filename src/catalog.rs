//! The static portfolio catalog.
//!
//! Loaded once from a `catalog.toml`:
//!
//! ```toml
//! [[assets]]
//! id = 7
//! title = "Luxury GYM Design in Guwahati"
//! category = "commercial"
//! url = "/videos/GYM.mp4"
//! thumbnail = "https://images.pexels.com/photos/380768/pexels-photo-380768.jpeg"
//! # kind = "video"   # inferred from the URL extension when omitted
//! ```
//!
//! Asset order in the file is display order. Ids must be unique.

use crate::sources::kind_for_url;
use crate::types::{MediaAsset, MediaKind};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Duplicate asset id {0}")]
    DuplicateId(u32),
    #[error("Asset {0} has an empty url")]
    EmptyUrl(u32),
    #[error("Cannot infer media kind of asset {id} from {url:?}; set `kind` explicitly")]
    UnknownKind { id: u32, url: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    #[serde(default)]
    assets: Vec<RawAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAsset {
    id: u32,
    title: String,
    category: String,
    url: String,
    #[serde(default)]
    kind: Option<MediaKind>,
    #[serde(default)]
    thumbnail: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    assets: Vec<MediaAsset>,
}

impl Catalog {
    /// Build a catalog, checking id uniqueness and non-empty URLs.
    pub fn new(assets: Vec<MediaAsset>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for asset in &assets {
            if !seen.insert(asset.id) {
                return Err(CatalogError::DuplicateId(asset.id));
            }
            if asset.url.trim().is_empty() {
                return Err(CatalogError::EmptyUrl(asset.id));
            }
        }
        Ok(Self { assets })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = toml::from_str(content)?;
        let assets = raw
            .assets
            .into_iter()
            .map(|a| {
                let kind = match a.kind {
                    Some(kind) => kind,
                    None => kind_for_url(&a.url).ok_or_else(|| CatalogError::UnknownKind {
                        id: a.id,
                        url: a.url.clone(),
                    })?,
                };
                Ok(MediaAsset {
                    id: a.id,
                    title: a.title,
                    category: a.category,
                    url: a.url,
                    kind,
                    thumbnail: a.thumbnail.filter(|t| !t.trim().is_empty()),
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;
        Self::new(assets)
    }

    pub fn assets(&self) -> &[MediaAsset] {
        &self.assets
    }

    pub fn get(&self, id: u32) -> Option<&MediaAsset> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Distinct categories in first-appearance order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.assets
            .iter()
            .map(|a| a.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Load and validate a catalog file.
pub fn load_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let content = fs::read_to_string(path)?;
    Catalog::from_toml_str(&content)
}
