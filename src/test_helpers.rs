//! Shared test utilities for the showreel test suite.
//!
//! Loads the fixture catalog and config from `fixtures/` and provides lookup
//! helpers that panic with the available entries on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let catalog = fixture_catalog();
//! let gym = find_asset(&catalog, "Luxury GYM");
//! assert_eq!(gym.url, "/videos/GYM.mp4");
//! ```

use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, load_catalog};
use crate::types::MediaAsset;

// =========================================================================
// Fixture setup
// =========================================================================

/// Absolute path of the `fixtures/` directory.
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// The portfolio catalog in `fixtures/catalog.toml`.
pub fn fixture_catalog() -> Catalog {
    load_catalog(&fixtures_dir().join("catalog.toml")).unwrap()
}

// =========================================================================
// Catalog lookups: panic with a clear message on miss
// =========================================================================

/// Find the first asset whose title contains `needle`. Panics if none does.
pub fn find_asset<'a>(catalog: &'a Catalog, needle: &str) -> &'a MediaAsset {
    catalog
        .assets()
        .iter()
        .find(|a| a.title.contains(needle))
        .unwrap_or_else(|| {
            let titles = asset_titles(catalog);
            panic!("asset matching '{needle}' not found. Available: {titles:?}")
        })
}

/// All asset titles in catalog order.
pub fn asset_titles(catalog: &Catalog) -> Vec<&str> {
    catalog.assets().iter().map(|a| a.title.as_str()).collect()
}

/// Ids of `assets`, in order.
pub fn asset_ids(assets: &[&MediaAsset]) -> Vec<u32> {
    assets.iter().map(|a| a.id).collect()
}
