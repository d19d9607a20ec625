//! Read-only tile/site geometry lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fixed-function physical location within a tile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Site {
    /// The site's global name (e.g. `IPAD_X0Y2`).
    pub name: String,
    /// Grid x coordinate of the site.
    pub x: i32,
    /// Grid y coordinate of the site.
    pub y: i32,
}

/// A coordinate-addressed region of the chip containing one or more sites.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tile {
    /// The tile's global name (e.g. `GTP_COMMON_X0Y0`).
    pub name: String,
    /// The sites inside this tile, in database order.
    pub sites: Vec<Site>,
}

/// Read-only device geometry, consumed as an external service.
///
/// The legalizer only ever asks one question of the device database: given a
/// site name, which tile contains it (and what else is in that tile). The
/// real flow answers from its device database; tests answer from a
/// [`StaticGeometry`].
pub trait DeviceGeometry {
    /// Returns the tile containing the named site, if the site exists.
    fn tile_of_site(&self, site_name: &str) -> Option<&Tile>;
}

/// An in-memory [`DeviceGeometry`] built from explicit tile records.
#[derive(Default)]
pub struct StaticGeometry {
    tiles: Vec<Tile>,
    site_to_tile: HashMap<String, usize>,
}

impl StaticGeometry {
    /// Creates an empty geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tile and indexes its sites.
    pub fn add_tile(&mut self, tile: Tile) {
        let index = self.tiles.len();
        for site in &tile.sites {
            self.site_to_tile.insert(site.name.clone(), index);
        }
        self.tiles.push(tile);
    }
}

impl DeviceGeometry for StaticGeometry {
    fn tile_of_site(&self, site_name: &str) -> Option<&Tile> {
        self.site_to_tile
            .get(site_name)
            .map(|&index| &self.tiles[index])
    }
}
