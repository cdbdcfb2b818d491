// TileStore — keyed access to resident tiles

use std::collections::BTreeMap;

use ndarray::Array3;

use crate::error::{Error, Result};
use crate::tile::Tile;

/// A keyed collection of tiles.
///
/// Stores own their tiles and must keep them resident (or memory-mapped) for
/// the lifetime of any sampler reading from them; the sampling pipeline does
/// no I/O of its own. `keys()` must return a deterministic ordering so that
/// sequential traversal is reproducible across runs.
pub trait TileStore: Send + Sync {
    /// All tile ids, in a deterministic (sorted) order.
    fn keys(&self) -> Vec<String>;

    /// Look up a tile by id.
    fn get(&self, id: &str) -> Result<&Tile>;
}

/// An in-memory tile store backed by a sorted map.
///
/// Suitable for tests, development, and callers whose tiles already fit in
/// memory. Keys iterate in lexicographic order.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    tiles: BTreeMap<String, Tile>,
}

impl MemoryTileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a list of tiles, keyed by tile name.
    pub fn from_tiles(tiles: Vec<Tile>) -> Self {
        let mut store = Self::new();
        for tile in tiles {
            store.insert(tile);
        }
        store
    }

    /// Insert a tile, keyed by its name. Replaces any existing tile with the
    /// same name.
    pub fn insert(&mut self, tile: Tile) {
        self.tiles.insert(tile.name().to_string(), tile);
    }

    /// Number of tiles held.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether the store holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Create a small synthetic store for testing.
    ///
    /// Generates `n` tiles named `tile-000`, `tile-001`, … with a `features`
    /// array of shape `(height, width, channels)` and an `outlines` array of
    /// shape `(height, width, 1)`, where `height`/`width` are the *padded*
    /// array extents. Every element at `(i, j)` of tile `t` holds the
    /// coordinate code `(t * height + i) * width + j`, so a test can recover
    /// exactly which window of which tile a patch was cut from.
    ///
    /// Attributes are derived so the padded extent reconstructs from them:
    /// `height = height - 2 * pad`, `pad_height = pad` (same for width).
    ///
    /// # Panics
    /// Panics if `2 * pad` is not smaller than `height` and `width`.
    pub fn synthetic(n: usize, height: usize, width: usize, channels: usize, pad: usize) -> Self {
        assert!(2 * pad < height && 2 * pad < width);
        let mut store = Self::new();
        for t in 0..n {
            let code = |i: usize, j: usize| ((t * height + i) * width + j) as f32;
            let features = Array3::from_shape_fn((height, width, channels), |(i, j, _)| code(i, j));
            let outlines = Array3::from_shape_fn((height, width, 1), |(i, j, _)| code(i, j));
            let tile = Tile::new(format!("tile-{t:03}"))
                .with_array("features", features)
                .with_array("outlines", outlines)
                .with_attr("height", (height - 2 * pad) as i64)
                .with_attr("width", (width - 2 * pad) as i64)
                .with_attr("pad_height", pad as i64)
                .with_attr("pad_width", pad as i64);
            store.insert(tile);
        }
        store
    }
}

impl TileStore for MemoryTileStore {
    fn keys(&self) -> Vec<String> {
        self.tiles.keys().cloned().collect()
    }

    fn get(&self, id: &str) -> Result<&Tile> {
        self.tiles.get(id).ok_or_else(|| Error::MissingTile {
            tile: id.to_string(),
        })
    }
}
