// Samplers — traversal strategies over a (tile, pixel-window) address space
//
// A sampler owns the traversal state over a tile store and produces one
// patch per call. Two strategies: uniform random draws (with replacement)
// and a deterministic raster scan that visits every non-overlapping
// patch-aligned window exactly once per pass.

use std::sync::Arc;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tilefeed_core::{bail, ArrayData, Error, Result, Tile, TileStore};

use crate::patch::Patch;

// Configuration

/// Configuration for a sampler.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Edge length of the square windows to cut.
    pub patch_size: usize,
    /// Feature arrays to extract from each tile, in order. The first one
    /// defines the addressable extent of a tile.
    pub feature_names: Vec<String>,
    /// Name of the label array; its windows are promoted to f64.
    pub label_name: String,
    /// Optional random seed for reproducible draws.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            patch_size: 32,
            feature_names: vec!["features".to_string()],
            label_name: "outlines".to_string(),
            seed: None,
        }
    }
}

impl SamplerConfig {
    pub fn patch_size(mut self, size: usize) -> Self {
        self.patch_size = size;
        self
    }

    pub fn feature_names(mut self, names: &[&str]) -> Self {
        self.feature_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn label_name(mut self, name: &str) -> Self {
        self.label_name = name.to_string();
        self
    }

    pub fn seed(mut self, s: u64) -> Self {
        self.seed = Some(s);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.patch_size == 0 {
            return Err(Error::InvalidConfig("patch_size must be positive".into()));
        }
        if self.feature_names.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one feature name is required".into(),
            ));
        }
        Ok(())
    }
}

// Cursor

/// Snapshot of a deterministic sampler's traversal position.
///
/// Random samplers have no cursor; their snapshot is the origin and seeking
/// is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub tile: usize,
    pub y: usize,
    pub x: usize,
}

// Sampler trait

/// A stateful traversal strategy producing one patch per call.
///
/// The accessor methods expose exactly the state the plugin lifecycle is
/// allowed to touch: the tile list (pruned by filtering plugins before
/// indexing) and the patch capacity (rewritten by oversampling plugins
/// after indexing).
pub trait Sampler: Send {
    /// The store this sampler reads from.
    fn store(&self) -> &dyn TileStore;

    /// The current ordered tile list.
    fn tiles(&self) -> &[String];

    /// Replace the tile list. Destructive; the previous list is gone.
    fn set_tiles(&mut self, tiles: Vec<String>);

    /// Edge length of the windows this sampler cuts.
    fn patch_size(&self) -> usize;

    /// The indexed patch capacity.
    fn n_patches(&self) -> usize;

    /// Overwrite the indexed patch capacity.
    fn set_n_patches(&mut self, n: usize);

    /// (Re)compute the patch capacity from the current tile list.
    ///
    /// For every tile the padded extent is reconstructed from its attrs as
    /// `height + 2 * pad_height + 1` (same for width) and divided by the
    /// patch size; the capacity is the sum over tiles of the products of
    /// both quotients. This is a capacity estimate over tile metadata, not
    /// an exact reachable count for every traversal strategy.
    fn index(&mut self) -> Result<()> {
        let ids = self.tiles().to_vec();
        let patch = self.patch_size();
        let mut total = 0usize;
        for id in &ids {
            let tile = self.store().get(id)?;
            let height = tile.attr("height")? + 2 * tile.attr("pad_height")? + 1;
            let width = tile.attr("width")? + 2 * tile.attr("pad_width")? + 1;
            if height < 0 || width < 0 {
                bail!("tile '{}' has a negative extent", id);
            }
            total += (height as usize / patch) * (width as usize / patch);
        }
        debug!("indexed {} patches across {} tiles", total, ids.len());
        self.set_n_patches(total);
        Ok(())
    }

    /// Return any traversal cursor to its initial state.
    fn reset(&mut self) {}

    /// Produce exactly one patch.
    fn sample(&mut self) -> Result<Patch>;

    /// Snapshot the traversal position.
    fn cursor(&self) -> Cursor {
        Cursor::default()
    }

    /// Restore a previously snapshotted traversal position.
    fn seek(&mut self, _cursor: Cursor) {}
}

// Shared plumbing

/// State common to every sampler variant.
struct SamplerCore {
    store: Arc<dyn TileStore>,
    tiles: Vec<String>,
    patch_size: usize,
    feature_names: Vec<String>,
    label_name: String,
    n_patches: usize,
}

impl SamplerCore {
    fn new(store: Arc<dyn TileStore>, config: &SamplerConfig) -> Result<Self> {
        config.validate()?;
        let tiles = store.keys();
        Ok(Self {
            store,
            tiles,
            patch_size: config.patch_size,
            feature_names: config.feature_names.clone(),
            label_name: config.label_name.clone(),
            n_patches: 0,
        })
    }

    /// Addressable extent of a tile: the dims of its first configured
    /// feature array.
    fn tile_dims(&self, tile: &Tile) -> Result<(usize, usize)> {
        let first = tile.array(&self.feature_names[0])?;
        if first.ndim() != 3 {
            return Err(Error::RankMismatch {
                expected: 3,
                got: first.ndim(),
            });
        }
        let shape = first.shape();
        Ok((shape[0], shape[1]))
    }

    /// Cut one patch at `(y, x)`: every configured feature window keeps its
    /// dtype, the label window is promoted to f64.
    fn extract(&self, tile: &Tile, y: usize, x: usize) -> Result<Patch> {
        let mut patch = Patch::new();
        for feature in &self.feature_names {
            let window = tile.array(feature)?.window(y, x, self.patch_size)?;
            patch.insert(feature.clone(), window);
        }
        let label = tile
            .array(&self.label_name)?
            .window(y, x, self.patch_size)?
            .to_f64();
        patch.insert(self.label_name.clone(), ArrayData::F64(label));
        Ok(patch)
    }
}

// RandomSampler

/// Uniform random traversal: each call picks a tile uniformly at random
/// (with replacement across calls), then a row/column offset uniformly
/// within `[0, extent - patch)`. No memory of past draws.
pub struct RandomSampler {
    core: SamplerCore,
    rng: StdRng,
}

impl std::fmt::Debug for RandomSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSampler").finish_non_exhaustive()
    }
}

impl RandomSampler {
    pub fn new(store: Arc<dyn TileStore>, config: SamplerConfig) -> Result<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            core: SamplerCore::new(store, &config)?,
            rng,
        })
    }
}

impl Sampler for RandomSampler {
    fn store(&self) -> &dyn TileStore {
        &*self.core.store
    }

    fn tiles(&self) -> &[String] {
        &self.core.tiles
    }

    fn set_tiles(&mut self, tiles: Vec<String>) {
        self.core.tiles = tiles;
    }

    fn patch_size(&self) -> usize {
        self.core.patch_size
    }

    fn n_patches(&self) -> usize {
        self.core.n_patches
    }

    fn set_n_patches(&mut self, n: usize) {
        self.core.n_patches = n;
    }

    fn sample(&mut self) -> Result<Patch> {
        if self.core.tiles.is_empty() {
            return Err(Error::EmptyTileSet);
        }
        let idx = self.rng.gen_range(0..self.core.tiles.len());
        let id = self.core.tiles[idx].clone();
        let tile = self.core.store.get(&id)?;
        let (height, width) = self.core.tile_dims(tile)?;
        let patch = self.core.patch_size;
        // Offsets are drawn from [0, extent - patch), so the extent must
        // exceed the patch size strictly.
        if height <= patch || width <= patch {
            return Err(Error::OutOfRange {
                tile: id,
                height,
                width,
                patch,
            });
        }
        let y = self.rng.gen_range(0..height - patch);
        let x = self.rng.gen_range(0..width - patch);
        self.core.extract(tile, y, x)
    }
}

// ConsecutiveSampler

/// Deterministic raster-scan traversal: tile order, then row-major within a
/// tile, advancing by one patch size per call. When the horizontal edge is
/// reached the column wraps and the row advances; when the vertical edge is
/// reached the cursor moves to the next tile; after the last tile the whole
/// traversal wraps back to the start.
///
/// One full pass of `n_patches` calls visits every non-overlapping
/// patch-aligned window of every tile exactly once (when the capacity
/// formula matches the arrays' real extents).
pub struct ConsecutiveSampler {
    core: SamplerCore,
    cursor: Cursor,
}

impl ConsecutiveSampler {
    pub fn new(store: Arc<dyn TileStore>, config: SamplerConfig) -> Result<Self> {
        Ok(Self {
            core: SamplerCore::new(store, &config)?,
            cursor: Cursor::default(),
        })
    }
}

impl Sampler for ConsecutiveSampler {
    fn store(&self) -> &dyn TileStore {
        &*self.core.store
    }

    fn tiles(&self) -> &[String] {
        &self.core.tiles
    }

    fn set_tiles(&mut self, tiles: Vec<String>) {
        self.core.tiles = tiles;
    }

    fn patch_size(&self) -> usize {
        self.core.patch_size
    }

    fn n_patches(&self) -> usize {
        self.core.n_patches
    }

    fn set_n_patches(&mut self, n: usize) {
        self.core.n_patches = n;
    }

    fn reset(&mut self) {
        self.cursor = Cursor::default();
    }

    fn cursor(&self) -> Cursor {
        self.cursor
    }

    fn seek(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    fn sample(&mut self) -> Result<Patch> {
        if self.core.tiles.is_empty() {
            return Err(Error::EmptyTileSet);
        }
        if self.cursor.tile >= self.core.tiles.len() {
            self.reset();
        }
        let patch_size = self.core.patch_size;

        let mut id = self.core.tiles[self.cursor.tile].clone();
        let mut tile = self.core.store.get(&id)?;
        let (mut height, mut width) = self.core.tile_dims(tile)?;
        if patch_size > height || patch_size > width {
            return Err(Error::OutOfRange {
                tile: id,
                height,
                width,
                patch: patch_size,
            });
        }

        if self.cursor.x + patch_size > width {
            self.cursor.x = 0;
            self.cursor.y += patch_size;
        }
        if self.cursor.y + patch_size > height {
            self.cursor.y = 0;
            self.cursor.x = 0;
            self.cursor.tile += 1;
            if self.cursor.tile >= self.core.tiles.len() {
                self.cursor = Cursor::default();
            }
            id = self.core.tiles[self.cursor.tile].clone();
            tile = self.core.store.get(&id)?;
            let dims = self.core.tile_dims(tile)?;
            height = dims.0;
            width = dims.1;
            if patch_size > height || patch_size > width {
                return Err(Error::OutOfRange {
                    tile: id,
                    height,
                    width,
                    patch: patch_size,
                });
            }
        }

        let patch = self.core.extract(tile, self.cursor.y, self.cursor.x)?;
        self.cursor.x += patch_size;
        Ok(patch)
    }
}
