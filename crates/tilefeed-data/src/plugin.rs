// Plugins — capability-tagged hooks into the indexing/sampling lifecycle
//
// A plugin declares, via its HookSet, which lifecycle points it
// participates in; the loader queries that declaration once at registration
// and routes the plugin only to the matching hook chains. Registration
// order fixes the order of both the on-sampling and the finalising chain.

use std::collections::HashSet;

use log::debug;

use tilefeed_core::{Result, Tile};

use crate::loader::Batch;
use crate::patch::Patch;
use crate::sampler::Sampler;
use crate::transform::Transformation;

// HookSet

/// The lifecycle hooks a plugin declares at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookSet {
    pub before_indexing: bool,
    pub after_indexing: bool,
    pub on_sampling: bool,
    pub on_finalising: bool,
}

impl HookSet {
    /// No hooks at all; such a plugin is legal but inert.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_before_indexing(mut self) -> Self {
        self.before_indexing = true;
        self
    }

    pub fn with_after_indexing(mut self) -> Self {
        self.after_indexing = true;
        self
    }

    pub fn with_on_sampling(mut self) -> Self {
        self.on_sampling = true;
        self
    }

    pub fn with_on_finalising(mut self) -> Self {
        self.on_finalising = true;
        self
    }
}

// Plugin trait

/// A hook implementer injected into the indexing/sampling/finalising
/// lifecycle.
///
/// All hook bodies default to identity/no-op; `hooks()` must declare
/// exactly the ones a concrete plugin overrides. Hook errors propagate
/// uncaught to the batch-request caller.
pub trait Plugin: Send {
    /// Which lifecycle hooks this plugin participates in.
    fn hooks(&self) -> HookSet;

    /// Runs after sampler construction, before `index()`. May prune the
    /// sampler's tile list.
    fn before_indexing(&mut self, _sampler: &mut dyn Sampler) -> Result<()> {
        Ok(())
    }

    /// Runs after `index()`. May rewrite the sampler's patch capacity.
    fn after_indexing(&mut self, _sampler: &mut dyn Sampler) -> Result<()> {
        Ok(())
    }

    /// Runs once per produced patch. Returns one or more patches; the
    /// loader's fill loop consumes however many are returned and advances
    /// its counter by that count.
    fn on_sampling(&mut self, patch: Patch) -> Result<Vec<Patch>> {
        Ok(vec![patch])
    }

    /// Runs once per assembled batch.
    fn on_finalising(&mut self, batch: Batch) -> Result<Batch> {
        Ok(batch)
    }
}

// TileFilter

/// A fallible predicate over a tile.
pub type TilePredicate = Box<dyn Fn(&Tile) -> Result<bool> + Send + Sync>;

/// Keep only the tiles for which every predicate holds.
///
/// Runs before indexing; the pruning is destructive and irreversible for
/// the lifetime of the owning loader. Predicate errors (for example a
/// missing attribute) propagate instead of being swallowed.
pub struct TileFilter {
    predicates: Vec<TilePredicate>,
}

impl TileFilter {
    pub fn new(predicates: Vec<TilePredicate>) -> Self {
        Self { predicates }
    }
}

impl Plugin for TileFilter {
    fn hooks(&self) -> HookSet {
        HookSet::none().with_before_indexing()
    }

    fn before_indexing(&mut self, sampler: &mut dyn Sampler) -> Result<()> {
        let ids = sampler.tiles().to_vec();
        let mut kept = Vec::with_capacity(ids.len());
        for id in ids {
            let tile = sampler.store().get(&id)?;
            let mut keep = true;
            for predicate in &self.predicates {
                if !predicate(tile)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                kept.push(id);
            }
        }
        debug!("tile filter kept {}/{} tiles", kept.len(), sampler.tiles().len());
        sampler.set_tiles(kept);
        Ok(())
    }
}

/// Predicate: the tile name contains `needle`.
pub fn name_contains(needle: impl Into<String>) -> TilePredicate {
    let needle = needle.into();
    Box::new(move |tile: &Tile| Ok(tile.name().contains(&needle)))
}

/// Predicate: the tile's region code is one of `regions`.
///
/// The region code is the segment of the tile name after its first
/// character, up to the first `-`.
pub fn region_in(regions: &[&str]) -> TilePredicate {
    let regions: HashSet<String> = regions.iter().map(|r| r.to_string()).collect();
    Box::new(move |tile: &Tile| {
        let code = tile
            .name()
            .get(1..)
            .unwrap_or("")
            .split('-')
            .next()
            .unwrap_or("");
        Ok(regions.contains(code))
    })
}

// Augmentation

/// Apply an ordered list of transformations to every sampled patch, in
/// place.
pub struct Augmentation {
    transformations: Vec<Box<dyn Transformation>>,
}

impl Augmentation {
    pub fn new(transformations: Vec<Box<dyn Transformation>>) -> Self {
        Self { transformations }
    }
}

impl Plugin for Augmentation {
    fn hooks(&self) -> HookSet {
        HookSet::none().with_on_sampling()
    }

    fn on_sampling(&mut self, mut patch: Patch) -> Result<Vec<Patch>> {
        for transformation in &mut self.transformations {
            transformation.apply(&mut patch);
        }
        Ok(vec![patch])
    }
}

// ReplicateLabels

/// Replace the batch label with `replicas` shared handles to the same
/// stacked label array, for consumers expecting one label tensor per output
/// head of a multi-output model. The handles share storage; nothing is
/// deep-copied.
pub struct ReplicateLabels {
    replicas: usize,
}

impl ReplicateLabels {
    /// # Panics
    /// Panics if `replicas` is zero.
    pub fn new(replicas: usize) -> Self {
        assert!(replicas > 0, "ReplicateLabels: need at least one replica");
        Self { replicas }
    }
}

impl Default for ReplicateLabels {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Plugin for ReplicateLabels {
    fn hooks(&self) -> HookSet {
        HookSet::none().with_on_finalising()
    }

    fn on_finalising(&mut self, mut batch: Batch) -> Result<Batch> {
        if let Some(first) = batch.y.first().cloned() {
            batch.y = vec![first; self.replicas];
        }
        Ok(batch)
    }
}

// OversampleWithTransforms

/// Turn every base sample into two training examples: the original patch
/// plus a transformed deep copy.
///
/// After indexing the declared patch capacity is doubled so the reported
/// epoch length accounts for the extra examples; on sampling the plugin
/// returns `[original, transformed copy]` and the loader's fill counter
/// advances by two.
pub struct OversampleWithTransforms {
    transformations: Vec<Box<dyn Transformation>>,
}

impl OversampleWithTransforms {
    pub fn new(transformations: Vec<Box<dyn Transformation>>) -> Self {
        Self { transformations }
    }
}

impl Plugin for OversampleWithTransforms {
    fn hooks(&self) -> HookSet {
        HookSet::none()
            .with_after_indexing()
            .with_on_sampling()
    }

    fn after_indexing(&mut self, sampler: &mut dyn Sampler) -> Result<()> {
        sampler.set_n_patches(sampler.n_patches() * 2);
        Ok(())
    }

    fn on_sampling(&mut self, patch: Patch) -> Result<Vec<Patch>> {
        let mut copy = patch.clone();
        for transformation in &mut self.transformations {
            transformation.apply(&mut copy);
        }
        Ok(vec![patch, copy])
    }
}
