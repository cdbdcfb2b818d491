// BatchLoader — drives the sample/hook loop and assembles batch tensors

use std::collections::HashMap;

use log::{debug, trace};
use ndarray::{ArcArray, IxDyn};

use tilefeed_core::{ArrayData, Error, Result};

use crate::patch::Patch;
use crate::plugin::Plugin;
use crate::sampler::Sampler;

// Configuration

/// Configuration for a batch loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of patches per batch.
    pub batch_size: usize,
    /// Name of the label feature, split out of `batch.x` into `batch.y`.
    pub label_name: String,
    /// Epoch-length multiplier: one epoch reports
    /// `n_patches / batch_size * len_factor` batches.
    pub len_factor: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            label_name: "outlines".to_string(),
            len_factor: 1,
        }
    }
}

impl LoaderConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn label_name(mut self, name: &str) -> Self {
        self.label_name = name.to_string();
        self
    }

    pub fn len_factor(mut self, factor: usize) -> Self {
        self.len_factor = factor;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be positive".into()));
        }
        if self.len_factor == 0 {
            return Err(Error::InvalidConfig("len_factor must be at least 1".into()));
        }
        Ok(())
    }
}

// Batch

/// One assembled batch.
///
/// `x` maps every feature key except the label to an array of shape
/// `(batch, patch, patch, channels)`, in the dtype the patches carried.
/// `y` holds the stacked f64 label — normally one entry, replicated into N
/// shared handles by a finalising plugin for multi-head consumers.
#[derive(Debug, Clone)]
pub struct Batch {
    pub x: HashMap<String, ArrayData>,
    pub y: Vec<ArcArray<f64, IxDyn>>,
}

// BatchLoader

/// Orchestrates indexing, drives the sample/hook loop to assemble batches,
/// and reformats accumulated patches into batch tensors.
///
/// Construction registers every plugin: each is assigned to the hook chains
/// its [`HookSet`](crate::plugin::HookSet) declares, in registration order,
/// and the full indexing phase runs (`before_indexing` hooks →
/// `Sampler::index()` → `after_indexing` hooks). Plugins never outlive the
/// loader.
pub struct BatchLoader {
    sampler: Box<dyn Sampler>,
    plugins: Vec<Box<dyn Plugin>>,
    before_indexing: Vec<usize>,
    after_indexing: Vec<usize>,
    on_sampling: Vec<usize>,
    on_finalising: Vec<usize>,
    config: LoaderConfig,
}

impl std::fmt::Debug for BatchLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchLoader")
            .field("plugins", &self.plugins.len())
            .field("before_indexing", &self.before_indexing)
            .field("after_indexing", &self.after_indexing)
            .field("on_sampling", &self.on_sampling)
            .field("on_finalising", &self.on_finalising)
            .field("config", &self.config)
            .finish()
    }
}

impl BatchLoader {
    pub fn new(
        mut sampler: Box<dyn Sampler>,
        mut plugins: Vec<Box<dyn Plugin>>,
        config: LoaderConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut before_indexing = Vec::new();
        let mut after_indexing = Vec::new();
        let mut on_sampling = Vec::new();
        let mut on_finalising = Vec::new();
        for (i, plugin) in plugins.iter().enumerate() {
            let hooks = plugin.hooks();
            if hooks.before_indexing {
                before_indexing.push(i);
            }
            if hooks.after_indexing {
                after_indexing.push(i);
            }
            if hooks.on_sampling {
                on_sampling.push(i);
            }
            if hooks.on_finalising {
                on_finalising.push(i);
            }
        }
        debug!(
            "registered {} plugins ({} before-indexing, {} after-indexing, {} on-sampling, {} finalising)",
            plugins.len(),
            before_indexing.len(),
            after_indexing.len(),
            on_sampling.len(),
            on_finalising.len()
        );

        for &i in &before_indexing {
            plugins[i].before_indexing(sampler.as_mut())?;
        }
        sampler.index()?;
        for &i in &after_indexing {
            plugins[i].after_indexing(sampler.as_mut())?;
        }

        let loader = Self {
            sampler,
            plugins,
            before_indexing,
            after_indexing,
            on_sampling,
            on_finalising,
            config,
        };
        debug!(
            "loader ready: {} patches, {} batches per epoch",
            loader.sampler.n_patches(),
            loader.len()
        );
        Ok(loader)
    }

    /// Number of batches considered one epoch:
    /// `n_patches / batch_size * len_factor`.
    ///
    /// A scheduling hint, not a hard cap — sampling never stops at this
    /// boundary on its own.
    pub fn len(&self) -> usize {
        self.sampler.n_patches() / self.config.batch_size * self.config.len_factor
    }

    /// Whether a full epoch holds no batches.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read access to the owned sampler.
    pub fn sampler(&self) -> &dyn Sampler {
        self.sampler.as_ref()
    }

    /// Assemble the batch at `index`.
    ///
    /// Requesting index 0 resets the sampler, realigning deterministic
    /// traversal to the start of an epoch whenever iteration restarts.
    /// Batch assembly is transactional: patches accumulate into a local
    /// buffer and the sampler's cursor is restored on any error, so a
    /// failed batch is wholly discarded and retrying the same index repeats
    /// the same deterministic traversal.
    pub fn get_batch(&mut self, index: usize) -> Result<Batch> {
        if index == 0 {
            self.sampler.reset();
        }
        let available = self.sampler.n_patches();
        if self.sampler.tiles().is_empty() || available < self.config.batch_size {
            return Err(Error::EmptyBatch {
                have: available,
                need: self.config.batch_size,
            });
        }

        let checkpoint = self.sampler.cursor();
        match self.fill_batch() {
            Ok(batch) => Ok(batch),
            Err(e) => {
                self.sampler.seek(checkpoint);
                Err(e)
            }
        }
    }

    fn fill_batch(&mut self) -> Result<Batch> {
        let batch_size = self.config.batch_size;
        let mut accumulator: Vec<Patch> = Vec::with_capacity(batch_size);

        while accumulator.len() < batch_size {
            let patch = self.sampler.sample()?;
            let mut produced = vec![patch];
            for &i in &self.on_sampling {
                let mut next = Vec::with_capacity(produced.len());
                for patch in produced {
                    next.extend(self.plugins[i].on_sampling(patch)?);
                }
                produced = next;
            }
            for patch in produced {
                if accumulator.len() < batch_size {
                    accumulator.push(patch);
                } else {
                    // A multi-patch hook overflowed the final fill step;
                    // the batch size is a hard invariant, so the excess is
                    // dropped rather than carried over.
                    trace!("dropping excess patch beyond batch size");
                }
            }
        }

        let mut batch = reformat(&accumulator, &self.config.label_name, batch_size)?;
        for &i in &self.on_finalising {
            batch = self.plugins[i].on_finalising(batch)?;
        }
        Ok(batch)
    }
}

/// Reformat accumulated patches into stacked batch tensors, splitting the
/// label key off into `y`.
fn reformat(accumulator: &[Patch], label_name: &str, batch_size: usize) -> Result<Batch> {
    let first = accumulator.first().ok_or(Error::EmptyBatch {
        have: 0,
        need: batch_size,
    })?;

    let mut x = HashMap::new();
    let mut y = Vec::new();
    for feature in first.keys() {
        let mut parts = Vec::with_capacity(accumulator.len());
        for patch in accumulator {
            parts.push(patch.get(feature).ok_or_else(|| {
                Error::msg(format!("feature '{feature}' missing from a sampled patch"))
            })?);
        }
        let stacked = ArrayData::stack(&parts)?;
        if feature == label_name {
            y.push(stacked.to_f64().into_shared());
        } else {
            x.insert(feature.to_string(), stacked);
        }
    }
    Ok(Batch { x, y })
}
