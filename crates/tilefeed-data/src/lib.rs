//! # tilefeed-data
//!
//! Patch sampling, plugins, and batch loading for tilefeed.
//!
//! This crate provides:
//! - [`Patch`] — one sampled window as a feature-name → array mapping
//! - [`Sampler`] trait — stateful traversal producing one patch per call
//! - [`RandomSampler`] / [`ConsecutiveSampler`] — the two traversal
//!   strategies (uniform random with replacement, deterministic raster scan)
//! - [`Transformation`] — randomized in-place patch mutators (flips,
//!   quarter-turn rotation, crop-and-rescale)
//! - [`Plugin`] — capability-tagged lifecycle hooks, with the built-ins
//!   [`TileFilter`], [`Augmentation`], [`ReplicateLabels`], and
//!   [`OversampleWithTransforms`]
//! - [`BatchLoader`] — drives the sample/hook loop and assembles batches
//! - [`prefetch_epoch`] — single-owner background batch production

pub mod loader;
pub mod patch;
pub mod plugin;
pub mod prefetch;
pub mod sampler;
pub mod transform;

pub use loader::{Batch, BatchLoader, LoaderConfig};
pub use patch::Patch;
pub use plugin::{
    name_contains, region_in, Augmentation, HookSet, OversampleWithTransforms, Plugin,
    ReplicateLabels, TileFilter, TilePredicate,
};
pub use prefetch::{prefetch_epoch, PrefetchConfig, PrefetchIterator};
pub use sampler::{ConsecutiveSampler, Cursor, RandomSampler, Sampler, SamplerConfig};
pub use transform::{
    RandomCropScale, RandomHorizontalFlip, RandomRotation, RandomVerticalFlip, Transformation,
};
