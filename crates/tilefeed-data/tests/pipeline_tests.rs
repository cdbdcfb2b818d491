// End-to-end tests for the sampling/indexing/batch-assembly pipeline.

use std::collections::HashSet;
use std::sync::Arc;

use ndarray::Array3;

use tilefeed_core::{ArrayData, Error, MemoryTileStore, Tile, TileStore};
use tilefeed_data::{
    name_contains, prefetch_epoch, region_in, Augmentation, BatchLoader, ConsecutiveSampler,
    HookSet, LoaderConfig, OversampleWithTransforms, Patch, Plugin, PrefetchConfig, RandomSampler,
    ReplicateLabels, Sampler, SamplerConfig, TileFilter, Transformation,
};

// Helpers

fn synthetic(n: usize, extent: usize) -> Arc<dyn TileStore> {
    Arc::new(MemoryTileStore::synthetic(n, extent, extent, 2, 0))
}

/// Coordinate code of sample `i`'s top-left feature element in a batch.
fn code_at(batch: &tilefeed_data::Batch, i: usize) -> usize {
    match batch.x.get("features").unwrap() {
        ArrayData::F32(a) => a[[i, 0, 0, 0]] as usize,
        _ => panic!("features should be f32"),
    }
}

/// A deterministic mock transformation: fill every rank-3 entry with 1.0.
struct FillOnes;

impl Transformation for FillOnes {
    fn apply(&mut self, patch: &mut Patch) {
        for (_, data) in patch.iter_mut() {
            if data.ndim() != 3 {
                continue;
            }
            match data {
                ArrayData::F32(a) => a.fill(1.0),
                ArrayData::F64(a) => a.fill(1.0),
            }
        }
    }
}

// Indexing

#[test]
fn capacity_formula_with_padding() {
    // Padded extent 66x66 = unpadded 62 + 2*2; patch 16:
    // (62 + 2*2 + 1) / 16 = 4 per axis -> 16 patches per tile.
    let store = Arc::new(MemoryTileStore::synthetic(3, 66, 66, 1, 2));
    let mut sampler =
        RandomSampler::new(store, SamplerConfig::default().patch_size(16)).unwrap();
    sampler.index().unwrap();
    assert_eq!(sampler.n_patches(), 48);
}

// Random traversal

#[test]
fn random_sampler_stays_in_bounds_over_many_draws() {
    let mut sampler = RandomSampler::new(
        synthetic(4, 48),
        SamplerConfig::default().patch_size(16).seed(1234),
    )
    .unwrap();
    for _ in 0..10_000 {
        let patch = sampler.sample().unwrap();
        assert_eq!(patch.get("features").unwrap().shape(), &[16, 16, 2]);
        assert_eq!(patch.get("outlines").unwrap().shape(), &[16, 16, 1]);
    }
}

// Deterministic traversal across a full epoch

#[test]
fn one_epoch_covers_the_traversal_prefix() {
    // 2 tiles of 64x64, patch 32 -> 8 windows per pass; batch_size 3 and
    // len_factor 1 give len = 8/3 = 2 batches, i.e. the first 6 windows of
    // the pass in traversal order.
    let sampler = ConsecutiveSampler::new(
        synthetic(2, 64),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    let mut loader = BatchLoader::new(
        Box::new(sampler),
        vec![],
        LoaderConfig::default().batch_size(3),
    )
    .unwrap();
    assert_eq!(loader.len(), 2);

    let mut seen = Vec::new();
    for index in 0..loader.len() {
        let batch = loader.get_batch(index).unwrap();
        for i in 0..3 {
            seen.push(code_at(&batch, i));
        }
    }

    // Expected order: tile 0 row-major, then tile 1.
    let code = |t: usize, y: usize, x: usize| (t * 64 + y) * 64 + x;
    let expected = vec![
        code(0, 0, 0),
        code(0, 0, 32),
        code(0, 32, 0),
        code(0, 32, 32),
        code(1, 0, 0),
        code(1, 0, 32),
    ];
    assert_eq!(seen, expected);
}

#[test]
fn full_epoch_union_matches_window_set() {
    // batch_size 4 divides the 8 windows exactly: one epoch is one pass.
    let sampler = ConsecutiveSampler::new(
        synthetic(2, 64),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    let mut loader = BatchLoader::new(
        Box::new(sampler),
        vec![],
        LoaderConfig::default().batch_size(4),
    )
    .unwrap();
    assert_eq!(loader.len(), 2);

    let mut seen = HashSet::new();
    for index in 0..loader.len() {
        let batch = loader.get_batch(index).unwrap();
        for i in 0..4 {
            seen.insert(code_at(&batch, i));
        }
    }

    let mut expected = HashSet::new();
    for t in 0..2 {
        for y in [0, 32] {
            for x in [0, 32] {
                expected.insert((t * 64 + y) * 64 + x);
            }
        }
    }
    assert_eq!(seen, expected);
}

// Filtering

#[test]
fn filter_reduces_tiles_and_reindexes() {
    let mut store = MemoryTileStore::new();
    for (name, extent) in [("sEU32-0001", 64usize), ("sEU32-0002", 64), ("sUS07-0001", 64)] {
        let features = Array3::<f32>::zeros((extent, extent, 1));
        let outlines = Array3::<f32>::zeros((extent, extent, 1));
        store.insert(
            Tile::new(name)
                .with_array("features", features)
                .with_array("outlines", outlines)
                .with_attr("height", extent as i64)
                .with_attr("width", extent as i64)
                .with_attr("pad_height", 0)
                .with_attr("pad_width", 0),
        );
    }
    let sampler = ConsecutiveSampler::new(
        Arc::new(store),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();

    let plugins: Vec<Box<dyn Plugin>> =
        vec![Box::new(TileFilter::new(vec![region_in(&["EU32"])]))];
    let loader = BatchLoader::new(
        Box::new(sampler),
        plugins,
        LoaderConfig::default().batch_size(2),
    )
    .unwrap();

    assert_eq!(loader.sampler().tiles(), &["sEU32-0001", "sEU32-0002"]);
    // (64 + 1) / 32 = 2 per axis -> 4 windows per tile, surviving tiles only.
    assert_eq!(loader.sampler().n_patches(), 8);
}

#[test]
fn substring_filter_keeps_exact_subset() {
    let sampler = ConsecutiveSampler::new(
        synthetic(4, 64),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    let plugins: Vec<Box<dyn Plugin>> =
        vec![Box::new(TileFilter::new(vec![name_contains("-002")]))];
    let loader = BatchLoader::new(
        Box::new(sampler),
        plugins,
        LoaderConfig::default().batch_size(2),
    )
    .unwrap();
    assert_eq!(loader.sampler().tiles(), &["tile-002"]);
    assert_eq!(loader.sampler().n_patches(), 4);
}

// Oversampling

#[test]
fn oversampling_doubles_capacity_and_interleaves_pairs() {
    let sampler = ConsecutiveSampler::new(
        synthetic(2, 64),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    let plugins: Vec<Box<dyn Plugin>> =
        vec![Box::new(OversampleWithTransforms::new(vec![Box::new(FillOnes)]))];
    let mut loader = BatchLoader::new(
        Box::new(sampler),
        plugins,
        LoaderConfig::default().batch_size(4),
    )
    .unwrap();

    // 8 base windows, doubled by the plugin.
    assert_eq!(loader.sampler().n_patches(), 16);
    assert_eq!(loader.len(), 4);

    let batch = loader.get_batch(0).unwrap();
    // Accumulator order: original, transformed copy, original, copy.
    let code = |t: usize, y: usize, x: usize| (t * 64 + y) * 64 + x;
    assert_eq!(code_at(&batch, 0), code(0, 0, 0));
    assert_eq!(code_at(&batch, 1), 1); // filled with the constant
    assert_eq!(code_at(&batch, 2), code(0, 0, 32));
    assert_eq!(code_at(&batch, 3), 1);

    // Labels pair up the same way.
    assert_eq!(batch.y[0][[1, 5, 5, 0]], 1.0);
    assert_eq!(batch.y[0][[3, 5, 5, 0]], 1.0);
}

// Finalising

#[test]
fn label_replication_produces_shared_handles() {
    let sampler = ConsecutiveSampler::new(
        synthetic(1, 64),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(ReplicateLabels::default())];
    let mut loader = BatchLoader::new(
        Box::new(sampler),
        plugins,
        LoaderConfig::default().batch_size(2),
    )
    .unwrap();
    let batch = loader.get_batch(0).unwrap();
    assert_eq!(batch.y.len(), 2);
    assert_eq!(batch.y[0].as_ptr(), batch.y[1].as_ptr());
}

// Plugin chaining

#[test]
fn registration_order_fixes_the_sampling_chain() {
    // Two augmentations registered in order: the first fills with ones,
    // the second adds ten. A swapped chain would wipe the offset.
    struct AddTen;
    impl Transformation for AddTen {
        fn apply(&mut self, patch: &mut Patch) {
            for (_, data) in patch.iter_mut() {
                if data.ndim() != 3 {
                    continue;
                }
                match data {
                    ArrayData::F32(a) => *a += 10.0,
                    ArrayData::F64(a) => *a += 10.0,
                }
            }
        }
    }

    let sampler = ConsecutiveSampler::new(
        synthetic(1, 64),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    let plugins: Vec<Box<dyn Plugin>> = vec![
        Box::new(Augmentation::new(vec![Box::new(FillOnes)])),
        Box::new(Augmentation::new(vec![Box::new(AddTen)])),
    ];
    let mut loader = BatchLoader::new(
        Box::new(sampler),
        plugins,
        LoaderConfig::default().batch_size(2),
    )
    .unwrap();
    let batch = loader.get_batch(0).unwrap();
    // FillOnes ran first, AddTen second: 1 + 10.
    assert_eq!(code_at(&batch, 0), 11);
}

#[test]
fn undeclared_hooks_are_never_routed() {
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Spy {
        touched: Arc<AtomicBool>,
    }
    impl Plugin for Spy {
        fn hooks(&self) -> HookSet {
            HookSet::none()
        }
        fn on_sampling(&mut self, patch: Patch) -> tilefeed_core::Result<Vec<Patch>> {
            self.touched.store(true, Ordering::SeqCst);
            Ok(vec![patch])
        }
    }

    let touched = Arc::new(AtomicBool::new(false));
    let sampler = ConsecutiveSampler::new(
        synthetic(1, 64),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    // The spy's on_sampling body exists but is undeclared, so the loader
    // must never call it.
    let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Spy {
        touched: touched.clone(),
    })];
    let mut loader = BatchLoader::new(
        Box::new(sampler),
        plugins,
        LoaderConfig::default().batch_size(2),
    )
    .unwrap();
    loader.get_batch(0).unwrap();
    assert!(!touched.load(Ordering::SeqCst));
}

// Error propagation

#[test]
fn predicate_errors_surface_at_construction() {
    let sampler = ConsecutiveSampler::new(
        synthetic(2, 64),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(TileFilter::new(vec![Box::new(
        |tile: &Tile| tile.attr("cloud_cover").map(|v| v < 20),
    )]))];
    let err = BatchLoader::new(
        Box::new(sampler),
        plugins,
        LoaderConfig::default().batch_size(2),
    )
    .unwrap_err();
    assert!(matches!(err, Error::MissingAttr { .. }));
}

#[test]
fn capacity_guard_rejects_a_store_below_one_batch() {
    let sampler = ConsecutiveSampler::new(
        synthetic(1, 16),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    let mut loader = BatchLoader::new(
        Box::new(sampler),
        vec![],
        LoaderConfig::default().batch_size(1),
    )
    .unwrap();
    // The capacity formula reports (16+1)/32 = 0 windows.
    assert!(matches!(
        loader.get_batch(0).unwrap_err(),
        Error::EmptyBatch { .. }
    ));
}

#[test]
fn undersized_tile_fails_at_first_touch() {
    // One addressable tile plus one that cannot hold a single window. The
    // small tile contributes zero capacity, so the first batch assembles
    // fine; traversal reaching the small tile must fail loudly instead of
    // clamping the window.
    let mut store = MemoryTileStore::new();
    for (name, extent) in [("a-big", 64usize), ("b-small", 16)] {
        store.insert(
            Tile::new(name)
                .with_array("features", Array3::<f32>::zeros((extent, extent, 1)))
                .with_array("outlines", Array3::<f32>::zeros((extent, extent, 1)))
                .with_attr("height", extent as i64)
                .with_attr("width", extent as i64)
                .with_attr("pad_height", 0)
                .with_attr("pad_width", 0),
        );
    }
    let sampler = ConsecutiveSampler::new(
        Arc::new(store),
        SamplerConfig::default().patch_size(32),
    )
    .unwrap();
    let mut loader = BatchLoader::new(
        Box::new(sampler),
        vec![],
        LoaderConfig::default().batch_size(4),
    )
    .unwrap();

    // The big tile's 4 windows fill the first batch.
    loader.get_batch(0).unwrap();
    // The next request advances into the small tile.
    assert!(matches!(
        loader.get_batch(1).unwrap_err(),
        Error::OutOfRange { .. }
    ));
}

// Prefetching

#[test]
fn prefetched_epoch_equals_synchronous_epoch() {
    let build = || {
        let sampler = ConsecutiveSampler::new(
            synthetic(2, 64),
            SamplerConfig::default().patch_size(32),
        )
        .unwrap();
        BatchLoader::new(
            Box::new(sampler),
            vec![],
            LoaderConfig::default().batch_size(2),
        )
        .unwrap()
    };

    let mut sync_loader = build();
    let expected: Vec<usize> = (0..sync_loader.len())
        .map(|i| code_at(&sync_loader.get_batch(i).unwrap(), 0))
        .collect();

    let got: Vec<usize> = prefetch_epoch(build(), PrefetchConfig::default().depth(2))
        .map(|b| code_at(&b.unwrap(), 0))
        .collect();

    assert_eq!(got, expected);
}
