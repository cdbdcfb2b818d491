// Prefetching — produce batches ahead of the consumer on one worker thread
//
// The sampler mutates shared cursor state and oversampling plugins must run
// on the same logical thread as the fill loop, so exactly one background
// thread owns the loader and produces batches in order into a bounded
// channel. The consumer pulls ready batches from the channel, overlapping
// batch assembly with training computation.
//
// Usage:
//
//   let loader = BatchLoader::new(sampler, plugins, config)?;
//   for batch in prefetch_epoch(loader, PrefetchConfig::default().depth(4)) {
//       let batch = batch?;
//       // train on batch ...
//   }

use std::sync::mpsc;
use std::thread;

use tilefeed_core::Result;

use crate::loader::{Batch, BatchLoader};

/// Configuration for the prefetcher.
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// How many assembled batches may wait in the channel ahead of the
    /// consumer.
    pub depth: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self { depth: 2 }
    }
}

impl PrefetchConfig {
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

/// Run one epoch of batches on a background thread.
///
/// The worker requests batches `0..loader.len()` in order, so deterministic
/// traversal behaves exactly as it would in a synchronous loop. A failed
/// batch is surfaced as an `Err` item; later batches still follow (note
/// that retrying a failed index is only possible after recovering the
/// loader with [`PrefetchIterator::join`]).
pub fn prefetch_epoch(mut loader: BatchLoader, config: PrefetchConfig) -> PrefetchIterator {
    let total = loader.len();
    let (tx, rx) = mpsc::sync_channel::<Result<Batch>>(config.depth.max(1));

    let handle = thread::spawn(move || {
        for index in 0..total {
            let result = loader.get_batch(index);
            if tx.send(result).is_err() {
                // Receiver dropped; stop producing.
                break;
            }
        }
        loader
    });

    PrefetchIterator {
        rx,
        handle: Some(handle),
        remaining: total,
    }
}

/// An iterator yielding prefetched batches from the background worker.
///
/// The worker is joined when the iterator is dropped, or earlier via
/// [`join`](PrefetchIterator::join) to recover the loader.
pub struct PrefetchIterator {
    rx: mpsc::Receiver<Result<Batch>>,
    handle: Option<thread::JoinHandle<BatchLoader>>,
    remaining: usize,
}

impl PrefetchIterator {
    /// Drain any remaining batches, join the worker, and hand the loader
    /// back for further use.
    pub fn join(mut self) -> BatchLoader {
        // Keep receiving until the worker finishes its epoch and hangs up;
        // try_recv alone could leave it blocked on a full channel.
        while self.rx.recv().is_ok() {}
        let handle = self.handle.take().expect("worker already joined");
        match handle.join() {
            Ok(loader) => loader,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Iterator for PrefetchIterator {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.rx.recv() {
            Ok(batch) => {
                self.remaining -= 1;
                Some(batch)
            }
            Err(_) => {
                // Channel closed — worker done (possibly early).
                self.remaining = 0;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PrefetchIterator {}

impl Drop for PrefetchIterator {
    fn drop(&mut self) {
        // Keep the channel draining so the worker never blocks on a full
        // buffer, then join it.
        if let Some(handle) = self.handle.take() {
            while self.rx.recv().is_ok() {}
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tilefeed_core::MemoryTileStore;

    use crate::loader::LoaderConfig;
    use crate::sampler::{ConsecutiveSampler, SamplerConfig};

    fn loader() -> BatchLoader {
        let store = Arc::new(MemoryTileStore::synthetic(2, 64, 64, 1, 0));
        let sampler =
            ConsecutiveSampler::new(store, SamplerConfig::default().patch_size(32)).unwrap();
        BatchLoader::new(Box::new(sampler), vec![], LoaderConfig::default().batch_size(2)).unwrap()
    }

    #[test]
    fn yields_one_epoch_in_order() {
        let mut sync_loader = loader();
        let expected: Vec<_> = (0..sync_loader.len())
            .map(|i| sync_loader.get_batch(i).unwrap())
            .collect();

        let prefetched: Vec<_> = prefetch_epoch(loader(), PrefetchConfig::default())
            .map(|b| b.unwrap())
            .collect();

        assert_eq!(prefetched.len(), expected.len());
        for (got, want) in prefetched.iter().zip(expected.iter()) {
            assert_eq!(got.x.get("features"), want.x.get("features"));
        }
    }

    #[test]
    fn join_recovers_the_loader() {
        let iter = prefetch_epoch(loader(), PrefetchConfig::default().depth(1));
        let mut recovered = iter.join();
        // The loader is fully usable again on this thread.
        assert!(recovered.get_batch(0).is_ok());
    }

    #[test]
    fn early_drop_joins_cleanly() {
        let mut iter = prefetch_epoch(loader(), PrefetchConfig::default().depth(1));
        let _ = iter.next();
        drop(iter);
    }
}
