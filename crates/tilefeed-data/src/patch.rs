// Patch — one sampled window, as a mapping of feature name to array

use std::collections::HashMap;

use tilefeed_core::ArrayData;

/// A single sampled patch: feature name → windowed array of shape
/// `(patch, patch, channels)`.
///
/// The label entry is always `f64`; other entries keep the dtype their tile
/// stores them in. A `Patch` is created fresh per `sample()` call and owned
/// exclusively by its producer until handed to the batch accumulator.
/// `clone()` produces an independent deep copy of every entry.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    entries: HashMap<String, ArrayData>,
}

impl Patch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) an entry.
    pub fn insert(&mut self, feature: impl Into<String>, data: impl Into<ArrayData>) {
        self.entries.insert(feature.into(), data.into());
    }

    /// Look up an entry by feature name.
    pub fn get(&self, feature: &str) -> Option<&ArrayData> {
        self.entries.get(feature)
    }

    /// Mutable lookup, for in-place transformations.
    pub fn get_mut(&mut self, feature: &str) -> Option<&mut ArrayData> {
        self.entries.get_mut(feature)
    }

    /// Whether the patch carries the given feature.
    pub fn contains(&self, feature: &str) -> bool {
        self.entries.contains_key(feature)
    }

    /// Feature names present in this patch.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayData)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate mutably over all entries.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ArrayData)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the patch has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
