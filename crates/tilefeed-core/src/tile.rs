// Tile — a named raster unit with feature arrays and integer attributes

use std::collections::HashMap;

use crate::array::ArrayData;
use crate::error::{Error, Result};

/// A named raster unit holding one or more feature arrays plus integer
/// attributes describing the unpadded extent and its symmetric padding.
///
/// The four attributes every tile must carry are `height`, `width`,
/// `pad_height`, and `pad_width`. Attributes are kept as an open map so a
/// store can attach whatever else it knows about a tile; an absent key
/// surfaces as an error instead of a silent default.
///
/// Tiles are immutable from the sampling pipeline's point of view: samplers
/// only read arrays and attributes, and filtering drops tile *references*,
/// never tile data.
#[derive(Debug, Clone)]
pub struct Tile {
    name: String,
    arrays: HashMap<String, ArrayData>,
    attrs: HashMap<String, i64>,
}

impl Tile {
    /// Create an empty tile with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arrays: HashMap::new(),
            attrs: HashMap::new(),
        }
    }

    /// Attach a named feature array.
    pub fn with_array(mut self, feature: impl Into<String>, data: impl Into<ArrayData>) -> Self {
        self.arrays.insert(feature.into(), data.into());
        self
    }

    /// Attach an integer attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: i64) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// The tile's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the feature arrays this tile holds.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// Look up a feature array by name.
    pub fn array(&self, feature: &str) -> Result<&ArrayData> {
        self.arrays.get(feature).ok_or_else(|| Error::MissingFeature {
            tile: self.name.clone(),
            feature: feature.to_string(),
        })
    }

    /// Look up an integer attribute by key.
    pub fn attr(&self, key: &str) -> Result<i64> {
        self.attrs
            .get(key)
            .copied()
            .ok_or_else(|| Error::MissingAttr {
                tile: self.name.clone(),
                attr: key.to_string(),
            })
    }

    /// Whether the tile carries the given attribute.
    pub fn has_attr(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }
}
