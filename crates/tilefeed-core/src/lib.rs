//! # tilefeed-core
//!
//! Tile data model, array values, and the store contract for tilefeed.
//!
//! This crate provides:
//! - [`DType`] — element data types carried by the pipeline (f32, f64)
//! - [`ArrayData`] — dtype-tagged dynamically-ranked array values
//! - [`Tile`] — a named raster unit with feature arrays and integer attrs
//! - [`TileStore`] trait — keyed access to resident tiles
//! - [`MemoryTileStore`] — in-memory store with synthetic test fixtures
//! - [`Error`] / [`Result`] — the shared error type

pub mod array;
pub mod dtype;
pub mod error;
pub mod store;
pub mod tile;

pub use array::ArrayData;
pub use dtype::DType;
pub use error::{Error, Result};
pub use store::{MemoryTileStore, TileStore};
pub use tile::Tile;
