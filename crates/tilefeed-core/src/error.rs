/// All errors that can occur within tilefeed.
///
/// This enum captures every failure mode of the sampling pipeline: tiles too
/// small for the requested patch, missing features or attributes, dtype and
/// shape disagreements during batch assembly, and invalid configuration.
/// Using a single error type across the workspace simplifies propagation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A tile's usable extent is smaller than the requested patch size.
    ///
    /// Fatal for the sampler configuration that hit it; never clamped.
    #[error(
        "patch size {patch} does not fit tile '{tile}' with extent {height}x{width}"
    )]
    OutOfRange {
        tile: String,
        height: usize,
        width: usize,
        patch: usize,
    },

    /// Not enough samples to assemble one batch.
    #[error("cannot assemble a batch: {have} patches available, {need} needed")]
    EmptyBatch { have: usize, need: usize },

    /// Sampling was attempted on an empty tile list.
    #[error("no tiles to sample from")]
    EmptyTileSet,

    /// A tile id was not found in the store.
    #[error("tile '{tile}' not found in store")]
    MissingTile { tile: String },

    /// A named feature array is absent from a tile.
    #[error("tile '{tile}' has no feature array '{feature}'")]
    MissingFeature { tile: String, feature: String },

    /// A required integer attribute is absent from a tile.
    #[error("tile '{tile}' has no attribute '{attr}'")]
    MissingAttr { tile: String, attr: String },

    /// Operation requires a specific rank (number of dimensions).
    #[error("rank mismatch: expected rank {expected}, got {got}")]
    RankMismatch { expected: usize, got: usize },

    /// Mixed element dtypes where a uniform dtype is required.
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch {
        expected: crate::DType,
        got: crate::DType,
    },

    /// Arrays disagree in shape where equal shapes are required.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    /// A window selection falls outside an array's extent.
    #[error(
        "window ({y}, {x}) + {size} exceeds array extent {height}x{width}"
    )]
    WindowOutOfBounds {
        y: usize,
        x: usize,
        size: usize,
        height: usize,
        width: usize,
    },

    /// Invalid construction parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout tilefeed.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
