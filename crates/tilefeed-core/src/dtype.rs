use std::fmt;

// DType — element types carried through the sampling pipeline
//
// Feature arrays keep whatever element type the tile store holds them in;
// label windows are always promoted to F64 when a patch is cut. Two float
// types cover everything the pipeline produces:
//
//   F32 — 32-bit float, the usual storage type for raster features
//   F64 — 64-bit float, the label precision

/// Enum of the supported element data types.
///
/// Stored inside every [`ArrayData`](crate::ArrayData) value so callers can
/// dispatch to the correct typed representation at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Whether this dtype is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{}", s)
    }
}
