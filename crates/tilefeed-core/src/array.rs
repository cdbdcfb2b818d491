// ArrayData — dtype-tagged n-dimensional array values
//
// Tiles hold raster bands in whatever element type the store materialised
// them with; labels travel as f64. A tagged union over the two lets patches
// and batches carry mixed-dtype entries under one map value type while
// operations dispatch to the correct typed representation at runtime.

use ndarray::{Array, ArrayD, ArrayViewD, Axis, Ix3};

use crate::error::{Error, Result};
use crate::DType;

/// A dynamically-ranked array tagged with its element dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

impl ArrayData {
    /// The element dtype of this array.
    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
        }
    }

    /// The shape of the array.
    pub fn shape(&self) -> &[usize] {
        match self {
            ArrayData::F32(a) => a.shape(),
            ArrayData::F64(a) => a.shape(),
        }
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        match self {
            ArrayData::F32(a) => a.ndim(),
            ArrayData::F64(a) => a.ndim(),
        }
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::F32(a) => a.len(),
            ArrayData::F64(a) => a.len(),
        }
    }

    /// Whether the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cut a `size`×`size` window at row `y`, column `x` from a rank-3
    /// `(height, width, channels)` array, keeping the dtype.
    ///
    /// # Errors
    /// `RankMismatch` if the array is not rank 3; `WindowOutOfBounds` if the
    /// window does not fit within the array's extent.
    pub fn window(&self, y: usize, x: usize, size: usize) -> Result<ArrayData> {
        fn cut<T: Clone>(a: &ArrayD<T>, y: usize, x: usize, size: usize) -> Result<ArrayD<T>> {
            let a3 = a
                .view()
                .into_dimensionality::<Ix3>()
                .map_err(|_| Error::RankMismatch {
                    expected: 3,
                    got: a.ndim(),
                })?;
            let (h, w, _) = a3.dim();
            if y + size > h || x + size > w {
                return Err(Error::WindowOutOfBounds {
                    y,
                    x,
                    size,
                    height: h,
                    width: w,
                });
            }
            Ok(a3
                .slice(ndarray::s![y..y + size, x..x + size, ..])
                .to_owned()
                .into_dyn())
        }
        match self {
            ArrayData::F32(a) => Ok(ArrayData::F32(cut(a, y, x, size)?)),
            ArrayData::F64(a) => Ok(ArrayData::F64(cut(a, y, x, size)?)),
        }
    }

    /// Convert to an owned `f64` array, promoting `f32` elements.
    pub fn to_f64(&self) -> ArrayD<f64> {
        match self {
            ArrayData::F32(a) => a.mapv(f64::from),
            ArrayData::F64(a) => a.clone(),
        }
    }

    /// Stack arrays of equal dtype and shape along a new leading axis.
    ///
    /// The result has shape `(n, ..item_shape)`.
    ///
    /// # Errors
    /// `EmptyBatch` on an empty input, `DTypeMismatch` on mixed dtypes,
    /// `ShapeMismatch` when item shapes disagree.
    pub fn stack(parts: &[&ArrayData]) -> Result<ArrayData> {
        let first = parts.first().ok_or(Error::EmptyBatch { have: 0, need: 1 })?;
        let dtype = first.dtype();
        let shape = first.shape();
        for part in &parts[1..] {
            if part.dtype() != dtype {
                return Err(Error::DTypeMismatch {
                    expected: dtype,
                    got: part.dtype(),
                });
            }
            if part.shape() != shape {
                return Err(Error::ShapeMismatch {
                    expected: shape.to_vec(),
                    got: part.shape().to_vec(),
                });
            }
        }

        fn stack_views<T: Clone>(views: Vec<ArrayViewD<'_, T>>) -> Result<ArrayD<T>> {
            ndarray::stack(Axis(0), &views)
                .map_err(|e| Error::msg(format!("stacking failed: {e}")))
        }

        match dtype {
            DType::F32 => {
                let views = parts
                    .iter()
                    .map(|p| match p {
                        ArrayData::F32(a) => Ok(a.view()),
                        other => Err(Error::DTypeMismatch {
                            expected: DType::F32,
                            got: other.dtype(),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ArrayData::F32(stack_views(views)?))
            }
            DType::F64 => {
                let views = parts
                    .iter()
                    .map(|p| match p {
                        ArrayData::F64(a) => Ok(a.view()),
                        other => Err(Error::DTypeMismatch {
                            expected: DType::F64,
                            got: other.dtype(),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ArrayData::F64(stack_views(views)?))
            }
        }
    }
}

impl From<ArrayD<f32>> for ArrayData {
    fn from(a: ArrayD<f32>) -> Self {
        ArrayData::F32(a)
    }
}

impl From<ArrayD<f64>> for ArrayData {
    fn from(a: ArrayD<f64>) -> Self {
        ArrayData::F64(a)
    }
}

impl From<Array<f32, Ix3>> for ArrayData {
    fn from(a: Array<f32, Ix3>) -> Self {
        ArrayData::F32(a.into_dyn())
    }
}

impl From<Array<f64, Ix3>> for ArrayData {
    fn from(a: Array<f64, Ix3>) -> Self {
        ArrayData::F64(a.into_dyn())
    }
}
