// Transformations — randomized in-place patch mutators
//
// Every transformation mutates the rank-3 `(height, width, channels)`
// entries of a patch in place and leaves entries of any other rank
// untouched. Each one owns its own RNG and draws its own probability gate,
// so composing N transformations is the sequential application of each in
// caller order, each independently randomized.

use ndarray::{ArrayD, Axis, IxDyn};
use num_traits::AsPrimitive;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tilefeed_core::ArrayData;

use crate::patch::Patch;

/// A randomized in-place patch mutator.
pub trait Transformation: Send {
    /// Apply the transformation to the patch, mutating rank-3 entries in
    /// place.
    fn apply(&mut self, patch: &mut Patch);
}

// Geometry helpers

fn flip_axis(data: &mut ArrayData, axis: usize) {
    match data {
        ArrayData::F32(a) => a.invert_axis(Axis(axis)),
        ArrayData::F64(a) => a.invert_axis(Axis(axis)),
    }
}

/// One clockwise quarter-turn in the (row, column) plane.
fn rot90_cw<T: Clone>(a: &ArrayD<T>) -> ArrayD<T> {
    let mut v = a.view();
    v.swap_axes(0, 1);
    v.invert_axis(Axis(1));
    v.to_owned()
}

/// Crop `crop`×`crop` at `(y0, x0)` and rescale back to `out`×`out` per
/// channel. Interpolation is bilinear with pixel-center alignment.
fn crop_and_rescale<T>(src: &ArrayD<T>, y0: usize, x0: usize, crop: usize, out: usize) -> ArrayD<T>
where
    T: Copy + 'static + AsPrimitive<f64>,
    f64: AsPrimitive<T>,
{
    let channels = src.shape()[2];
    let scale = crop as f64 / out as f64;
    ArrayD::from_shape_fn(IxDyn(&[out, out, channels]), |idx| {
        let sy = ((idx[0] as f64 + 0.5) * scale - 0.5).max(0.0);
        let sx = ((idx[1] as f64 + 0.5) * scale - 0.5).max(0.0);
        let c = idx[2];

        let yl = (sy.floor() as usize).min(crop - 1);
        let yh = (yl + 1).min(crop - 1);
        let xl = (sx.floor() as usize).min(crop - 1);
        let xh = (xl + 1).min(crop - 1);
        let fy = sy - yl as f64;
        let fx = sx - xl as f64;

        let v00: f64 = src[[y0 + yl, x0 + xl, c]].as_();
        let v01: f64 = src[[y0 + yl, x0 + xh, c]].as_();
        let v10: f64 = src[[y0 + yh, x0 + xl, c]].as_();
        let v11: f64 = src[[y0 + yh, x0 + xh, c]].as_();

        let top = v00 * (1.0 - fx) + v01 * fx;
        let bottom = v10 * (1.0 - fx) + v11 * fx;
        (top * (1.0 - fy) + bottom * fy).as_()
    })
}

// RandomVerticalFlip

/// Flip rows of every rank-3 entry with probability `p`.
#[derive(Debug)]
pub struct RandomVerticalFlip {
    pub p: f64,
    rng: StdRng,
}

impl RandomVerticalFlip {
    pub fn new(p: f64) -> Self {
        Self {
            p,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(p: f64, seed: u64) -> Self {
        Self {
            p,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomVerticalFlip {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Transformation for RandomVerticalFlip {
    fn apply(&mut self, patch: &mut Patch) {
        if self.rng.gen::<f64>() >= self.p {
            return;
        }
        for (_, data) in patch.iter_mut() {
            if data.ndim() != 3 {
                continue;
            }
            flip_axis(data, 0);
        }
    }
}

// RandomHorizontalFlip

/// Flip columns of every rank-3 entry with probability `p`.
#[derive(Debug)]
pub struct RandomHorizontalFlip {
    pub p: f64,
    rng: StdRng,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Self {
        Self {
            p,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(p: f64, seed: u64) -> Self {
        Self {
            p,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomHorizontalFlip {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl Transformation for RandomHorizontalFlip {
    fn apply(&mut self, patch: &mut Patch) {
        if self.rng.gen::<f64>() >= self.p {
            return;
        }
        for (_, data) in patch.iter_mut() {
            if data.ndim() != 3 {
                continue;
            }
            flip_axis(data, 1);
        }
    }
}

// RandomRotation

/// Rotate every rank-3 entry by the same random multiple of 90 degrees
/// (clockwise) with probability `p`. One k in {1, 2, 3} is drawn per patch,
/// so features and label stay aligned.
#[derive(Debug)]
pub struct RandomRotation {
    pub p: f64,
    rng: StdRng,
}

impl RandomRotation {
    pub fn new(p: f64) -> Self {
        Self {
            p,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(p: f64, seed: u64) -> Self {
        Self {
            p,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomRotation {
    fn default() -> Self {
        Self::new(0.75)
    }
}

impl Transformation for RandomRotation {
    fn apply(&mut self, patch: &mut Patch) {
        if self.rng.gen::<f64>() >= self.p {
            return;
        }
        let k = self.rng.gen_range(1..=3);
        for (_, data) in patch.iter_mut() {
            if data.ndim() != 3 {
                continue;
            }
            for _ in 0..k {
                match data {
                    ArrayData::F32(a) => *a = rot90_cw(a),
                    ArrayData::F64(a) => *a = rot90_cw(a),
                }
            }
        }
    }
}

// RandomCropScale

/// With probability `p`, crop a random sub-square of `[scale, 1.0)` of the
/// patch linear size and rescale it back to the original size, per channel,
/// with bilinear interpolation. One crop geometry is drawn per patch and
/// applied to every rank-3 entry, so features and label stay aligned.
#[derive(Debug)]
pub struct RandomCropScale {
    pub scale: f64,
    pub p: f64,
    rng: StdRng,
}

impl RandomCropScale {
    /// # Panics
    /// Panics if `scale` is not within `(0.0, 1.0)`.
    pub fn new(scale: f64, p: f64) -> Self {
        assert!(
            scale > 0.0 && scale < 1.0,
            "RandomCropScale: scale must be in (0.0, 1.0), got {scale}"
        );
        Self {
            scale,
            p,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(scale: f64, p: f64, seed: u64) -> Self {
        let mut t = Self::new(scale, p);
        t.rng = StdRng::seed_from_u64(seed);
        t
    }
}

impl Default for RandomCropScale {
    fn default() -> Self {
        Self::new(0.8, 0.5)
    }
}

impl Transformation for RandomCropScale {
    fn apply(&mut self, patch: &mut Patch) {
        if self.rng.gen::<f64>() >= self.p {
            return;
        }
        // The patch linear size comes from the first rank-3 entry.
        let size = match patch.iter().find(|(_, d)| d.ndim() == 3) {
            Some((_, d)) => d.shape()[0],
            None => return,
        };
        if size < 2 {
            return;
        }
        let coef = self.rng.gen_range(self.scale..1.0);
        let crop = ((coef * size as f64) as usize).max(1);
        let y0 = self.rng.gen_range(0..size - crop);
        let x0 = self.rng.gen_range(0..size - crop);

        for (_, data) in patch.iter_mut() {
            if data.ndim() != 3 {
                continue;
            }
            match data {
                ArrayData::F32(a) => *a = crop_and_rescale(a, y0, x0, crop, size),
                ArrayData::F64(a) => *a = crop_and_rescale(a, y0, x0, crop, size),
            }
        }
    }
}
