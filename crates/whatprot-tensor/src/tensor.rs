//! Dense order-`O` tensor over a fixed shape, with range-scoped iteration.
//!
//! The allocation always spans the *full* shape passed to [`Tensor::new`]
//! (no cropped-allocation optimization — see `DESIGN.md` for why); the live
//! sub-region a caller cares about at any point is tracked separately by
//! [`crate::psv::PeptideStateVector::range`]. This keeps indexing a single
//! strided dot product with no extra offset bookkeeping.

use crate::range::KDRange;

/// Row-major dense buffer of shape `shape[0] x shape[1] x ... x shape[O-1]`.
#[derive(Clone, Debug)]
pub struct Tensor {
    shape: Vec<usize>,
    strides: Vec<usize>,
    values: Vec<f64>,
}

impl Tensor {
    /// Allocate a zero-filled tensor of the given shape.
    #[must_use]
    pub fn new(shape: &[usize]) -> Self {
        let order = shape.len();
        let mut strides = vec![0usize; order];
        let mut size = 1usize;
        for i in (0..order).rev() {
            strides[i] = size;
            size *= shape[i];
        }
        Tensor {
            shape: shape.to_vec(),
            strides,
            values: vec![0.0; size],
        }
    }

    #[inline]
    #[must_use]
    pub fn order(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    #[must_use]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[inline]
    fn index(&self, loc: &[usize]) -> usize {
        debug_assert_eq!(loc.len(), self.order());
        loc.iter().zip(&self.strides).map(|(&l, &s)| l * s).sum()
    }

    #[must_use]
    pub fn get(&self, loc: &[usize]) -> f64 {
        self.values[self.index(loc)]
    }

    pub fn set(&mut self, loc: &[usize], value: f64) {
        let i = self.index(loc);
        self.values[i] = value;
    }

    pub fn get_mut(&mut self, loc: &[usize]) -> &mut f64 {
        let i = self.index(loc);
        &mut self.values[i]
    }

    /// Sum of every allocated cell, ignoring any live-range bookkeeping.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Sum of all cells within `range`.
    #[must_use]
    pub fn sum_range(&self, range: &KDRange) -> f64 {
        let mut total = 0.0;
        self.for_each_in_range(range, |v| total += v);
        total
    }

    /// Visit every cell in `range` in row-major order (immutable).
    pub fn for_each_in_range(&self, range: &KDRange, mut f: impl FnMut(f64)) {
        if range.is_empty() {
            return;
        }
        let mut cursor = range.min.clone();
        loop {
            f(self.get(&cursor));
            if !advance_cursor(&mut cursor, range) {
                break;
            }
        }
    }

    /// Visit every cell in `range` in row-major order (mutable).
    pub fn for_each_in_range_mut(&mut self, range: &KDRange, mut f: impl FnMut(&mut f64)) {
        if range.is_empty() {
            return;
        }
        let mut cursor = range.min.clone();
        loop {
            f(self.get_mut(&cursor));
            if !advance_cursor(&mut cursor, range) {
                break;
            }
        }
    }

    /// Visit every 1-D slice along `axis` whose outer coordinates range over
    /// `range` (with `axis` itself held fixed at `range.min[axis]` — the
    /// callback receives the whole `[range.min[axis], range.max[axis])` span).
    pub fn for_each_vector(&self, range: &KDRange, axis: usize, mut f: impl FnMut(&StridedVec<'_>)) {
        if range.shape().iter().enumerate().any(|(i, &n)| i != axis && n == 0) {
            return;
        }
        let len = range.max[axis].saturating_sub(range.min[axis]);
        if len == 0 {
            return;
        }
        let stride = self.strides[axis];
        self.for_each_outer(range, axis, |base| {
            let v = StridedVec {
                data: &self.values,
                base,
                stride,
                len,
            };
            f(&v);
        });
    }

    /// Mutable counterpart of [`Tensor::for_each_vector`].
    pub fn for_each_vector_mut(
        &mut self,
        range: &KDRange,
        axis: usize,
        mut f: impl FnMut(&mut StridedVecMut<'_>),
    ) {
        if range.shape().iter().enumerate().any(|(i, &n)| i != axis && n == 0) {
            return;
        }
        let len = range.max[axis].saturating_sub(range.min[axis]);
        if len == 0 {
            return;
        }
        let stride = self.strides[axis];
        let order = self.order();
        let mut cursor = range.min.clone();
        loop {
            let mut base = 0usize;
            for i in 0..order {
                if i != axis {
                    base += cursor[i] * self.strides[i];
                }
            }
            {
                let mut v = StridedVecMut {
                    data: &mut self.values,
                    base,
                    stride,
                    len,
                };
                f(&mut v);
            }
            if !advance_outer_cursor(&mut cursor, range, axis) {
                break;
            }
        }
    }

    /// Visit every 1-D slice along `axis` in `self` together with the
    /// corresponding slice in `out` (same shape), letting the callback read
    /// one and write the other. Used by transitions that redistribute mass
    /// along a single axis (e.g. a binomial survival table) without an
    /// in-place read/write hazard.
    pub fn transform_vectors(
        &self,
        range: &KDRange,
        axis: usize,
        out: &mut Tensor,
        mut f: impl FnMut(&StridedVec<'_>, &mut StridedVecMut<'_>),
    ) {
        debug_assert_eq!(self.shape, out.shape);
        if range.shape().iter().enumerate().any(|(i, &n)| i != axis && n == 0) {
            return;
        }
        let len = range.max[axis].saturating_sub(range.min[axis]);
        if len == 0 {
            return;
        }
        let in_stride = self.strides[axis];
        let out_stride = out.strides[axis];
        let order = self.order();
        let mut cursor = range.min.clone();
        loop {
            let mut base = 0usize;
            for i in 0..order {
                if i != axis {
                    base += cursor[i] * self.strides[i];
                }
            }
            let vin = StridedVec {
                data: &self.values,
                base,
                stride: in_stride,
                len,
            };
            let mut vout = StridedVecMut {
                data: &mut out.values,
                base,
                stride: out_stride,
                len,
            };
            f(&vin, &mut vout);
            if !advance_outer_cursor(&mut cursor, range, axis) {
                break;
            }
        }
    }

    fn for_each_outer(&self, range: &KDRange, axis: usize, mut f: impl FnMut(usize)) {
        let order = self.order();
        let mut cursor = range.min.clone();
        loop {
            let mut base = 0usize;
            for i in 0..order {
                if i != axis {
                    base += cursor[i] * self.strides[i];
                }
            }
            f(base);
            if !advance_outer_cursor(&mut cursor, range, axis) {
                break;
            }
        }
    }
}

/// Advance `cursor` in row-major order within `range`. Returns `false` once
/// the final cell has been visited.
fn advance_cursor(cursor: &mut [usize], range: &KDRange) -> bool {
    for i in (0..cursor.len()).rev() {
        cursor[i] += 1;
        if cursor[i] < range.max[i] {
            return true;
        }
        cursor[i] = range.min[i];
    }
    false
}

/// Like [`advance_cursor`] but skips `axis` (used when enumerating the outer
/// coordinates for a vector iterator along `axis`).
fn advance_outer_cursor(cursor: &mut [usize], range: &KDRange, axis: usize) -> bool {
    for i in (0..cursor.len()).rev() {
        if i == axis {
            continue;
        }
        cursor[i] += 1;
        if cursor[i] < range.max[i] {
            return true;
        }
        cursor[i] = range.min[i];
    }
    false
}

/// A borrowed, strided 1-D view into a [`Tensor`]'s buffer (immutable).
#[derive(Debug)]
pub struct StridedVec<'a> {
    data: &'a [f64],
    base: usize,
    stride: usize,
    len: usize,
}

impl<'a> StridedVec<'a> {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> f64 {
        self.data[self.base + i * self.stride]
    }
}

/// Mutable counterpart of [`StridedVec`].
#[derive(Debug)]
pub struct StridedVecMut<'a> {
    data: &'a mut [f64],
    base: usize,
    stride: usize,
    len: usize,
}

impl<'a> StridedVecMut<'a> {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> f64 {
        self.data[self.base + i * self.stride]
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: f64) {
        self.data[self.base + i * self.stride] = value;
    }
}
