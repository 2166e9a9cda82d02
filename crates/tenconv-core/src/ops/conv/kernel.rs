//! Windowed accumulation inner loop.
//!
//! The output is split into `(n, c_out)` planes, each a contiguous row-major
//! chunk of the output buffer. Planes are independent, so they can be filled
//! sequentially or on the rayon pool without synchronization.
//!
//! For every output position the valid kernel-tap range is computed once per
//! spatial dimension, which removes per-tap boundary checks: taps that would
//! read the implicit zero padding are simply never visited.

use super::geometry::ConvGeometry;
use crate::dtype::Element;
use crate::tensor_view::TensorView;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Accumulation strategy, selected at compile time per call
pub(crate) trait Accumulator<T: Element> {
    type Acc: Copy;

    fn zero() -> Self::Acc;

    fn mul_add(acc: Self::Acc, x: T, w: T) -> Self::Acc;

    fn finish(acc: Self::Acc) -> T;
}

/// Accumulates in the element type
pub(crate) struct NativeAcc;

impl<T: Element> Accumulator<T> for NativeAcc {
    type Acc = T;

    #[inline(always)]
    fn zero() -> T {
        T::zero()
    }

    #[inline(always)]
    fn mul_add(acc: T, x: T, w: T) -> T {
        // Not fused: rounding must match a plain multiply then add
        acc + x * w
    }

    #[inline(always)]
    fn finish(acc: T) -> T {
        acc
    }
}

/// Accumulates in f64 and rounds once
pub(crate) struct WidenedAcc;

impl<T: Element> Accumulator<T> for WidenedAcc {
    type Acc = f64;

    #[inline(always)]
    fn zero() -> f64 {
        0.0
    }

    #[inline(always)]
    fn mul_add(acc: f64, x: T, w: T) -> f64 {
        acc + x.to_f64() * w.to_f64()
    }

    #[inline(always)]
    fn finish(acc: f64) -> T {
        T::from_f64(acc)
    }
}

/// Strided access into one operand.
///
/// `outer` holds the strides of the two leading axes: batch and channel for
/// the input (batch stride is 0 without a batch axis), output and input
/// channel for the kernel.
struct Operand<'a, T> {
    data: &'a [T],
    offset: isize,
    outer: [isize; 2],
    spatial: &'a [isize],
}

impl<'a, T: Element> Operand<'a, T> {
    fn input(view: &'a TensorView<'a, T>, has_batch: bool) -> Self {
        let strides = view.strides();
        let (outer, spatial) = if has_batch {
            ([strides[0], strides[1]], &strides[2..])
        } else {
            ([0, strides[0]], &strides[1..])
        };
        Self {
            data: view.data(),
            offset: view.offset() as isize,
            outer,
            spatial,
        }
    }

    fn kernel(view: &'a TensorView<'a, T>) -> Self {
        let strides = view.strides();
        Self {
            data: view.data(),
            offset: view.offset() as isize,
            outer: [strides[0], strides[1]],
            spatial: &strides[2..],
        }
    }
}

/// Per-plane scratch describing the current output position's window
#[derive(Debug)]
struct Window {
    out_index: Vec<usize>,
    /// Input coordinate of the first in-range tap
    first: Vec<isize>,
    /// Valid tap range `[lo, hi)` per dimension
    lo: Vec<usize>,
    hi: Vec<usize>,
}

impl Window {
    fn new(rank: usize) -> Self {
        Self {
            out_index: vec![0; rank],
            first: vec![0; rank],
            lo: vec![0; rank],
            hi: vec![0; rank],
        }
    }
}

/// Everything the inner loop needs, resolved once per call
pub(crate) struct ConvPlan<'a, T> {
    geometry: &'a ConvGeometry,
    input: Operand<'a, T>,
    kernel: Operand<'a, T>,
    /// Input step per kernel tap: spatial stride times dilation.
    ///
    /// Zero when the product overflows; two taps of one window can then
    /// never both be in range, so the step is never applied.
    tap_step: Vec<isize>,
    bias: Option<Vec<T>>,
}

impl<'a, T: Element> ConvPlan<'a, T> {
    pub(crate) fn new(
        geometry: &'a ConvGeometry,
        input: &'a TensorView<'a, T>,
        kernel: &'a TensorView<'a, T>,
        bias: Option<Vec<T>>,
    ) -> Self {
        let input = Operand::input(input, geometry.batch.is_some());
        let kernel = Operand::kernel(kernel);
        let tap_step = geometry
            .dims
            .iter()
            .zip(input.spatial)
            .map(|(d, &s)| {
                isize::try_from(d.dilation)
                    .ok()
                    .and_then(|dilation| s.checked_mul(dilation))
                    .unwrap_or(0)
            })
            .collect();
        Self {
            geometry,
            input,
            kernel,
            tap_step,
            bias,
        }
    }

    /// Fill every output plane of `output`, which must hold
    /// `plane_count * plane_size` elements.
    pub(crate) fn run<A: Accumulator<T>>(&self, output: &mut [T], parallel: bool) {
        let plane = self.geometry.plane_size();
        let rank = self.geometry.spatial_dims();
        debug_assert_eq!(output.len(), plane * self.geometry.plane_count());

        if parallel {
            #[cfg(feature = "parallel")]
            {
                output
                    .par_chunks_mut(plane)
                    .enumerate()
                    .for_each_init(
                        || Window::new(rank),
                        |window, (p, chunk)| self.fill_plane::<A>(p, chunk, window),
                    );
                return;
            }
        }

        let mut window = Window::new(rank);
        for (p, chunk) in output.chunks_mut(plane).enumerate() {
            self.fill_plane::<A>(p, chunk, &mut window);
        }
    }

    fn fill_plane<A: Accumulator<T>>(&self, plane: usize, out: &mut [T], window: &mut Window) {
        let g = self.geometry;
        let n = plane / g.out_channels;
        let c_out = plane % g.out_channels;
        let in_base = self.input.offset + n as isize * self.input.outer[0];
        let k_base = self.kernel.offset + c_out as isize * self.kernel.outer[0];
        let bias = self.bias.as_ref().map(|b| b[c_out]);

        window.out_index.iter_mut().for_each(|i| *i = 0);
        for slot in out.iter_mut() {
            let value = if self.resolve_window(window) {
                let spatial_base: isize = window
                    .first
                    .iter()
                    .zip(self.input.spatial)
                    .map(|(&s, &stride)| s * stride)
                    .sum();
                let mut acc = A::zero();
                for c_in in 0..g.in_channels {
                    let ip = in_base + c_in as isize * self.input.outer[1] + spatial_base;
                    let kp = k_base + c_in as isize * self.kernel.outer[1];
                    acc = self.accumulate_taps::<A>(0, ip, kp, window, acc);
                }
                A::finish(acc)
            } else {
                T::zero()
            };
            *slot = match bias {
                Some(b) => value + b,
                None => value,
            };
            advance(&mut window.out_index, &g.dims);
        }
    }

    /// Compute the valid tap range for the current output index.
    ///
    /// Returns false when some dimension has no in-range tap, in which case
    /// the output element only sees padding.
    fn resolve_window(&self, window: &mut Window) -> bool {
        for (i, d) in self.geometry.dims.iter().enumerate() {
            // o * s and pad_before are bounded by the padded extent
            let start = (window.out_index[i] * d.stride) as isize - d.pad_before as isize;
            let last = d.input as isize - 1;

            let (lo, first) = if start < 0 {
                let behind = start.unsigned_abs();
                let lo = behind.div_ceil(d.dilation);
                // Below one dilation step, so it fits
                (lo, (lo * d.dilation - behind) as isize)
            } else {
                (0, start)
            };
            if lo >= d.kernel || first > last {
                return false;
            }
            let hi = (lo + (last - first) as usize / d.dilation + 1).min(d.kernel);

            window.first[i] = first;
            window.lo[i] = lo;
            window.hi[i] = hi;
        }
        true
    }

    fn accumulate_taps<A: Accumulator<T>>(
        &self,
        dim: usize,
        in_pos: isize,
        k_pos: isize,
        window: &Window,
        mut acc: A::Acc,
    ) -> A::Acc {
        let in_step = self.tap_step[dim];
        let k_step = self.kernel.spatial[dim];
        let k_first = k_pos + window.lo[dim] as isize * k_step;
        let taps = (window.hi[dim] - window.lo[dim]) as isize;

        // Offsets are recomputed per tap so nothing steps past the last one
        if dim + 1 == self.tap_step.len() {
            for t in 0..taps {
                let ip = in_pos + t * in_step;
                let kp = k_first + t * k_step;
                acc = A::mul_add(acc, self.input.data[ip as usize], self.kernel.data[kp as usize]);
            }
        } else {
            for t in 0..taps {
                acc = self.accumulate_taps::<A>(
                    dim + 1,
                    in_pos + t * in_step,
                    k_first + t * k_step,
                    window,
                    acc,
                );
            }
        }
        acc
    }
}

/// Row-major odometer increment of an output index
#[inline]
fn advance(index: &mut [usize], dims: &[super::geometry::DimGeometry]) {
    for axis in (0..index.len()).rev() {
        index[axis] += 1;
        if index[axis] < dims[axis].output {
            return;
        }
        index[axis] = 0;
    }
}
