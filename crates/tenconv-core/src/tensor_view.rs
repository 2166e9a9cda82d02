//! Borrowed array views handed to the convolution engine.
//!
//! A [`TensorView`] never owns its buffer. It pairs a shared slice with a
//! [`StridedLayout`], so the borrow checker keeps the caller from mutating
//! or freeing the data while a convolution is in flight.

use crate::dtype::{DType, Element};
use crate::strided::StridedLayout;
use crate::{ConvError, Result};
use ndarray::{ArrayView, Dimension};
use std::ops::Range;

/// Read-only strided view over a numeric buffer
#[derive(Debug, Clone)]
pub struct TensorView<'a, T> {
    data: &'a [T],
    layout: StridedLayout,
}

impl<'a, T: Element> TensorView<'a, T> {
    /// Create a C-contiguous view over `data`
    pub fn new(data: &'a [T], shape: &[usize]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(ConvError::invalid_layout(
                "tensor_view",
                format!(
                    "Data length {} doesn't match shape {:?} (size {})",
                    data.len(),
                    shape,
                    expected
                ),
                Some(shape),
            ));
        }
        Ok(Self {
            data,
            layout: StridedLayout::new(shape.to_vec()),
        })
    }

    /// Create a view with explicit element strides and offset.
    ///
    /// Fails unless every element the layout can address lies inside `data`.
    pub fn with_strides(
        data: &'a [T],
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        let layout = StridedLayout::with_strides(shape.to_vec(), strides.to_vec(), offset)?;
        Self::from_layout(data, layout)
    }

    /// Create a view from an already-built layout
    pub fn from_layout(data: &'a [T], layout: StridedLayout) -> Result<Self> {
        layout.check_bounds(data.len())?;
        Ok(Self { data, layout })
    }

    /// Create a view over a raw buffer supplied by a host-language binding.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` elements of `T`, properly
    /// aligned, and the memory must not be mutated for the lifetime `'a`.
    pub unsafe fn from_raw_parts(
        ptr: *const T,
        len: usize,
        shape: &[usize],
        strides: &[isize],
        offset: usize,
    ) -> Result<Self> {
        if ptr.is_null() {
            return Err(ConvError::invalid_layout(
                "tensor_view",
                "null buffer pointer".to_string(),
                Some(shape),
            ));
        }
        let data = std::slice::from_raw_parts(ptr, len);
        Self::with_strides(data, shape, strides, offset)
    }

    /// Borrow an ndarray view without copying.
    ///
    /// The view must be contiguous in some memory order (C, Fortran, or with
    /// reversed axes). Views with gaps, such as `s![.., ..;2]`, fail with
    /// [`ConvError::InvalidLayout`]: the skipped elements may be mutably
    /// borrowed elsewhere, so the span cannot be borrowed as one slice.
    /// Pass `view.as_standard_layout().view()` for those, or build the view
    /// over the owning buffer with [`TensorView::with_strides`].
    pub fn from_ndarray<D: Dimension>(view: ArrayView<'a, T, D>) -> Result<Self> {
        let shape = view.shape().to_vec();
        let strides = view.strides().to_vec();
        let data = view.to_slice_memory_order().ok_or_else(|| {
            ConvError::invalid_layout(
                "tensor_view",
                "ndarray view is not contiguous in memory; \
                 copy it with `as_standard_layout()` first"
                    .to_string(),
                Some(&shape),
            )
        })?;
        // The slice starts at the lowest address; reversed axes push the
        // logical origin forward.
        let offset = shape
            .iter()
            .zip(&strides)
            .filter(|(_, s)| **s < 0)
            .map(|(&d, &s)| d.saturating_sub(1) * s.unsigned_abs())
            .sum();
        Self::with_strides(data, &shape, &strides, offset)
    }

    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    pub fn offset(&self) -> usize {
        self.layout.offset()
    }

    pub fn layout(&self) -> &StridedLayout {
        &self.layout
    }

    /// The full borrowed buffer, including elements outside the view
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    pub fn numel(&self) -> usize {
        self.layout.numel()
    }

    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Element at a multi-dimensional index
    pub fn get(&self, index: &[usize]) -> Option<T> {
        self.layout
            .linear_index(index)
            .ok()
            .and_then(|i| self.data.get(i).copied())
    }

    /// Zero-copy sub-view
    pub fn slice(&self, ranges: &[Range<usize>]) -> Result<Self> {
        Ok(Self {
            data: self.data,
            layout: self.layout.slice(ranges)?,
        })
    }

    /// Zero-copy axis permutation
    pub fn permuted(&self, axes: &[usize]) -> Result<Self> {
        Ok(Self {
            data: self.data,
            layout: self.layout.permute(axes)?,
        })
    }

    /// Copy the viewed elements out in logical row-major order
    pub fn to_vec(&self) -> Vec<T> {
        let shape = self.shape();
        let strides = self.strides();
        let mut out = Vec::with_capacity(self.numel());
        if shape.contains(&0) {
            return out;
        }
        let mut index = vec![0usize; shape.len()];
        let mut pos = self.offset() as isize;
        loop {
            out.push(self.data[pos as usize]);
            // Odometer increment, carrying from the last axis
            let mut axis = shape.len();
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                index[axis] += 1;
                pos += strides[axis];
                if index[axis] < shape[axis] {
                    break;
                }
                pos -= strides[axis] * shape[axis] as isize;
                index[axis] = 0;
            }
        }
    }
}

/// Dtype-tagged view for callers that only learn the element type at runtime
#[derive(Debug, Clone)]
pub enum DynTensorView<'a> {
    F32(TensorView<'a, f32>),
    F64(TensorView<'a, f64>),
}

impl DynTensorView<'_> {
    pub fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::Float32,
            Self::F64(_) => DType::Float64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::F32(v) => v.shape(),
            Self::F64(v) => v.shape(),
        }
    }
}

impl<'a> From<TensorView<'a, f32>> for DynTensorView<'a> {
    fn from(view: TensorView<'a, f32>) -> Self {
        Self::F32(view)
    }
}

impl<'a> From<TensorView<'a, f64>> for DynTensorView<'a> {
    fn from(view: TensorView<'a, f64>) -> Self {
        Self::F64(view)
    }
}
