use crate::{ConvError, Result};
use std::ops::Range;

/// Element-strided layout of an N-dimensional array over a flat buffer.
///
/// Strides and the offset are measured in elements, not bytes. Strides may
/// be negative (reversed axes) or zero (broadcast axes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StridedLayout {
    shape: Vec<usize>,
    strides: Vec<isize>,
    offset: usize,
}

impl StridedLayout {
    /// Create a new strided layout with default C-contiguous strides
    pub fn new(shape: Vec<usize>) -> Self {
        let strides = Self::compute_strides(&shape);
        Self {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Create layout with custom strides
    pub fn with_strides(shape: Vec<usize>, strides: Vec<isize>, offset: usize) -> Result<Self> {
        if shape.len() != strides.len() {
            return Err(ConvError::invalid_layout(
                "strided_layout",
                format!(
                    "Shape and strides must have same length: {} != {}",
                    shape.len(),
                    strides.len()
                ),
                Some(&shape),
            ));
        }

        Ok(Self {
            shape,
            strides,
            offset,
        })
    }

    /// Compute C-contiguous strides for a shape
    pub fn compute_strides(shape: &[usize]) -> Vec<isize> {
        let mut strides = vec![1isize; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1] as isize;
        }
        strides
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get total number of elements
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check if the layout is contiguous (C-order)
    pub fn is_contiguous(&self) -> bool {
        if self.offset != 0 {
            return false;
        }
        self.strides == Self::compute_strides(&self.shape)
    }

    /// Smallest and largest buffer positions reachable through this layout.
    ///
    /// Returns `None` for layouts with no elements.
    pub fn reachable_range(&self) -> Option<(isize, isize)> {
        if self.shape.contains(&0) {
            return None;
        }
        let mut lo = self.offset as isize;
        let mut hi = self.offset as isize;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides) {
            let span = (dim as isize - 1) * stride;
            if span < 0 {
                lo += span;
            } else {
                hi += span;
            }
        }
        Some((lo, hi))
    }

    /// Verify every reachable position lies inside a buffer of `len` elements
    pub fn check_bounds(&self, len: usize) -> Result<()> {
        match self.reachable_range() {
            None => Ok(()),
            Some((lo, hi)) if lo >= 0 && (hi as usize) < len => Ok(()),
            Some((lo, hi)) => Err(ConvError::invalid_layout(
                "strided_layout",
                format!("layout reaches buffer positions {lo}..={hi}, buffer holds {len} elements"),
                Some(&self.shape),
            )),
        }
    }

    /// Compute the linear index for a multi-dimensional index
    pub fn linear_index(&self, indices: &[usize]) -> Result<usize> {
        if indices.len() != self.shape.len() {
            return Err(ConvError::invalid_layout(
                "linear_index",
                format!(
                    "Index dimension mismatch: {} != {}",
                    indices.len(),
                    self.shape.len()
                ),
                Some(&self.shape),
            ));
        }

        let mut linear_idx = self.offset as isize;
        for (i, &idx) in indices.iter().enumerate() {
            if idx >= self.shape[i] {
                return Err(ConvError::invalid_layout(
                    "linear_index",
                    format!("Index out of bounds: {} >= {} on axis {}", idx, self.shape[i], i),
                    Some(&self.shape),
                ));
            }
            linear_idx += idx as isize * self.strides[i];
        }

        Ok(linear_idx as usize)
    }

    /// Create a view by slicing along dimensions
    pub fn slice(&self, ranges: &[Range<usize>]) -> Result<Self> {
        if ranges.len() != self.shape.len() {
            return Err(ConvError::invalid_layout(
                "slice",
                format!(
                    "Slice dimension mismatch: {} != {}",
                    ranges.len(),
                    self.shape.len()
                ),
                Some(&self.shape),
            ));
        }

        let mut new_shape = Vec::with_capacity(self.shape.len());
        let mut new_offset = self.offset as isize;

        for (i, range) in ranges.iter().enumerate() {
            if range.start > range.end || range.end > self.shape[i] {
                return Err(ConvError::invalid_layout(
                    "slice",
                    format!(
                        "Invalid slice range {:?} for dimension size {}",
                        range, self.shape[i]
                    ),
                    Some(&self.shape),
                ));
            }

            new_shape.push(range.end - range.start);
            new_offset += range.start as isize * self.strides[i];
        }

        if new_offset < 0 {
            return Err(ConvError::invalid_layout(
                "slice",
                "Slice operation resulted in negative offset".to_string(),
                Some(&self.shape),
            ));
        }

        Ok(Self {
            shape: new_shape,
            strides: self.strides.clone(),
            offset: new_offset as usize,
        })
    }

    /// Permute the axes of the layout
    pub fn permute(&self, axes: &[usize]) -> Result<Self> {
        if axes.len() != self.shape.len() {
            return Err(ConvError::invalid_layout(
                "permute",
                format!("expected {} axes, got {}", self.shape.len(), axes.len()),
                Some(&self.shape),
            ));
        }

        let mut seen = vec![false; self.shape.len()];
        for &ax in axes {
            if ax >= self.shape.len() || seen[ax] {
                return Err(ConvError::invalid_layout(
                    "permute",
                    format!("{axes:?} is not a permutation of the axes"),
                    Some(&self.shape),
                ));
            }
            seen[ax] = true;
        }

        Ok(Self {
            shape: axes.iter().map(|&i| self.shape[i]).collect(),
            strides: axes.iter().map(|&i| self.strides[i]).collect(),
            offset: self.offset,
        })
    }
}
