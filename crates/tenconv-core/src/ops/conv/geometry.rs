//! Output-shape derivation and padding resolution.
//!
//! Every shape rule of the engine lives here so that validation happens in
//! one pass before any output is allocated.

use crate::config::{BoundaryMode, ConvConfig};
use crate::{ConvError, Result};

/// Largest padded extent the kernel loop can address with `isize` offsets
const MAX_EXTENT: usize = isize::MAX as usize;

/// Resolved geometry of one spatial dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimGeometry {
    pub input: usize,
    pub kernel: usize,
    pub stride: usize,
    pub dilation: usize,
    /// Span covered by the dilated kernel: `(kernel - 1) * dilation + 1`
    pub effective_kernel: usize,
    pub pad_before: usize,
    pub pad_after: usize,
    pub output: usize,
}

impl DimGeometry {
    /// Derive padding and output size for one dimension.
    ///
    /// `dim` is the spatial dimension index, used for error reporting only.
    pub fn resolve(
        dim: usize,
        input: usize,
        kernel: usize,
        stride: usize,
        dilation: usize,
        mode: BoundaryMode,
    ) -> Result<Self> {
        if input == 0 || kernel == 0 {
            return Err(ConvError::shape_mismatch(
                "convolve",
                &format!("non-empty spatial dimension {dim}"),
                &format!("input size {input}, kernel size {kernel}"),
            ));
        }
        if stride == 0 || dilation == 0 {
            return Err(ConvError::invalid_configuration(
                "convolve",
                &format!("stride[{dim}]/dilation[{dim}]"),
                &format!("must be positive, got stride {stride} and dilation {dilation}"),
            ));
        }

        let out_of_range = || {
            ConvError::invalid_configuration(
                "convolve",
                &format!("dilation[{dim}]"),
                &format!(
                    "padded extent of spatial dimension {dim} exceeds the addressable range \
                     (kernel size {kernel}, dilation {dilation}, stride {stride})"
                ),
            )
        };

        let effective_kernel = (kernel - 1)
            .checked_mul(dilation)
            .and_then(|span| span.checked_add(1))
            .filter(|&extent| extent <= MAX_EXTENT)
            .ok_or_else(out_of_range)?;

        let (pad_before, pad_after, output) = match mode {
            BoundaryMode::Valid => {
                if input < effective_kernel {
                    return Err(ConvError::dimension_too_small(
                        "convolve",
                        dim,
                        input,
                        effective_kernel,
                    ));
                }
                (0, 0, (input - effective_kernel) / stride + 1)
            }
            BoundaryMode::Same => {
                let output = input.div_ceil(stride);
                let total = ((output - 1) * stride)
                    .checked_add(effective_kernel)
                    .ok_or_else(out_of_range)?
                    .saturating_sub(input);
                let before = total / 2;
                (before, total - before, output)
            }
            BoundaryMode::Full => {
                let pad = effective_kernel - 1;
                // (D + 2 * pad - K') / s + 1 == (D - 1 + pad) / s + 1
                let span = (input - 1).checked_add(pad).ok_or_else(out_of_range)?;
                (pad, pad, span / stride + 1)
            }
        };

        // Window starts and tap offsets are computed in isize
        let padded = ((output - 1) * stride).checked_add(effective_kernel);
        if padded.map_or(true, |extent| extent > MAX_EXTENT) {
            return Err(out_of_range());
        }

        Ok(Self {
            input,
            kernel,
            stride,
            dilation,
            effective_kernel,
            pad_before,
            pad_after,
            output,
        })
    }
}

/// Fully validated geometry of one convolution call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvGeometry {
    /// Batch size, `None` when the input has no batch axis
    pub batch: Option<usize>,
    pub in_channels: usize,
    pub out_channels: usize,
    pub boundary_mode: BoundaryMode,
    pub dims: Vec<DimGeometry>,
}

impl ConvGeometry {
    pub fn spatial_dims(&self) -> usize {
        self.dims.len()
    }

    /// Batch count used by the kernel loop (1 without a batch axis)
    pub fn batch_count(&self) -> usize {
        self.batch.unwrap_or(1)
    }

    pub fn output_spatial_shape(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.output).collect()
    }

    /// Output shape, including the batch axis when the input has one
    pub fn output_shape(&self) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.dims.len() + 2);
        if let Some(n) = self.batch {
            shape.push(n);
        }
        shape.push(self.out_channels);
        shape.extend(self.dims.iter().map(|d| d.output));
        shape
    }

    /// Total output element count, `None` when it overflows `usize`
    pub fn output_len(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(self.batch_count(), |acc, d| acc.checked_mul(d.output))
            .and_then(|n| n.checked_mul(self.out_channels))
    }

    /// Elements in one `(n, c_out)` output plane
    pub fn plane_size(&self) -> usize {
        self.dims.iter().map(|d| d.output).product()
    }

    /// Number of `(n, c_out)` output planes
    pub fn plane_count(&self) -> usize {
        self.batch_count() * self.out_channels
    }

    /// Multiply-accumulates per output element, ignoring padding
    pub fn taps_per_output(&self) -> usize {
        self.in_channels * self.dims.iter().map(|d| d.kernel).product::<usize>()
    }

    /// Upper bound on multiply-accumulates for the whole call
    pub fn mac_count(&self) -> usize {
        self.plane_count()
            .saturating_mul(self.plane_size())
            .saturating_mul(self.taps_per_output())
    }
}

/// Validate operand shapes against a configuration and derive the output
/// geometry.
///
/// `input_shape` is `[N, C_in, D...]` when `config.has_batch`, otherwise
/// `[C_in, D...]`; `kernel_shape` is `[C_out, C_in, K...]`.
pub fn output_geometry(
    input_shape: &[usize],
    kernel_shape: &[usize],
    config: &ConvConfig,
) -> Result<ConvGeometry> {
    if kernel_shape.len() < 3 {
        return Err(ConvError::shape_mismatch(
            "convolve",
            "kernel of rank >= 3 ([C_out, C_in, K_1, ...])",
            &format!("kernel shape {kernel_shape:?}"),
        ));
    }
    let spatial = kernel_shape.len() - 2;

    let stride = config.resolved_stride(spatial)?;
    let dilation = config.resolved_dilation(spatial)?;

    let leading = config.leading_axes();
    if input_shape.len() != spatial + leading {
        let layout = if config.has_batch {
            "[N, C_in, D...]"
        } else {
            "[C_in, D...]"
        };
        return Err(ConvError::shape_mismatch(
            "convolve",
            &format!(
                "input of rank {} {layout} for a kernel with {spatial} spatial dimensions",
                spatial + leading
            ),
            &format!("input shape {input_shape:?}"),
        ));
    }

    if let Some(axis) = kernel_shape.iter().position(|&d| d == 0) {
        return Err(ConvError::shape_mismatch(
            "convolve",
            "non-empty kernel dimensions",
            &format!("kernel shape {kernel_shape:?} with zero extent on axis {axis}"),
        ));
    }
    if let Some(axis) = input_shape.iter().position(|&d| d == 0) {
        return Err(ConvError::shape_mismatch(
            "convolve",
            "non-empty input dimensions",
            &format!("input shape {input_shape:?} with zero extent on axis {axis}"),
        ));
    }

    let in_channels = input_shape[leading - 1];
    let kernel_in_channels = kernel_shape[1];
    if in_channels != kernel_in_channels {
        return Err(ConvError::shape_mismatch(
            "convolve",
            &format!("input in_channels={in_channels}"),
            &format!("kernel in_channels={kernel_in_channels}"),
        ));
    }

    let dims = (0..spatial)
        .map(|i| {
            DimGeometry::resolve(
                i,
                input_shape[leading + i],
                kernel_shape[2 + i],
                stride[i],
                dilation[i],
                config.boundary_mode,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let geometry = ConvGeometry {
        batch: config.has_batch.then(|| input_shape[0]),
        in_channels,
        out_channels: kernel_shape[0],
        boundary_mode: config.boundary_mode,
        dims,
    };
    if geometry.output_len().is_none() {
        return Err(ConvError::invalid_configuration(
            "convolve",
            "output",
            &format!(
                "element count of shape {:?} overflows the platform index type",
                geometry.output_shape()
            ),
        ));
    }
    log::trace!(
        "conv geometry: input={:?} kernel={:?} mode={} -> output={:?}",
        input_shape,
        kernel_shape,
        config.boundary_mode,
        geometry.output_shape()
    );
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(input: usize, kernel: usize, stride: usize, dilation: usize, mode: BoundaryMode) -> DimGeometry {
        DimGeometry::resolve(0, input, kernel, stride, dilation, mode).unwrap()
    }

    #[test]
    fn test_valid_output_size() {
        let g = dim(5, 3, 1, 1, BoundaryMode::Valid);
        assert_eq!(g.output, 3);
        assert_eq!((g.pad_before, g.pad_after), (0, 0));

        let g = dim(7, 3, 2, 1, BoundaryMode::Valid);
        assert_eq!(g.output, 3);
    }

    #[test]
    fn test_valid_with_dilation() {
        let g = dim(5, 3, 1, 2, BoundaryMode::Valid);
        assert_eq!(g.effective_kernel, 5);
        assert_eq!(g.output, 1);

        let err = DimGeometry::resolve(1, 4, 3, 1, 2, BoundaryMode::Valid).unwrap_err();
        match err {
            ConvError::DimensionTooSmall { dim, size, extent, .. } => {
                assert_eq!((dim, size, extent), (1, 4, 5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_same_padding_split() {
        // Even kernel: total padding 1, all of it after
        let g = dim(5, 2, 1, 1, BoundaryMode::Same);
        assert_eq!(g.output, 5);
        assert_eq!((g.pad_before, g.pad_after), (0, 1));

        let g = dim(5, 3, 1, 1, BoundaryMode::Same);
        assert_eq!((g.pad_before, g.pad_after), (1, 1));

        // Strided: ceil(6 / 4) = 2, total padding (2 - 1) * 4 + 3 - 6 = 1
        let g = dim(6, 3, 4, 1, BoundaryMode::Same);
        assert_eq!(g.output, 2);
        assert_eq!((g.pad_before, g.pad_after), (0, 1));
    }

    #[test]
    fn test_same_never_negative_padding() {
        let g = dim(10, 1, 3, 1, BoundaryMode::Same);
        assert_eq!(g.output, 4);
        assert_eq!((g.pad_before, g.pad_after), (0, 0));
    }

    #[test]
    fn test_full_output_size() {
        let g = dim(5, 3, 1, 1, BoundaryMode::Full);
        assert_eq!(g.output, 7);
        assert_eq!((g.pad_before, g.pad_after), (2, 2));

        let g = dim(1, 3, 2, 2, BoundaryMode::Full);
        // K' = 5: (1 + 8 - 5) / 2 + 1 = 3
        assert_eq!(g.output, 3);
    }

    #[test]
    fn test_extent_beyond_isize_rejected() {
        let huge = isize::MAX as usize;
        for mode in [BoundaryMode::Valid, BoundaryMode::Same, BoundaryMode::Full] {
            let err = DimGeometry::resolve(2, 3, 2, 1, huge, mode).unwrap_err();
            match err {
                ConvError::InvalidConfiguration { parameter, .. } => {
                    assert_eq!(parameter, "dilation[2]")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        // Extent fits, but the full-mode padded span does not
        assert!(DimGeometry::resolve(0, 3, 2, 1, huge / 2, BoundaryMode::Full).is_err());
        assert!(DimGeometry::resolve(0, 3, 2, 1, huge / 4, BoundaryMode::Full).is_ok());
    }

    #[test]
    fn test_output_len_overflow_detected() {
        let config = ConvConfig::new(BoundaryMode::Full).with_dilation(&[1 << 40]);
        let err = output_geometry(&[1, 1, 1, 1], &[1, 1, 2, 2], &config).unwrap_err();
        assert!(matches!(err, ConvError::InvalidConfiguration { .. }));

        let g = output_geometry(&[2, 1, 5], &[3, 1, 2], &ConvConfig::default()).unwrap();
        assert_eq!(g.output_len(), Some(2 * 3 * 4));
    }

    #[test]
    fn test_geometry_batched() {
        let config = ConvConfig::default();
        let g = output_geometry(&[2, 3, 8, 6], &[4, 3, 3, 3], &config).unwrap();
        assert_eq!(g.output_shape(), vec![2, 4, 6, 4]);
        assert_eq!(g.plane_count(), 8);
        assert_eq!(g.plane_size(), 24);
        assert_eq!(g.taps_per_output(), 27);
    }

    #[test]
    fn test_geometry_unbatched() {
        let config = ConvConfig::new(BoundaryMode::Same).with_batch(false);
        let g = output_geometry(&[3, 8], &[4, 3, 3], &config).unwrap();
        assert_eq!(g.batch, None);
        assert_eq!(g.output_shape(), vec![4, 8]);
    }

    #[test]
    fn test_geometry_rank_errors() {
        let config = ConvConfig::default();
        assert!(matches!(
            output_geometry(&[1, 1, 5], &[1, 1], &config),
            Err(ConvError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            output_geometry(&[1, 5, 5], &[1, 1, 3, 3], &config),
            Err(ConvError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_geometry_empty_dims_rejected() {
        let config = ConvConfig::new(BoundaryMode::Same);
        assert!(matches!(
            output_geometry(&[1, 1, 0], &[1, 1, 3], &config),
            Err(ConvError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            output_geometry(&[1, 1, 4], &[0, 1, 3], &config),
            Err(ConvError::ShapeMismatch { .. })
        ));
    }
}
