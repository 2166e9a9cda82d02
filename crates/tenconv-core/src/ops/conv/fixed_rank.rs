//! Rank-specific convolution shortcuts over batched channel-first layouts.
//!
//! These take the padding mode as text (`"valid"`, `"same"`, `"full"`) and
//! always expect a leading batch axis.

use super::engine::convolve_with_bias;
use crate::config::{BoundaryMode, ConvConfig};
use crate::dtype::Element;
use crate::tensor::Tensor;
use crate::tensor_view::TensorView;
use crate::{ConvError, Result};

fn check_rank<T: Element>(
    op: &str,
    input: &TensorView<'_, T>,
    weight: &TensorView<'_, T>,
    rank: usize,
    layout: &str,
) -> Result<()> {
    if input.ndim() != rank {
        return Err(ConvError::shape_mismatch(
            op,
            &format!("{rank}D input ({layout} format)"),
            &format!("input shape {:?}", input.shape()),
        ));
    }
    if weight.ndim() != rank {
        return Err(ConvError::shape_mismatch(
            op,
            &format!("{rank}D weight"),
            &format!("weight shape {:?}", weight.shape()),
        ));
    }
    Ok(())
}

fn config_for(stride: &[usize], padding: &str) -> Result<ConvConfig> {
    let mode: BoundaryMode = padding.parse()?;
    let stride = stride
        .iter()
        .map(|&s| {
            i64::try_from(s).map_err(|_| {
                ConvError::invalid_configuration("convolve", "stride", &format!("{s} is too large"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ConvConfig::new(mode).with_stride(&stride))
}

/// Performs 1D convolution operation
/// Input shape: [batch, in_channels, length] (NCL format)
/// Weight shape: [out_channels, in_channels, kernel_length]
/// Output shape: [batch, out_channels, out_length]
pub fn conv1d<T: Element>(
    input: &TensorView<'_, T>,
    weight: &TensorView<'_, T>,
    bias: Option<&TensorView<'_, T>>,
    stride: usize,
    padding: &str,
) -> Result<Tensor<T>> {
    check_rank("conv1d", input, weight, 3, "NCL")?;
    convolve_with_bias(input, weight, bias, &config_for(&[stride], padding)?)
}

/// Performs 2D convolution operation
/// Input shape: [batch, in_channels, height, width] (NCHW format)
/// Weight shape: [out_channels, in_channels, kernel_height, kernel_width]
/// Output shape: [batch, out_channels, out_height, out_width]
pub fn conv2d<T: Element>(
    input: &TensorView<'_, T>,
    weight: &TensorView<'_, T>,
    bias: Option<&TensorView<'_, T>>,
    stride: (usize, usize),
    padding: &str,
) -> Result<Tensor<T>> {
    check_rank("conv2d", input, weight, 4, "NCHW")?;
    convolve_with_bias(
        input,
        weight,
        bias,
        &config_for(&[stride.0, stride.1], padding)?,
    )
}

/// Performs 3D convolution operation
/// Input shape: [batch, in_channels, depth, height, width] (NCDHW format)
/// Weight shape: [out_channels, in_channels, kernel_depth, kernel_height, kernel_width]
/// Output shape: [batch, out_channels, out_depth, out_height, out_width]
pub fn conv3d<T: Element>(
    input: &TensorView<'_, T>,
    weight: &TensorView<'_, T>,
    bias: Option<&TensorView<'_, T>>,
    stride: (usize, usize, usize),
    padding: &str,
) -> Result<Tensor<T>> {
    check_rank("conv3d", input, weight, 5, "NCDHW")?;
    convolve_with_bias(
        input,
        weight,
        bias,
        &config_for(&[stride.0, stride.1, stride.2], padding)?,
    )
}
