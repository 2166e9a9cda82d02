//! Dense N-dimensional convolution
//!
//! This module provides:
//! - Output geometry derivation for `valid`, `same` and `full` boundaries
//! - The stateless [`ConvolutionEngine`] with stride and dilation support
//! - Dtype-tagged dispatch for callers holding runtime-typed views
//! - Rank-specific 1D, 2D and 3D shortcuts

pub mod engine;
pub mod fixed_rank;
pub mod geometry;
mod kernel;

pub use engine::{convolve, convolve_dyn, convolve_with_bias, ConvolutionEngine};
pub use fixed_rank::{conv1d, conv2d, conv3d};
pub use geometry::{output_geometry, ConvGeometry, DimGeometry};
