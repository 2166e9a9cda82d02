//! Sliding-window convolution over dense N-dimensional arrays.
//!
//! The engine borrows its operands as [`TensorView`]s, validates every shape
//! and configuration rule up front, and returns a freshly allocated
//! row-major [`Tensor`]. It holds no global state.
//!
//! ```
//! use tenconv_core::{convolve, BoundaryMode, ConvConfig, TensorView};
//!
//! # fn main() -> tenconv_core::Result<()> {
//! let input: Vec<f32> = (0..25).map(|v| v as f32).collect();
//! let kernel = vec![1.0f32; 9];
//! let input = TensorView::new(&input, &[1, 1, 5, 5])?;
//! let kernel = TensorView::new(&kernel, &[1, 1, 3, 3])?;
//!
//! let out = convolve(&input, &kernel, &ConvConfig::new(BoundaryMode::Valid))?;
//! assert_eq!(out.shape().dims(), &[1, 1, 3, 3]);
//! # Ok(())
//! # }
//! ```
#![allow(clippy::result_large_err)]

pub mod config;
pub mod dtype;
pub mod error;
pub mod ops;
pub mod shape;
pub mod strided;
pub mod tensor;
pub mod tensor_view;

pub use config::{Accumulation, BoundaryMode, ConvConfig, EngineOptions, ExecutionPolicy};
pub use dtype::{dtype_from_type, DType, Element};
pub use error::{ConvError, ErrorContext, Result};
pub use ops::{
    conv1d, conv2d, conv3d, convolve, convolve_dyn, convolve_with_bias, output_geometry,
    ConvGeometry, ConvolutionEngine, DimGeometry,
};
pub use shape::Shape;
pub use strided::StridedLayout;
pub use tensor::{DynTensor, Tensor};
pub use tensor_view::{DynTensorView, TensorView};
