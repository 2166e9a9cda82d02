//! # tenconv - Dense N-dimensional Convolution
//!
//! tenconv computes sliding-window convolutions (in the deep-learning sense,
//! i.e. cross-correlation without kernel flipping) over dense numeric arrays
//! of any spatial rank:
//!
//! - **Any rank**: 1D signals, 2D images, 3D volumes and beyond
//! - **Boundary modes**: `valid`, `same` and `full`
//! - **Strides and dilation**: per spatial dimension
//! - **Zero-copy inputs**: operands are borrowed as strided views
//! - **Parallel**: output planes are spread over the rayon pool
//!
//! ## Quick Start
//!
//! ```rust
//! use tenconv::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // [batch, channels, length]
//! let signal = vec![1.0f64, 2.0, 3.0, 4.0, 5.0];
//! let signal = TensorView::new(&signal, &[1, 1, 5])?;
//!
//! // [out_channels, in_channels, kernel_length]
//! let taps = vec![1.0f64, 1.0, 1.0];
//! let taps = TensorView::new(&taps, &[1, 1, 3])?;
//!
//! let out = convolve(&signal, &taps, &ConvConfig::new(BoundaryMode::Same))?;
//! assert_eq!(out.to_vec(), vec![3.0, 6.0, 9.0, 12.0, 9.0]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Configuring the Engine
//!
//! ```rust
//! use tenconv::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ConvolutionEngine::new(
//!     EngineOptions::sequential().with_accumulation(Accumulation::Widened),
//! );
//!
//! let image = vec![0.5f32; 3 * 8 * 8];
//! let image = TensorView::new(&image, &[3, 8, 8])?;
//! let filters = vec![0.1f32; 4 * 3 * 3 * 3];
//! let filters = TensorView::new(&filters, &[4, 3, 3, 3])?;
//!
//! let config = ConvConfig::new(BoundaryMode::Valid)
//!     .with_batch(false)
//!     .with_stride(&[2])
//!     .with_dilation(&[1, 2]);
//! let out = engine.convolve(&image, &filters, &config)?;
//! assert_eq!(out.shape().dims(), &[4, 3, 2]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Borrowing ndarray Views
//!
//! `TensorView::from_ndarray` borrows any view that is contiguous in some
//! memory order, including transposed and reversed ones. Views with gaps
//! (for example `a.slice(s![.., ..;2])`) are rejected; copy them with
//! `as_standard_layout()` first.
//!
//! ```rust
//! use ndarray::{s, Array3};
//! use tenconv::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let signal = Array3::from_shape_fn((1, 1, 8), |(_, _, i)| i as f32);
//! let every_other = signal.slice(s![.., .., ..;2]);
//! assert!(TensorView::from_ndarray(every_other).is_err());
//!
//! let packed = every_other.as_standard_layout();
//! let input = TensorView::from_ndarray(packed.view())?;
//! let taps = vec![1.0f32, 1.0];
//! let taps = TensorView::new(&taps, &[1, 1, 2])?;
//! let out = convolve(&input, &taps, &ConvConfig::default())?;
//! assert_eq!(out.to_vec(), vec![2.0, 6.0, 10.0]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: views, owned tensors, configuration, errors and the kernels

pub use tenconv_core as core;

pub mod prelude {
    // Operands
    pub use crate::core::{DType, DynTensor, DynTensorView, Element, Tensor, TensorView};

    // Configuration
    pub use crate::core::{
        Accumulation, BoundaryMode, ConvConfig, EngineOptions, ExecutionPolicy,
    };

    // Entry points
    pub use crate::core::{
        conv1d, conv2d, conv3d, convolve, convolve_dyn, convolve_with_bias, output_geometry,
        ConvolutionEngine,
    };

    // Errors
    pub use crate::core::ConvError;
}

/// The version of the tenconv crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the version string of tenconv
pub fn version() -> &'static str {
    VERSION
}
