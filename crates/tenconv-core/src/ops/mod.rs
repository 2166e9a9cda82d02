pub mod conv;

pub use conv::{
    conv1d, conv2d, conv3d, convolve, convolve_dyn, convolve_with_bias, output_geometry,
    ConvGeometry, ConvolutionEngine, DimGeometry,
};
