#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use num_traits::Float;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum DType {
    Float32,
    Float64,
}

impl DType {
    pub fn size(&self) -> usize {
        match self {
            DType::Float32 => 4,
            DType::Float64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Floating-point element types the convolution kernels are instantiated for.
///
/// The trait is sealed: the engine only guarantees its accumulation
/// semantics for IEEE single and double precision.
pub trait Element:
    Float + Default + Send + Sync + std::fmt::Debug + sealed::Sealed + 'static
{
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    fn from_f64(value: f64) -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::Float32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::Float64;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Get DType from Rust type
pub fn dtype_from_type<T: Element>() -> DType {
    T::DTYPE
}
