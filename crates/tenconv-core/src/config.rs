//! Convolution configuration records.
//!
//! [`ConvConfig`] is the per-call record a host binding fills in.
//! [`EngineOptions`] tunes how a [`crate::ConvolutionEngine`] executes and
//! never changes the shape or value semantics of a call.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::{ConvError, DType, Result};
use std::str::FromStr;

/// Implicit zero-padding policy around the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum BoundaryMode {
    /// No padding; the output shrinks by the effective kernel extent
    #[default]
    Valid,
    /// Zero padding so that the output spatial size is `ceil(D / s)`
    Same,
    /// Zero padding so every partial overlap contributes
    Full,
}

impl BoundaryMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Same => "same",
            Self::Full => "full",
        }
    }
}

impl std::fmt::Display for BoundaryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoundaryMode {
    type Err = ConvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "valid" => Ok(Self::Valid),
            "same" => Ok(Self::Same),
            "full" => Ok(Self::Full),
            other => Err(ConvError::invalid_configuration(
                "boundary_mode",
                "boundary_mode",
                &format!("unknown padding mode '{other}', expected valid, same or full"),
            )),
        }
    }
}

/// Per-call convolution configuration.
///
/// `stride` and `dilation` hold one entry per spatial dimension. An empty
/// sequence means 1 everywhere and a single entry applies to every spatial
/// dimension. Values are signed so that host records carrying zero or
/// negative integers are rejected rather than wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct ConvConfig {
    pub stride: Vec<i64>,
    pub dilation: Vec<i64>,
    pub boundary_mode: BoundaryMode,
    /// Input carries a leading batch axis (`[N, C_in, D...]`)
    pub has_batch: bool,
    /// Element type both operands are expected to have
    pub dtype: Option<DType>,
}

impl Default for ConvConfig {
    fn default() -> Self {
        Self {
            stride: Vec::new(),
            dilation: Vec::new(),
            boundary_mode: BoundaryMode::Valid,
            has_batch: true,
            dtype: None,
        }
    }
}

impl ConvConfig {
    pub fn new(boundary_mode: BoundaryMode) -> Self {
        Self {
            boundary_mode,
            ..Self::default()
        }
    }

    pub fn with_stride(mut self, stride: &[i64]) -> Self {
        self.stride = stride.to_vec();
        self
    }

    pub fn with_dilation(mut self, dilation: &[i64]) -> Self {
        self.dilation = dilation.to_vec();
        self
    }

    pub fn with_boundary_mode(mut self, mode: BoundaryMode) -> Self {
        self.boundary_mode = mode;
        self
    }

    pub fn with_batch(mut self, has_batch: bool) -> Self {
        self.has_batch = has_batch;
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Number of leading non-spatial axes on the input
    pub fn leading_axes(&self) -> usize {
        if self.has_batch {
            2
        } else {
            1
        }
    }

    /// Resolve stride into one positive value per spatial dimension
    pub fn resolved_stride(&self, spatial_dims: usize) -> Result<Vec<usize>> {
        resolve_per_dim("stride", &self.stride, spatial_dims)
    }

    /// Resolve dilation into one positive value per spatial dimension
    pub fn resolved_dilation(&self, spatial_dims: usize) -> Result<Vec<usize>> {
        resolve_per_dim("dilation", &self.dilation, spatial_dims)
    }
}

fn resolve_per_dim(parameter: &str, values: &[i64], spatial_dims: usize) -> Result<Vec<usize>> {
    let expanded: Vec<i64> = match values.len() {
        0 => vec![1; spatial_dims],
        1 => vec![values[0]; spatial_dims],
        n if n == spatial_dims => values.to_vec(),
        n => {
            return Err(ConvError::invalid_configuration(
                "convolve",
                parameter,
                &format!("has {n} entries but the kernel has {spatial_dims} spatial dimensions"),
            ))
        }
    };

    expanded
        .iter()
        .enumerate()
        .map(|(dim, &v)| {
            if v <= 0 {
                Err(ConvError::invalid_configuration(
                    "convolve",
                    &format!("{parameter}[{dim}]"),
                    &format!("must be a positive integer, got {v}"),
                ))
            } else {
                usize::try_from(v).map_err(|_| {
                    ConvError::invalid_configuration(
                        "convolve",
                        &format!("{parameter}[{dim}]"),
                        &format!("value {v} does not fit the platform index type"),
                    )
                })
            }
        })
        .collect()
}

/// Whether output planes are processed on the rayon pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ExecutionPolicy {
    Sequential,
    Parallel,
    /// Parallelize once the multiply-accumulate count reaches
    /// [`EngineOptions::parallel_threshold`]
    #[default]
    Auto,
}

/// Accumulator precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Accumulation {
    /// Accumulate in the element type, in input-channel then kernel-tap order
    #[default]
    Native,
    /// Accumulate in `f64` and round to the element type once per output.
    /// Results for `f32` may differ from `Native` in the last bits.
    Widened,
}

/// Execution tuning for a [`crate::ConvolutionEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct EngineOptions {
    pub execution: ExecutionPolicy,
    pub parallel_threshold: usize,
    pub accumulation: Accumulation,
}

impl EngineOptions {
    pub const DEFAULT_PARALLEL_THRESHOLD: usize = 32 * 1024;

    pub fn sequential() -> Self {
        Self {
            execution: ExecutionPolicy::Sequential,
            ..Self::default()
        }
    }

    pub fn parallel() -> Self {
        Self {
            execution: ExecutionPolicy::Parallel,
            ..Self::default()
        }
    }

    pub fn with_accumulation(mut self, accumulation: Accumulation) -> Self {
        self.accumulation = accumulation;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            execution: ExecutionPolicy::Auto,
            parallel_threshold: Self::DEFAULT_PARALLEL_THRESHOLD,
            accumulation: Accumulation::Native,
        }
    }
}
