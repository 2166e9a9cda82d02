//! The convolution entry points.

use super::geometry::{output_geometry, ConvGeometry};
use super::kernel::{ConvPlan, NativeAcc, WidenedAcc};
use crate::config::{Accumulation, ConvConfig, EngineOptions, ExecutionPolicy};
use crate::dtype::Element;
use crate::error::ErrorContext;
use crate::tensor::{DynTensor, Tensor};
use crate::tensor_view::{DynTensorView, TensorView};
use crate::{ConvError, Result};

/// Stateless convolution engine.
///
/// Holds only [`EngineOptions`]; a single engine can be shared freely
/// across threads and reused for any number of calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvolutionEngine {
    options: EngineOptions,
}

impl ConvolutionEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Convolve `input` with `kernel`.
    ///
    /// Input shape: `[N, C_in, D_1, ..., D_k]`, or `[C_in, D_1, ..., D_k]`
    /// when `config.has_batch` is false.
    /// Kernel shape: `[C_out, C_in, K_1, ..., K_k]`.
    /// Output shape: `[N, C_out, O_1, ..., O_k]` (`[C_out, O...]` unbatched).
    ///
    /// All validation happens before the output is allocated.
    pub fn convolve<T: Element>(
        &self,
        input: &TensorView<'_, T>,
        kernel: &TensorView<'_, T>,
        config: &ConvConfig,
    ) -> Result<Tensor<T>> {
        self.convolve_with_bias(input, kernel, None, config)
    }

    /// Convolve and add a per-output-channel bias of shape `[C_out]`
    pub fn convolve_with_bias<T: Element>(
        &self,
        input: &TensorView<'_, T>,
        kernel: &TensorView<'_, T>,
        bias: Option<&TensorView<'_, T>>,
        config: &ConvConfig,
    ) -> Result<Tensor<T>> {
        let context = || {
            let mut ctx = ErrorContext::new()
                .with_input(input.shape(), T::DTYPE)
                .with_input(kernel.shape(), T::DTYPE);
            if let Some(b) = bias {
                ctx = ctx.with_input(b.shape(), T::DTYPE);
            }
            ctx
        };

        if let Some(expected) = config.dtype {
            if expected != T::DTYPE {
                return Err(
                    ConvError::type_mismatch("convolve", expected, T::DTYPE).with_context(context())
                );
            }
        }

        let geometry = output_geometry(input.shape(), kernel.shape(), config)
            .map_err(|e| e.with_context(context()))?;

        let len = geometry
            .output_len()
            .filter(|&n| {
                n.checked_mul(std::mem::size_of::<T>())
                    .is_some_and(|bytes| bytes <= isize::MAX as usize)
            })
            .ok_or_else(|| {
                ConvError::invalid_configuration(
                    "convolve",
                    "output",
                    &format!(
                        "{} output of shape {:?} exceeds the largest possible allocation",
                        T::DTYPE,
                        geometry.output_shape()
                    ),
                )
                .with_context(context())
            })?;

        let bias = bias
            .map(|b| {
                if b.shape() != [geometry.out_channels] {
                    Err(ConvError::shape_mismatch(
                        "convolve",
                        &format!("bias shape [{}]", geometry.out_channels),
                        &format!("bias shape {:?}", b.shape()),
                    )
                    .with_context(context()))
                } else {
                    Ok(b.to_vec())
                }
            })
            .transpose()?;

        Ok(self.execute(&geometry, len, input, kernel, bias))
    }

    /// Convolve operands whose element type is only known at runtime.
    ///
    /// Selects the monomorphic kernel for the shared element type; mixed
    /// element types fail with [`ConvError::TypeMismatch`].
    pub fn convolve_dyn(
        &self,
        input: &DynTensorView<'_>,
        kernel: &DynTensorView<'_>,
        config: &ConvConfig,
    ) -> Result<DynTensor> {
        match (input, kernel) {
            (DynTensorView::F32(i), DynTensorView::F32(k)) => {
                self.convolve(i, k, config).map(DynTensor::F32)
            }
            (DynTensorView::F64(i), DynTensorView::F64(k)) => {
                self.convolve(i, k, config).map(DynTensor::F64)
            }
            (i, k) => Err(ConvError::type_mismatch("convolve", i.dtype(), k.dtype()).with_context(
                ErrorContext::new()
                    .with_input(i.shape(), i.dtype())
                    .with_input(k.shape(), k.dtype()),
            )),
        }
    }

    fn execute<T: Element>(
        &self,
        geometry: &ConvGeometry,
        len: usize,
        input: &TensorView<'_, T>,
        kernel: &TensorView<'_, T>,
        bias: Option<Vec<T>>,
    ) -> Tensor<T> {
        let shape = geometry.output_shape();
        let parallel = self.use_parallel(geometry);
        log::debug!(
            "convolve<{}>: input={:?} kernel={:?} mode={} output={:?} macs={} parallel={} accumulation={:?}",
            T::DTYPE,
            input.shape(),
            kernel.shape(),
            geometry.boundary_mode,
            shape,
            geometry.mac_count(),
            parallel,
            self.options.accumulation
        );

        let mut output = vec![T::zero(); len];
        let plan = ConvPlan::new(geometry, input, kernel, bias);
        match self.options.accumulation {
            Accumulation::Native => plan.run::<NativeAcc>(&mut output, parallel),
            Accumulation::Widened => plan.run::<WidenedAcc>(&mut output, parallel),
        }

        Tensor::from_vec(output, &shape)
            .unwrap_or_else(|_| unreachable!("output buffer is sized from its geometry"))
    }

    fn use_parallel(&self, geometry: &ConvGeometry) -> bool {
        if !cfg!(feature = "parallel") {
            return false;
        }
        match self.options.execution {
            ExecutionPolicy::Sequential => false,
            ExecutionPolicy::Parallel => geometry.plane_count() > 1,
            ExecutionPolicy::Auto => {
                geometry.plane_count() > 1
                    && geometry.mac_count() >= self.options.parallel_threshold
            }
        }
    }
}

/// Convolve with default [`EngineOptions`]
pub fn convolve<T: Element>(
    input: &TensorView<'_, T>,
    kernel: &TensorView<'_, T>,
    config: &ConvConfig,
) -> Result<Tensor<T>> {
    ConvolutionEngine::default().convolve(input, kernel, config)
}

/// Convolve with a per-output-channel bias using default [`EngineOptions`]
pub fn convolve_with_bias<T: Element>(
    input: &TensorView<'_, T>,
    kernel: &TensorView<'_, T>,
    bias: Option<&TensorView<'_, T>>,
    config: &ConvConfig,
) -> Result<Tensor<T>> {
    ConvolutionEngine::default().convolve_with_bias(input, kernel, bias, config)
}

/// Dtype-dispatching convolution using default [`EngineOptions`]
pub fn convolve_dyn(
    input: &DynTensorView<'_>,
    kernel: &DynTensorView<'_>,
    config: &ConvConfig,
) -> Result<DynTensor> {
    ConvolutionEngine::default().convolve_dyn(input, kernel, config)
}
