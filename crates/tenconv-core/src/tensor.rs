//! Owned, contiguous output tensors.

use crate::dtype::{DType, Element};
use crate::tensor_view::TensorView;
use crate::{ConvError, Result, Shape};
use ndarray::{ArrayD, IxDyn};

/// Densely allocated row-major tensor returned by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    array: ArrayD<T>,
    shape: Shape,
}

impl<T: Element> Tensor<T> {
    /// Create a tensor from an existing ndarray
    pub fn from_array(array: ArrayD<T>) -> Self {
        let array = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        let shape = Shape::from_slice(array.shape());
        Self { array, shape }
    }

    /// Create a tensor from a vector of data with specified shape
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self> {
        let total_size: usize = shape.iter().product();
        if data.len() != total_size {
            return Err(ConvError::invalid_layout(
                "tensor_creation",
                format!(
                    "Data length {} doesn't match shape {:?} (size {})",
                    data.len(),
                    shape,
                    total_size
                ),
                Some(shape),
            ));
        }

        let array = ArrayD::from_shape_vec(IxDyn(shape), data)?;
        Ok(Self::from_array(array))
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::from_array(ArrayD::zeros(IxDyn(shape)))
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    pub fn numel(&self) -> usize {
        self.shape.size()
    }

    pub fn ndim(&self) -> usize {
        self.shape.rank()
    }

    /// Row-major element buffer
    pub fn data(&self) -> &[T] {
        self.array
            .as_slice()
            .unwrap_or_else(|| unreachable!("tensor storage is kept in standard layout"))
    }

    pub fn get(&self, index: &[usize]) -> Option<T> {
        if index.len() != self.array.ndim() {
            return None;
        }
        self.array.get(index).copied()
    }

    /// Borrow this tensor as an engine input view
    pub fn view(&self) -> TensorView<'_, T> {
        TensorView::new(self.data(), self.shape.dims())
            .unwrap_or_else(|_| unreachable!("tensor buffer always matches its shape"))
    }

    pub fn as_array(&self) -> &ArrayD<T> {
        &self.array
    }

    pub fn into_array(self) -> ArrayD<T> {
        self.array
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.data().to_vec()
    }
}

/// Dtype-tagged owned output matching [`crate::DynTensorView`]
#[derive(Debug, Clone, PartialEq)]
pub enum DynTensor {
    F32(Tensor<f32>),
    F64(Tensor<f64>),
}

impl DynTensor {
    pub fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::Float32,
            Self::F64(_) => DType::Float64,
        }
    }

    pub fn shape(&self) -> &Shape {
        match self {
            Self::F32(t) => t.shape(),
            Self::F64(t) => t.shape(),
        }
    }

    pub fn as_f32(&self) -> Option<&Tensor<f32>> {
        match self {
            Self::F32(t) => Some(t),
            Self::F64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<&Tensor<f64>> {
        match self {
            Self::F64(t) => Some(t),
            Self::F32(_) => None,
        }
    }
}

impl From<Tensor<f32>> for DynTensor {
    fn from(t: Tensor<f32>) -> Self {
        Self::F32(t)
    }
}

impl From<Tensor<f64>> for DynTensor {
    fn from(t: Tensor<f64>) -> Self {
        Self::F64(t)
    }
}
