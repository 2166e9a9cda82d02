use crate::DType;
use thiserror::Error;

/// Validation errors reported by the convolution engine.
///
/// Every variant is raised before any output element is computed. None of
/// them are transient: the same inputs always produce the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvError {
    #[error("Shape mismatch in operation '{operation}': expected {expected}, got {got}")]
    ShapeMismatch {
        operation: String,
        expected: String,
        got: String,
        context: Option<ErrorContext>,
    },

    #[error("Invalid configuration in operation '{operation}': {parameter} {reason}")]
    InvalidConfiguration {
        operation: String,
        parameter: String,
        reason: String,
        context: Option<ErrorContext>,
    },

    #[error("Type mismatch in operation '{operation}': expected {expected}, got {got}")]
    TypeMismatch {
        operation: String,
        expected: DType,
        got: DType,
        context: Option<ErrorContext>,
    },

    #[error(
        "Dimension too small in operation '{operation}': spatial dimension {dim} has size {size}, \
         effective kernel extent is {extent}"
    )]
    DimensionTooSmall {
        operation: String,
        dim: usize,
        size: usize,
        extent: usize,
        context: Option<ErrorContext>,
    },

    #[error("Invalid array layout in operation '{operation}': {reason}")]
    InvalidLayout {
        operation: String,
        reason: String,
        shape: Option<Vec<usize>>,
    },
}

/// Shapes and dtypes of the operands involved in a failed call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub input_shapes: Vec<Vec<usize>>,
    pub input_dtypes: Vec<DType>,
    pub output_shape: Option<Vec<usize>>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add operand information
    pub fn with_input(mut self, shape: &[usize], dtype: DType) -> Self {
        self.input_shapes.push(shape.to_vec());
        self.input_dtypes.push(dtype);
        self
    }

    pub fn with_output_shape(mut self, shape: &[usize]) -> Self {
        self.output_shape = Some(shape.to_vec());
        self
    }
}

impl ConvError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(operation: &str, expected: &str, got: &str) -> Self {
        Self::ShapeMismatch {
            operation: operation.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
            context: None,
        }
    }

    /// Create an invalid configuration error naming the offending parameter
    pub fn invalid_configuration(operation: &str, parameter: &str, reason: &str) -> Self {
        Self::InvalidConfiguration {
            operation: operation.to_string(),
            parameter: parameter.to_string(),
            reason: reason.to_string(),
            context: None,
        }
    }

    pub fn type_mismatch(operation: &str, expected: DType, got: DType) -> Self {
        Self::TypeMismatch {
            operation: operation.to_string(),
            expected,
            got,
            context: None,
        }
    }

    pub fn dimension_too_small(operation: &str, dim: usize, size: usize, extent: usize) -> Self {
        Self::DimensionTooSmall {
            operation: operation.to_string(),
            dim,
            size,
            extent,
            context: None,
        }
    }

    /// Create a layout error for a view that cannot be built
    pub fn invalid_layout(operation: &str, reason: String, shape: Option<&[usize]>) -> Self {
        Self::InvalidLayout {
            operation: operation.to_string(),
            reason,
            shape: shape.map(|s| s.to_vec()),
        }
    }

    /// Attach operand context to an existing error
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        match &mut self {
            Self::ShapeMismatch { context: ctx, .. } => *ctx = Some(context),
            Self::InvalidConfiguration { context: ctx, .. } => *ctx = Some(context),
            Self::TypeMismatch { context: ctx, .. } => *ctx = Some(context),
            Self::DimensionTooSmall { context: ctx, .. } => *ctx = Some(context),
            Self::InvalidLayout { .. } => {}
        }
        self
    }

    /// Get the operation name for this error
    pub fn operation(&self) -> &str {
        match self {
            Self::ShapeMismatch { operation, .. } => operation,
            Self::InvalidConfiguration { operation, .. } => operation,
            Self::TypeMismatch { operation, .. } => operation,
            Self::DimensionTooSmall { operation, .. } => operation,
            Self::InvalidLayout { operation, .. } => operation,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::ShapeMismatch { context, .. }
            | Self::InvalidConfiguration { context, .. }
            | Self::TypeMismatch { context, .. }
            | Self::DimensionTooSmall { context, .. } => context.as_ref(),
            Self::InvalidLayout { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvError>;

impl From<ndarray::ShapeError> for ConvError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::InvalidLayout {
            operation: "tensor_creation".to_string(),
            reason: format!("Shape error: {err}"),
            shape: None,
        }
    }
}
