//! Error types for device-layer operations

use crate::device::DeviceKind;
use crate::elem::ScalarType;

/// Result type for device-layer operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur during launch validation and kernel execution
///
/// Launch-geometry and memory-shape variants form the configuration class:
/// they are detected eagerly, before any work-item runs, and name the
/// offending dimension or shape so the caller can act on them.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Extent has a zero-sized dimension
    #[error("extent dimension {dim} is zero")]
    ZeroExtent { dim: usize },

    /// Local extent rank differs from global extent rank
    #[error("local extent rank {local} does not match global extent rank {global}")]
    RankMismatch { global: usize, local: usize },

    /// Local extent does not evenly partition the global extent
    #[error("global extent {global} is not divisible by local extent {local} along dimension {dim}")]
    IndivisibleExtent { dim: usize, global: usize, local: usize },

    /// No device of the requested kind could be located
    #[error("no {kind} device available")]
    DeviceUnavailable { kind: DeviceKind },

    /// Invalid buffer handle
    #[error("invalid buffer handle: {0}")]
    InvalidBufferHandle(u64),

    /// Host transfer out of bounds
    #[error("buffer access out of bounds: offset {offset} + size {size} > buffer size {buffer_size}")]
    BufferOutOfBounds {
        offset: usize,
        size: usize,
        buffer_size: usize,
    },

    /// Buffer byte length is not a whole number of elements
    #[error("buffer of {bytes} bytes is not a whole number of {scalar} elements")]
    MisalignedView { bytes: usize, scalar: ScalarType },

    /// View shape does not cover the buffer's element count
    #[error("view shape {shape:?} does not cover {len} elements")]
    ShapeMismatch { shape: Vec<usize>, len: usize },

    /// Index rank differs from view rank
    #[error("index rank {got} does not match view rank {expected}")]
    IndexRankMismatch { expected: usize, got: usize },

    /// Index outside the view's shape
    #[error("index {index:?} out of bounds for view of shape {shape:?}")]
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },

    /// Work-items of one group disagree on a local allocation's element type
    #[error("local allocation {site}: element type {requested} does not match {existing}")]
    LocalElemMismatch {
        site: usize,
        requested: ScalarType,
        existing: ScalarType,
    },

    /// Work-items of one group disagree on a local allocation's shape
    #[error("local allocation {site}: shape {requested:?} does not match {existing:?}")]
    LocalShapeMismatch {
        site: usize,
        requested: Vec<usize>,
        existing: Vec<usize>,
    },

    /// Kernel argument index out of range
    #[error("kernel argument index {0} out of range")]
    InvalidArgument(usize),

    /// Execution error
    #[error("execution error: {0}")]
    ExecutionError(String),
}

impl BackendError {
    /// Create an execution error
    pub fn execution_error(msg: impl Into<String>) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// True for errors of the configuration class: wrong geometry, shapes,
    /// or indices supplied by the caller, detected before execution.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ZeroExtent { .. }
                | Self::RankMismatch { .. }
                | Self::IndivisibleExtent { .. }
                | Self::MisalignedView { .. }
                | Self::ShapeMismatch { .. }
                | Self::IndexRankMismatch { .. }
                | Self::IndexOutOfBounds { .. }
                | Self::LocalElemMismatch { .. }
                | Self::LocalShapeMismatch { .. }
        )
    }
}
