//! Error types for the host-facing surface

use prism_backends::{BackendError, DeviceKind, ScalarType};
use prism_targets::{TargetError, TargetKind};

/// Result type for prism-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur on the host-facing surface
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Device-layer error (geometry, memory, devices, execution)
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Context-resolution error (pairing, construction)
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Host slice length does not match the buffer
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A kernel argument's scalar type is not supported by the typing context
    #[error("kernel '{kernel}' argument {index}: {scalar} not supported by the {target} typing context")]
    UnsupportedArgType {
        kernel: String,
        index: usize,
        scalar: ScalarType,
        target: TargetKind,
    },

    /// The target context lacks a lowering rule the kernel requires
    #[error("kernel '{kernel}' requires intrinsic '{name}' which the target context does not lower")]
    MissingIntrinsic { kernel: String, name: String },

    /// Kernel compiled for one target kind, launched on another device kind
    #[error("kernel '{kernel}' compiled for the {compiled} target cannot launch on a {device} device")]
    TargetDeviceMismatch {
        kernel: String,
        compiled: TargetKind,
        device: DeviceKind,
    },

    /// Wrong number of launch arguments
    #[error("kernel '{kernel}' expects {expected} arguments, got {actual}")]
    ArgCountMismatch {
        kernel: String,
        expected: usize,
        actual: usize,
    },

    /// Launch argument element type differs from the declared signature
    #[error("kernel '{kernel}' argument {index}: declared {declared}, got {actual}")]
    ArgTypeMismatch {
        kernel: String,
        index: usize,
        declared: ScalarType,
        actual: ScalarType,
    },
}
