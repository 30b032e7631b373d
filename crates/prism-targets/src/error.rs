//! Error types for context resolution

use crate::context::ContextId;

/// Result type for context-resolution operations
pub type TargetResult<T> = std::result::Result<T, TargetError>;

/// Errors that can occur while resolving or constructing contexts
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// A target context was paired with a typing context it was not
    /// constructed against
    #[error("target context {target} was not constructed against typing context {typing}")]
    ContextMismatch { typing: ContextId, target: ContextId },

    /// Context construction failed; the underlying inference/lowering
    /// failure is passed through unmodified
    #[error(transparent)]
    Construction(Box<dyn std::error::Error + Send + Sync>),

    /// An operation signature was registered twice
    #[error("duplicate signature: {op}({args})")]
    DuplicateSignature { op: String, args: String },
}

impl TargetError {
    /// Wrap a construction failure without altering its message
    pub fn construction(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Construction(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_error_is_transparent() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "lowering table overflow");
        let err = TargetError::construction(inner);
        // Display forwards the underlying message unmodified.
        assert_eq!(err.to_string(), "lowering table overflow");
    }

    #[test]
    fn test_mismatch_names_both_contexts() {
        let err = TargetError::ContextMismatch {
            typing: ContextId(3),
            target: ContextId(9),
        };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('9'));
    }
}
