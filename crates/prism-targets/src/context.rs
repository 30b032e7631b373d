//! Typing and target contexts
//!
//! A `TypingContext` is the rule set mapping operation signatures to result
//! types for one target kind; a `TargetContext` is the rule set mapping
//! typed operations to lowering strategies for the same kind, constructed
//! against exactly one typing context. The two travel together as a
//! `ContextPair`; a target context can never be observed paired with a
//! typing context it was not built from.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use prism_backends::{DeviceKind, MemFence, ScalarType};

use crate::error::{TargetError, TargetResult};

/// Unique identity of one constructed context
///
/// Identities are process-wide and never reused; the pairing invariant is
/// checked against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

fn next_context_id() -> ContextId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    ContextId(COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Compilation target kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// General-purpose host processor
    Host,
    /// Accelerator device
    Accelerator,
}

impl TargetKind {
    /// The device kind this target's compiled code executes on
    pub fn device_kind(self) -> DeviceKind {
        match self {
            TargetKind::Host => DeviceKind::Host,
            TargetKind::Accelerator => DeviceKind::Accelerator,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Host => f.write_str("host"),
            TargetKind::Accelerator => f.write_str("accelerator"),
        }
    }
}

/// Key of one operation signature: name plus argument types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Signature {
    op: String,
    args: Vec<ScalarType>,
}

/// Rule set mapping operation signatures to result types for one target kind
///
/// Immutable after construction. Built through [`TypingContextBuilder`];
/// the default tables register the arithmetic and atomic operations every
/// target understands, restricted to the scalar types the target supports.
pub struct TypingContext {
    id: ContextId,
    target: TargetKind,
    supported: Vec<ScalarType>,
    signatures: HashMap<Signature, ScalarType>,
}

impl TypingContext {
    /// Start building a typing context for `target`
    pub fn builder(target: TargetKind) -> TypingContextBuilder {
        TypingContextBuilder {
            target,
            supported: Vec::new(),
            signatures: HashMap::new(),
        }
    }

    /// Build the default typing context for `target`
    ///
    /// The host supports every scalar type. The accelerator omits `f64`;
    /// double-precision support is an optional device capability and the
    /// reference device does not advertise it.
    pub fn build_default(target: TargetKind) -> TargetResult<Self> {
        let supported: Vec<ScalarType> = match target {
            TargetKind::Host => ScalarType::ALL.to_vec(),
            TargetKind::Accelerator => ScalarType::ALL
                .iter()
                .copied()
                .filter(|s| *s != ScalarType::F64)
                .collect(),
        };

        let mut builder = Self::builder(target).with_supported(&supported);
        for &ty in &supported {
            for op in ["add", "sub", "mul", "div", "min", "max"] {
                builder = builder.signature(op, &[ty, ty], ty)?;
            }
            if ty.is_atomic() {
                for op in ["atomic_add", "atomic_sub", "atomic_min", "atomic_max"] {
                    builder = builder.signature(op, &[ty, ty], ty)?;
                }
            }
        }
        Ok(builder.build())
    }

    /// Unique identity of this context
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Target kind this context types for
    pub fn target_kind(&self) -> TargetKind {
        self.target
    }

    /// Result type of `op` applied to `args`, if the signature is known
    pub fn resolve(&self, op: &str, args: &[ScalarType]) -> Option<ScalarType> {
        let key = Signature {
            op: op.to_string(),
            args: args.to_vec(),
        };
        self.signatures.get(&key).copied()
    }

    /// True when this target supports values of type `scalar`
    pub fn supports(&self, scalar: ScalarType) -> bool {
        self.supported.contains(&scalar)
    }

    /// Number of registered signatures
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// True when no signatures are registered
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl fmt::Debug for TypingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypingContext")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("signatures", &self.signatures.len())
            .finish()
    }
}

/// Builder for [`TypingContext`]
///
/// The registration interface consumed by the external type-inference
/// engine; once `build` runs the context is immutable.
pub struct TypingContextBuilder {
    target: TargetKind,
    supported: Vec<ScalarType>,
    signatures: HashMap<Signature, ScalarType>,
}

impl TypingContextBuilder {
    /// Declare the scalar types this target supports
    pub fn with_supported(mut self, supported: &[ScalarType]) -> Self {
        self.supported = supported.to_vec();
        self
    }

    /// Register one operation signature
    ///
    /// # Errors
    ///
    /// `DuplicateSignature` when the same `(op, args)` key is registered
    /// twice.
    pub fn signature(mut self, op: &str, args: &[ScalarType], result: ScalarType) -> TargetResult<Self> {
        let key = Signature {
            op: op.to_string(),
            args: args.to_vec(),
        };
        if self.signatures.contains_key(&key) {
            return Err(TargetError::DuplicateSignature {
                op: op.to_string(),
                args: args.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", "),
            });
        }
        self.signatures.insert(key, result);
        Ok(self)
    }

    /// Freeze the rule set
    pub fn build(self) -> TypingContext {
        let ctx = TypingContext {
            id: next_context_id(),
            target: self.target,
            supported: self.supported,
            signatures: self.signatures,
        };
        tracing::debug!(id = %ctx.id, target = %ctx.target, signatures = ctx.len(), "typing_context_built");
        ctx
    }
}

/// How one intrinsic lowers on a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoweringRule {
    /// Plain intrinsic mapped to a target symbol
    Intrinsic { symbol: String },
    /// Work-group barrier with its default fence scope
    Barrier { default_fence: MemFence },
    /// Atomic read-modify-write; indices are unsigned integers of
    /// `index_bits` width at every call site
    AtomicRmw { index_bits: u32 },
}

/// Calling convention compiled functions use on a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConv {
    /// Native host calling convention
    Native,
    /// Kernel dispatch convention: arguments arrive as device buffers
    Kernel,
}

/// Rule set mapping typed operations to lowering strategies for one target
///
/// Always constructed against the typing context it will be paired with;
/// immutable after construction.
pub struct TargetContext {
    id: ContextId,
    typing: Arc<TypingContext>,
    call_conv: CallConv,
    intrinsics: HashMap<String, LoweringRule>,
}

impl TargetContext {
    /// Build the default target context for the typing context's target kind
    pub fn build_default(typing: Arc<TypingContext>) -> TargetResult<Self> {
        let mut intrinsics = HashMap::new();
        let (call_conv, prefix) = match typing.target_kind() {
            TargetKind::Host => (CallConv::Native, "host"),
            TargetKind::Accelerator => (CallConv::Kernel, "accel"),
        };

        intrinsics.insert(
            "barrier".to_string(),
            LoweringRule::Barrier {
                default_fence: MemFence::Global,
            },
        );
        intrinsics.insert("atomic_rmw".to_string(), LoweringRule::AtomicRmw { index_bits: 64 });
        for name in ["global_id", "local_id", "group_id", "local_size", "num_groups"] {
            intrinsics.insert(
                name.to_string(),
                LoweringRule::Intrinsic {
                    symbol: format!("{prefix}.{name}"),
                },
            );
        }

        Ok(Self {
            id: next_context_id(),
            typing,
            call_conv,
            intrinsics,
        })
    }

    /// Unique identity of this context
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The typing context this target context was constructed against
    pub fn typing(&self) -> &Arc<TypingContext> {
        &self.typing
    }

    /// Target kind this context lowers for
    pub fn target_kind(&self) -> TargetKind {
        self.typing.target_kind()
    }

    /// Calling convention for compiled functions
    pub fn call_conv(&self) -> CallConv {
        self.call_conv
    }

    /// Lowering rule for a named intrinsic
    pub fn intrinsic(&self, name: &str) -> Option<&LoweringRule> {
        self.intrinsics.get(name)
    }
}

impl fmt::Debug for TargetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetContext")
            .field("id", &self.id)
            .field("typing", &self.typing.id())
            .field("call_conv", &self.call_conv)
            .finish()
    }
}

/// The (typing, target) tuple governing one compilation
#[derive(Clone, Debug)]
pub struct ContextPair {
    typing: Arc<TypingContext>,
    target: Arc<TargetContext>,
}

impl ContextPair {
    /// Pair a typing context with a target context
    ///
    /// # Errors
    ///
    /// `ContextMismatch` unless `target` was constructed against `typing`.
    pub fn new(typing: Arc<TypingContext>, target: Arc<TargetContext>) -> TargetResult<Self> {
        if !Arc::ptr_eq(&typing, target.typing()) {
            return Err(TargetError::ContextMismatch {
                typing: typing.id(),
                target: target.id(),
            });
        }
        Ok(Self { typing, target })
    }

    /// Pair a target context with the typing context it was built from
    pub fn from_target(target: Arc<TargetContext>) -> Self {
        Self {
            typing: Arc::clone(target.typing()),
            target,
        }
    }

    /// The typing half
    pub fn typing(&self) -> &Arc<TypingContext> {
        &self.typing
    }

    /// The target half
    pub fn target(&self) -> &Arc<TargetContext> {
        &self.target
    }

    /// True when both halves are the same contexts as `other`'s
    /// (reference identity, not value equality)
    pub fn same_as(&self, other: &ContextPair) -> bool {
        Arc::ptr_eq(&self.typing, &other.typing) && Arc::ptr_eq(&self.target, &other.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_typing_tables() {
        let typing = TypingContext::build_default(TargetKind::Host).unwrap();
        assert_eq!(
            typing.resolve("add", &[ScalarType::F32, ScalarType::F32]),
            Some(ScalarType::F32)
        );
        assert_eq!(
            typing.resolve("atomic_add", &[ScalarType::U32, ScalarType::U32]),
            Some(ScalarType::U32)
        );
        // No atomic signatures for sub-word types.
        assert_eq!(typing.resolve("atomic_add", &[ScalarType::U8, ScalarType::U8]), None);
        // Unknown op.
        assert_eq!(typing.resolve("fma", &[ScalarType::F32, ScalarType::F32]), None);
    }

    #[test]
    fn test_accelerator_omits_f64() {
        let typing = TypingContext::build_default(TargetKind::Accelerator).unwrap();
        assert!(typing.supports(ScalarType::F32));
        assert!(!typing.supports(ScalarType::F64));
        assert_eq!(typing.resolve("add", &[ScalarType::F64, ScalarType::F64]), None);

        let host = TypingContext::build_default(TargetKind::Host).unwrap();
        assert!(host.supports(ScalarType::F64));
    }

    #[test]
    fn test_duplicate_signature_rejected() {
        let result = TypingContext::builder(TargetKind::Host)
            .signature("add", &[ScalarType::I32, ScalarType::I32], ScalarType::I32)
            .unwrap()
            .signature("add", &[ScalarType::I32, ScalarType::I32], ScalarType::I64);
        assert!(matches!(result, Err(TargetError::DuplicateSignature { .. })));
    }

    #[test]
    fn test_context_ids_unique() {
        let a = TypingContext::build_default(TargetKind::Host).unwrap();
        let b = TypingContext::build_default(TargetKind::Host).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_target_context_carries_lowering_rules() {
        let typing = Arc::new(TypingContext::build_default(TargetKind::Accelerator).unwrap());
        let target = TargetContext::build_default(Arc::clone(&typing)).unwrap();

        assert_eq!(target.call_conv(), CallConv::Kernel);
        assert!(matches!(
            target.intrinsic("barrier"),
            Some(LoweringRule::Barrier {
                default_fence: MemFence::Global
            })
        ));
        assert!(matches!(
            target.intrinsic("atomic_rmw"),
            Some(LoweringRule::AtomicRmw { index_bits: 64 })
        ));
        assert!(target.intrinsic("no_such_intrinsic").is_none());
    }

    #[test]
    fn test_pairing_invariant() {
        let typing_a = Arc::new(TypingContext::build_default(TargetKind::Host).unwrap());
        let typing_b = Arc::new(TypingContext::build_default(TargetKind::Host).unwrap());
        let target_a = Arc::new(TargetContext::build_default(Arc::clone(&typing_a)).unwrap());

        assert!(ContextPair::new(Arc::clone(&typing_a), Arc::clone(&target_a)).is_ok());

        match ContextPair::new(Arc::clone(&typing_b), target_a) {
            Err(TargetError::ContextMismatch { .. }) => {}
            other => panic!("expected ContextMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_pair_from_target_is_always_consistent() {
        let typing = Arc::new(TypingContext::build_default(TargetKind::Accelerator).unwrap());
        let target = Arc::new(TargetContext::build_default(Arc::clone(&typing)).unwrap());
        let pair = ContextPair::from_target(target);
        assert!(Arc::ptr_eq(pair.typing(), &typing));
    }
}
