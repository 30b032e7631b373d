//! Target/typing context registry for Prism
//!
//! This crate decides which *typing context* (rules for inferring result
//! types) and which *target context* (rules for lowering typed operations)
//! govern each compilation, and lets one process compile for several
//! execution targets without the pipelines corrupting each other's state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 TargetDescriptor                      │
//! │  typing_context() / target_context() / nested()       │
//! └──────┬──────────────────┬────────────────────────────┘
//!        │                  │
//!        ▼                  ▼
//!  thread-local       lazy init-once
//!  override stack     singleton pair
//!        │                  │
//!        └────────┬─────────┘
//!                 ▼
//!          CompilationLock (process-wide, reentrant)
//! ```
//!
//! Every accessor takes the compilation lock, consults the calling thread's
//! override stack, then falls back to the lazily-built top-level singleton.
//! Overrides are strictly thread-scoped: two threads may hold different
//! overrides (or one an override and one the singleton) simultaneously
//! without interference.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use prism_targets::{accelerator_target, TargetContext, TargetKind, TypingContext};
//!
//! # fn main() -> Result<(), prism_targets::TargetError> {
//! // Singleton access: built on first touch, cached for the process.
//! let typing = accelerator_target().typing_context()?;
//! let target = accelerator_target().target_context()?;
//! assert!(Arc::ptr_eq(target.typing(), &typing));
//!
//! // Scoped override for this thread only.
//! let alt_typing = Arc::new(TypingContext::build_default(TargetKind::Accelerator)?);
//! let alt_target = Arc::new(TargetContext::build_default(Arc::clone(&alt_typing))?);
//! {
//!     let _scope = accelerator_target().nested(alt_typing, alt_target)?;
//!     // Compilations here resolve the substituted pair.
//! }
//! // Previous state restored, even on panic.
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod descriptor;
pub mod error;
pub mod lock;
mod stack;

// Re-export public API
pub use context::{CallConv, ContextId, ContextPair, LoweringRule, TargetContext, TargetKind, TypingContext, TypingContextBuilder};
pub use descriptor::{accelerator_target, host_target, NestedContextGuard, TargetDescriptor};
pub use error::{TargetError, TargetResult};
pub use lock::{CompilationLock, CompilationLockGuard};
