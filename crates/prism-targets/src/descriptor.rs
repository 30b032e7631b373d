//! Target descriptors
//!
//! One `TargetDescriptor` exists per target kind. It lazily builds and
//! caches exactly one `TypingContext` and one `TargetContext` for the
//! lifetime of the process, and lets a caller temporarily substitute a
//! different pair for the current thread through [`TargetDescriptor::nested`].
//!
//! Every accessor takes the compilation lock, consults the calling thread's
//! override stack first, and falls back to the top-level singletons. The
//! singletons are published only after fully successful construction: a
//! failed build leaves the cell unset, so a later access retries.

use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use prism_tracing::perf_span;

use crate::context::{ContextPair, TargetContext, TargetKind, TypingContext};
use crate::error::{TargetError, TargetResult};
use crate::lock::CompilationLock;
use crate::stack;

type BoxedError = Box<dyn Error + Send + Sync>;
type TypingFactory = Box<dyn Fn() -> Result<TypingContext, BoxedError> + Send + Sync>;
type TargetFactory = Box<dyn Fn(&Arc<TypingContext>) -> Result<TargetContext, BoxedError> + Send + Sync>;

fn next_descriptor_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Registry entry for one compilation target
///
/// Two descriptors never share contexts: each owns its singletons outright,
/// and the only state they share is the compilation lock.
pub struct TargetDescriptor {
    kind: TargetKind,
    id: u64,
    typing_cell: RwLock<Option<Arc<TypingContext>>>,
    target_cell: RwLock<Option<Arc<TargetContext>>>,
    typing_factory: TypingFactory,
    target_factory: TargetFactory,
}

impl TargetDescriptor {
    /// Create a descriptor with the default context factories for `kind`
    pub fn new(kind: TargetKind) -> Self {
        Self::with_factories(
            kind,
            Box::new(move || TypingContext::build_default(kind).map_err(BoxedError::from)),
            Box::new(|typing| TargetContext::build_default(Arc::clone(typing)).map_err(BoxedError::from)),
        )
    }

    /// Create a descriptor with custom context factories
    ///
    /// Used by tests to exercise construction-failure paths and by embedders
    /// that plug in their own inference/lowering tables.
    pub fn with_factories(kind: TargetKind, typing_factory: TypingFactory, target_factory: TargetFactory) -> Self {
        Self {
            kind,
            id: next_descriptor_id(),
            typing_cell: RwLock::new(None),
            target_cell: RwLock::new(None),
            typing_factory,
            target_factory,
        }
    }

    /// Target kind this descriptor resolves contexts for
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    /// The typing context governing compilation on the calling thread
    ///
    /// Returns the thread's top override when one is installed, otherwise
    /// the lazily-built top-level singleton.
    pub fn typing_context(&self) -> TargetResult<Arc<TypingContext>> {
        let _guard = CompilationLock::acquire();

        if let Some(pair) = stack::top(self.id) {
            return Ok(Arc::clone(pair.typing()));
        }
        if let Some(ctx) = self.typing_cell.read().as_ref() {
            return Ok(Arc::clone(ctx));
        }

        // First access: build under the compilation lock. The cell lock is
        // not held across the build, so construction may re-enter these
        // accessors without deadlocking.
        let _span = perf_span!("typing_context_build");
        let built = (self.typing_factory)().map_err(TargetError::Construction)?;
        let ctx = Arc::new(built);
        *self.typing_cell.write() = Some(Arc::clone(&ctx));
        tracing::debug!(target = %self.kind, id = %ctx.id(), "typing_singleton_published");
        Ok(ctx)
    }

    /// The target context governing compilation on the calling thread
    ///
    /// Returns the thread's top override when one is installed, otherwise
    /// the lazily-built top-level singleton. The singleton is always built
    /// against this descriptor's typing singleton, typing first.
    pub fn target_context(&self) -> TargetResult<Arc<TargetContext>> {
        let _guard = CompilationLock::acquire();

        if let Some(pair) = stack::top(self.id) {
            return Ok(Arc::clone(pair.target()));
        }
        if let Some(ctx) = self.target_cell.read().as_ref() {
            return Ok(Arc::clone(ctx));
        }

        let _span = perf_span!("target_context_build");
        let typing = self.typing_context()?;
        let built = (self.target_factory)(&typing).map_err(TargetError::Construction)?;
        let ctx = Arc::new(built);
        *self.target_cell.write() = Some(Arc::clone(&ctx));
        tracing::debug!(target = %self.kind, id = %ctx.id(), "target_singleton_published");
        Ok(ctx)
    }

    /// The context pair governing compilation on the calling thread
    pub fn context_pair(&self) -> TargetResult<ContextPair> {
        let _guard = CompilationLock::acquire();

        if let Some(pair) = stack::top(self.id) {
            return Ok(pair);
        }
        let typing = self.typing_context()?;
        let target = self.target_context()?;
        ContextPair::new(typing, target)
    }

    /// Temporarily substitute `(typing, target)` as the active pair for the
    /// calling thread
    ///
    /// Returns a guard; the previous state is restored when the guard drops,
    /// on every exit path including panics. Overrides nest to unbounded
    /// depth and never leak to other threads.
    ///
    /// # Errors
    ///
    /// `ContextMismatch` unless `target` was constructed against `typing`.
    pub fn nested(
        &self,
        typing: Arc<TypingContext>,
        target: Arc<TargetContext>,
    ) -> TargetResult<NestedContextGuard<'_>> {
        let pair = ContextPair::new(typing, target)?;
        let _guard = CompilationLock::acquire();
        stack::push(self.id, pair);
        tracing::debug!(target = %self.kind, depth = stack::depth(self.id), "override_installed");
        Ok(NestedContextGuard {
            descriptor: self,
            // Overrides are thread-scoped; the guard must not cross threads.
            _not_send: std::marker::PhantomData,
        })
    }

    /// Current override depth on the calling thread (0 = singleton fallback)
    pub fn override_depth(&self) -> usize {
        stack::depth(self.id)
    }
}

impl std::fmt::Debug for TargetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetDescriptor")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("typing_built", &self.typing_cell.read().is_some())
            .field("target_built", &self.target_cell.read().is_some())
            .finish()
    }
}

/// Guard restoring the previous override state when dropped
///
/// Dropping pops exactly the override its `nested` call installed; nested
/// guards therefore compose correctly as long as they drop in reverse
/// order, which lexical scoping guarantees.
pub struct NestedContextGuard<'a> {
    descriptor: &'a TargetDescriptor,
    _not_send: std::marker::PhantomData<*mut ()>,
}

impl Drop for NestedContextGuard<'_> {
    fn drop(&mut self) {
        let _guard = CompilationLock::acquire();
        stack::pop(self.descriptor.id);
        tracing::debug!(
            target = %self.descriptor.kind,
            depth = stack::depth(self.descriptor.id),
            "override_restored"
        );
    }
}

/// The process-wide host target
pub fn host_target() -> &'static TargetDescriptor {
    static HOST: OnceLock<TargetDescriptor> = OnceLock::new();
    HOST.get_or_init(|| TargetDescriptor::new(TargetKind::Host))
}

/// The process-wide accelerator target
pub fn accelerator_target() -> &'static TargetDescriptor {
    static ACCELERATOR: OnceLock<TargetDescriptor> = OnceLock::new();
    ACCELERATOR.get_or_init(|| TargetDescriptor::new(TargetKind::Accelerator))
}
