//! The compilation lock
//!
//! A single process-wide reentrant mutex serializing all context
//! construction and override install/restore. Reentrancy matters: building
//! a target context re-enters the typing-context accessor on the same
//! thread, and context construction may trigger nested compilation of
//! helper routines that walks back into the same accessors.
//!
//! The lock only serializes — it does not detect or break deadlocks. Never
//! block on external I/O or a device dispatch while holding it.

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

static COMPILATION_LOCK: ReentrantMutex<()> = ReentrantMutex::new(());

/// Process-wide reentrant lock guarding context construction and override
/// install/restore
pub struct CompilationLock;

/// Guard proving the compilation lock is held by the current thread
pub type CompilationLockGuard = ReentrantMutexGuard<'static, ()>;

impl CompilationLock {
    /// Acquire the lock, blocking until it is available
    ///
    /// A thread already holding the lock may acquire it again; acquisition
    /// never fails in normal operation.
    pub fn acquire() -> CompilationLockGuard {
        COMPILATION_LOCK.lock()
    }

    /// True when the current thread could acquire the lock without blocking
    /// on another thread (already held by us, or free)
    pub fn try_acquire() -> Option<CompilationLockGuard> {
        COMPILATION_LOCK.try_lock()
    }
}
