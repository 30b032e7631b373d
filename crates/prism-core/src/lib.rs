//! # prism-core — Host surface for heterogeneous kernel execution
//!
//! Prism lets one process compile for more than one physical execution
//! target. The context-resolution layer (`prism-targets`) decides which
//! typing/lowering rule pair governs each compilation; the device layer
//! (`prism-backends`) executes compiled kernels under the work-group model
//! with barriers, atomics, and scoped local memory. This crate ties the two
//! together behind the API the host program actually uses.
//!
//! ## Architecture
//!
//! ```text
//! prism_core::CompiledKernel
//!   │  compile: resolves ContextPair from a TargetDescriptor
//!   │           (override stack first, then lazy singletons)
//!   ▼
//! prism_core::Executor ── owns Device + MemoryManager
//!   │  dispatch: validates geometry + signature, builds Args
//!   ▼
//! prism_backends::GroupExecutor ── groups in parallel,
//!                                  one thread per work-item
//! ```
//!
//! ## Example
//!
//! ```rust
//! use prism_backends::{Args, Extent, Result as KernelResult, ScalarType, WorkItem};
//! use prism_core::{accelerator_target, CompiledKernel, Executor};
//!
//! # fn main() -> prism_core::Result<()> {
//! // Author a kernel: one closure, run once per work-item.
//! let kernel = CompiledKernel::compile(
//!     "scale",
//!     accelerator_target(),
//!     &[ScalarType::F32],
//!     |item: &WorkItem, args: &Args| -> KernelResult<()> {
//!         let data = args.buffer::<f32>(0)?;
//!         let i = item.global_id(0);
//!         data.store(i, data.load(i)? * 3.0)
//!     },
//! )?;
//!
//! // Allocate, transfer, launch, read back.
//! let mut exec = Executor::new_auto()?;
//! let mut buf = exec.allocate::<f32>(64)?;
//! buf.copy_from_slice(&mut exec, &vec![1.0; 64])?;
//! kernel.dispatch(&mut exec, Extent::d1(64), Some(Extent::d1(16)), &[buf.as_arg()])?;
//! assert_eq!(buf.to_vec(&exec)?, vec![3.0; 64]);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod executor;
pub mod kernel;

// Re-export primary types
pub use buffer::Buffer;
pub use error::{Error, Result};
pub use executor::{Executor, LaunchArg};
pub use kernel::CompiledKernel;

// The context-resolution surface, re-exported for callers that only need
// the host API.
pub use prism_targets::{accelerator_target, host_target, TargetDescriptor, TargetKind};
