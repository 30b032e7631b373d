//! Device layer for Prism kernel execution
//!
//! This crate provides:
//! - **Launch geometry**: extents, launch descriptors, eager validation
//! - **Devices**: discovery and selection of the in-process devices
//! - **Device memory**: handle-managed allocations and typed views
//! - **Execution model**: work-items, work-group barriers, scoped local
//!   memory, and atomic read-modify-write primitives
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Kernel Body                           │
//! │        (one closure, run once per work-item)             │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                   GroupExecutor                          │
//! │   groups in parallel · one thread per work-item          │
//! └───────┬─────────────────────┬───────────────────────────┘
//!         ▼                     ▼
//!   ┌───────────┐        ┌─────────────┐
//!   │  WorkItem │        │ Work-group  │
//!   │  indices  │        │ barrier +   │
//!   │  atomics  │        │ local memory│
//!   └───────────┘        └─────────────┘
//! ```
//!
//! # Consistency model
//!
//! Work-items of one group run with true parallelism; groups are independent
//! units of scheduling with no ordering between them. Shared device memory
//! is racy by default; atomics are indivisible without a barrier, and
//! barriers with a fence scope are the only ordering primitive. That is the
//! entire model — there are no transactional semantics.
//!
//! # Usage
//!
//! ```rust
//! use prism_backends::{
//!     Args, DeviceKind, DeviceRegistry, Extent, GroupExecutor, KernelArg, LaunchDescriptor,
//!     MemoryManager, Result, WorkItem,
//! };
//!
//! # fn main() -> Result<()> {
//! let registry = DeviceRegistry::discover();
//! let device = registry.get(DeviceKind::Accelerator)?.clone();
//!
//! let mut memory = MemoryManager::new();
//! let handle = memory.allocate_buffer(10 * std::mem::size_of::<f32>())?;
//!
//! let body = |item: &WorkItem, args: &Args| -> Result<()> {
//!     let data = args.buffer::<f32>(0)?;
//!     data.store(item.global_id(0), item.global_id(0) as f32)
//! };
//!
//! let launch = LaunchDescriptor::new(device, Extent::d1(10), None)?;
//! let args = Args::new(vec![KernelArg::new(
//!     memory.allocation(handle)?,
//!     prism_backends::ScalarType::F32,
//! )]);
//! GroupExecutor::execute(&body, &launch, &args)?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod elem;
pub mod error;
pub mod executor;
pub mod extent;
pub mod group;
pub mod kernel;
pub mod launch;
pub mod memory;
pub mod view;
pub mod workitem;

// Re-export public API
pub use device::{Device, DeviceKind, DeviceRegistry};
pub use elem::{AtomicElem, DeviceElem, ScalarType};
pub use error::{BackendError, Result};
pub use executor::GroupExecutor;
pub use extent::{Extent, MAX_RANK};
pub use kernel::{Args, KernelArg, KernelBody};
pub use launch::{LaunchDescriptor, LaunchPhase, LaunchReport};
pub use memory::{BufferHandle, DeviceAllocation, MemoryManager};
pub use view::{AsIndex, BufferView};
pub use workitem::{MemFence, WorkItem};
