//! Kernel bodies and their arguments
//!
//! `KernelBody` marks a function as a device kernel: it runs once per
//! work-item against the launch's argument buffers. `Args` resolves
//! positional arguments into typed views; the declared scalar type of each
//! argument is checked when the view is taken, so a kernel cannot silently
//! reinterpret an argument at a different element type than it was launched
//! with.

use std::sync::Arc;

use crate::elem::{DeviceElem, ScalarType};
use crate::error::{BackendError, Result};
use crate::memory::DeviceAllocation;
use crate::view::BufferView;
use crate::workitem::WorkItem;

/// One positional kernel argument: an allocation plus its declared element
/// type
#[derive(Clone)]
pub struct KernelArg {
    alloc: Arc<DeviceAllocation>,
    scalar: ScalarType,
}

impl KernelArg {
    /// Create an argument from a shared allocation and its element type
    pub fn new(alloc: Arc<DeviceAllocation>, scalar: ScalarType) -> Self {
        Self { alloc, scalar }
    }

    /// Declared element type
    pub fn scalar(&self) -> ScalarType {
        self.scalar
    }
}

/// The argument buffers of one launch
///
/// Shared by every work-item; views taken from it alias device memory.
pub struct Args {
    args: Vec<KernelArg>,
}

impl Args {
    /// Bundle the positional arguments of a launch
    pub fn new(args: Vec<KernelArg>) -> Self {
        Self { args }
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// True when the launch has no arguments
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Declared element type of argument `index`
    pub fn scalar(&self, index: usize) -> Result<ScalarType> {
        self.args
            .get(index)
            .map(|a| a.scalar)
            .ok_or(BackendError::InvalidArgument(index))
    }

    /// Take a flat typed view of argument `index`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an out-of-range index; `TypeMismatch`-class
    /// errors when `T` differs from the declared element type.
    pub fn buffer<T: DeviceElem>(&self, index: usize) -> Result<BufferView<T>> {
        let arg = self.args.get(index).ok_or(BackendError::InvalidArgument(index))?;
        if arg.scalar != T::SCALAR {
            return Err(BackendError::execution_error(format!(
                "argument {index} declared as {} but viewed as {}",
                arg.scalar,
                T::SCALAR
            )));
        }
        BufferView::new(Arc::clone(&arg.alloc))
    }

    /// Take a shaped typed view of argument `index` (row-major)
    pub fn buffer_shaped<T: DeviceElem>(&self, index: usize, shape: &[usize]) -> Result<BufferView<T>> {
        self.buffer::<T>(index)?.with_shape(shape)
    }
}

/// A function body designated as a device kernel
///
/// Implemented for any `Fn(&WorkItem, &Args) -> Result<()>` closure, which
/// is the usual way to author one:
///
/// ```rust
/// use prism_backends::{Args, Result, WorkItem};
///
/// let body = |item: &WorkItem, args: &Args| -> Result<()> {
///     let data = args.buffer::<f32>(0)?;
///     let i = item.global_id(0);
///     let v = data.load(i)?;
///     data.store(i, v * 2.0)
/// };
/// # let _ = body;
/// ```
pub trait KernelBody: Send + Sync {
    /// Execute this kernel for one work-item
    fn run(&self, item: &WorkItem, args: &Args) -> Result<()>;
}

impl<F> KernelBody for F
where
    F: Fn(&WorkItem, &Args) -> Result<()> + Send + Sync,
{
    fn run(&self, item: &WorkItem, args: &Args) -> Result<()> {
        self(item, args)
    }
}
