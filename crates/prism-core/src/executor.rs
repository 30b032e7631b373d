//! Executor for managing device execution
//!
//! The `Executor` owns one device and its memory manager, and provides the
//! high-level APIs for buffer allocation and host↔device transfers. Kernel
//! dispatch goes through [`crate::kernel::CompiledKernel`], which borrows
//! the executor for the duration of one launch.

use std::sync::Arc;

use parking_lot::RwLock;
use prism_backends::{
    Device, DeviceKind, DeviceRegistry, KernelArg, MemoryManager, ScalarType,
};

use crate::buffer::Buffer;
use crate::error::Result;

/// Executor for one device
///
/// # Example
///
/// ```rust
/// use prism_core::Executor;
///
/// # fn main() -> prism_core::Result<()> {
/// let mut exec = Executor::new_auto()?;
/// let buf = exec.allocate::<f32>(1024)?;
/// # let _ = buf;
/// # Ok(())
/// # }
/// ```
pub struct Executor {
    device: Device,
    memory: Arc<RwLock<MemoryManager>>,
}

impl Executor {
    /// Create an executor on the host device
    #[tracing::instrument]
    pub fn new() -> Result<Self> {
        Self::with_device(DeviceKind::Host)
    }

    /// Create an executor on the first device of the given kind
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` when no device of `kind` exists; the request is
    /// never downgraded to a different device.
    #[tracing::instrument]
    pub fn with_device(kind: DeviceKind) -> Result<Self> {
        Self::with_registry(&DeviceRegistry::discover(), kind)
    }

    /// Create an executor against an explicit device registry
    pub fn with_registry(registry: &DeviceRegistry, kind: DeviceKind) -> Result<Self> {
        let device = registry.get(kind)?.clone();
        tracing::debug!(device = %device, "executor_created");
        Ok(Self {
            device,
            memory: Arc::new(RwLock::new(MemoryManager::new())),
        })
    }

    /// Create an executor with automatic device selection
    ///
    /// Tries the accelerator first and falls back to the host.
    #[tracing::instrument]
    pub fn new_auto() -> Result<Self> {
        let registry = DeviceRegistry::discover();
        if let Ok(exec) = Self::with_registry(&registry, DeviceKind::Accelerator) {
            tracing::info!("Auto-selected accelerator device");
            return Ok(exec);
        }
        tracing::info!("Auto-selected host device (fallback)");
        Self::with_registry(&registry, DeviceKind::Host)
    }

    /// The device this executor dispatches to
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Allocate a zeroed buffer of `len` elements
    #[tracing::instrument(skip(self), fields(
        len = len,
        elem_size = std::mem::size_of::<T>(),
        type_name = std::any::type_name::<T>()
    ))]
    pub fn allocate<T: prism_backends::DeviceElem>(&mut self, len: usize) -> Result<Buffer<T>> {
        let size_bytes = len * std::mem::size_of::<T>();
        let handle = self.memory.write().allocate_buffer(size_bytes)?;
        tracing::debug!(
            handle = %handle,
            size_bytes = size_bytes,
            size_kb = size_bytes as f64 / 1024.0,
            "buffer_allocated"
        );
        Ok(Buffer::new(handle, len))
    }

    /// Free a buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer was already freed.
    pub fn free<T: prism_backends::DeviceElem>(&mut self, buffer: Buffer<T>) -> Result<()> {
        self.memory.write().free_buffer(buffer.handle())?;
        Ok(())
    }

    /// Write typed host data into a buffer
    pub(crate) fn write_buffer_data<T: prism_backends::DeviceElem>(
        &mut self,
        buffer: &Buffer<T>,
        data: &[T],
    ) -> Result<()> {
        let bytes = bytemuck::cast_slice(data);
        self.memory.write().copy_to_buffer(buffer.handle(), bytes)?;
        Ok(())
    }

    /// Read typed host data out of a buffer
    pub(crate) fn read_buffer_data<T: prism_backends::DeviceElem>(&self, buffer: &Buffer<T>) -> Result<Vec<T>> {
        let mut data = vec![<T as bytemuck::Zeroable>::zeroed(); buffer.len()];
        self.memory.read().copy_from_buffer(buffer.handle(), bytemuck::cast_slice_mut(&mut data))?;
        Ok(data)
    }

    /// Resolve a type-erased launch argument into a backend [`KernelArg`]
    pub(crate) fn resolve_arg(&self, arg: &LaunchArg) -> Result<KernelArg> {
        let alloc = self.memory.read().allocation(arg.handle())?;
        Ok(KernelArg::new(alloc, arg.scalar()))
    }
}

/// A type-erased kernel launch argument
///
/// Obtained from [`Buffer::as_arg`]; carries the buffer handle plus its
/// declared element type so dispatch can check it against the kernel's
/// signature.
#[derive(Debug, Clone, Copy)]
pub struct LaunchArg {
    handle: prism_backends::BufferHandle,
    scalar: ScalarType,
    len: usize,
}

impl LaunchArg {
    pub(crate) fn new(handle: prism_backends::BufferHandle, scalar: ScalarType, len: usize) -> Self {
        Self { handle, scalar, len }
    }

    /// Backend handle of the underlying buffer
    pub fn handle(&self) -> prism_backends::BufferHandle {
        self.handle
    }

    /// Declared element type
    pub fn scalar(&self) -> ScalarType {
        self.scalar
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| panic!("failed to create default executor: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_executor_on_host() {
        let exec = Executor::new().unwrap();
        assert_eq!(exec.device().kind(), DeviceKind::Host);
    }

    #[test]
    fn test_executor_auto_prefers_accelerator() {
        let exec = Executor::new_auto().unwrap();
        assert_eq!(exec.device().kind(), DeviceKind::Accelerator);
    }

    #[test]
    fn test_executor_unavailable_device() {
        let registry = DeviceRegistry::with_devices(vec![]);
        match Executor::with_registry(&registry, DeviceKind::Accelerator) {
            Err(Error::Backend(prism_backends::BackendError::DeviceUnavailable { kind })) => {
                assert_eq!(kind, DeviceKind::Accelerator);
            }
            other => panic!("expected DeviceUnavailable, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_allocate_and_free() {
        let mut exec = Executor::new().unwrap();
        let buf = exec.allocate::<f32>(128).unwrap();
        assert_eq!(buf.len(), 128);
        exec.free(buf).unwrap();
    }

    #[test]
    fn test_buffer_roundtrip() {
        let mut exec = Executor::new().unwrap();
        let mut buf = exec.allocate::<f32>(4).unwrap();

        let data = vec![1.0f32, 2.0, 3.0, 4.0];
        buf.copy_from_slice(&mut exec, &data).unwrap();
        assert_eq!(buf.to_vec(&exec).unwrap(), data);
    }
}
