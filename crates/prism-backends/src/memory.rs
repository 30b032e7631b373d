//! Device memory management
//!
//! `MemoryManager` owns all allocations for one device and hands out opaque
//! `BufferHandle`s, the way backend memory managers own buffers behind
//! handles. Host transfers require exclusive access; kernel-time access goes
//! through typed views ([`crate::view::BufferView`]) whose element operations
//! are atomic, so cross-work-item visibility is ordered only by barriers.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BackendError, Result};

/// Handle to an allocated device buffer
///
/// Buffers are opaque handles managed by a [`MemoryManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

impl BufferHandle {
    /// Create a new buffer handle
    pub const fn new(id: u64) -> Self {
        BufferHandle(id)
    }

    /// Get the internal ID
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buf{}", self.0)
    }
}

/// One raw device allocation
///
/// Backing storage is a block of 8-byte words, so every element offset that
/// is a multiple of the element size is correctly aligned for the matching
/// atomic access width.
pub struct DeviceAllocation {
    words: Box<[UnsafeCell<u64>]>,
    len_bytes: usize,
}

// Safety: all shared access to allocation contents goes through per-element
// atomic operations (see `elem::DeviceElem`); host-side copies take `&mut`.
unsafe impl Send for DeviceAllocation {}
unsafe impl Sync for DeviceAllocation {}

impl DeviceAllocation {
    /// Allocate `len_bytes` of zeroed device memory
    pub fn zeroed(len_bytes: usize) -> Self {
        let words = (0..len_bytes.div_ceil(8)).map(|_| UnsafeCell::new(0u64)).collect();
        Self { words, len_bytes }
    }

    /// Allocation size in bytes
    pub fn len_bytes(&self) -> usize {
        self.len_bytes
    }

    /// Base address of the allocation
    ///
    /// The pointer stays valid for the lifetime of the allocation; callers
    /// must respect the atomic-access contract of [`crate::elem::DeviceElem`].
    pub(crate) fn base_ptr(&self) -> *mut u8 {
        if self.words.is_empty() {
            std::ptr::NonNull::<u8>::dangling().as_ptr()
        } else {
            UnsafeCell::raw_get(self.words.as_ptr()) as *mut u8
        }
    }

    /// Copy host bytes into the allocation at `offset`
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        // Exclusive access: no kernel is running against this allocation.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.base_ptr().add(offset), data.len());
        }
        Ok(())
    }

    /// Copy bytes from the allocation at `offset` into a host slice
    pub fn read_bytes(&self, offset: usize, data: &mut [u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(self.base_ptr().add(offset), data.as_mut_ptr(), data.len());
        }
        Ok(())
    }

    fn check_range(&self, offset: usize, size: usize) -> Result<()> {
        if offset + size > self.len_bytes {
            return Err(BackendError::BufferOutOfBounds {
                offset,
                size,
                buffer_size: self.len_bytes,
            });
        }
        Ok(())
    }
}

/// Memory manager for one device
///
/// Owns buffers behind handles; allocation and host transfers are
/// synchronous and bounds-checked.
pub struct MemoryManager {
    buffers: HashMap<u64, Arc<DeviceAllocation>>,
    next_id: u64,
}

impl MemoryManager {
    /// Create an empty memory manager
    pub fn new() -> Self {
        Self {
            buffers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocate a zeroed buffer of `size` bytes
    pub fn allocate_buffer(&mut self, size: usize) -> Result<BufferHandle> {
        let handle = BufferHandle::new(self.next_id);
        self.next_id += 1;
        self.buffers.insert(handle.id(), Arc::new(DeviceAllocation::zeroed(size)));
        tracing::debug!(handle = %handle, size_bytes = size, "buffer_allocated");
        Ok(handle)
    }

    /// Free a previously allocated buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer handle is invalid.
    pub fn free_buffer(&mut self, handle: BufferHandle) -> Result<()> {
        self.buffers
            .remove(&handle.id())
            .map(|_| ())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }

    /// Copy data from host to buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is invalid or the data exceeds the
    /// buffer size.
    pub fn copy_to_buffer(&mut self, handle: BufferHandle, data: &[u8]) -> Result<()> {
        let alloc = self
            .buffers
            .get_mut(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        let alloc = Arc::get_mut(alloc)
            .ok_or_else(|| BackendError::execution_error(format!("buffer {handle} is in use by a running launch")))?;
        alloc.write_bytes(0, data)
    }

    /// Copy data from buffer to host
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is invalid or the destination exceeds
    /// the buffer size.
    pub fn copy_from_buffer(&self, handle: BufferHandle, data: &mut [u8]) -> Result<()> {
        let alloc = self
            .buffers
            .get(&handle.id())
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))?;
        alloc.read_bytes(0, data)
    }

    /// Get buffer size in bytes
    pub fn buffer_size(&self, handle: BufferHandle) -> Result<usize> {
        self.allocation(handle).map(|a| a.len_bytes())
    }

    /// Get the shared allocation behind a handle (used to build kernel
    /// argument views)
    pub fn allocation(&self, handle: BufferHandle) -> Result<Arc<DeviceAllocation>> {
        self.buffers
            .get(&handle.id())
            .cloned()
            .ok_or(BackendError::InvalidBufferHandle(handle.id()))
    }
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}
