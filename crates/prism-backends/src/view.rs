//! Typed views over device allocations
//!
//! A `BufferView<T>` is how kernel code touches memory: bounds-checked loads
//! and stores by flat or multi-dimensional index (row-major), plus the atomic
//! read-modify-write operations for element types that support them. Views
//! are cheap handles over a shared allocation; work-items of one launch all
//! see the same bytes.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::elem::{AtomicElem, DeviceElem};
use crate::error::{BackendError, Result};
use crate::memory::DeviceAllocation;

/// An index into a view: flat or multi-dimensional
///
/// Indices are unsigned machine-width integers (`usize`) everywhere — this is
/// the single index-type contract for loads, stores and atomics alike, so
/// every call site on the same memory lowers through the same rule.
pub trait AsIndex {
    /// Write the coordinates into `out`, returning how many were written
    fn coords(&self, out: &mut [usize; 3]) -> usize;
}

impl AsIndex for usize {
    fn coords(&self, out: &mut [usize; 3]) -> usize {
        out[0] = *self;
        1
    }
}

impl AsIndex for (usize, usize) {
    fn coords(&self, out: &mut [usize; 3]) -> usize {
        out[0] = self.0;
        out[1] = self.1;
        2
    }
}

impl AsIndex for (usize, usize, usize) {
    fn coords(&self, out: &mut [usize; 3]) -> usize {
        out[0] = self.0;
        out[1] = self.1;
        out[2] = self.2;
        3
    }
}

impl AsIndex for [usize; 2] {
    fn coords(&self, out: &mut [usize; 3]) -> usize {
        out[0] = self[0];
        out[1] = self[1];
        2
    }
}

impl AsIndex for [usize; 3] {
    fn coords(&self, out: &mut [usize; 3]) -> usize {
        out.copy_from_slice(self);
        3
    }
}

/// Typed, shaped view over a device allocation
///
/// Cloning a view is cheap and aliases the same memory.
pub struct BufferView<T: DeviceElem> {
    alloc: Arc<DeviceAllocation>,
    len: usize,
    shape: Vec<usize>,
    _marker: PhantomData<T>,
}

impl<T: DeviceElem> Clone for BufferView<T> {
    fn clone(&self) -> Self {
        Self {
            alloc: Arc::clone(&self.alloc),
            len: self.len,
            shape: self.shape.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: DeviceElem> BufferView<T> {
    /// Create a flat view covering the whole allocation
    ///
    /// # Errors
    ///
    /// `MisalignedView` if the allocation is not a whole number of `T`
    /// elements.
    pub fn new(alloc: Arc<DeviceAllocation>) -> Result<Self> {
        let bytes = alloc.len_bytes();
        let elem = std::mem::size_of::<T>();
        if bytes % elem != 0 {
            return Err(BackendError::MisalignedView {
                bytes,
                scalar: T::SCALAR,
            });
        }
        let len = bytes / elem;
        Ok(Self {
            alloc,
            len,
            shape: vec![len],
            _marker: PhantomData,
        })
    }

    /// Reshape the view (row-major)
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` unless the shape's product equals the element count.
    pub fn with_shape(mut self, shape: &[usize]) -> Result<Self> {
        let covered: usize = shape.iter().product();
        if shape.is_empty() || covered != self.len {
            return Err(BackendError::ShapeMismatch {
                shape: shape.to_vec(),
                len: self.len,
            });
        }
        self.shape = shape.to_vec();
        Ok(self)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the view holds no elements
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View shape (row-major)
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Resolve an index to a flat element offset, checking rank and bounds
    fn offset_of(&self, index: &impl AsIndex) -> Result<usize> {
        let mut coords = [0usize; 3];
        let rank = index.coords(&mut coords);
        if rank != self.shape.len() {
            return Err(BackendError::IndexRankMismatch {
                expected: self.shape.len(),
                got: rank,
            });
        }
        let mut flat = 0usize;
        for (d, &extent) in self.shape.iter().enumerate() {
            if coords[d] >= extent {
                return Err(BackendError::IndexOutOfBounds {
                    index: coords[..rank].to_vec(),
                    shape: self.shape.clone(),
                });
            }
            flat = flat * extent + coords[d];
        }
        Ok(flat)
    }

    fn elem_ptr(&self, flat: usize) -> *mut T {
        // flat is already bounds-checked; base is 8-byte aligned so every
        // element offset is aligned for its atomic width.
        unsafe { (self.alloc.base_ptr() as *mut T).add(flat) }
    }

    /// Load the element at `index`
    pub fn load(&self, index: impl AsIndex) -> Result<T> {
        let flat = self.offset_of(&index)?;
        Ok(unsafe { T::load_relaxed(self.elem_ptr(flat)) })
    }

    /// Store `value` at `index`
    pub fn store(&self, index: impl AsIndex, value: T) -> Result<()> {
        let flat = self.offset_of(&index)?;
        unsafe { T::store_relaxed(self.elem_ptr(flat), value) };
        Ok(())
    }
}

impl<T: AtomicElem> BufferView<T> {
    /// Atomically add `operand` to the element at `index`, returning the
    /// previous value
    pub fn atomic_add(&self, index: impl AsIndex, operand: T) -> Result<T> {
        let flat = self.offset_of(&index)?;
        Ok(unsafe { T::fetch_add(self.elem_ptr(flat), operand) })
    }

    /// Atomically subtract `operand` from the element at `index`, returning
    /// the previous value
    pub fn atomic_sub(&self, index: impl AsIndex, operand: T) -> Result<T> {
        let flat = self.offset_of(&index)?;
        Ok(unsafe { T::fetch_sub(self.elem_ptr(flat), operand) })
    }

    /// Atomically take the minimum with `operand`, returning the previous value
    pub fn atomic_min(&self, index: impl AsIndex, operand: T) -> Result<T> {
        let flat = self.offset_of(&index)?;
        Ok(unsafe { T::fetch_min(self.elem_ptr(flat), operand) })
    }

    /// Atomically take the maximum with `operand`, returning the previous value
    pub fn atomic_max(&self, index: impl AsIndex, operand: T) -> Result<T> {
        let flat = self.offset_of(&index)?;
        Ok(unsafe { T::fetch_max(self.elem_ptr(flat), operand) })
    }
}
