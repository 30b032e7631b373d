//! Work-group shared state
//!
//! Each work-group owns one `WorkGroupShared`: the rendezvous barrier its
//! work-items synchronize on and the local-memory arena scoped to this group
//! for the duration of one launch. The arena is keyed by allocation site —
//! the n-th `local_alloc` call of every work-item in the group resolves to
//! the same block, because all items execute the same kernel body.

use std::sync::{Arc, Barrier};

use parking_lot::Mutex;

use crate::elem::{DeviceElem, ScalarType};
use crate::error::{BackendError, Result};
use crate::memory::DeviceAllocation;
use crate::view::BufferView;

/// One local-memory block, created by the first work-item to reach its
/// allocation site
pub(crate) struct LocalSlot {
    scalar: ScalarType,
    shape: Vec<usize>,
    alloc: Arc<DeviceAllocation>,
}

/// State shared by all work-items of one work-group
pub(crate) struct WorkGroupShared {
    barrier: Barrier,
    locals: Mutex<Vec<LocalSlot>>,
}

impl WorkGroupShared {
    /// Create shared state for a group of `items` work-items
    pub(crate) fn new(items: usize) -> Self {
        Self {
            barrier: Barrier::new(items),
            locals: Mutex::new(Vec::new()),
        }
    }

    /// Block until every work-item of the group has arrived
    pub(crate) fn wait(&self) {
        self.barrier.wait();
    }

    /// Resolve allocation site `site` to its local-memory view, creating the
    /// block on first arrival
    ///
    /// # Errors
    ///
    /// `LocalElemMismatch` / `LocalShapeMismatch` when work-items of the same
    /// group disagree about the block's element type or shape.
    pub(crate) fn local_view<T: DeviceElem>(&self, site: usize, shape: &[usize]) -> Result<BufferView<T>> {
        let mut locals = self.locals.lock();
        if let Some(slot) = locals.get(site) {
            if slot.scalar != T::SCALAR {
                return Err(BackendError::LocalElemMismatch {
                    site,
                    requested: T::SCALAR,
                    existing: slot.scalar,
                });
            }
            if slot.shape != shape {
                return Err(BackendError::LocalShapeMismatch {
                    site,
                    requested: shape.to_vec(),
                    existing: slot.shape.clone(),
                });
            }
            return BufferView::new(Arc::clone(&slot.alloc))?.with_shape(shape);
        }

        // Sites are visited in order by every item; a gap means the kernel
        // body diverged, which is outside the supported contract.
        if site != locals.len() {
            return Err(BackendError::execution_error(format!(
                "local allocation site {site} reached before site {}",
                locals.len()
            )));
        }

        let elements: usize = shape.iter().product();
        let alloc = Arc::new(DeviceAllocation::zeroed(elements * std::mem::size_of::<T>()));
        locals.push(LocalSlot {
            scalar: T::SCALAR,
            shape: shape.to_vec(),
            alloc: Arc::clone(&alloc),
        });
        BufferView::new(alloc)?.with_shape(shape)
    }
}
