//! Work-item execution context
//!
//! A `WorkItem` is the view one executing unit has of its launch: its global
//! and local position, its group's geometry, the group barrier, and scoped
//! local memory. One `WorkItem` belongs to exactly one OS thread for the
//! duration of a launch; it is handed to the kernel body by reference.

use std::cell::Cell;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use crate::elem::DeviceElem;
use crate::error::Result;
use crate::extent::Extent;
use crate::group::WorkGroupShared;
use crate::view::BufferView;

/// Memory-visibility fence scope for barriers
///
/// Controls which writes are guaranteed visible to the other work-items of
/// the group after the barrier. [`MemFence::Global`] is the default when no
/// scope is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemFence {
    /// Orders writes to work-group local memory
    Local,
    /// Orders writes to all device memory
    #[default]
    Global,
}

/// Per-work-item execution context
///
/// # Synchronization contract
///
/// [`WorkItem::barrier`] synchronizes only the work-items of this group;
/// barriers in different groups provide no ordering relative to each other.
/// Calling a barrier inside a conditional that not all work-items of the
/// group evaluate identically is undefined behaviour at the execution-model
/// level: the group deadlocks or desynchronizes. This precondition is the
/// kernel author's to uphold; it is not detected here.
pub struct WorkItem {
    group_id: [usize; 3],
    local_id: [usize; 3],
    group_size: Extent,
    num_groups: Extent,
    global_size: Extent,
    shared: Arc<WorkGroupShared>,
    local_sites: Cell<usize>,
}

impl WorkItem {
    pub(crate) fn new(
        group_id: [usize; 3],
        local_id: [usize; 3],
        group_size: Extent,
        num_groups: Extent,
        global_size: Extent,
        shared: Arc<WorkGroupShared>,
    ) -> Self {
        Self {
            group_id,
            local_id,
            group_size,
            num_groups,
            global_size,
            shared,
            local_sites: Cell::new(0),
        }
    }

    /// Global index along dimension `d`, unique within the whole launch
    pub fn global_id(&self, d: usize) -> usize {
        self.group_id[d.min(2)] * self.group_size.dim(d) + self.local_id[d.min(2)]
    }

    /// Local index along dimension `d`, unique within this work-group
    pub fn local_id(&self, d: usize) -> usize {
        self.local_id[d.min(2)]
    }

    /// This work-group's index along dimension `d`
    pub fn group_id(&self, d: usize) -> usize {
        self.group_id[d.min(2)]
    }

    /// Work-group size along dimension `d`
    pub fn local_size(&self, d: usize) -> usize {
        self.group_size.dim(d)
    }

    /// Number of work-groups along dimension `d`
    pub fn num_groups(&self, d: usize) -> usize {
        self.num_groups.dim(d)
    }

    /// Global index-space size along dimension `d`
    pub fn global_size(&self, d: usize) -> usize {
        self.global_size.dim(d)
    }

    /// Linear index of this work-group within the launch
    pub fn group_linear_id(&self) -> usize {
        (self.group_id[2] * self.num_groups.dim(1) + self.group_id[1]) * self.num_groups.dim(0) + self.group_id[0]
    }

    /// Linear index of this work-item within its group
    pub fn local_linear_id(&self) -> usize {
        (self.local_id[2] * self.group_size.dim(1) + self.local_id[1]) * self.group_size.dim(0) + self.local_id[0]
    }

    /// Wait until every work-item of this group has reached the barrier
    ///
    /// The fence scope controls which memory writes are guaranteed visible
    /// to the rest of the group afterwards.
    pub fn barrier(&self, scope: MemFence) {
        match scope {
            MemFence::Local => fence(Ordering::AcqRel),
            MemFence::Global => fence(Ordering::SeqCst),
        }
        self.shared.wait();
        match scope {
            MemFence::Local => fence(Ordering::AcqRel),
            MemFence::Global => fence(Ordering::SeqCst),
        }
    }

    /// Barrier with the default global-memory fence
    pub fn barrier_default(&self) {
        self.barrier(MemFence::Global);
    }

    /// Allocate (or join) a block of work-group local memory
    ///
    /// The block has a fixed shape and element type, is visible to every
    /// work-item of this group, and lives only until the group finishes.
    /// Every work-item must reach the same allocation sites in the same
    /// order with identical arguments; a mismatch is a configuration error.
    ///
    /// Concurrent unsynchronized access to the same address from different
    /// work-items is a data race unless ordered by a barrier.
    pub fn local_alloc<T: DeviceElem>(&self, shape: impl Into<Vec<usize>>) -> Result<BufferView<T>> {
        let site = self.local_sites.get();
        self.local_sites.set(site + 1);
        self.shared.local_view::<T>(site, &shape.into())
    }
}
