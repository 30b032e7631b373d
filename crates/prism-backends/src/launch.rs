//! Kernel launch descriptors
//!
//! A `LaunchDescriptor` captures one kernel invocation: the target device,
//! the global index-space extent, and the optional local (work-group)
//! extent. All geometry validation happens here, eagerly, so a bad
//! configuration is reported before any work-item runs.

use std::fmt;

use crate::device::Device;
use crate::error::Result;
use crate::extent::Extent;

/// Lifecycle of one kernel launch
///
/// No partial-group completion is observable from the host; results are
/// visible only after `Retired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPhase {
    /// Descriptor built, not yet handed to the executor
    Queued,
    /// Geometry fixed, groups about to be scheduled
    Dispatched,
    /// Work-items running
    Executing,
    /// Every work-group has finished
    AllGroupsComplete,
    /// Results visible to the host
    Retired,
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaunchPhase::Queued => "queued",
            LaunchPhase::Dispatched => "dispatched",
            LaunchPhase::Executing => "executing",
            LaunchPhase::AllGroupsComplete => "all-groups-complete",
            LaunchPhase::Retired => "retired",
        };
        f.write_str(name)
    }
}

/// Describes one kernel invocation
///
/// # Geometry
///
/// When a local extent is supplied it must evenly partition the global
/// extent along every dimension; anything else is a configuration error,
/// not a runtime fault. When it is omitted the executor picks one: the
/// whole global extent as a single work-group if its total fits the
/// device's maximum work-group size, otherwise one work-item per group.
#[derive(Debug, Clone)]
pub struct LaunchDescriptor {
    device: Device,
    global: Extent,
    local: Option<Extent>,
    group_size: Extent,
    groups: Extent,
}

impl LaunchDescriptor {
    /// Build and validate a launch descriptor
    ///
    /// # Errors
    ///
    /// `ZeroExtent`, `RankMismatch` or `IndivisibleExtent` (naming the
    /// offending dimension) when the geometry is invalid.
    pub fn new(device: Device, global: Extent, local: Option<Extent>) -> Result<Self> {
        global.validate_nonzero()?;
        if let Some(local) = &local {
            local.validate_nonzero()?;
        }

        let group_size = match &local {
            Some(local) => {
                // Divisibility check happens here; the quotient is the grid.
                global.checked_div(local)?;
                *local
            }
            None => {
                if global.total() <= device.max_work_group_size() {
                    global
                } else {
                    Extent::ones(global.rank())
                }
            }
        };
        let groups = global.checked_div(&group_size)?;

        tracing::debug!(
            device = %device,
            global = %global,
            group_size = %group_size,
            groups = %groups,
            "launch_descriptor_built"
        );

        Ok(Self {
            device,
            global,
            local,
            group_size,
            groups,
        })
    }

    /// The device this launch targets
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Global index-space extent
    pub fn global(&self) -> Extent {
        self.global
    }

    /// The caller-supplied local extent, if any
    pub fn local(&self) -> Option<Extent> {
        self.local
    }

    /// Resolved work-group size
    pub fn group_size(&self) -> Extent {
        self.group_size
    }

    /// Number of work-groups along each dimension
    pub fn work_groups(&self) -> Extent {
        self.groups
    }
}

impl fmt::Display for LaunchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "global={}, group={}, groups={} on {}",
            self.global, self.group_size, self.groups, self.device
        )
    }
}

/// Summary of a completed launch, returned once the launch has retired
#[derive(Debug, Clone, Copy)]
pub struct LaunchReport {
    /// Final lifecycle phase; always [`LaunchPhase::Retired`] on success
    pub phase: LaunchPhase,
    /// Number of work-groups executed
    pub work_groups: usize,
    /// Total number of work-items executed
    pub work_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceKind, DeviceRegistry};
    use crate::error::BackendError;

    fn accelerator() -> Device {
        DeviceRegistry::discover().get(DeviceKind::Accelerator).unwrap().clone()
    }

    #[test]
    fn test_explicit_local_extent() {
        let launch = LaunchDescriptor::new(accelerator(), Extent::d1(1024), Some(Extent::d1(64))).unwrap();
        assert_eq!(launch.group_size(), Extent::d1(64));
        assert_eq!(launch.work_groups(), Extent::d1(16));
    }

    #[test]
    fn test_indivisible_local_extent() {
        match LaunchDescriptor::new(accelerator(), Extent::d1(100), Some(Extent::d1(64))) {
            Err(BackendError::IndivisibleExtent { dim, global, local }) => {
                assert_eq!((dim, global, local), (0, 100, 64));
            }
            other => panic!("expected IndivisibleExtent, got {other:?}"),
        }
    }

    #[test]
    fn test_divisibility_checked_per_dimension() {
        // First dimension divides, second does not.
        match LaunchDescriptor::new(accelerator(), Extent::d2(8, 10), Some(Extent::d2(4, 4))) {
            Err(BackendError::IndivisibleExtent { dim, .. }) => assert_eq!(dim, 1),
            other => panic!("expected IndivisibleExtent, got {other:?}"),
        }
    }

    #[test]
    fn test_rank_mismatch() {
        assert!(matches!(
            LaunchDescriptor::new(accelerator(), Extent::d2(8, 8), Some(Extent::d1(8))),
            Err(BackendError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_extent_rejected() {
        assert!(matches!(
            LaunchDescriptor::new(accelerator(), Extent::d1(0), None),
            Err(BackendError::ZeroExtent { dim: 0 })
        ));
        assert!(matches!(
            LaunchDescriptor::new(accelerator(), Extent::d1(8), Some(Extent::d1(0))),
            Err(BackendError::ZeroExtent { dim: 0 })
        ));
    }

    #[test]
    fn test_omitted_local_small_launch_is_one_group() {
        let launch = LaunchDescriptor::new(accelerator(), Extent::d1(10), None).unwrap();
        assert_eq!(launch.group_size(), Extent::d1(10));
        assert_eq!(launch.work_groups(), Extent::d1(1));
        assert_eq!(launch.local(), None);
    }

    #[test]
    fn test_omitted_local_large_launch_is_item_per_group() {
        let device = accelerator();
        let big = device.max_work_group_size() * 4;
        let launch = LaunchDescriptor::new(device, Extent::d1(big), None).unwrap();
        assert_eq!(launch.group_size(), Extent::d1(1));
        assert_eq!(launch.work_groups(), Extent::d1(big));
    }
}
