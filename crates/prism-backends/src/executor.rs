//! Work-group kernel executor
//!
//! Drives one launch through its lifecycle: work-groups are independent
//! units of scheduling executed in parallel across the rayon pool, and the
//! work-items of one group run on dedicated OS threads so that barrier
//! semantics hold under true parallelism. The first error from any
//! work-item fails the launch.

use std::sync::Arc;

use prism_tracing::perf_span;
use rayon::prelude::*;

use crate::error::{BackendError, Result};
use crate::group::WorkGroupShared;
use crate::kernel::{Args, KernelBody};
use crate::launch::{LaunchDescriptor, LaunchPhase, LaunchReport};
use crate::workitem::WorkItem;

/// Executes kernel launches on the in-process devices
///
/// The executor is stateless; all launch state lives in the descriptor and
/// the argument buffers.
pub struct GroupExecutor;

impl GroupExecutor {
    /// Run a launch to retirement
    ///
    /// Blocks until every work-group has completed. The host may observe the
    /// argument buffers only after this returns; no partial-group completion
    /// is visible.
    ///
    /// # Errors
    ///
    /// The first error returned by any work-item, or an execution error if a
    /// work-item panicked.
    pub fn execute(body: &dyn KernelBody, launch: &LaunchDescriptor, args: &Args) -> Result<LaunchReport> {
        let groups = launch.work_groups();
        let group_size = launch.group_size();
        let total_groups = groups.total();
        let items_per_group = group_size.total();

        let _span = perf_span!(
            "kernel_execute",
            groups = total_groups,
            items_per_group = items_per_group
        );

        tracing::debug!(launch = %launch, phase = %LaunchPhase::Queued, "launch_phase");
        tracing::debug!(phase = %LaunchPhase::Dispatched, "launch_phase");
        tracing::debug!(phase = %LaunchPhase::Executing, "launch_phase");

        (0..total_groups).into_par_iter().try_for_each(|group_linear| {
            let group_id = groups.delinearize(group_linear);
            Self::execute_group(body, launch, args, group_id, items_per_group)
        })?;

        tracing::debug!(phase = %LaunchPhase::AllGroupsComplete, "launch_phase");
        tracing::debug!(phase = %LaunchPhase::Retired, "launch_phase");

        Ok(LaunchReport {
            phase: LaunchPhase::Retired,
            work_groups: total_groups,
            work_items: total_groups * items_per_group,
        })
    }

    /// Execute every work-item of one group
    ///
    /// Single-item groups run inline on the calling rayon worker; larger
    /// groups get one OS thread per work-item so all items of the group are
    /// live simultaneously, which the barrier contract requires.
    fn execute_group(
        body: &dyn KernelBody,
        launch: &LaunchDescriptor,
        args: &Args,
        group_id: [usize; 3],
        items_per_group: usize,
    ) -> Result<()> {
        let group_size = launch.group_size();
        let shared = Arc::new(WorkGroupShared::new(items_per_group));

        if items_per_group == 1 {
            let item = WorkItem::new(
                group_id,
                [0, 0, 0],
                group_size,
                launch.work_groups(),
                launch.global(),
                shared,
            );
            return body.run(&item, args);
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..items_per_group)
                .map(|local_linear| {
                    let local_id = group_size.delinearize(local_linear);
                    let item = WorkItem::new(
                        group_id,
                        local_id,
                        group_size,
                        launch.work_groups(),
                        launch.global(),
                        Arc::clone(&shared),
                    );
                    scope.spawn(move || body.run(&item, args))
                })
                .collect();

            let mut first_error = None;
            for handle in handles {
                match handle.join() {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                    Err(_) => {
                        if first_error.is_none() {
                            first_error = Some(BackendError::execution_error("work-item panicked"));
                        }
                    }
                }
            }
            match first_error {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }
}
