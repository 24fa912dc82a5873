//! The error pipeline: boundary acknowledgement and recovery.

use log::{debug, warn};
use rustc_hash::FxHashSet;

use crate::error::{BoxedError, SchedulerError, TrappedError};
use crate::fiber::root::RootId;
use crate::fiber::{FiberId, FiberTag};
use crate::host::HostConfig;
use crate::priority::PriorityLevel;
use crate::reconciler::Reconciler;

use super::{Scheduler, UnitError};

impl<H: HostConfig, R: Reconciler> Scheduler<H, R> {
    /// Fixed-point worklist over trapped errors.
    ///
    /// Each round acknowledges every distinct boundary in the batch,
    /// then re-renders the affected boundaries synchronously with
    /// unmount errors ignored. Errors raised while acknowledging or
    /// recovering are trapped against the same boundary and handled on
    /// the next round, never recursively. A boundary-less error wins
    /// first and, once the worklist drains, clears the registry and
    /// surfaces to the caller.
    pub(crate) fn handle_errors(
        &mut self,
        initial: Vec<TrappedError>,
    ) -> Result<(), SchedulerError> {
        let mut queue = initial;
        let mut first_uncaught: Option<BoxedError> = None;

        while !queue.is_empty() {
            let batch = std::mem::take(&mut queue);
            debug!("error pipeline round, {} error(s)", batch.len());
            let mut acknowledged: FxHashSet<FiberId> = FxHashSet::default();
            let mut affected: Vec<FiberId> = Vec::new();

            for trapped in batch {
                let Some(boundary) = trapped.boundary else {
                    if first_uncaught.is_none() {
                        first_uncaught = Some(trapped.error);
                    }
                    continue;
                };
                if !acknowledged.insert(boundary) {
                    continue;
                }
                match self.reconciler.acknowledge_error_in_boundary(
                    &mut self.fibers,
                    boundary,
                    trapped.error,
                ) {
                    Ok(()) => affected.push(boundary),
                    Err(error) => queue.push(TrappedError {
                        boundary: Some(boundary),
                        error,
                    }),
                }
            }

            for boundary in affected {
                self.recover_boundary(boundary, &mut queue)?;
            }
        }

        if let Some(error) = first_uncaught {
            warn!("uncaught error reached the host container, clearing registry");
            self.clear_registry();
            return Err(SchedulerError::Uncaught(error));
        }
        Ok(())
    }

    /// Re-renders an acknowledged boundary: raise the path to its root
    /// to the ambient priority, clone a fresh work-in-progress tree and
    /// drive that one root to commit with unmount errors ignored. Other
    /// registered roots are left in their scheduled order. New failures
    /// land back on the worklist.
    fn recover_boundary(
        &mut self,
        boundary: FiberId,
        queue: &mut Vec<TrappedError>,
    ) -> Result<(), SchedulerError> {
        let root = self.schedule_error_recovery(boundary)?;
        let priority = self.priority_context;
        let current = self.roots[root].current;
        let work_in_progress = self.fibers.clone_fiber(current, priority);
        self.next_priority_level = priority;
        self.next_unit_of_work = Some(work_in_progress);

        let mut commit_trapped = Vec::new();
        while let Some(unit) = self.next_unit_of_work {
            match self.perform_unit_of_work(unit, true, &mut commit_trapped) {
                Ok(next) => self.next_unit_of_work = next,
                Err(UnitError::Fatal(fatal)) => return Err(fatal),
                Err(UnitError::Render(error)) => {
                    queue.push(TrappedError {
                        boundary: Some(boundary),
                        error,
                    });
                    self.next_unit_of_work = None;
                }
            }
        }
        queue.append(&mut commit_trapped);
        Ok(())
    }

    /// Marks the path from a boundary up to its root as pending at the
    /// ambient priority and returns the root.
    fn schedule_error_recovery(&mut self, boundary: FiberId) -> Result<RootId, SchedulerError> {
        let priority = self.priority_context;
        let mut node = boundary;
        loop {
            self.fibers[node].pending_work_priority = priority;
            if let Some(alternate) = self.fibers[node].alternate {
                self.fibers[alternate].pending_work_priority = priority;
            }
            match self.fibers[node].parent {
                Some(parent) => node = parent,
                None => break,
            }
        }
        if self.fibers[node].tag != FiberTag::HostContainer {
            return Err(SchedulerError::InvalidRoot);
        }
        self.fibers
            .root_of_container(node)
            .ok_or(SchedulerError::UnboundContainer)
    }

    /// Drops the whole registry chain. Pending work on those roots is
    /// lost; callers must re-schedule each root explicitly. Flags are
    /// cleared so re-scheduling enqueues cleanly.
    fn clear_registry(&mut self) {
        let mut node = self.first_scheduled_root;
        while let Some(root) = node {
            node = self.roots[root].next_scheduled_root.take();
            self.roots[root].is_scheduled = false;
        }
        self.first_scheduled_root = None;
        self.last_scheduled_root = None;
        self.next_unit_of_work = None;
        self.next_priority_level = PriorityLevel::NoWork;
    }
}
