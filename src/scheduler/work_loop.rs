//! The work loop: picking, performing and completing units of work.

use log::trace;

use crate::error::{SchedulerError, TrappedError};
use crate::fiber::root::RootId;
use crate::fiber::{FiberId, FiberTag};
use crate::host::HostConfig;
use crate::priority::PriorityLevel;
use crate::reconciler::Reconciler;

use super::{Scheduler, UnitError};

impl<H: HostConfig, R: Reconciler> Scheduler<H, R> {
    /// Picks the next unit of work: detaches exhausted roots, selects
    /// the most urgent remaining root and clones its current fiber into
    /// a fresh work-in-progress node.
    ///
    /// Sets `next_priority_level` as a side effect; `NoWork` when the
    /// registry is empty.
    pub(crate) fn find_next_unit_of_work(&mut self) -> Option<FiberId> {
        // Detach leading roots with no pending work.
        while let Some(root) = self.first_scheduled_root {
            let current = self.roots[root].current;
            if self.fibers[current].pending_work_priority.is_work() {
                break;
            }
            let next = self.roots[root].next_scheduled_root.take();
            self.roots[root].is_scheduled = false;
            self.first_scheduled_root = next;
            if next.is_none() {
                self.last_scheduled_root = None;
            }
        }

        // Most urgent root wins; ties go to registry order.
        let mut best: Option<(RootId, PriorityLevel)> = None;
        let mut node = self.first_scheduled_root;
        while let Some(root) = node {
            let current = self.roots[root].current;
            let priority = self.fibers[current].pending_work_priority;
            if priority.is_work() && best.map_or(true, |(_, b)| priority < b) {
                best = Some((root, priority));
            }
            node = self.roots[root].next_scheduled_root;
        }

        match best {
            Some((root, priority)) => {
                self.next_priority_level = priority;
                let current = self.roots[root].current;
                let work_in_progress = self.fibers.clone_fiber(current, priority);
                trace!(
                    "next unit of work: {:?} on {:?} at {:?}",
                    work_in_progress,
                    root,
                    priority
                );
                Some(work_in_progress)
            }
            None => {
                self.next_priority_level = PriorityLevel::NoWork;
                None
            }
        }
    }

    /// Begins one fiber; on a leaf or a bailout, completes upward.
    /// Returns the next unit to work on, or `None` when the registry is
    /// exhausted.
    pub(crate) fn perform_unit_of_work(
        &mut self,
        work_in_progress: FiberId,
        ignore_unmounting_errors: bool,
        trapped: &mut Vec<TrappedError>,
    ) -> Result<Option<FiberId>, UnitError> {
        let current = self.fibers[work_in_progress].alternate;
        let begun = self.reconciler.begin_work(
            &mut self.fibers,
            current,
            work_in_progress,
            self.next_priority_level,
        );
        let result = match begun {
            Ok(Some(child)) => Ok(Some(child)),
            Ok(None) => {
                self.complete_unit_of_work(work_in_progress, ignore_unmounting_errors, trapped)
            }
            Err(error) => Err(UnitError::Render(error)),
        };
        // The owner slot is per-unit state, dropped no matter how the
        // unit ended.
        self.fibers.current_owner = None;
        result
    }

    /// Completes fibers while ascending: finalize, bubble priority and
    /// effects, then move to the sibling or the parent. Reaching the
    /// top commits the tree.
    fn complete_unit_of_work(
        &mut self,
        fiber: FiberId,
        ignore_unmounting_errors: bool,
        trapped: &mut Vec<TrappedError>,
    ) -> Result<Option<FiberId>, UnitError> {
        let mut work_in_progress = fiber;
        loop {
            let current = self.fibers[work_in_progress].alternate;
            let next = self
                .reconciler
                .complete_work(&mut self.fibers, current, work_in_progress)
                .map_err(UnitError::Render)?;
            if next.is_some() {
                return Ok(next);
            }

            self.fibers.reset_work_priority(work_in_progress);
            self.fibers[work_in_progress].pending_props = None;
            self.fibers[work_in_progress].update_queue = None;

            match self.fibers[work_in_progress].parent {
                Some(parent) => {
                    self.splice_effects_into(parent, work_in_progress);
                    if let Some(sibling) = self.fibers[work_in_progress].sibling {
                        return Ok(Some(sibling));
                    }
                    work_in_progress = parent;
                }
                None => {
                    return self.complete_root(
                        work_in_progress,
                        ignore_unmounting_errors,
                        trapped,
                    );
                }
            }
        }
    }

    /// Splices a completed fiber's effect list onto its parent's, then
    /// appends the fiber itself if it carries an effect. Children stay
    /// ahead of parents, keeping the list in post-order.
    fn splice_effects_into(&mut self, parent: FiberId, fiber: FiberId) {
        let (first, last, tag) = {
            let f = &self.fibers[fiber];
            (f.first_effect, f.last_effect, f.effect_tag)
        };

        if self.fibers[parent].first_effect.is_none() {
            self.fibers[parent].first_effect = first;
        }
        if last.is_some() {
            if let Some(parent_last) = self.fibers[parent].last_effect {
                self.fibers[parent_last].next_effect = first;
            }
            self.fibers[parent].last_effect = last;
        }
        if !tag.is_empty() {
            match self.fibers[parent].last_effect {
                Some(parent_last) => self.fibers[parent_last].next_effect = Some(fiber),
                None => self.fibers[parent].first_effect = Some(fiber),
            }
            self.fibers[parent].last_effect = Some(fiber);
        }
    }

    /// The topmost fiber completed: swap buffers, commit, and, unless
    /// this commit was driven by a boundary re-render, look for the
    /// next root with pending work.
    fn complete_root(
        &mut self,
        fiber: FiberId,
        ignore_unmounting_errors: bool,
        trapped: &mut Vec<TrappedError>,
    ) -> Result<Option<FiberId>, UnitError> {
        if self.fibers[fiber].tag != FiberTag::HostContainer {
            return Err(UnitError::Fatal(SchedulerError::InvalidRoot));
        }
        let root = self
            .fibers
            .root_of_container(fiber)
            .ok_or(UnitError::Fatal(SchedulerError::UnboundContainer))?;
        if self.roots[root].current == fiber {
            return Err(UnitError::Fatal(SchedulerError::AlreadyCommitted));
        }
        self.roots[root].current = fiber;
        let commit_errors = self.commit_all_work(fiber, ignore_unmounting_errors);
        trapped.extend(commit_errors);
        if ignore_unmounting_errors {
            // A boundary re-render drives only its own root. The rest
            // of the registry keeps its scheduled order and is picked
            // up by the entry point's own loop.
            return Ok(None);
        }
        Ok(self.find_next_unit_of_work())
    }
}
