//! The cooperative scheduler: entry points, batching, root registry.
//!
//! One `Scheduler` value holds everything that would otherwise be
//! module-scoped state: the fiber arena, the root registry chain, the
//! work-loop cursors and the ambient priority context. Instances are
//! fully independent of each other.

mod commit;
mod errors;
mod work_loop;

use log::trace;

use crate::error::{BoxedError, SchedulerError, TrappedError};
use crate::fiber::root::{ContainerHandle, FiberRoot, RootId, Roots};
use crate::fiber::{FiberArena, FiberId, FiberTag, StateNode};
use crate::host::{Deadline, HostConfig, TIME_HEURISTIC_MS};
use crate::priority::PriorityLevel;
use crate::reconciler::Reconciler;

/// Error raised while driving a single unit of work.
///
/// Render errors come from user code and are routed through the error
/// pipeline; fatal errors are structural violations that surface to the
/// caller untouched.
pub(crate) enum UnitError {
    Fatal(SchedulerError),
    Render(BoxedError),
}

/// Which entry point is driving the work loop.
#[derive(Clone, Copy)]
enum WorkMode<'a> {
    Synchronous,
    Animation,
    Deferred(&'a dyn Deadline),
}

/// Priority-driven incremental reconciler over a host config `H` and a
/// reconciliation collaborator `R`.
pub struct Scheduler<H: HostConfig, R: Reconciler> {
    pub(crate) host: H,
    pub(crate) reconciler: R,
    pub(crate) fibers: FiberArena,
    pub(crate) roots: Roots,

    // Registry chain of roots with pending work.
    pub(crate) first_scheduled_root: Option<RootId>,
    pub(crate) last_scheduled_root: Option<RootId>,

    // Work loop cursors.
    pub(crate) next_unit_of_work: Option<FiberId>,
    pub(crate) next_priority_level: PriorityLevel,

    // Ambient scheduling context.
    pub(crate) priority_context: PriorityLevel,
    should_batch_updates: bool,
    is_animation_callback_scheduled: bool,
    is_deferred_callback_scheduled: bool,
}

impl<H: HostConfig, R: Reconciler> Scheduler<H, R> {
    pub fn new(host: H, reconciler: R) -> Self {
        let priority_context = if host.use_sync_scheduling() {
            PriorityLevel::Synchronous
        } else {
            PriorityLevel::Low
        };
        Scheduler {
            host,
            reconciler,
            fibers: FiberArena::new(),
            roots: Roots::new(),
            first_scheduled_root: None,
            last_scheduled_root: None,
            next_unit_of_work: None,
            next_priority_level: PriorityLevel::NoWork,
            priority_context,
            should_batch_updates: false,
            is_animation_callback_scheduled: false,
            is_deferred_callback_scheduled: false,
        }
    }

    /// Creates a root for a host container, along with the one fiber
    /// the scheduler constructs itself: the container fiber.
    pub fn create_container(&mut self, container: ContainerHandle) -> RootId {
        let fiber = self.fibers.create_fiber(FiberTag::HostContainer);
        let root = self.roots.insert(FiberRoot::new(fiber, container));
        self.fibers[fiber].state_node = Some(StateNode::Root(root));
        trace!("created container {:?} as {:?}", container, root);
        root
    }

    /// Schedules work on a root at the ambient priority context.
    pub fn schedule_work(&mut self, root: RootId) -> Result<(), SchedulerError> {
        self.schedule_work_at_priority(root, self.priority_context)
    }

    /// Schedules work on a root at an explicit priority, to be flushed
    /// during host idle time.
    pub fn schedule_deferred_work(&mut self, root: RootId, priority: PriorityLevel) {
        self.schedule_root(root, priority);
        self.request_deferred_callback();
    }

    /// Schedules an update on a fiber: raises the pending priority on
    /// the path up to its root, then dispatches the root at the ambient
    /// priority context.
    pub fn schedule_update(&mut self, fiber: FiberId) -> Result<(), SchedulerError> {
        let priority = self.priority_context;
        let mut node = fiber;
        loop {
            self.fibers.raise_pending_priority(node, priority);
            match self.fibers[node].parent {
                Some(parent) => node = parent,
                None => break,
            }
        }
        if self.fibers[node].tag != FiberTag::HostContainer {
            return Err(SchedulerError::InvalidRoot);
        }
        let root = self
            .fibers
            .root_of_container(node)
            .ok_or(SchedulerError::UnboundContainer)?;
        self.schedule_work_at_priority(root, priority)
    }

    /// Runs `f` with the ambient priority context replaced by `priority`,
    /// restoring the previous context on the way out.
    pub fn perform_with_priority<A>(
        &mut self,
        priority: PriorityLevel,
        f: impl FnOnce(&mut Self) -> A,
    ) -> A {
        let previous = self.priority_context;
        self.priority_context = priority;
        let result = f(self);
        self.priority_context = previous;
        result
    }

    /// Runs `f` with a synchronous priority context.
    pub fn sync_updates<A>(&mut self, f: impl FnOnce(&mut Self) -> A) -> A {
        self.perform_with_priority(PriorityLevel::Synchronous, f)
    }

    /// Runs `f` with synchronous flushes suppressed. When the outermost
    /// batched scope exits, pending synchronous work flushes once.
    pub fn batched_updates<A>(
        &mut self,
        f: impl FnOnce(&mut Self) -> A,
    ) -> Result<A, SchedulerError> {
        let previous = self.should_batch_updates;
        self.should_batch_updates = true;
        let result = f(self);
        self.should_batch_updates = previous;
        if !previous {
            self.perform_work(WorkMode::Synchronous)?;
        }
        Ok(result)
    }

    /// Host entry point: the animation callback fired.
    pub fn perform_animation_work(&mut self) -> Result<(), SchedulerError> {
        self.is_animation_callback_scheduled = false;
        self.perform_work(WorkMode::Animation)
    }

    /// Host entry point: the deferred callback fired with a deadline.
    pub fn perform_deferred_work(&mut self, deadline: &dyn Deadline) -> Result<(), SchedulerError> {
        self.is_deferred_callback_scheduled = false;
        self.perform_work(WorkMode::Deferred(deadline))
    }

    fn schedule_work_at_priority(
        &mut self,
        root: RootId,
        priority: PriorityLevel,
    ) -> Result<(), SchedulerError> {
        self.schedule_root(root, priority);
        match priority {
            PriorityLevel::Synchronous => {
                let sole = self.first_scheduled_root == Some(root)
                    && self.last_scheduled_root == Some(root);
                if sole && !self.should_batch_updates {
                    return self.perform_work(WorkMode::Synchronous);
                }
            }
            PriorityLevel::Animation => self.request_animation_callback(),
            PriorityLevel::Low => self.request_deferred_callback(),
            PriorityLevel::NoWork => {}
        }
        Ok(())
    }

    /// Raises a root's pending priority and appends it to the registry
    /// chain if it is not already scheduled.
    pub(crate) fn schedule_root(&mut self, root: RootId, priority: PriorityLevel) {
        if !priority.is_work() {
            return;
        }
        // Scheduling at or above the in-flight level invalidates the
        // cursor: more urgent work may now exist on another root.
        if priority <= self.next_priority_level {
            self.next_unit_of_work = None;
        }
        let current = self.roots[root].current;
        self.fibers.raise_pending_priority(current, priority);
        if !self.roots[root].is_scheduled {
            self.roots[root].is_scheduled = true;
            self.roots[root].next_scheduled_root = None;
            match self.last_scheduled_root {
                Some(last) => self.roots[last].next_scheduled_root = Some(root),
                None => self.first_scheduled_root = Some(root),
            }
            self.last_scheduled_root = Some(root);
        }
        trace!("scheduled {:?} at {:?}", root, priority);
    }

    fn request_animation_callback(&mut self) {
        if !self.is_animation_callback_scheduled {
            self.is_animation_callback_scheduled = true;
            self.host.schedule_animation_callback();
        }
    }

    fn request_deferred_callback(&mut self) {
        if !self.is_deferred_callback_scheduled {
            self.is_deferred_callback_scheduled = true;
            self.host.schedule_deferred_callback();
        }
    }

    /// Drives an entry point's work loop, routing trapped errors
    /// through the error pipeline and resuming until the loop runs to
    /// its natural end.
    fn perform_work(&mut self, mode: WorkMode<'_>) -> Result<(), SchedulerError> {
        loop {
            let mut trapped = Vec::new();
            let outcome = match mode {
                WorkMode::Synchronous => self.perform_synchronous_work_unsafe(&mut trapped),
                WorkMode::Animation => self.perform_animation_work_unsafe(&mut trapped),
                WorkMode::Deferred(deadline) => {
                    self.perform_deferred_work_unsafe(deadline, &mut trapped)
                }
            };
            match outcome {
                Ok(done) => {
                    if !trapped.is_empty() {
                        self.handle_errors(trapped)?;
                        continue;
                    }
                    if done {
                        return Ok(());
                    }
                }
                Err(UnitError::Fatal(fatal)) => return Err(fatal),
                Err(UnitError::Render(error)) => {
                    // Trap at the unit the loop stopped on, then rescan
                    // from the roots once the boundary has re-rendered.
                    let trapped_error = match self.next_unit_of_work {
                        Some(failed) => {
                            self.reconciler.trap_error(&self.fibers, failed, error)
                        }
                        None => TrappedError {
                            boundary: None,
                            error,
                        },
                    };
                    self.next_unit_of_work = None;
                    self.handle_errors(vec![trapped_error])?;
                }
            }
        }
    }

    /// Works down synchronous units; leftover lower-priority work gets
    /// a host callback.
    fn perform_synchronous_work_unsafe(
        &mut self,
        trapped: &mut Vec<TrappedError>,
    ) -> Result<bool, UnitError> {
        if self.next_unit_of_work.is_none() {
            self.next_unit_of_work = self.find_next_unit_of_work();
        }
        while let Some(unit) = self.next_unit_of_work {
            if self.next_priority_level != PriorityLevel::Synchronous {
                break;
            }
            self.next_unit_of_work = self.perform_unit_of_work(unit, false, trapped)?;
            if !trapped.is_empty() {
                return Ok(false);
            }
        }
        match self.next_priority_level {
            PriorityLevel::Animation => self.request_animation_callback(),
            PriorityLevel::Low => self.request_deferred_callback(),
            _ => {}
        }
        Ok(true)
    }

    /// Works down units through animation priority; remaining deferred
    /// work gets an idle callback.
    fn perform_animation_work_unsafe(
        &mut self,
        trapped: &mut Vec<TrappedError>,
    ) -> Result<bool, UnitError> {
        if self.next_unit_of_work.is_none() {
            self.next_unit_of_work = self.find_next_unit_of_work();
        }
        while let Some(unit) = self.next_unit_of_work {
            if self.next_priority_level > PriorityLevel::Animation {
                break;
            }
            self.next_unit_of_work = self.perform_unit_of_work(unit, false, trapped)?;
            if !trapped.is_empty() {
                return Ok(false);
            }
        }
        if self.next_priority_level > PriorityLevel::Animation && self.next_priority_level.is_work()
        {
            self.request_deferred_callback();
        }
        Ok(true)
    }

    /// Works down units while the host deadline allows, checking the
    /// budget at the top of every iteration. Leftover work re-registers
    /// the idle callback.
    fn perform_deferred_work_unsafe(
        &mut self,
        deadline: &dyn Deadline,
        trapped: &mut Vec<TrappedError>,
    ) -> Result<bool, UnitError> {
        if self.next_unit_of_work.is_none() {
            self.next_unit_of_work = self.find_next_unit_of_work();
        }
        while let Some(unit) = self.next_unit_of_work {
            if deadline.time_remaining() <= TIME_HEURISTIC_MS {
                break;
            }
            self.next_unit_of_work = self.perform_unit_of_work(unit, false, trapped)?;
            if !trapped.is_empty() {
                return Ok(false);
            }
        }
        if self.next_unit_of_work.is_some() {
            self.request_deferred_callback();
        }
        Ok(true)
    }

    // Read-only views for hosts and tests.

    pub fn arena(&self) -> &FiberArena {
        &self.fibers
    }

    pub fn arena_mut(&mut self) -> &mut FiberArena {
        &mut self.fibers
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn reconciler(&self) -> &R {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut R {
        &mut self.reconciler
    }

    /// The last committed fiber of a root.
    pub fn root_current(&self, root: RootId) -> FiberId {
        self.roots[root].current
    }

    pub fn is_root_scheduled(&self, root: RootId) -> bool {
        self.roots[root].is_scheduled
    }

    /// Whether any root sits in the registry chain.
    pub fn has_scheduled_roots(&self) -> bool {
        self.first_scheduled_root.is_some() || self.last_scheduled_root.is_some()
    }

    pub fn next_unit_of_work(&self) -> Option<FiberId> {
        self.next_unit_of_work
    }

    pub fn next_priority_level(&self) -> PriorityLevel {
        self.next_priority_level
    }

    pub fn priority_context(&self) -> PriorityLevel {
        self.priority_context
    }

    pub fn is_animation_callback_scheduled(&self) -> bool {
        self.is_animation_callback_scheduled
    }

    pub fn is_deferred_callback_scheduled(&self) -> bool {
        self.is_deferred_callback_scheduled
    }
}
