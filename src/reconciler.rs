//! The reconciliation collaborator driven by the scheduler.

use crate::error::{BoxedError, TrappedError};
use crate::fiber::{FiberArena, FiberId};
use crate::priority::PriorityLevel;

/// Per-fiber reconciliation logic, invoked by the work loop and the
/// commit engine as a black box.
///
/// Render-phase methods (`begin_work`, `complete_work`) may fail with
/// an opaque user error; the scheduler traps it at the failing unit and
/// routes it through the error pipeline. Commit-phase hooks hand
/// trapped errors back as values so the commit itself stays atomic.
///
/// Every method receives the fiber arena, since reconciliation is what
/// creates and rewires fibers; the scheduler only walks them.
pub trait Reconciler {
    /// Reconciles one fiber against its current-buffer pair and returns
    /// the first child to work on, or `None` when this subtree is done
    /// or bailed out.
    fn begin_work(
        &mut self,
        fibers: &mut FiberArena,
        current: Option<FiberId>,
        work_in_progress: FiberId,
        priority: PriorityLevel,
    ) -> Result<Option<FiberId>, BoxedError>;

    /// Finalizes a fiber once all its children are done. May spawn a
    /// new fiber to work on (rare, for host effects).
    fn complete_work(
        &mut self,
        fibers: &mut FiberArena,
        current: Option<FiberId>,
        work_in_progress: FiberId,
    ) -> Result<Option<FiberId>, BoxedError>;

    /// Attaches a newly placed fiber's instance to the host tree.
    fn commit_insertion(&mut self, fibers: &mut FiberArena, fiber: FiberId);

    /// Applies an update to an already mounted fiber.
    fn commit_work(&mut self, fibers: &mut FiberArena, current: Option<FiberId>, fiber: FiberId);

    /// Unmounts a deleted subtree. Teardown of user code may fail;
    /// every failure comes back trapped against its nearest boundary.
    fn commit_deletion(&mut self, fibers: &mut FiberArena, fiber: FiberId) -> Vec<TrappedError>;

    /// Runs post-mutation lifecycle hooks and scheduled callbacks for
    /// one fiber.
    fn commit_lifecycles(
        &mut self,
        fibers: &mut FiberArena,
        current: Option<FiberId>,
        fiber: FiberId,
    ) -> Option<TrappedError>;

    /// Finds the nearest ancestor error boundary of a failed fiber and
    /// pairs it with the error. A `None` boundary means the error will
    /// surface to the host.
    fn trap_error(&mut self, fibers: &FiberArena, failed: FiberId, error: BoxedError)
        -> TrappedError;

    /// Informs a boundary that it will re-render because of `error`.
    /// Acknowledgement itself may fail; the returned error is trapped
    /// against the same boundary on the next pipeline round.
    fn acknowledge_error_in_boundary(
        &mut self,
        fibers: &mut FiberArena,
        boundary: FiberId,
        error: BoxedError,
    ) -> Result<(), BoxedError>;
}
