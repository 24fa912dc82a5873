//! fibril - an incremental, priority-driven tree reconciler.
//!
//! A cooperative scheduler turns a tree of work units (fibers) into a
//! committed tree of host-side effects, in slices bounded by a
//! host-supplied deadline, with strict priority ordering, atomic commit
//! and error containment at designated boundary fibers.
//!
//! The crate is generic over two collaborators supplied by the
//! embedding: a [`HostConfig`] providing callback-scheduling hooks, and
//! a [`Reconciler`] deciding per-fiber child diffing and host
//! mutations. The scheduler owns the double-buffered fiber tree, the
//! root registry, the work loop, the commit engine and the error
//! pipeline.

pub mod error;
pub mod fiber;
pub mod host;
pub mod priority;
pub mod reconciler;
pub mod scheduler;

pub use error::{BoxedError, SchedulerError, TrappedError};
pub use fiber::root::{ContainerHandle, FiberRoot, RootId};
pub use fiber::{EffectTag, Fiber, FiberArena, FiberId, FiberTag, InstanceId, StateNode};
pub use host::{Deadline, FrameDeadline, HostConfig, TIME_HEURISTIC_MS};
pub use priority::PriorityLevel;
pub use reconciler::Reconciler;
pub use scheduler::Scheduler;
