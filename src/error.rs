//! Error types surfaced by the scheduler.

use thiserror::Error;

use crate::fiber::FiberId;

/// Opaque user error raised by reconciliation or host code.
///
/// The scheduler never inspects the payload; it only routes it to the
/// nearest error boundary or surfaces it to the caller.
pub type BoxedError = Box<dyn std::error::Error + 'static>;

/// A user error paired with the boundary that will absorb it.
///
/// `boundary` is `None` when no ancestor error boundary exists, in
/// which case the error escapes to the caller as
/// [`SchedulerError::Uncaught`].
#[derive(Debug)]
pub struct TrappedError {
    pub boundary: Option<FiberId>,
    pub error: BoxedError,
}

/// The error type for scheduler entry points.
///
/// `Uncaught` wraps a user error that reached the root without meeting
/// a boundary. The remaining variants are structural invariant
/// violations; they indicate a bug in the embedding or in a
/// reconciliation collaborator and are surfaced immediately instead of
/// being routed through the error pipeline.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A user error bubbled past the topmost fiber with no boundary to
    /// catch it. The root registry has been cleared; pending roots must
    /// be re-scheduled explicitly.
    #[error("uncaught error reached the host container: {0}")]
    Uncaught(BoxedError),

    /// A finished tree was handed to commit while already being the
    /// current tree of its root.
    #[error("cannot commit the tree that is already current")]
    AlreadyCommitted,

    /// An update was scheduled on a fiber whose topmost ancestor is not
    /// a host container.
    #[error("top of the fiber tree is not a host container")]
    InvalidRoot,

    /// A host-container fiber carries no root descriptor.
    #[error("host container fiber is not bound to a root")]
    UnboundContainer,
}
