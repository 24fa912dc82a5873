//! Host-side scheduling primitives consumed by the scheduler.

use std::time::{Duration, Instant};

/// Minimum idle budget, in milliseconds, worth starting a unit of work.
///
/// The deferred work loop yields back to the host as soon as
/// `Deadline::time_remaining` drops to this value or below.
pub const TIME_HEURISTIC_MS: f64 = 1.0;

/// Callback-scheduling hooks supplied by the embedding runtime.
///
/// The scheduler requests at most one outstanding callback of each kind
/// at a time. A request is a signal, not a closure: when the host's
/// frame hook or idle timer fires, the embedding calls back into
/// [`Scheduler::perform_animation_work`] or
/// [`Scheduler::perform_deferred_work`] on the same logical agent.
///
/// [`Scheduler::perform_animation_work`]: crate::Scheduler::perform_animation_work
/// [`Scheduler::perform_deferred_work`]: crate::Scheduler::perform_deferred_work
pub trait HostConfig {
    /// Request a callback before the next frame is produced.
    fn schedule_animation_callback(&mut self);

    /// Request a callback during host idle time, with a deadline.
    fn schedule_deferred_callback(&mut self);

    /// When true, work scheduled at the default priority flushes
    /// synchronously instead of being deferred.
    fn use_sync_scheduling(&self) -> bool {
        false
    }
}

/// Remaining idle budget reported by the host.
pub trait Deadline {
    /// Milliseconds left before the host wants control back.
    fn time_remaining(&self) -> f64;
}

/// Wall-clock deadline: a fixed budget measured from creation.
pub struct FrameDeadline {
    end: Instant,
}

impl FrameDeadline {
    pub fn new(budget: Duration) -> Self {
        FrameDeadline {
            end: Instant::now() + budget,
        }
    }
}

impl Deadline for FrameDeadline {
    fn time_remaining(&self) -> f64 {
        self.end
            .saturating_duration_since(Instant::now())
            .as_secs_f64()
            * 1000.0
    }
}
