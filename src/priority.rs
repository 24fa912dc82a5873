//! Priority lattice for pending work.

/// Urgency class of a unit of pending work.
///
/// Levels are totally ordered by urgency: `Synchronous` is the most
/// urgent and `NoWork` sorts last, so `min` always keeps the most
/// urgent of two levels. New levels slot in between `Animation` and
/// `Low` by declaration order alone; every comparison in the crate
/// goes through the derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityLevel {
    /// Must flush before control returns to the caller that scheduled it.
    Synchronous,

    /// Should flush within the next animation frame.
    Animation,

    /// Deferred work, processed during host idle time under a deadline.
    Low,

    /// No pending work. Sorts after every real level.
    NoWork,
}

impl PriorityLevel {
    /// Whether this level represents actual pending work.
    pub fn is_work(self) -> bool {
        self != PriorityLevel::NoWork
    }

    /// The more urgent of two levels. `NoWork` is the identity.
    pub fn raise_to(self, other: PriorityLevel) -> PriorityLevel {
        self.min(other)
    }
}
