//! Shared fixtures: a recording host config and a scripted reconciler.

#![allow(dead_code)]

use std::cell::Cell;

use rustc_hash::{FxHashMap, FxHashSet};

use fibril::{
    BoxedError, ContainerHandle, Deadline, EffectTag, FiberArena, FiberId, FiberTag, HostConfig,
    PriorityLevel, Reconciler, RootId, Scheduler, TrappedError,
};

pub type TestScheduler = Scheduler<MockHost, TestReconciler>;

/// Host config that records callback requests instead of scheduling
/// anything.
#[derive(Default)]
pub struct MockHost {
    pub animation_requests: usize,
    pub deferred_requests: usize,
    pub sync: bool,
}

impl HostConfig for MockHost {
    fn schedule_animation_callback(&mut self) {
        self.animation_requests += 1;
    }

    fn schedule_deferred_callback(&mut self) {
        self.deferred_requests += 1;
    }

    fn use_sync_scheduling(&self) -> bool {
        self.sync
    }
}

/// Deadline that always reports the same remaining budget.
pub struct FixedDeadline(pub f64);

impl Deadline for FixedDeadline {
    fn time_remaining(&self) -> f64 {
        self.0
    }
}

/// Deadline that shrinks by a fixed step on every query, so a test can
/// let exactly N units through before the budget runs out.
pub struct CountdownDeadline {
    remaining: Cell<f64>,
    step: f64,
}

impl CountdownDeadline {
    pub fn new(budget: f64, step: f64) -> Self {
        CountdownDeadline {
            remaining: Cell::new(budget),
            step,
        }
    }
}

impl Deadline for CountdownDeadline {
    fn time_remaining(&self) -> f64 {
        let remaining = self.remaining.get();
        self.remaining.set((remaining - self.step).max(0.0));
        remaining
    }
}

/// Scripted reconciliation collaborator.
///
/// The committed tree doubles as the declarative source: `begin_work`
/// clones the source fiber's children into the work-in-progress buffer
/// and `complete_work` attaches whatever effects the test marked by
/// name. Failures are injected by name as well. Every host-facing
/// commit call lands in `journal` in call order.
#[derive(Default)]
pub struct TestReconciler {
    pub names: FxHashMap<FiberId, &'static str>,

    /// Fibers designated as error boundaries.
    pub boundaries: FxHashSet<&'static str>,
    /// Boundaries that have acknowledged an error and render no failed
    /// children anymore.
    pub failed_boundaries: FxHashSet<&'static str>,

    /// Failure injection by fiber name.
    pub render_failures: FxHashSet<&'static str>,
    pub complete_failures: FxHashSet<&'static str>,
    pub failing_unmounts: FxHashSet<&'static str>,
    pub failing_lifecycles: FxHashSet<&'static str>,
    /// One-shot: a boundary listed here fails its first acknowledgement.
    pub acknowledge_failures: FxHashSet<&'static str>,

    /// Effects to attach at completion, by fiber name.
    pub placements: FxHashSet<&'static str>,
    pub updates: FxHashSet<&'static str>,
    pub callbacks: FxHashSet<&'static str>,
    pub deletions: FxHashSet<&'static str>,

    pub journal: Vec<String>,
    pub acknowledgements: Vec<&'static str>,
    pub failed_acknowledgements: usize,
}

impl TestReconciler {
    pub fn new() -> Self {
        TestReconciler::default()
    }

    pub fn name_of(&self, fibers: &FiberArena, fiber: FiberId) -> &'static str {
        if let Some(name) = self.names.get(&fiber).copied() {
            return name;
        }
        if let Some(alternate) = fibers[fiber].alternate {
            if let Some(name) = self.names.get(&alternate).copied() {
                return name;
            }
        }
        "?"
    }

    fn nearest_boundary(&self, fibers: &FiberArena, fiber: FiberId) -> Option<FiberId> {
        let mut node = fibers[fiber].parent;
        while let Some(candidate) = node {
            if self.boundaries.contains(self.name_of(fibers, candidate)) {
                return Some(candidate);
            }
            node = fibers[candidate].parent;
        }
        None
    }

    fn append_effect(fibers: &mut FiberArena, parent: FiberId, fiber: FiberId) {
        fibers[fiber].next_effect = None;
        match fibers[parent].last_effect {
            Some(last) => fibers[last].next_effect = Some(fiber),
            None => fibers[parent].first_effect = Some(fiber),
        }
        fibers[parent].last_effect = Some(fiber);
    }
}

impl Reconciler for TestReconciler {
    fn begin_work(
        &mut self,
        fibers: &mut FiberArena,
        _current: Option<FiberId>,
        work_in_progress: FiberId,
        _priority: PriorityLevel,
    ) -> Result<Option<FiberId>, BoxedError> {
        let name = self.name_of(fibers, work_in_progress);
        if self.render_failures.contains(name) {
            return Err(format!("{name} failed to render").into());
        }
        let boundary_failed =
            self.boundaries.contains(name) && self.failed_boundaries.contains(name);

        let mut first: Option<FiberId> = None;
        let mut previous: Option<FiberId> = None;
        let mut source = fibers[work_in_progress].child;
        while let Some(child) = source {
            let next = fibers[child].sibling;
            let child_name = self.name_of(fibers, child);
            if boundary_failed && self.render_failures.contains(child_name) {
                // A failed subtree under an acknowledged boundary is
                // dropped and unmounted.
                fibers[child].effect_tag.insert(EffectTag::DELETION);
                Self::append_effect(fibers, work_in_progress, child);
                source = next;
                continue;
            }
            let child_priority = fibers[child].pending_work_priority;
            let clone = fibers.clone_fiber(child, child_priority);
            self.names.insert(clone, child_name);
            fibers[clone].parent = Some(work_in_progress);
            fibers[clone].sibling = None;
            match previous {
                Some(prev) => fibers[prev].sibling = Some(clone),
                None => first = Some(clone),
            }
            previous = Some(clone);
            source = next;
        }
        fibers[work_in_progress].child = first;
        fibers[work_in_progress].progressed_child = first;
        Ok(first)
    }

    fn complete_work(
        &mut self,
        fibers: &mut FiberArena,
        _current: Option<FiberId>,
        work_in_progress: FiberId,
    ) -> Result<Option<FiberId>, BoxedError> {
        let name = self.name_of(fibers, work_in_progress);
        if self.complete_failures.contains(name) {
            return Err(format!("{name} failed to complete").into());
        }
        if self.placements.contains(name) {
            fibers[work_in_progress]
                .effect_tag
                .insert(EffectTag::PLACEMENT);
        }
        if self.updates.contains(name) {
            fibers[work_in_progress].effect_tag.insert(EffectTag::UPDATE);
        }
        if self.callbacks.contains(name) {
            fibers[work_in_progress]
                .effect_tag
                .insert(EffectTag::CALLBACK);
        }
        if self.deletions.contains(name) {
            fibers[work_in_progress]
                .effect_tag
                .insert(EffectTag::DELETION);
        }
        Ok(None)
    }

    fn commit_insertion(&mut self, fibers: &mut FiberArena, fiber: FiberId) {
        let name = self.name_of(fibers, fiber);
        self.journal.push(format!("insert {name}"));
    }

    fn commit_work(
        &mut self,
        fibers: &mut FiberArena,
        _current: Option<FiberId>,
        fiber: FiberId,
    ) {
        let name = self.name_of(fibers, fiber);
        self.journal.push(format!("update {name}"));
    }

    fn commit_deletion(&mut self, fibers: &mut FiberArena, fiber: FiberId) -> Vec<TrappedError> {
        let name = self.name_of(fibers, fiber);
        self.journal.push(format!("delete {name}"));
        if self.failing_unmounts.remove(name) {
            let boundary = self.nearest_boundary(fibers, fiber);
            return vec![TrappedError {
                boundary,
                error: format!("{name} failed to unmount").into(),
            }];
        }
        Vec::new()
    }

    fn commit_lifecycles(
        &mut self,
        fibers: &mut FiberArena,
        _current: Option<FiberId>,
        fiber: FiberId,
    ) -> Option<TrappedError> {
        let name = self.name_of(fibers, fiber);
        self.journal.push(format!("lifecycle {name}"));
        if self.failing_lifecycles.remove(name) {
            let boundary = self.nearest_boundary(fibers, fiber);
            return Some(TrappedError {
                boundary,
                error: format!("{name} failed its lifecycle").into(),
            });
        }
        None
    }

    fn trap_error(
        &mut self,
        fibers: &FiberArena,
        failed: FiberId,
        error: BoxedError,
    ) -> TrappedError {
        TrappedError {
            boundary: self.nearest_boundary(fibers, failed),
            error,
        }
    }

    fn acknowledge_error_in_boundary(
        &mut self,
        fibers: &mut FiberArena,
        boundary: FiberId,
        error: BoxedError,
    ) -> Result<(), BoxedError> {
        let name = self.name_of(fibers, boundary);
        if self.acknowledge_failures.remove(name) {
            self.failed_acknowledgements += 1;
            return Err(format!("{name} failed to acknowledge: {error}").into());
        }
        self.failed_boundaries.insert(name);
        self.acknowledgements.push(name);
        Ok(())
    }
}

pub fn scheduler() -> TestScheduler {
    Scheduler::new(MockHost::default(), TestReconciler::new())
}

/// Creates a root and names its container fiber.
pub fn mount(s: &mut TestScheduler, name: &'static str) -> (RootId, FiberId) {
    let root = s.create_container(ContainerHandle(0));
    let container = s.root_current(root);
    s.reconciler_mut().names.insert(container, name);
    (root, container)
}

/// Appends a named child fiber under `parent` in the committed tree.
pub fn add_child(
    s: &mut TestScheduler,
    parent: FiberId,
    tag: FiberTag,
    name: &'static str,
) -> FiberId {
    let fibers = s.arena_mut();
    let fiber = fibers.create_fiber(tag);
    fibers[fiber].parent = Some(parent);
    match fibers[parent].child {
        None => fibers[parent].child = Some(fiber),
        Some(first) => {
            let mut last = first;
            while let Some(next) = fibers[last].sibling {
                last = next;
            }
            fibers[last].sibling = Some(fiber);
        }
    }
    s.reconciler_mut().names.insert(fiber, name);
    fiber
}

/// Pre-order names of the committed tree of a root.
pub fn committed_names(s: &TestScheduler, root: RootId) -> Vec<&'static str> {
    let fibers = s.arena();
    let mut out = Vec::new();
    let mut stack = vec![s.root_current(root)];
    while let Some(fiber) = stack.pop() {
        out.push(s.reconciler().name_of(fibers, fiber));
        if let Some(sibling) = fibers[fiber].sibling {
            stack.push(sibling);
        }
        if let Some(child) = fibers[fiber].child {
            stack.push(child);
        }
    }
    out
}
