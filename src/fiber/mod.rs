//! Fiber nodes and the arena that owns them.
//!
//! A fiber is one unit of reconciliation work. The tree is double
//! buffered: every fiber may be paired with an `alternate` in the other
//! buffer (current vs. work in progress). Parent, child, sibling,
//! alternate and effect links are all cyclic, so fibers never own each
//! other. The arena owns the storage and every link is an index into
//! it, the way dioxus keeps its scopes and elements in a `Slab` behind
//! newtype ids.

pub mod root;

use std::any::Any;
use std::fmt;
use std::ops::{Index, IndexMut};

use bitflags::bitflags;
use slab::Slab;

use crate::priority::PriorityLevel;
use root::RootId;

/// Handle of a fiber inside a [`FiberArena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiberId(pub usize);

impl fmt::Debug for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiberId({})", self.0)
    }
}

/// Opaque handle of a host-side instance (element, text node, ...).
///
/// The scheduler never dereferences these; the host config maps them to
/// real objects on its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub usize);

/// Variant discriminator of a fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiberTag {
    /// The topmost fiber of a root. Its `state_node` is the root itself.
    HostContainer,
    /// A host element with a native instance.
    HostComponent,
    /// A host text leaf.
    HostText,
    /// A user-defined composite node.
    Composite,
}

/// What a fiber's `state_node` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateNode {
    /// Root descriptor, only for `HostContainer` fibers.
    Root(RootId),
    /// Host instance handle, for host fibers.
    Instance(InstanceId),
}

bitflags! {
    /// Pending side effects of a fiber, consumed at commit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EffectTag: u8 {
        const PLACEMENT = 0b0001;
        const UPDATE    = 0b0010;
        const DELETION  = 0b0100;
        const CALLBACK  = 0b1000;
    }
}

/// One unit of reconciliation work.
///
/// Fibers are plain mutable records; each phase touches its own slice
/// of the fields. Begin sets children and the effect tag, complete
/// bubbles effects and resets priority, commit applies side effects and
/// clears the tag.
pub struct Fiber {
    pub tag: FiberTag,
    pub state_node: Option<StateNode>,

    /// Parent in the work-in-progress tree. `None` iff this is a
    /// host container.
    pub parent: Option<FiberId>,
    pub child: Option<FiberId>,
    pub sibling: Option<FiberId>,

    /// Paired fiber in the other buffer. Always bidirectional.
    pub alternate: Option<FiberId>,

    /// Inputs to the next reconciliation, cleared on completion.
    pub pending_props: Option<Box<dyn Any>>,
    pub update_queue: Option<Box<dyn Any>>,

    /// First child of the most recently progressed child set.
    pub progressed_child: Option<FiberId>,

    /// Most urgent pending work anywhere in this subtree.
    pub pending_work_priority: PriorityLevel,

    pub effect_tag: EffectTag,

    /// Singly-linked effect list covering this subtree, in post-order.
    pub first_effect: Option<FiberId>,
    pub last_effect: Option<FiberId>,
    pub next_effect: Option<FiberId>,
}

impl Fiber {
    /// A fresh fiber with no links, no effects and no pending work.
    pub fn new(tag: FiberTag) -> Self {
        Fiber {
            tag,
            state_node: None,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            pending_props: None,
            update_queue: None,
            progressed_child: None,
            pending_work_priority: PriorityLevel::NoWork,
            effect_tag: EffectTag::empty(),
            first_effect: None,
            last_effect: None,
            next_effect: None,
        }
    }
}

impl fmt::Debug for Fiber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("tag", &self.tag)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("sibling", &self.sibling)
            .field("alternate", &self.alternate)
            .field("pending_work_priority", &self.pending_work_priority)
            .field("effect_tag", &self.effect_tag)
            .finish()
    }
}

/// Owner of all fiber storage for one scheduler instance.
pub struct FiberArena {
    fibers: Slab<Fiber>,

    /// Render-phase owner slot. Reconciliation collaborators may set it
    /// while a unit of work runs; the scheduler clears it after every
    /// unit.
    pub current_owner: Option<FiberId>,
}

impl FiberArena {
    pub fn new() -> Self {
        FiberArena {
            fibers: Slab::new(),
            current_owner: None,
        }
    }

    /// Allocates a fiber and returns its handle.
    pub fn create_fiber(&mut self, tag: FiberTag) -> FiberId {
        FiberId(self.fibers.insert(Fiber::new(tag)))
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber> {
        self.fibers.get(id.0)
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber> {
        self.fibers.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Allocates or reuses the alternate of `fiber` as a fresh
    /// work-in-progress node at the given priority.
    ///
    /// The clone shares the structural links of the source (parent,
    /// child, sibling) and takes over its pending inputs; effect state
    /// is wiped. Both `alternate` back-links are maintained.
    pub fn clone_fiber(&mut self, fiber: FiberId, priority: PriorityLevel) -> FiberId {
        let wip = match self[fiber].alternate {
            Some(existing) => existing,
            None => {
                let tag = self[fiber].tag;
                let state_node = self[fiber].state_node;
                let created = self.create_fiber(tag);
                self[created].state_node = state_node;
                self[created].alternate = Some(fiber);
                self[fiber].alternate = Some(created);
                created
            }
        };

        let (parent, child, sibling) = {
            let src = &self[fiber];
            (src.parent, src.child, src.sibling)
        };
        let pending_props = self[fiber].pending_props.take();
        let update_queue = self[fiber].update_queue.take();

        let node = &mut self[wip];
        node.parent = parent;
        node.child = child;
        node.sibling = sibling;
        node.progressed_child = child;
        node.pending_props = pending_props;
        node.update_queue = update_queue;
        node.pending_work_priority = priority;
        node.effect_tag = EffectTag::empty();
        node.first_effect = None;
        node.last_effect = None;
        node.next_effect = None;
        wip
    }

    /// Recomputes a fiber's pending priority from its progressed
    /// children: the most urgent non-`NoWork` child level, or `NoWork`
    /// if no child has pending work.
    pub fn reset_work_priority(&mut self, fiber: FiberId) {
        let mut priority = PriorityLevel::NoWork;
        let mut child = self[fiber].progressed_child;
        while let Some(c) = child {
            let p = self[c].pending_work_priority;
            if p.is_work() {
                priority = priority.raise_to(p);
            }
            child = self[c].sibling;
        }
        self[fiber].pending_work_priority = priority;
    }

    /// Raises the pending priority of a fiber and its alternate,
    /// never deprioritizing.
    pub fn raise_pending_priority(&mut self, fiber: FiberId, priority: PriorityLevel) {
        let raised = self[fiber].pending_work_priority.raise_to(priority);
        self[fiber].pending_work_priority = raised;
        if let Some(alt) = self[fiber].alternate {
            let raised = self[alt].pending_work_priority.raise_to(priority);
            self[alt].pending_work_priority = raised;
        }
    }

    /// The root descriptor a host-container fiber is bound to.
    pub fn root_of_container(&self, fiber: FiberId) -> Option<RootId> {
        match self[fiber].state_node {
            Some(StateNode::Root(root)) => Some(root),
            _ => None,
        }
    }
}

impl Default for FiberArena {
    fn default() -> Self {
        FiberArena::new()
    }
}

impl Index<FiberId> for FiberArena {
    type Output = Fiber;

    fn index(&self, id: FiberId) -> &Fiber {
        &self.fibers[id.0]
    }
}

impl IndexMut<FiberId> for FiberArena {
    fn index_mut(&mut self, id: FiberId) -> &mut Fiber {
        &mut self.fibers[id.0]
    }
}
