//! Root descriptors: one per host container.

use std::fmt;
use std::ops::{Index, IndexMut};

use slab::Slab;

use super::FiberId;

/// Handle of a root inside a [`Roots`] arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(pub usize);

impl fmt::Debug for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootId({})", self.0)
    }
}

/// Opaque handle of the host container a root renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub usize);

/// Host container descriptor.
///
/// `current` always points at the last successfully committed fiber for
/// this root; only commit replaces it. `is_scheduled` and
/// `next_scheduled_root` make up the root registry chain.
pub struct FiberRoot {
    pub current: FiberId,
    pub is_scheduled: bool,
    pub next_scheduled_root: Option<RootId>,
    pub container_info: ContainerHandle,
}

impl FiberRoot {
    pub fn new(current: FiberId, container_info: ContainerHandle) -> Self {
        FiberRoot {
            current,
            is_scheduled: false,
            next_scheduled_root: None,
            container_info,
        }
    }
}

/// Owner of all root descriptors for one scheduler instance.
pub struct Roots {
    roots: Slab<FiberRoot>,
}

impl Roots {
    pub fn new() -> Self {
        Roots { roots: Slab::new() }
    }

    pub fn insert(&mut self, root: FiberRoot) -> RootId {
        RootId(self.roots.insert(root))
    }

    pub fn get(&self, id: RootId) -> Option<&FiberRoot> {
        self.roots.get(id.0)
    }
}

impl Default for Roots {
    fn default() -> Self {
        Roots::new()
    }
}

impl Index<RootId> for Roots {
    type Output = FiberRoot;

    fn index(&self, id: RootId) -> &FiberRoot {
        &self.roots[id.0]
    }
}

impl IndexMut<RootId> for Roots {
    fn index_mut(&mut self, id: RootId) -> &mut FiberRoot {
        &mut self.roots[id.0]
    }
}
