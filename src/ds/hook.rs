//! Node hooks: per-node link and flag metadata for the eviction list.
//!
//! Hooks live in a fixed-capacity [`HookArena`] and are addressed by
//! [`NodeId`]. Links between hooks are stored as atomic arena indices with a
//! `NIL` sentinel for "absent", which lets the list's lock-free insertion
//! path run entirely through shared references: the arena is allocated once
//! and never moves.
//!
//! The engine stores no payloads. The surrounding cache owns its own object
//! storage and maps each cached object to a `NodeId`; a hook slot must stay
//! reserved from `link_at_head` until the node is removed or claimed from
//! the eviction buffer.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Sentinel index encoding an absent link.
const NIL: usize = usize::MAX;

/// Stable handle to a node hook in a [`HookArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Builds a handle from an arena index.
    ///
    /// The host cache assigns indices; the engine only checks that an index
    /// is inside the arena when the node is used.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Atomic optional node reference, encoded as an index with a `NIL` sentinel.
#[derive(Debug)]
pub(crate) struct AtomicLink(AtomicUsize);

impl AtomicLink {
    pub(crate) fn none() -> Self {
        Self(AtomicUsize::new(NIL))
    }

    pub(crate) fn load(&self) -> Option<NodeId> {
        decode(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, link: Option<NodeId>) {
        self.0.store(encode(link), Ordering::Release);
    }

    pub(crate) fn swap(&self, link: Option<NodeId>) -> Option<NodeId> {
        decode(self.0.swap(encode(link), Ordering::AcqRel))
    }

    pub(crate) fn compare_exchange(
        &self,
        current: Option<NodeId>,
        new: Option<NodeId>,
    ) -> Result<(), Option<NodeId>> {
        self.0
            .compare_exchange(
                encode(current),
                encode(new),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(decode)
    }

    pub(crate) fn compare_exchange_weak(
        &self,
        current: Option<NodeId>,
        new: Option<NodeId>,
    ) -> Result<(), Option<NodeId>> {
        self.0
            .compare_exchange_weak(
                encode(current),
                encode(new),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(decode)
    }
}

fn encode(link: Option<NodeId>) -> usize {
    link.map_or(NIL, |id| id.0)
}

fn decode(raw: usize) -> Option<NodeId> {
    (raw != NIL).then_some(NodeId(raw))
}

/// Per-node metadata: sibling links and the accessed flag.
#[derive(Debug)]
pub struct NodeHook {
    prev: AtomicLink,
    next: AtomicLink,
    accessed: AtomicBool,
}

impl NodeHook {
    fn new() -> Self {
        Self {
            prev: AtomicLink::none(),
            next: AtomicLink::none(),
            accessed: AtomicBool::new(false),
        }
    }

    pub(crate) fn prev(&self) -> Option<NodeId> {
        self.prev.load()
    }

    pub(crate) fn next(&self) -> Option<NodeId> {
        self.next.load()
    }

    pub(crate) fn set_prev(&self, link: Option<NodeId>) {
        self.prev.store(link);
    }

    pub(crate) fn set_next(&self, link: Option<NodeId>) {
        self.next.store(link);
    }

    /// The accessed flag is observational and never ordered against the
    /// links, so relaxed loads and stores suffice.
    pub(crate) fn is_accessed(&self) -> bool {
        self.accessed.load(Ordering::Relaxed)
    }

    pub(crate) fn set_accessed(&self, accessed: bool) {
        self.accessed.store(accessed, Ordering::Relaxed);
    }
}

/// Fixed-capacity arena of node hooks.
///
/// Indexing with an out-of-range `NodeId` is a caller bug and panics.
#[derive(Debug)]
pub struct HookArena {
    hooks: Box<[NodeHook]>,
}

impl HookArena {
    /// Creates an arena with `capacity` hook slots, all unlinked.
    pub fn new(capacity: usize) -> Self {
        let mut hooks = Vec::with_capacity(capacity);
        hooks.resize_with(capacity, NodeHook::new);
        Self {
            hooks: hooks.into_boxed_slice(),
        }
    }

    /// Returns the number of hook slots.
    pub fn capacity(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) fn hook(&self, id: NodeId) -> &NodeHook {
        &self.hooks[id.0]
    }
}
