//! Concurrent doubly-linked eviction list with a sweeping hand.
//!
//! The list keeps per-node state in a [`HookArena`] and links nodes by
//! [`NodeId`]. Insertion at the head is lock-free; every other structural
//! mutation happens under a single mutex.
//!
//! ## Architecture
//!
//! ```text
//!   SieveList
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │  arena: HookArena            (prev/next/accessed per node)   │
//!   │  head ─► most recent   tail ─► oldest   hand ─► sweep cursor │
//!   │  len: AtomicUsize                                            │
//!   │  mutation_mtx: Mutex<()>     (unlink / replace / move)       │
//!   └──────────────────────────────────────────────────────────────┘
//!
//!   head ─► [D] ◄──► [C] ◄──► [B] ◄──► [A] ◄── tail
//!                              ▲
//!                             hand  (walks tail → head)
//! ```
//!
//! ## Concurrency
//!
//! - `link_at_head` runs lock-free: a CAS loop on `head`, then a fix-up of
//!   the displaced head's back-pointer. Readers must tolerate the transient
//!   window where `head.next.prev != head` for the single node that is the
//!   current head; all other back-pointers are consistent under the mutex.
//! - `unlink`, `replace`, and `move_to_head` require the mutex. They are
//!   methods on [`ListGuard`], so holding the lock is enforced by the type
//!   system rather than a runtime assertion.
//! - `hand` is written only under the mutex, except for the single
//!   initialising store on the empty→non-empty transition.
//!
//! Iteration is for diagnostics and tests only; it is not safe against
//! concurrent structural mutation.
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ds::hook::{AtomicLink, HookArena, NodeId};
use crate::error::InvariantError;

/// Concurrent eviction list over a fixed hook arena.
#[derive(Debug)]
pub struct SieveList {
    arena: HookArena,
    head: AtomicLink,
    tail: AtomicLink,
    hand: AtomicLink,
    len: AtomicUsize,
    mutation_mtx: Mutex<()>,
}

impl SieveList {
    /// Creates an empty list with `node_capacity` hook slots.
    pub fn new(node_capacity: usize) -> Self {
        Self {
            arena: HookArena::new(node_capacity),
            head: AtomicLink::none(),
            tail: AtomicLink::none(),
            hand: AtomicLink::none(),
            len: AtomicUsize::new(0),
            mutation_mtx: Mutex::new(()),
        }
    }

    /// Returns the number of linked nodes.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns `true` if no node is linked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of hook slots in the backing arena.
    pub fn node_capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Returns the most recently inserted node.
    pub fn head(&self) -> Option<NodeId> {
        self.head.load()
    }

    /// Returns the oldest node.
    pub fn tail(&self) -> Option<NodeId> {
        self.tail.load()
    }

    /// Returns the sweep cursor.
    pub fn hand(&self) -> Option<NodeId> {
        self.hand.load()
    }

    pub(crate) fn set_hand(&self, node: Option<NodeId>) {
        self.hand.store(node);
    }

    /// Returns the node after `node` (toward the tail).
    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        self.arena.hook(node).next()
    }

    /// Returns the node before `node` (toward the head).
    pub fn prev(&self, node: NodeId) -> Option<NodeId> {
        self.arena.hook(node).prev()
    }

    /// Sets the accessed flag; called on every cache hit.
    pub fn mark_accessed(&self, node: NodeId) {
        self.arena.hook(node).set_accessed(true);
    }

    /// Clears the accessed flag.
    pub fn unmark_accessed(&self, node: NodeId) {
        self.arena.hook(node).set_accessed(false);
    }

    /// Reads the accessed flag.
    pub fn is_accessed(&self, node: NodeId) -> bool {
        self.arena.hook(node).is_accessed()
    }

    /// Returns `true` if `node` is currently linked.
    ///
    /// A linked node normally has at least one sibling link set; the unique
    /// node of a single-element list has neither, so the head is consulted
    /// as well.
    pub fn is_linked(&self, node: NodeId) -> bool {
        let hook = self.arena.hook(node);
        hook.prev().is_some()
            || hook.next().is_some()
            || self.head.load() == Some(node)
            || self.tail.load() == Some(node)
    }

    /// Attaches `node` as the new head. Lock-free; callable concurrently
    /// from any number of threads.
    ///
    /// The node must not be linked. That precondition is the caller's to
    /// uphold; it is checked in debug builds only.
    pub fn link_at_head(&self, node: NodeId) {
        debug_assert!(
            !self.is_linked(node),
            "link_at_head called on a linked node {}",
            node.index()
        );

        let hook = self.arena.hook(node);
        hook.set_prev(None);

        let mut old_head = self.head.load();
        hook.set_next(old_head);
        while let Err(current) = self.head.compare_exchange_weak(old_head, Some(node)) {
            old_head = current;
            hook.set_next(old_head);
        }

        match old_head {
            None => {
                // This thread won the empty→non-empty transition, so it is
                // the unique initialiser of tail and hand.
                let tail_init = self.tail.compare_exchange(None, Some(node)).is_ok();
                debug_assert!(tail_init, "tail already set on empty→non-empty transition");
                let hand_init = self.hand.compare_exchange(None, Some(node)).is_ok();
                debug_assert!(hand_init, "hand already set on empty→non-empty transition");
            }
            Some(displaced) => self.arena.hook(displaced).set_prev(Some(node)),
        }

        self.len.fetch_add(1, Ordering::AcqRel);
    }

    /// Acquires the structural-mutation lock.
    pub fn lock_mutations(&self) -> ListGuard<'_> {
        ListGuard {
            list: self,
            _lock: self.mutation_mtx.lock(),
        }
    }

    /// Removes `node` from the list if it is linked. Idempotent.
    ///
    /// Returns `true` if the node was unlinked by this call.
    pub fn remove(&self, node: NodeId) -> bool {
        // Fast path: an unlinked node has no sibling links and is not the
        // head. Skip the lock entirely for the common double-remove.
        if self.looks_unlinked(node) {
            return false;
        }

        let guard = self.lock_mutations();
        // A racing sweep or remover may have detached the node while we
        // waited on the lock.
        if self.looks_unlinked(node) {
            return false;
        }
        guard.unlink(node);
        let hook = self.arena.hook(node);
        hook.set_prev(None);
        hook.set_next(None);
        true
    }

    fn looks_unlinked(&self, node: NodeId) -> bool {
        let hook = self.arena.hook(node);
        hook.prev().is_none() && hook.next().is_none() && self.head.load() != Some(node)
    }

    /// Substitutes `new` for `old` in place, preserving list position.
    ///
    /// Used when the host cache relocates an object to a different slot.
    pub fn replace(&self, old: NodeId, new: NodeId) {
        let guard = self.lock_mutations();
        guard.replace(old, new);
    }

    /// Moves `node` to the head. No-op if it already is the head.
    pub fn move_to_head(&self, node: NodeId) {
        let guard = self.lock_mutations();
        guard.move_to_head(node);
    }

    /// Iterates node ids from head toward tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            curr: self.head.load(),
            direction: Direction::FromHead,
        }
    }

    /// Iterates node ids from tail toward head.
    pub fn iter_from_tail(&self) -> Iter<'_> {
        Iter {
            list: self,
            curr: self.tail.load(),
            direction: Direction::FromTail,
        }
    }

    pub(crate) fn clear_links(&self, node: NodeId) {
        let hook = self.arena.hook(node);
        hook.set_prev(None);
        hook.set_next(None);
    }

    #[cold]
    fn structural_panic(&self, what: &str, node: NodeId) -> ! {
        let hook = self.arena.hook(node);
        panic!(
            "sieve list structural inconsistency: {what}; node={} prev={:?} next={:?} \
             head={:?} tail={:?} hand={:?} len={}",
            node.index(),
            hook.prev().map(NodeId::index),
            hook.next().map(NodeId::index),
            self.head.load().map(NodeId::index),
            self.tail.load().map(NodeId::index),
            self.hand.load().map(NodeId::index),
            self.len(),
        );
    }

    /// Verifies the structural invariants of a quiescent list.
    ///
    /// Takes the mutation lock; concurrent `link_at_head` calls can still
    /// produce the transient head back-pointer window, so run this only
    /// when insertion has settled.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        let _guard = self.mutation_mtx.lock();
        let len = self.len();
        let head = self.head.load();
        let tail = self.tail.load();

        if len == 0 {
            if head.is_some() || tail.is_some() {
                return Err(InvariantError::new(format!(
                    "empty list has head={:?} tail={:?}",
                    head.map(NodeId::index),
                    tail.map(NodeId::index)
                )));
            }
            return Ok(());
        }

        let head = match head {
            Some(id) => id,
            None => return Err(InvariantError::new("head absent on non-empty list")),
        };
        let tail = match tail {
            Some(id) => id,
            None => return Err(InvariantError::new("tail absent on non-empty list")),
        };

        let mut seen = FxHashSet::default();
        let mut count = 0usize;
        let mut curr = Some(head);
        let mut expected_prev: Option<NodeId> = None;
        let mut last = head;

        while let Some(id) = curr {
            if !seen.insert(id) {
                return Err(InvariantError::new(format!(
                    "cycle through node {}",
                    id.index()
                )));
            }
            let hook = self.arena.hook(id);
            if hook.prev() != expected_prev {
                return Err(InvariantError::new(format!(
                    "node {} prev={:?}, expected {:?}",
                    id.index(),
                    hook.prev().map(NodeId::index),
                    expected_prev.map(NodeId::index)
                )));
            }
            count += 1;
            if count > len {
                return Err(InvariantError::new(format!(
                    "forward traversal exceeds len {len}"
                )));
            }
            expected_prev = Some(id);
            last = id;
            curr = hook.next();
        }

        if last != tail {
            return Err(InvariantError::new(format!(
                "traversal ends at {} instead of tail {}",
                last.index(),
                tail.index()
            )));
        }
        if count != len {
            return Err(InvariantError::new(format!(
                "len {len} but traversal visited {count} nodes"
            )));
        }
        if let Some(hand) = self.hand.load() {
            if !seen.contains(&hand) {
                return Err(InvariantError::new(format!(
                    "hand {} is not a linked node",
                    hand.index()
                )));
            }
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if let Err(err) = self.check_invariants() {
            panic!("{err}");
        }
    }
}

/// Guard over the list's structural-mutation mutex.
///
/// Splice operations live here so that "the mutex must be held" is a
/// compile-time property of the call site.
pub struct ListGuard<'a> {
    list: &'a SieveList,
    _lock: MutexGuard<'a, ()>,
}

impl ListGuard<'_> {
    /// Splices `node` out of the list.
    ///
    /// Head, tail, and hand are retargeted if they point at `node`; the
    /// node's own links are left in place for the caller to reuse or clear.
    pub fn unlink(&self, node: NodeId) {
        let list = self.list;
        if list.len() == 0 {
            list.structural_panic("unlink on empty list", node);
        }

        let hook = list.arena.hook(node);
        let prev = hook.prev();
        let next = hook.next();

        if list.head.load() == Some(node) {
            list.head.store(next);
        }
        if list.tail.load() == Some(node) {
            list.tail.store(prev);
        }
        if list.hand.load() == Some(node) {
            list.hand.store(prev);
        }

        if let Some(p) = prev {
            list.arena.hook(p).set_next(next);
        }
        if let Some(n) = next {
            list.arena.hook(n).set_prev(prev);
        }

        let remaining = list.len.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining > 0 && (list.head.load().is_none() || list.tail.load().is_none()) {
            list.structural_panic("head or tail lost with nodes remaining", node);
        }
    }

    /// Substitutes `new` for `old` in place.
    pub fn replace(&self, old: NodeId, new: NodeId) {
        let list = self.list;
        let old_hook = list.arena.hook(old);
        let new_hook = list.arena.hook(new);
        let prev = old_hook.prev();
        let next = old_hook.next();

        if list.head.load() == Some(old) {
            list.head.store(Some(new));
        }
        if list.tail.load() == Some(old) {
            list.tail.store(Some(new));
        }
        if list.hand.load() == Some(old) {
            list.hand.store(Some(new));
        }

        if let Some(p) = prev {
            list.arena.hook(p).set_next(Some(new));
        }
        if let Some(n) = next {
            list.arena.hook(n).set_prev(Some(new));
        }

        new_hook.set_prev(prev);
        new_hook.set_next(next);
        old_hook.set_prev(None);
        old_hook.set_next(None);
    }

    /// Relinks `node` at the head. No-op if it already is the head.
    pub fn move_to_head(&self, node: NodeId) {
        if self.list.head.load() == Some(node) {
            return;
        }
        self.unlink(node);
        self.list.link_at_head(node);
    }
}

/// Traversal direction for [`Iter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Head toward tail (insertion order, newest first).
    FromHead,
    /// Tail toward head (oldest first; the sweep direction).
    FromTail,
}

/// Node-id iterator over the list. Diagnostics and tests only; not safe
/// against concurrent structural mutation.
pub struct Iter<'a> {
    list: &'a SieveList,
    curr: Option<NodeId>,
    direction: Direction,
}

impl Iterator for Iter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.curr?;
        self.curr = match self.direction {
            Direction::FromHead => self.list.next(id),
            Direction::FromTail => self.list.prev(id),
        };
        Some(id)
    }
}
