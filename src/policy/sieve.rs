//! Buffered SIEVE eviction engine.
//!
//! Couples the concurrent list core with a sweeping hand that selects
//! eviction candidates in bulk and a staging buffer that hands them to
//! consumer threads without further locking.
//!
//! ## Eviction Flow
//!
//! ```text
//!   get_eviction_candidate()
//!        │
//!        ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ claim from buffer                                            │
//!   │   hit  → return node                                         │
//!   │   miss → list empty? → return None                           │
//!   │          else run prepare_eviction_candidates() and retry    │
//!   └──────────────────────────────────────────────────────────────┘
//!
//!   prepare_eviction_candidates()       (list mutex held)
//!        │
//!        ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ buffer still stocked? → early exit                           │
//!   │ walk hand from tail toward a snapshot of head:               │
//!   │   accessed   → clear bit, keep walking   (second chance)     │
//!   │   unaccessed → stage in buffer, unlink from list             │
//!   │ reaching the snapshot turns the walk around at the tail;     │
//!   │ more than `abort_turn_limit` turns gives up on the batch     │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sweep walks *away* from the head because the head is the lock-free
//! insertion point; bounding the walk by a snapshot of `head` keeps it off
//! nodes that were inserted after the sweep began.
//!
//! A node moves through: linked-unseen → linked-accessed (touch) →
//! linked-unseen (sweep clears) → staged (sweep detaches) → claimed
//! (consumer takes it) → back to the host's lifecycle.
//!
//! ## Variants
//!
//! The same skeleton supports SIEVE (default: clear the accessed bit, leave
//! the node in place) and CLOCK (move accessed nodes back to the head,
//! bit intact). SIEVE keeps popular nodes stationary, which is what makes
//! the lock-free insert path worth having.
use crate::ds::evict_buffer::CandidateBuffer;
use crate::ds::hook::NodeId;
use crate::ds::sieve_list::{Iter, ListGuard, SieveList};
use crate::error::InvariantError;

#[cfg(feature = "metrics")]
use crate::metrics::{EngineMetrics, EngineMetricsSnapshot};

/// Sweep algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepVariant {
    /// Clear the accessed bit and leave the node in place (default).
    Sieve,
    /// Move accessed nodes to the head on visit, bit intact.
    Clock,
}

/// Buffered SIEVE eviction engine over a fixed node arena.
///
/// Construct through [`SieveEngine::builder`]. The host cache maps its
/// object storage to [`NodeId`]s; the engine tracks recency metadata and
/// produces eviction candidates, nothing else.
#[derive(Debug)]
pub struct SieveEngine {
    list: SieveList,
    buffer: CandidateBuffer,
    variant: SweepVariant,
    abort_turn_limit: u32,
    #[cfg(feature = "metrics")]
    metrics: EngineMetrics,
}

impl SieveEngine {
    /// Starts building an engine over `node_capacity` hook slots.
    pub fn builder(node_capacity: usize) -> crate::builder::SieveEngineBuilder {
        crate::builder::SieveEngineBuilder::new(node_capacity)
    }

    pub(crate) fn from_parts(
        list: SieveList,
        buffer: CandidateBuffer,
        variant: SweepVariant,
        abort_turn_limit: u32,
    ) -> Self {
        Self {
            list,
            buffer,
            variant,
            abort_turn_limit,
            #[cfg(feature = "metrics")]
            metrics: EngineMetrics::default(),
        }
    }

    /// Returns the number of linked nodes.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if no node is linked.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Returns the hook-arena capacity.
    pub fn node_capacity(&self) -> usize {
        self.list.node_capacity()
    }

    /// Returns the staging-buffer capacity.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Returns the configured sweep variant.
    pub fn sweep_variant(&self) -> SweepVariant {
        self.variant
    }

    /// Returns the most recently inserted node. Diagnostics only.
    pub fn head(&self) -> Option<NodeId> {
        self.list.head()
    }

    /// Returns the oldest node. Diagnostics only.
    pub fn tail(&self) -> Option<NodeId> {
        self.list.tail()
    }

    /// Returns the sweep cursor. Diagnostics only.
    pub fn hand(&self) -> Option<NodeId> {
        self.list.hand()
    }

    /// Attaches `node` as the new head. Lock-free hot path.
    pub fn link_at_head(&self, node: NodeId) {
        self.list.link_at_head(node);
    }

    /// Removes `node` if linked; idempotent. Returns `true` if this call
    /// unlinked it.
    pub fn remove(&self, node: NodeId) -> bool {
        self.list.remove(node)
    }

    /// Substitutes `new` for `old` in place.
    pub fn replace(&self, old: NodeId, new: NodeId) {
        self.list.replace(old, new);
    }

    /// Moves `node` to the head. No-op if it already is the head.
    pub fn move_to_head(&self, node: NodeId) {
        self.list.move_to_head(node);
    }

    /// Records a hit on `node`. Lock-free hot path.
    pub fn mark_accessed(&self, node: NodeId) {
        self.list.mark_accessed(node);
    }

    /// Clears the accessed flag of `node`.
    pub fn unmark_accessed(&self, node: NodeId) {
        self.list.unmark_accessed(node);
    }

    /// Reads the accessed flag of `node`.
    pub fn is_accessed(&self, node: NodeId) -> bool {
        self.list.is_accessed(node)
    }

    /// Iterates linked nodes from head toward tail. Diagnostics and tests
    /// only; not safe against concurrent structural mutation.
    pub fn iter(&self) -> Iter<'_> {
        self.list.iter()
    }

    /// Iterates linked nodes from tail toward head.
    pub fn iter_from_tail(&self) -> Iter<'_> {
        self.list.iter_from_tail()
    }

    /// Returns one node detached from the list and staged for eviction, or
    /// `None` when the list is empty or a sweep could not make progress.
    ///
    /// Safe for any number of concurrent callers. Every staged node is
    /// returned to exactly one caller; a returned node has both links
    /// absent and is no longer reachable from the head.
    pub fn get_eviction_candidate(&self) -> Option<NodeId> {
        loop {
            if let Some(node) = self.buffer.claim() {
                #[cfg(feature = "metrics")]
                self.metrics.candidates_claimed.incr();
                return Some(node);
            }
            if self.list.is_empty() {
                return None;
            }
            if !self.prepare_eviction_candidates() {
                // The sweep gave up (over-churned or over-small list);
                // report no candidate and let the caller back off.
                return None;
            }
        }
    }

    /// Refills the staging buffer under the list mutex.
    ///
    /// Returns `true` if candidates are (or already were) available.
    fn prepare_eviction_candidates(&self) -> bool {
        let guard = self.list.lock_mutations();

        match &self.buffer {
            CandidateBuffer::Slots(slots) => {
                // A racing caller already refilled, or consumers have not
                // drained the previous batch yet.
                if slots.has_pending() {
                    return true;
                }
                #[cfg(feature = "metrics")]
                self.metrics.sweeps.incr();
                let produced = self.sweep(&guard, slots.capacity(), |idx, node| {
                    slots.publish(idx, node);
                    true
                });
                slots.finish_batch(produced);
                produced > 0
            }
            CandidateBuffer::Queue(queue) => {
                if queue.well_stocked() {
                    return true;
                }
                #[cfg(feature = "metrics")]
                self.metrics.sweeps.incr();
                let produced = self.sweep(&guard, queue.refill_target(), |_idx, node| {
                    let staged = queue.try_stage(node);
                    #[cfg(feature = "metrics")]
                    if !staged {
                        self.metrics.queue_stage_rejects.incr();
                    }
                    staged
                });
                produced > 0
            }
        }
    }

    /// One sweep of the hand: walks from the hand toward the head boundary,
    /// sparing accessed nodes and staging the rest until `target` nodes
    /// were handled or the turn limit was exceeded.
    ///
    /// `stage` receives `(batch_index, node)` and reports whether the node
    /// was actually staged; only staged nodes are unlinked.
    fn sweep(
        &self,
        guard: &ListGuard<'_>,
        target: usize,
        mut stage: impl FnMut(usize, NodeId) -> bool,
    ) -> usize {
        if target == 0 {
            return 0;
        }

        let mut produced = 0usize;
        let mut turns = 0u32;
        let mut curr = self.list.hand();
        let head_at_start = self.list.head();

        while produced < target {
            // SIEVE turns around at the snapshot so the sweep never touches
            // nodes inserted after it began; CLOCK relinks at the head, so
            // it has to track the live head instead.
            let boundary = match self.variant {
                SweepVariant::Sieve => head_at_start,
                SweepVariant::Clock => self.list.head(),
            };
            if curr.is_none() || curr == boundary {
                turns += 1;
                if turns > self.abort_turn_limit {
                    #[cfg(feature = "metrics")]
                    self.metrics.turn_limit_bailouts.incr();
                    break;
                }
                curr = self.list.tail();
                if curr.is_none() {
                    // The list emptied beneath the sweep.
                    break;
                }
            }
            let node = match curr {
                Some(node) => node,
                None => break,
            };

            // A node whose back-pointer is absent while it is not the live
            // head is a displaced head an in-flight insert has not patched
            // yet. Unlinking it now would skip that patch and orphan its
            // successors; leave it for a later pass.
            if self.list.prev(node).is_none() && self.list.head() != Some(node) {
                curr = None;
                continue;
            }

            if self.list.is_accessed(node) {
                match self.variant {
                    SweepVariant::Sieve => {
                        self.list.unmark_accessed(node);
                        curr = self.list.prev(node);
                    }
                    SweepVariant::Clock => {
                        let toward_head = self.list.prev(node);
                        guard.move_to_head(node);
                        curr = toward_head;
                    }
                }
                #[cfg(feature = "metrics")]
                self.metrics.second_chances.incr();
                continue;
            }

            let toward_head = self.list.prev(node);
            if stage(produced, node) {
                guard.unlink(node);
                self.list.clear_links(node);
            }
            produced += 1;
            curr = toward_head;
            if curr.is_none() {
                // The staged node was the tail; restart from the new tail.
                curr = self.list.tail();
            }
        }

        self.list.set_hand(curr);
        #[cfg(feature = "metrics")]
        self.metrics.candidates_published.add(produced as u64);
        produced
    }

    /// Verifies list invariants and that no staged candidate is still
    /// linked. Quiescent use only.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.list.check_invariants()?;
        if let CandidateBuffer::Slots(slots) = &self.buffer {
            for node in slots.staged() {
                if self.list.is_linked(node) {
                    return Err(InvariantError::new(format!(
                        "staged candidate {} is still linked",
                        node.index()
                    )));
                }
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

    /// Copies the engine counters. Requires the `metrics` feature.
    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> EngineMetricsSnapshot {
        self.metrics.snapshot(self.list.len(), self.buffer.capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ds::evict_buffer::BufferVariant;

    fn engine(node_capacity: usize, buffer_capacity: usize) -> SieveEngine {
        SieveEngine::builder(node_capacity)
            .buffer_capacity(buffer_capacity)
            .try_build()
            .unwrap()
    }

    fn id(index: usize) -> NodeId {
        NodeId(index)
    }

    #[test]
    fn empty_engine_has_no_candidate() {
        let engine = engine(8, 4);
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.get_eviction_candidate(), None);
        assert_eq!(engine.iter().count(), 0);
        engine.debug_validate_invariants();
    }

    #[test]
    fn single_unaccessed_node_is_evicted() {
        let engine = engine(8, 4);
        engine.link_at_head(id(0));

        assert_eq!(engine.get_eviction_candidate(), Some(id(0)));
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.get_eviction_candidate(), None);
        engine.debug_validate_invariants();
    }

    #[test]
    fn accessed_node_gets_a_second_chance() {
        // Insert a, b, c (c becomes head, a tail), touch a: the sweep must
        // spare a, clear its bit, and evict b instead.
        let engine = engine(8, 1);
        engine.link_at_head(id(0)); // a
        engine.link_at_head(id(1)); // b
        engine.link_at_head(id(2)); // c
        engine.mark_accessed(id(0));

        assert_eq!(engine.get_eviction_candidate(), Some(id(1)));
        assert!(!engine.is_accessed(id(0)));
        let remaining: Vec<_> = engine.iter().map(NodeId::index).collect();
        assert_eq!(remaining, vec![2, 0]);
        engine.debug_validate_invariants();
    }

    #[test]
    fn bulk_refill_sweeps_once_per_batch() {
        let engine = engine(128, 16);
        for index in 0..100 {
            engine.link_at_head(id(index));
        }

        // The first request fills the whole buffer in one sweep.
        assert!(engine.get_eviction_candidate().is_some());
        assert_eq!(engine.len(), 84);

        // The next fifteen drain the batch without touching the list.
        for _ in 0..15 {
            assert!(engine.get_eviction_candidate().is_some());
        }
        assert_eq!(engine.len(), 84);

        // The seventeenth forces another sweep.
        assert!(engine.get_eviction_candidate().is_some());
        assert_eq!(engine.len(), 68);
        engine.debug_validate_invariants();
    }

    #[test]
    fn candidates_come_out_oldest_first() {
        let engine = engine(8, 4);
        for index in 0..4 {
            engine.link_at_head(id(index));
        }

        assert_eq!(engine.get_eviction_candidate(), Some(id(0)));
        assert_eq!(engine.get_eviction_candidate(), Some(id(1)));
        assert_eq!(engine.get_eviction_candidate(), Some(id(2)));
        assert_eq!(engine.get_eviction_candidate(), Some(id(3)));
        assert_eq!(engine.get_eviction_candidate(), None);
    }

    #[test]
    fn candidate_is_fully_detached() {
        let engine = engine(8, 2);
        engine.link_at_head(id(0));
        engine.link_at_head(id(1));
        engine.link_at_head(id(2));

        let victim = engine.get_eviction_candidate().unwrap();
        let reachable: Vec<_> = engine.iter().collect();
        assert!(!reachable.contains(&victim));
        engine.debug_validate_invariants();
    }

    #[test]
    fn evicted_node_slot_can_be_relinked() {
        let engine = engine(4, 1);
        engine.link_at_head(id(0));
        engine.link_at_head(id(1));

        let victim = engine.get_eviction_candidate().unwrap();
        assert_eq!(victim, id(0));
        assert_eq!(engine.len(), 1);

        engine.link_at_head(victim);
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.head(), Some(victim));
        engine.debug_validate_invariants();
    }

    #[test]
    fn remove_of_hand_target_keeps_sweep_working() {
        let engine = engine(8, 1);
        engine.link_at_head(id(0));
        engine.link_at_head(id(1));
        engine.link_at_head(id(2));
        assert_eq!(engine.hand(), Some(id(0)));

        assert!(engine.remove(id(0)));
        assert_eq!(engine.hand(), Some(id(1)));

        // A sweep from the retreated hand still produces the oldest node.
        assert_eq!(engine.get_eviction_candidate(), Some(id(1)));
        assert_eq!(engine.len(), 1);
        engine.debug_validate_invariants();
    }

    #[test]
    fn all_accessed_nodes_survive_one_round_then_lose_the_bit() {
        let engine = engine(8, 2);
        for index in 0..3 {
            engine.link_at_head(id(index));
            engine.mark_accessed(id(index));
        }

        // The sweep clears the bits it visits, turns around at the head
        // snapshot, and stages the oldest two on its second pass. The
        // snapshot head itself is never visited and keeps its bit.
        assert_eq!(engine.get_eviction_candidate(), Some(id(0)));
        assert!(!engine.is_accessed(id(0)));
        assert!(!engine.is_accessed(id(1)));
        assert!(engine.is_accessed(id(2)));
        engine.debug_validate_invariants();
    }

    #[test]
    fn queue_variant_produces_candidates() {
        let engine = SieveEngine::builder(16)
            .buffer_capacity(4)
            .buffer_variant(BufferVariant::Queue)
            .try_build()
            .unwrap();
        for index in 0..8 {
            engine.link_at_head(id(index));
        }

        assert_eq!(engine.get_eviction_candidate(), Some(id(0)));
        assert_eq!(engine.get_eviction_candidate(), Some(id(1)));
        assert_eq!(engine.len(), 4);
        engine.debug_validate_invariants();
    }

    #[test]
    fn queue_variant_drains_to_empty() {
        let engine = SieveEngine::builder(8)
            .buffer_capacity(2)
            .buffer_variant(BufferVariant::Queue)
            .try_build()
            .unwrap();
        for index in 0..5 {
            engine.link_at_head(id(index));
        }

        let mut victims = Vec::new();
        while let Some(node) = engine.get_eviction_candidate() {
            victims.push(node.index());
        }
        victims.sort_unstable();
        assert_eq!(victims, vec![0, 1, 2, 3, 4]);
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn clock_variant_moves_accessed_nodes_to_head() {
        let engine = SieveEngine::builder(8)
            .buffer_capacity(1)
            .sweep_variant(SweepVariant::Clock)
            .try_build()
            .unwrap();
        engine.link_at_head(id(0));
        engine.link_at_head(id(1));
        engine.link_at_head(id(2));
        engine.mark_accessed(id(0));

        // CLOCK relocates the accessed tail to the head and keeps its bit.
        assert_eq!(engine.get_eviction_candidate(), Some(id(1)));
        assert!(engine.is_accessed(id(0)));
        assert_eq!(engine.head(), Some(id(0)));
        engine.debug_validate_invariants();
    }

    #[test]
    fn every_insert_eventually_becomes_exactly_one_candidate() {
        let engine = engine(64, 8);
        for index in 0..40 {
            engine.link_at_head(id(index));
        }

        let mut victims = Vec::new();
        while let Some(node) = engine.get_eviction_candidate() {
            victims.push(node.index());
        }
        victims.sort_unstable();
        assert_eq!(victims, (0..40).collect::<Vec<_>>());
        assert_eq!(engine.len(), 0);
    }

    #[cfg(feature = "metrics")]
    mod metrics {
        use super::*;

        #[test]
        fn sweep_counters_track_refills() {
            let engine = engine(64, 16);
            for index in 0..40 {
                engine.link_at_head(id(index));
            }

            for _ in 0..16 {
                engine.get_eviction_candidate();
            }
            let snap = engine.metrics_snapshot();
            assert_eq!(snap.sweeps, 1);
            assert_eq!(snap.candidates_published, 16);
            assert_eq!(snap.candidates_claimed, 16);
        }
    }
}
