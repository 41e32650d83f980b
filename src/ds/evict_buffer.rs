//! Staging buffers for detached eviction candidates.
//!
//! A sweep detaches un-accessed nodes from the list and parks them here;
//! consumer threads then claim them without touching the list mutex. Two
//! shapes are provided:
//!
//! - [`CandidateSlots`] (default): a fixed slot array. The producer fills
//!   slots `0..k`, publishes `k`, and resets the claim counter; consumers
//!   take `fetch_add` tickets against the published count. Before reusing a
//!   slot the producer waits for the slow consumer still holding the
//!   previous batch's entry to drain it.
//! - [`CandidateQueue`]: a bounded MPMC queue. The producer only detaches a
//!   node once its push succeeded, so nothing is ever orphaned; a full
//!   queue makes the sweep skip the node instead.
//!
//! Either way, a staged node is returned to exactly one consumer and is
//! never simultaneously linked in the list.
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::ArrayQueue;

use crate::ds::hook::{AtomicLink, NodeId};

/// Buffer shape used to stage eviction candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferVariant {
    /// Fixed slot array with a claim counter (default).
    SlotArray,
    /// Bounded MPMC queue.
    Queue,
}

/// Fixed slot array staging buffer.
#[derive(Debug)]
pub(crate) struct CandidateSlots {
    slots: Box<[AtomicLink]>,
    /// Ticket counter; the next slot index handed to a consumer.
    claim_idx: AtomicUsize,
    /// Number of candidates the last sweep published.
    published: AtomicUsize,
}

impl CandidateSlots {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, AtomicLink::none);
        Self {
            slots: slots.into_boxed_slice(),
            claim_idx: AtomicUsize::new(0),
            published: AtomicUsize::new(0),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// True while the previous batch still has unclaimed tickets; the
    /// refill early-exits in that case instead of sweeping again.
    pub(crate) fn has_pending(&self) -> bool {
        self.claim_idx.load(Ordering::Acquire) < self.published.load(Ordering::Acquire)
    }

    /// Claims one staged candidate, or `None` when the batch is exhausted.
    pub(crate) fn claim(&self) -> Option<NodeId> {
        let idx = self.claim_idx.fetch_add(1, Ordering::AcqRel);
        if idx >= self.published.load(Ordering::Acquire) {
            return None;
        }
        let taken = self.slots[idx].swap(None);
        debug_assert!(taken.is_some(), "claimed slot {idx} held no candidate");
        taken
    }

    /// Stores a candidate into `idx`. Producer side; the sweep mutex must
    /// be held so there is a single producer.
    ///
    /// Waits for the consumer still holding this slot's entry from the
    /// previous batch, spinning briefly and then yielding.
    pub(crate) fn publish(&self, idx: usize, node: NodeId) {
        let slot = &self.slots[idx];
        let mut spins = 0u32;
        while slot.load().is_some() {
            spins = spins.wrapping_add(1);
            if spins % 64 == 0 {
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
        slot.store(Some(node));
    }

    /// Publishes the batch size and reopens claims. Called once per sweep,
    /// after every slot in `0..produced` has been stored.
    pub(crate) fn finish_batch(&self, produced: usize) {
        self.published.store(produced, Ordering::Release);
        self.claim_idx.store(0, Ordering::Release);
    }

    /// Candidates currently staged and unclaimed. Diagnostics only.
    pub(crate) fn staged(&self) -> Vec<NodeId> {
        self.slots.iter().filter_map(AtomicLink::load).collect()
    }
}

/// Bounded MPMC queue staging buffer.
#[derive(Debug)]
pub(crate) struct CandidateQueue {
    queue: ArrayQueue<NodeId>,
}

impl CandidateQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub(crate) fn claim(&self) -> Option<NodeId> {
        self.queue.pop()
    }

    /// True while occupancy is above three quarters of capacity; the
    /// refill early-exits in that case.
    pub(crate) fn well_stocked(&self) -> bool {
        self.queue.len() > self.queue.capacity() / 4 * 3
    }

    pub(crate) fn refill_target(&self) -> usize {
        self.queue.capacity() - self.queue.len()
    }

    /// Attempts to stage a candidate; `false` means the queue was full and
    /// the node must not be detached.
    pub(crate) fn try_stage(&self, node: NodeId) -> bool {
        self.queue.push(node).is_ok()
    }
}

/// Dispatch over the two buffer shapes.
#[derive(Debug)]
pub(crate) enum CandidateBuffer {
    Slots(CandidateSlots),
    Queue(CandidateQueue),
}

impl CandidateBuffer {
    pub(crate) fn new(variant: BufferVariant, capacity: usize) -> Self {
        match variant {
            BufferVariant::SlotArray => Self::Slots(CandidateSlots::new(capacity)),
            BufferVariant::Queue => Self::Queue(CandidateQueue::new(capacity)),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        match self {
            Self::Slots(slots) => slots.capacity(),
            Self::Queue(queue) => queue.capacity(),
        }
    }

    pub(crate) fn claim(&self) -> Option<NodeId> {
        match self {
            Self::Slots(slots) => slots.claim(),
            Self::Queue(queue) => queue.claim(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_claim_before_publish_is_empty() {
        let slots = CandidateSlots::new(4);
        assert!(!slots.has_pending());
        assert_eq!(slots.claim(), None);
    }

    #[test]
    fn slots_batch_claims_in_order_then_exhausts() {
        let slots = CandidateSlots::new(4);
        slots.publish(0, NodeId(10));
        slots.publish(1, NodeId(11));
        slots.publish(2, NodeId(12));
        slots.finish_batch(3);

        assert!(slots.has_pending());
        assert_eq!(slots.claim(), Some(NodeId(10)));
        assert_eq!(slots.claim(), Some(NodeId(11)));
        assert_eq!(slots.claim(), Some(NodeId(12)));
        assert_eq!(slots.claim(), None);
        assert!(!slots.has_pending());
    }

    #[test]
    fn slots_failed_claims_do_not_block_next_batch() {
        let slots = CandidateSlots::new(2);
        // Stale consumers burn tickets against an empty buffer.
        assert_eq!(slots.claim(), None);
        assert_eq!(slots.claim(), None);

        slots.publish(0, NodeId(1));
        slots.finish_batch(1);
        assert_eq!(slots.claim(), Some(NodeId(1)));
        assert_eq!(slots.claim(), None);
    }

    #[test]
    fn slots_staged_lists_unclaimed_entries() {
        let slots = CandidateSlots::new(4);
        slots.publish(0, NodeId(1));
        slots.publish(1, NodeId(2));
        slots.finish_batch(2);
        assert_eq!(slots.staged(), vec![NodeId(1), NodeId(2)]);

        slots.claim();
        assert_eq!(slots.staged(), vec![NodeId(2)]);
    }

    #[test]
    fn queue_stage_and_claim_fifo() {
        let queue = CandidateQueue::new(2);
        assert!(queue.try_stage(NodeId(1)));
        assert!(queue.try_stage(NodeId(2)));
        assert!(!queue.try_stage(NodeId(3)));

        assert_eq!(queue.claim(), Some(NodeId(1)));
        assert_eq!(queue.claim(), Some(NodeId(2)));
        assert_eq!(queue.claim(), None);
    }

    #[test]
    fn queue_well_stocked_threshold() {
        let queue = CandidateQueue::new(8);
        assert!(!queue.well_stocked());
        for idx in 0..7 {
            queue.try_stage(NodeId(idx));
        }
        assert!(queue.well_stocked());
        assert_eq!(queue.refill_target(), 1);
    }

    #[test]
    fn buffer_dispatches_both_variants() {
        let slots = CandidateBuffer::new(BufferVariant::SlotArray, 4);
        assert_eq!(slots.capacity(), 4);
        assert_eq!(slots.claim(), None);

        let queue = CandidateBuffer::new(BufferVariant::Queue, 4);
        assert_eq!(queue.capacity(), 4);
        assert_eq!(queue.claim(), None);
    }
}
