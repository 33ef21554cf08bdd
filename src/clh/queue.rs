//! The fixed node pool and its free queue.
//!
//! Every queue mutex owns a pool of nodes sized at construction; acquiring
//! never allocates. Unused nodes wait on a single-ended FIFO in the style of
//! the Michael-Scott queue: `head` is a position marker, [`try_pop`] returns
//! the old head and promotes its successor, [`push`] swings `tail` and links
//! the old tail forward. Producers and consumers touch disjoint ends, both
//! padded to their own cache line.
//!
//! [`push`]: FreeQueue::push
//! [`try_pop`]: FreeQueue::try_pop

use core::cell::Cell;
use core::mem::size_of;
use core::ptr::{self, NonNull};
use core::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use core::sync::atomic::{AtomicBool, AtomicPtr};

use crossbeam_utils::CachePadded;

/// One cell of the wait chain.
///
/// A node is owned by exactly one party at a time: the free queue, the
/// mutex's `tail` slot, a thread mid-acquire, or the current holder. Its
/// fields change meaning with the owner, and the happens-before edges below
/// are what make the handoffs sound.
pub(super) struct Node {
    /// Intrusive link to the next free node. Meaningful only while the node
    /// sits on the free queue, but kept atomic regardless: a consumer that
    /// lost the pop race may still load it while the winner already rewrites
    /// the node for an acquire.
    pub(super) next: AtomicPtr<Node>,

    /// The abandoning owner's own predecessor. Non-null exactly when the
    /// owning thread timed out after enqueueing; the successor follows it to
    /// skip the dead waiter. Written only by the owner before its release
    /// store of `locked`, read only by the successor after observing that
    /// store, so no two threads ever touch it concurrently.
    pub(super) pred: Cell<*mut Node>,

    /// Whether the owning thread wants or holds the lock. The `true` to
    /// `false` transition is the release signal its successor spins on.
    pub(super) locked: AtomicBool,
}

impl Node {
    fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            pred: Cell::new(ptr::null_mut()),
            locked: AtomicBool::new(false),
        }
    }
}

fn node_ptr(slot: &CachePadded<Node>) -> *mut Node {
    let node: &Node = slot;
    (node as *const Node).cast_mut()
}

/// The free list, owning the backing storage of every node.
///
/// Storage lives in its own heap allocation so that node addresses survive
/// the owning mutex moving between stack slots or containers.
pub(super) struct FreeQueue {
    storage: Box<[CachePadded<Node>]>,
    head: CachePadded<AtomicPtr<Node>>,
    tail: CachePadded<AtomicPtr<Node>>,
}

// SAFETY: nodes are only mutated through atomics, except for `pred`, whose
// single-writer handoff is documented on the field.
unsafe impl Send for FreeQueue {}
unsafe impl Sync for FreeQueue {}

impl FreeQueue {
    /// Creates a queue of `capacity` freshly linked nodes.
    pub(super) fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity >= 2, "one node is always kept as the position marker");
        let storage: Box<[CachePadded<Node>]> =
            (0..capacity).map(|_| CachePadded::new(Node::new())).collect();

        for index in 0..capacity - 1 {
            let next = node_ptr(&storage[index + 1]);
            storage[index].next.store(next, Relaxed);
        }
        let head = node_ptr(&storage[0]);
        let tail = node_ptr(&storage[capacity - 1]);

        Self {
            storage,
            head: CachePadded::new(AtomicPtr::new(head)),
            tail: CachePadded::new(AtomicPtr::new(tail)),
        }
    }

    /// Publishes `node` as the new queue tail.
    ///
    /// Producers may race: a waiter recycling its released predecessor can
    /// run concurrently with an acquirer returning a node it reserved but
    /// never enqueued. The swap serializes them; a consumer that lands in
    /// the window before the old tail's `next` is linked sees a shorter
    /// queue and tries again.
    pub(super) fn push(&self, node: NonNull<Node>) {
        debug_assert!(self.owns(node.as_ptr()));
        // SAFETY: `node` points into `self.storage`, which is alive as long
        // as `self` is.
        unsafe { node.as_ref() }.next.store(ptr::null_mut(), Relaxed);
        let prev = self.tail.swap(node.as_ptr(), AcqRel);
        // Pairs with the acquire load of `next` in `try_pop`.
        // SAFETY: `prev` also points into `self.storage`.
        unsafe { &(*prev).next }.store(node.as_ptr(), Release);
    }

    /// Attempts to dequeue a free node.
    ///
    /// Returns the old head, promoting its successor; the queue never gives
    /// up its last node. `None` means the queue looked empty, which is also
    /// the permitted answer under the classic interleaving where the whole
    /// queue turns over between the head load and the `next` load, leaving
    /// `next` stale. Callers poll again under their own deadline.
    pub(super) fn try_pop(&self) -> Option<NonNull<Node>> {
        // Pairs with the release on a winning consumer's head exchange.
        let mut head = self.head.load(Acquire);
        loop {
            // Pairs with the release store of `next` in `push`.
            // SAFETY: `head` points into `self.storage`.
            let next = unsafe { &(*head).next }.load(Acquire);
            if next.is_null() {
                return None;
            }
            match self.head.compare_exchange_weak(head, next, Release, Acquire) {
                // SAFETY: every published head is derived from storage,
                // never null.
                Ok(_) => return Some(unsafe { NonNull::new_unchecked(head) }),
                Err(observed) => head = observed,
            }
        }
    }

    /// Whether `node` points into this queue's backing storage.
    pub(super) fn owns(&self, node: *const Node) -> bool {
        let base = self.storage.as_ptr() as usize;
        let end = base + self.storage.len() * size_of::<CachePadded<Node>>();
        (base..end).contains(&(node as usize))
    }
}

#[cfg(test)]
mod test {
    use super::FreeQueue;

    #[test]
    fn drains_to_all_but_the_position_marker() {
        let queue = FreeQueue::with_capacity(5);
        let mut popped = Vec::new();
        while let Some(node) = queue.try_pop() {
            assert!(queue.owns(node.as_ptr()));
            popped.push(node);
        }
        assert_eq!(popped.len(), 4);
    }

    #[test]
    fn round_trips_nodes_in_fifo_order() {
        let queue = FreeQueue::with_capacity(3);
        let first = queue.try_pop().unwrap();
        let second = queue.try_pop().unwrap();
        assert!(queue.try_pop().is_none());

        queue.push(first);
        queue.push(second);

        // The marker node comes back first, then the pushed ones in order.
        let mut popped = Vec::new();
        while let Some(node) = queue.try_pop() {
            popped.push(node.as_ptr());
        }
        assert_eq!(popped.len(), 2);
        assert_eq!(popped[1], first.as_ptr());
    }

    #[test]
    fn rejects_foreign_pointers() {
        let queue = FreeQueue::with_capacity(2);
        let other = FreeQueue::with_capacity(2);
        let node = other.try_pop().unwrap();
        assert!(!queue.owns(node.as_ptr()));
    }
}
