use core::cell::Cell;
use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use core::sync::atomic::Ordering::{Acquire, Relaxed, Release};
use core::sync::atomic::{AtomicPtr, AtomicUsize};

use crossbeam_utils::CachePadded;

use super::queue::{FreeQueue, Node};
use crate::clock::{Clock, Monotonic};
use crate::error::Oversubscribed;
use crate::failure::{Policy, Retry};
use crate::lock::{RawMutex, RawMutexTimed};
use crate::relax::{Relax, Spin};

/// A queue mutex with deadline-bounded acquisition over a fixed node pool.
///
/// Waiters form a chain: each acquire exchanges itself into `tail` and spins
/// on the flag of whatever node it displaced, so every thread waits on its
/// own cache line and acquisitions among enqueued threads are first come,
/// first served. The pool holds `N + 2` nodes, all allocated when the mutex
/// is created: `N` for concurrent waiters, one seeding `tail`, one kept by
/// the free queue as its position marker.
///
/// A waiter whose deadline passes abandons its place instead of blocking the
/// chain. It marks its node with the predecessor it was waiting on and
/// releases the node's flag; the successor skips over it, recycling every
/// abandoned node it walks past. Symmetrically, a released node is always
/// recycled by the thread that observed the release, never by the thread
/// that performed it, so a node cannot return to the pool while its waiter
/// still reads it.
///
/// The mutex is generic over its relax strategy `R`, its time source `C`
/// and its [`failure`] policy `F`.
///
/// # Example
///
/// ```
/// use exclusive::clh::spins::Mutex;
///
/// let mutex = Mutex::<4>::new();
///
/// assert!(mutex.try_lock().unwrap());
/// assert_eq!(mutex.queue_count(), 1);
/// // SAFETY: this thread just acquired the mutex.
/// unsafe { mutex.unlock() };
/// ```
///
/// [`failure`]: crate::failure
pub struct Mutex<const N: usize, R = Spin, C = Monotonic, F = Retry> {
    free: FreeQueue,
    /// Most recently enqueued node; what the next arrival will wait on.
    tail: CachePadded<AtomicPtr<Node>>,
    /// The holder's node. Read and written under exclusion only.
    active: Cell<*mut Node>,
    /// Successful enqueues since construction.
    queue_count: AtomicUsize,
    clock: C,
    relax: PhantomData<R>,
    failure: PhantomData<F>,
}

// SAFETY: same shape as the standard library mutex: all cross-thread state
// is handed off through the atomics above, and the `active` cell is only
// touched by the thread currently holding the lock. The clock handle is the
// only field shared as-is.
unsafe impl<const N: usize, R, C: Send, F> Send for Mutex<N, R, C, F> {}
unsafe impl<const N: usize, R, C: Sync, F> Sync for Mutex<N, R, C, F> {}

impl<const N: usize, R, C, F> Mutex<N, R, C, F> {
    const HAS_SLOTS: () = assert!(N > 0, "number of waiter slots must be greater than 0");

    /// Pool size: `N` waiters, one initial tail, one free-queue marker.
    const POOL: usize = N + 2;

    /// Creates an unlocked mutex reading time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        let () = Self::HAS_SLOTS;
        let free = FreeQueue::with_capacity(Self::POOL);
        let Some(initial) = free.try_pop() else {
            unreachable!("a fresh pool holds at least two linked nodes")
        };
        // SAFETY: `initial` is backed by `free`, which lives as long as the
        // mutex, and no other thread can reach it yet.
        unsafe { initial.as_ref() }.locked.store(false, Relaxed);

        Self {
            free,
            tail: CachePadded::new(AtomicPtr::new(initial.as_ptr())),
            active: Cell::new(ptr::null_mut()),
            queue_count: AtomicUsize::new(0),
            clock,
            relax: PhantomData,
            failure: PhantomData,
        }
    }

    /// Number of successful enqueues since construction.
    ///
    /// Monotonic. Exposed for observability and for test synchronization;
    /// a reader that sees the counter reach `n` also sees the `n`-th waiter
    /// published in the chain.
    pub fn queue_count(&self) -> usize {
        // Pairs with the release increment in `try_lock_until`.
        self.queue_count.load(Acquire)
    }
}

impl<const N: usize, R, C: Default, F> Mutex<N, R, C, F> {
    /// Creates an unlocked mutex with a default-constructed clock.
    pub fn new() -> Self {
        Self::with_clock(C::default())
    }
}

impl<const N: usize, R, C: Default, F> Default for Mutex<N, R, C, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, R: Relax, C: Clock, F: Policy> Mutex<N, R, C, F> {
    /// Acquires the mutex, blocking the current thread until it is held.
    ///
    /// Implemented as a deadline acquire against [`Clock::far_future`].
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`] under the [`Die`] policy when the node pool is
    /// empty at acquire time. The [`Retry`] policy never errors; it keeps
    /// waiting for a node instead.
    ///
    /// [`Die`]: crate::failure::Die
    pub fn lock(&self) -> Result<(), Oversubscribed> {
        while !self.try_lock_until(self.clock.far_future())? {}
        Ok(())
    }

    /// Attempts to acquire the mutex without waiting.
    ///
    /// Succeeds only when a pool node is immediately available and no
    /// predecessor is holding or queued.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`], as for [`lock`](Self::lock).
    pub fn try_lock(&self) -> Result<bool, Oversubscribed> {
        self.try_lock_until(self.clock.now())
    }

    /// Attempts to acquire the mutex before `timeout` elapses.
    ///
    /// A non-positive timeout (expressible with signed clock spans) is
    /// legal and still succeeds against an uncontended mutex.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`], as for [`lock`](Self::lock).
    pub fn try_lock_for(&self, timeout: C::Duration) -> Result<bool, Oversubscribed> {
        self.try_lock_until(self.clock.deadline(timeout))
    }

    /// Attempts to acquire the mutex before the clock reaches `deadline`.
    ///
    /// Returns `Ok(false)` when the deadline passes first, whether while
    /// waiting for a pool node, while racing for the tail, or while spinning
    /// on the predecessor.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`], as for [`lock`](Self::lock).
    pub fn try_lock_until(&self, deadline: C::Instant) -> Result<bool, Oversubscribed> {
        let Some(node) = self.reserve_node(deadline)? else {
            return Ok(false);
        };
        // SAFETY: the node came from this mutex's pool and stays invisible
        // to other threads until the tail exchange below.
        let node_ref = unsafe { node.as_ref() };

        // Intent only; the handshake happens at the tail exchange.
        node_ref.locked.store(true, Relaxed);

        // Pairs with the release on a predecessor's winning tail exchange,
        // so the observed node is fully initialized.
        let mut pred = self.tail.load(Acquire);
        while let Err(observed) =
            self.tail.compare_exchange_weak(pred, node.as_ptr(), Release, Acquire)
        {
            pred = observed;
            if self.clock.now() >= deadline {
                // No successor has seen the node; hand it straight back.
                self.free.push(node);
                return Ok(false);
            }
        }

        // Pairs with the acquire load in `queue_count`.
        self.queue_count.fetch_add(1, Release);

        let mut relax = R::new();
        loop {
            // Pairs with the release store of `locked` by the predecessor's
            // owner, on release or abandonment.
            while unsafe { &(*pred).locked }.load(Acquire) {
                if self.clock.now() >= deadline {
                    // Leave a trail for the successor, then wake it. The
                    // node stays out of the pool: the successor recycles it
                    // after reading both fields.
                    node_ref.pred.set(pred);
                    node_ref.locked.store(false, Release);
                    return Ok(false);
                }
                relax.relax();
            }

            // The predecessor released; from here only this thread can
            // still reach it.
            let abandoned = unsafe { &(*pred).pred }.get();
            // SAFETY: `pred` was published through `tail` or through an
            // abandoned node's trail, both of which point into the pool.
            self.free.push(unsafe { NonNull::new_unchecked(pred) });
            if abandoned.is_null() {
                break;
            }
            // The predecessor quit before its turn; adopt whoever it was
            // waiting on and keep spinning.
            pred = abandoned;
        }

        self.active.set(node.as_ptr());
        Ok(true)
    }

    /// Releases the mutex.
    ///
    /// The holder's node is not recycled here. The successor returns it to
    /// the pool after observing the release, so the node cannot be reused
    /// while a waiter still reads its fields.
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold the mutex.
    pub unsafe fn unlock(&self) {
        let active = self.active.get();
        debug_assert!(!active.is_null(), "unlock of a mutex that is not held");
        // SAFETY: the holder stored its own pool node in `active` when it
        // acquired, and the caller guarantees it still holds the lock.
        let node = unsafe { &*active };
        // The holder never abandoned, by definition.
        node.pred.set(ptr::null_mut());
        // Pairs with the acquire load in the successor's wait loop.
        node.locked.store(false, Release);
    }

    /// Polls the free queue until a node is available or the deadline
    /// passes. The failure policy is consulted on every empty poll made
    /// before the deadline.
    fn reserve_node(&self, deadline: C::Instant) -> Result<Option<NonNull<Node>>, Oversubscribed> {
        let mut node = self.free.try_pop();
        let mut relax = R::new();
        while node.is_none() && self.clock.now() < deadline {
            F::pool_exhausted(N)?;
            relax.relax();
            node = self.free.try_pop();
        }
        Ok(node)
    }
}

impl<const N: usize, R, C, F> Debug for Mutex<N, R, C, F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("queue_count", &self.queue_count.load(Acquire))
            .finish_non_exhaustive()
    }
}

// SAFETY: an acquire returns only after every predecessor in its chain has
// released, and the chain order is fixed by the tail exchanges.
unsafe impl<const N: usize, R: Relax, C: Clock, F: Policy> RawMutex for Mutex<N, R, C, F> {
    fn lock(&self) -> Result<(), Oversubscribed> {
        Self::lock(self)
    }

    unsafe fn unlock(&self) {
        // SAFETY: forwarded precondition: the caller holds the mutex.
        unsafe { Self::unlock(self) }
    }
}

// SAFETY: as for the `RawMutex` implementation above.
unsafe impl<const N: usize, R: Relax, C: Clock, F: Policy> RawMutexTimed for Mutex<N, R, C, F> {
    type Duration = C::Duration;
    type Instant = C::Instant;

    fn try_lock(&self) -> Result<bool, Oversubscribed> {
        Self::try_lock(self)
    }

    fn try_lock_for(&self, timeout: C::Duration) -> Result<bool, Oversubscribed> {
        Self::try_lock_for(self, timeout)
    }

    fn try_lock_until(&self, deadline: C::Instant) -> Result<bool, Oversubscribed> {
        Self::try_lock_until(self, deadline)
    }
}
