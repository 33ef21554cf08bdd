use core::cell::Cell;
use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use core::sync::atomic::{AtomicBool, AtomicUsize};

use crossbeam_utils::CachePadded;

use crate::error::Oversubscribed;
use crate::lock::RawMutex;
use crate::relax::{Relax, Spin};

/// One slot per concurrent thread, on its own cache line.
struct Slot {
    /// Exactly one slot is granted at any time; the ticket owner mapping to
    /// it may enter.
    granted: AtomicBool,
    /// Occupancy marker. A claimant that finds it already set shares its
    /// slot with a live thread: the lock is oversubscribed.
    in_use: AtomicBool,
}

/// An array-based queue mutex.
///
/// Each acquire draws a ticket from a free-running counter and spins on the
/// `granted` flag of slot `ticket % N`; releasing grants the next slot, so
/// handoff follows ticket order. `N` bounds the number of threads that may
/// hold or wait on the lock at once and must be a power of two, which keeps
/// the slot mapping continuous when the ticket counter wraps.
///
/// Exceeding `N` concurrent threads folds two claimants onto one slot; the
/// loser of the occupancy flag is rejected with [`Oversubscribed`]. There is
/// no timeout support: a waiter spins until its slot is granted.
///
/// # Example
///
/// ```
/// use exclusive::array::spins::Mutex;
///
/// let mutex = Mutex::<4>::new();
/// mutex.lock().unwrap();
/// // SAFETY: this thread just acquired the mutex.
/// unsafe { mutex.unlock() };
/// ```
pub struct Mutex<const N: usize, R = Spin> {
    slots: Box<[CachePadded<Slot>]>,
    /// Next ticket. Free-running: reduce modulo `N` before indexing.
    tail: CachePadded<AtomicUsize>,
    /// The holder's slot. Read and written under exclusion only.
    active: Cell<usize>,
    relax: PhantomData<R>,
}

// SAFETY: slots are only touched through atomics and the `active` cell is
// reserved to the thread currently holding the lock.
unsafe impl<const N: usize, R> Send for Mutex<N, R> {}
unsafe impl<const N: usize, R> Sync for Mutex<N, R> {}

impl<const N: usize, R> Mutex<N, R> {
    const POWER_OF_TWO: () = assert!(N.is_power_of_two(), "slot count must be a power of 2");

    /// Creates an unlocked mutex with slot 0 ready to grant.
    pub fn new() -> Self {
        let () = Self::POWER_OF_TWO;
        let slots: Box<[CachePadded<Slot>]> = (0..N)
            .map(|index| {
                CachePadded::new(Slot {
                    granted: AtomicBool::new(index == 0),
                    in_use: AtomicBool::new(false),
                })
            })
            .collect();

        Self {
            slots,
            tail: CachePadded::new(AtomicUsize::new(0)),
            active: Cell::new(0),
            relax: PhantomData,
        }
    }

    /// Releases the mutex, granting the next ticket's slot.
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold the mutex.
    pub unsafe fn unlock(&self) {
        let slot = self.active.get();
        let next = (slot + 1) % N;

        self.slots[slot].granted.store(false, Relaxed);
        // Publication of this clear rides on the release store below.
        self.slots[next].in_use.store(false, Relaxed);
        // Pairs with the acquire load in `lock` by the next ticket's owner.
        self.slots[next].granted.store(true, Release);
    }
}

impl<const N: usize, R: Relax> Mutex<N, R> {
    /// Acquires the mutex, blocking until this thread's ticket is granted.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`] when more than `N` threads hold or wait on the
    /// lock at once. Detection is best-effort: which of the colliding
    /// claimants is rejected depends on who reaches the shared slot first.
    pub fn lock(&self) -> Result<(), Oversubscribed> {
        let slot = self.tail.fetch_add(1, Relaxed) % N;

        let mut relax = R::new();
        // Pairs with the release store in `unlock` of the previous ticket.
        while !self.slots[slot].granted.load(Acquire) {
            relax.relax();
        }

        if self.slots[slot].in_use.swap(true, AcqRel) {
            return Err(Oversubscribed::new(N));
        }

        self.active.set(slot);
        Ok(())
    }
}

impl<const N: usize, R> Default for Mutex<N, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, R> Debug for Mutex<N, R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").finish_non_exhaustive()
    }
}

// SAFETY: a single slot is granted at a time, grants move in ticket order,
// and the occupancy flag rejects surplus claimants of a shared slot.
unsafe impl<const N: usize, R: Relax> RawMutex for Mutex<N, R> {
    fn lock(&self) -> Result<(), Oversubscribed> {
        Self::lock(self)
    }

    unsafe fn unlock(&self) {
        // SAFETY: forwarded precondition: the caller holds the mutex.
        unsafe { Self::unlock(self) }
    }
}

#[cfg(test)]
mod test {
    use super::Mutex;
    use crate::relax::Spin;

    #[test]
    fn smoke() {
        let mutex = Mutex::<4, Spin>::new();
        // More cycles than slots, so tickets wrap around the array.
        for _ in 0..10 {
            mutex.lock().unwrap();
            // SAFETY: just acquired.
            unsafe { mutex.unlock() };
        }
    }

    #[test]
    fn single_slot_reuse() {
        let mutex = Mutex::<1, Spin>::new();
        mutex.lock().unwrap();
        // SAFETY: just acquired.
        unsafe { mutex.unlock() };
        mutex.lock().unwrap();
        // SAFETY: just acquired.
        unsafe { mutex.unlock() };
    }

    #[test]
    fn single_slot_rejects_second_claimant() {
        let mutex = Mutex::<1, Spin>::new();
        mutex.lock().unwrap();

        // The surplus claim folds onto the held slot and must lose the
        // occupancy flag.
        let err = mutex.lock().unwrap_err();
        assert_eq!(err.limit(), 1);

        // SAFETY: held since the first claim.
        unsafe { mutex.unlock() };
    }
}
