//! A queue mutex over a fixed node pool, with timed acquisition.
//!
//! Waiting threads form a chain in which each spins against its own,
//! locally-accessible flag released by its predecessor, so lock handoff is
//! first come, first served among enqueued threads and costs O(1) remote
//! traffic per acquisition. Unlike the textbook formulation, nodes are not
//! allocated per acquire: the mutex owns a pool of `N + 2` nodes and a
//! lock-free free list, so acquiring never touches the allocator and the
//! number of concurrent waiters is bounded by construction.
//!
//! On top of that pool sits deadline support: [`try_lock_for`] and
//! [`try_lock_until`] let a waiter abandon the chain when its deadline
//! passes, leaving a marked node that successors skip and recycle. See
//! [`Mutex`] for the protocol details.
//!
//! The mutex is generic over the relax strategy, over the [`Clock`] the
//! deadlines are measured against, and over the [`failure`] policy applied
//! when more than `N` threads race for the pool. The modules below fix the
//! relax strategy to the common choices.
//!
//! [`try_lock_for`]: Mutex::try_lock_for
//! [`try_lock_until`]: Mutex::try_lock_until
//! [`Clock`]: crate::clock::Clock
//! [`failure`]: crate::failure

mod mutex;
mod queue;

pub use mutex::Mutex;

/// A queue mutex that signals the processor it is busy-waiting during lock
/// contention.
pub mod spins {
    use crate::relax::Spin;

    /// A [`clh::Mutex`] that spins with a processor hint while waiting.
    ///
    /// # Example
    ///
    /// ```
    /// use exclusive::clh::spins::Mutex;
    ///
    /// let mutex = Mutex::<2>::new();
    /// assert!(mutex.try_lock().unwrap());
    /// // SAFETY: this thread just acquired the mutex.
    /// unsafe { mutex.unlock() };
    /// ```
    /// [`clh::Mutex`]: super::Mutex
    pub type Mutex<const N: usize> = super::Mutex<N, Spin>;

    /// A queue mutex that spins with exponential backoff during lock
    /// contention.
    pub mod backoff {
        use crate::relax::SpinBackoff;

        /// A [`clh::Mutex`] that spins with bounded exponential backoff.
        ///
        /// [`clh::Mutex`]: super::super::Mutex
        pub type Mutex<const N: usize> = super::super::Mutex<N, SpinBackoff>;
    }
}

/// A queue mutex that yields its time slice to the OS scheduler during lock
/// contention.
pub mod yields {
    use crate::relax::Yield;

    /// A [`clh::Mutex`] that yields to the scheduler while waiting.
    ///
    /// # Example
    ///
    /// ```
    /// use exclusive::clh::yields::Mutex;
    ///
    /// let mutex = Mutex::<2>::new();
    /// assert!(mutex.try_lock().unwrap());
    /// // SAFETY: this thread just acquired the mutex.
    /// unsafe { mutex.unlock() };
    /// ```
    /// [`clh::Mutex`]: super::Mutex
    pub type Mutex<const N: usize> = super::Mutex<N, Yield>;
}
