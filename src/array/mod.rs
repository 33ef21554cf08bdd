//! An array-based queue mutex.
//!
//! The simpler sibling of the [`clh`] mutex: instead of a linked chain of
//! pool nodes, waiters spin on the flags of a fixed, cache-line-padded slot
//! array indexed by ticket. Handoff follows ticket order and each thread
//! spins on its own line, but there are no deadlines and no abandonment;
//! use it for cache-local, single-scope critical sections with at most `N`
//! participating threads.
//!
//! The modules below fix the relax strategy to the common choices.
//!
//! [`clh`]: crate::clh

mod mutex;

pub use mutex::Mutex;

/// An array mutex that signals the processor it is busy-waiting during lock
/// contention.
pub mod spins {
    use crate::relax::Spin;

    /// An [`array::Mutex`] that spins with a processor hint while waiting.
    ///
    /// # Example
    ///
    /// ```
    /// use exclusive::array::spins::Mutex;
    ///
    /// let mutex = Mutex::<2>::new();
    /// mutex.lock().unwrap();
    /// // SAFETY: this thread just acquired the mutex.
    /// unsafe { mutex.unlock() };
    /// ```
    /// [`array::Mutex`]: super::Mutex
    pub type Mutex<const N: usize> = super::Mutex<N, Spin>;
}

/// An array mutex that yields its time slice to the OS scheduler during
/// lock contention.
pub mod yields {
    use crate::relax::Yield;

    /// An [`array::Mutex`] that yields to the scheduler while waiting.
    ///
    /// [`array::Mutex`]: super::Mutex
    pub type Mutex<const N: usize> = super::Mutex<N, Yield>;
}
