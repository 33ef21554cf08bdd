//! The locking contract connecting mutexes to [`SharedResource`].
//!
//! These traits describe the minimal surface a mutex must offer to guard a
//! resource: a blocking acquire and a release, plus deadline-bounded
//! acquires for mutexes that understand time. `Duration` and `Instant` are
//! associated types so that an implementation can surface whatever its
//! [`Clock`] uses, signed fake-clock spans included.
//!
//! [`SharedResource`]: crate::resource::SharedResource
//! [`Clock`]: crate::clock::Clock

use crate::error::Oversubscribed;

/// A raw mutual exclusion primitive.
///
/// Acquisition errors are limited to [`Oversubscribed`]; a mutex that cannot
/// detect oversubscription simply never returns `Err`.
///
/// # Safety
///
/// Implementations must guarantee that between a successful return from
/// [`lock`] and the matching [`unlock`] no other thread's acquire completes.
///
/// [`lock`]: RawMutex::lock
/// [`unlock`]: RawMutex::unlock
pub unsafe trait RawMutex {
    /// Acquires the mutex, blocking the current thread until it is held.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`] if the mutex rejects this thread for exceeding its
    /// slot count.
    fn lock(&self) -> Result<(), Oversubscribed>;

    /// Releases the mutex.
    ///
    /// # Safety
    ///
    /// The calling thread must currently hold the mutex.
    unsafe fn unlock(&self);
}

/// A raw mutex supporting deadline-bounded acquisition.
///
/// Timing out is not an error: the timed acquires return `Ok(false)` when
/// the deadline passes first, and the caller decides what that means.
pub unsafe trait RawMutexTimed: RawMutex {
    /// Span type accepted by [`try_lock_for`].
    ///
    /// [`try_lock_for`]: RawMutexTimed::try_lock_for
    type Duration;

    /// Time point type accepted by [`try_lock_until`].
    ///
    /// [`try_lock_until`]: RawMutexTimed::try_lock_until
    type Instant;

    /// Attempts to acquire the mutex without waiting.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`], as for [`RawMutex::lock`].
    fn try_lock(&self) -> Result<bool, Oversubscribed>;

    /// Attempts to acquire the mutex before `timeout` elapses.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`], as for [`RawMutex::lock`].
    fn try_lock_for(&self, timeout: Self::Duration) -> Result<bool, Oversubscribed>;

    /// Attempts to acquire the mutex before the clock reaches `deadline`.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`], as for [`RawMutex::lock`].
    fn try_lock_until(&self, deadline: Self::Instant) -> Result<bool, Oversubscribed>;
}
