//! Policies selecting how the queue mutex reacts to an exhausted node pool.
//!
//! The pool of a [`clh::Mutex`] holds nodes for `N` concurrent waiters. When
//! an acquire finds the pool empty before its deadline has passed, more than
//! `N` threads are racing for the lock and the acquire must either wait for
//! a node to be recycled or give up. The two reactions are disjoint behaviors
//! picked at compile time through the mutex's policy parameter; they are not
//! runtime error values.
//!
//! [`clh::Mutex`]: crate::clh::Mutex

use crate::error::Oversubscribed;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Retry {}
    impl Sealed for super::Die {}
}

/// Reaction of an acquire that finds the node pool empty before its deadline.
///
/// This trait is sealed; [`Retry`] and [`Die`] are its only implementations.
pub trait Policy: sealed::Sealed {
    /// Called on every empty poll of the pool while the deadline has not
    /// passed. Returning `Err` aborts the acquire.
    fn pool_exhausted(limit: usize) -> Result<(), Oversubscribed>;
}

/// Keep polling the pool until a node is recycled or the deadline passes.
///
/// An untimed [`lock`] under this policy may block for as long as the lock
/// stays oversubscribed.
///
/// [`lock`]: crate::clh::Mutex::lock
pub struct Retry;

/// Report [`Oversubscribed`] instead of waiting for a node.
pub struct Die;

impl Policy for Retry {
    #[inline]
    fn pool_exhausted(_limit: usize) -> Result<(), Oversubscribed> {
        Ok(())
    }
}

impl Policy for Die {
    #[inline]
    fn pool_exhausted(limit: usize) -> Result<(), Oversubscribed> {
        Err(Oversubscribed::new(limit))
    }
}
