//! Errors reported by bounded locks.

use thiserror::Error;

/// More threads contend for a lock than it has slots.
///
/// Bounded locks own a fixed number of waiter slots, sized at compile time
/// through their `N` parameter. A lock reports this error when it can prove
/// that the surplus thread has no slot to take: always for the array mutex,
/// and under the [`Die`] policy for the queue mutex. Detection is best-effort
/// with respect to *which* of the racing threads is rejected.
///
/// The rendered message carries the stable phrase `device or resource busy`
/// so callers can recognize the condition in logs and wrapped errors.
///
/// [`Die`]: crate::failure::Die
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("device or resource busy: lock supports at most {limit} concurrent threads")]
pub struct Oversubscribed {
    limit: usize,
}

impl Oversubscribed {
    pub(crate) const fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// The number of concurrent threads the lock supports.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}

impl From<Oversubscribed> for std::io::Error {
    fn from(err: Oversubscribed) -> Self {
        Self::new(std::io::ErrorKind::ResourceBusy, err)
    }
}
