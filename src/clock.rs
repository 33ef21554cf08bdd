//! Time sources for deadline-bounded lock acquisition.
//!
//! Timed locks are generic over a [`Clock`] so that their waiting behavior
//! can be driven by real time in production and by a hand-cranked time source
//! in tests. A clock only needs to hand out comparable time points; locks
//! never subtract them or convert them to wall time.

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Release};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic source of time points for timed acquisitions.
pub trait Clock {
    /// A point in time. Only ordering is required of it.
    type Instant: Copy + PartialOrd;

    /// A span of time. Implementations may pick a signed representation,
    /// in which case negative spans produce deadlines in the past.
    type Duration: Copy;

    /// Returns the current time.
    fn now(&self) -> Self::Instant;

    /// Returns the deadline reached `timeout` after the current time.
    fn deadline(&self, timeout: Self::Duration) -> Self::Instant;

    /// Returns a deadline that is never reached in practice.
    fn far_future(&self) -> Self::Instant;
}

/// The process-wide monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct Monotonic;

impl Monotonic {
    /// Stand-in for "no deadline"; an acquire bounded by it outlives any
    /// reasonable process.
    const FAR: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);
}

impl Clock for Monotonic {
    type Instant = Instant;
    type Duration = Duration;

    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn deadline(&self, timeout: Duration) -> Instant {
        let now = Instant::now();
        now.checked_add(timeout).unwrap_or_else(|| self.far_future())
    }

    fn far_future(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(Self::FAR).unwrap_or(now)
    }
}

/// A clock that only moves when told to.
///
/// Time points and spans are nanosecond counts starting at zero. Spans are
/// signed, so deadlines in the past are expressible. Handles are cheap to
/// clone and share one counter: a test keeps one handle for time travel
/// while the lock under test reads through another.
///
/// # Example
///
/// ```
/// use exclusive::clock::{Clock, FakeClock};
///
/// let clock = FakeClock::new();
/// let deadline = clock.deadline(1_000);
///
/// clock.advance(999);
/// assert!(clock.now() < deadline);
/// clock.advance(1);
/// assert!(clock.now() >= deadline);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    now: Arc<AtomicI64>,
}

impl FakeClock {
    /// Creates a clock reading zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock to an absolute time point.
    pub fn set_now(&self, now: i64) {
        // Pairs with the acquire load in `now`, so a waiter that reads the
        // new time also sees every write made before the jump.
        self.now.store(now, Release);
    }

    /// Moves the clock forward, or backward for a negative span.
    pub fn advance(&self, span: i64) {
        self.now.fetch_add(span, AcqRel);
    }
}

impl Clock for FakeClock {
    type Instant = i64;
    type Duration = i64;

    fn now(&self) -> i64 {
        self.now.load(Acquire)
    }

    fn deadline(&self, timeout: i64) -> i64 {
        self.now().saturating_add(timeout)
    }

    fn far_future(&self) -> i64 {
        i64::MAX
    }
}
