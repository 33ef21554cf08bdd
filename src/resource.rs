//! Values bound to a mutex and reachable only through scoped tokens.

use core::cell::UnsafeCell;
use core::fmt::{self, Debug, Display, Formatter};
use core::ops::{Deref, DerefMut};

use crate::error::Oversubscribed;
use crate::lock::{RawMutex, RawMutexTimed};

/// A value guarded by a mutex.
///
/// The value is reachable only through the [`ScopedAccess`] tokens handed
/// out by [`access`] and [`access_within`], so every read and write happens
/// under the mutex. Any type implementing [`RawMutex`] can guard; the timed
/// accessor additionally asks for [`RawMutexTimed`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
///
/// use exclusive::clh::spins::Mutex;
/// use exclusive::resource::SharedResource;
///
/// let counter = Arc::new(SharedResource::<u32, Mutex<2>>::new(0));
/// let writer = Arc::clone(&counter);
///
/// thread::spawn(move || *writer.access().unwrap() = 10)
///     .join()
///     .expect("thread::spawn failed");
///
/// assert_eq!(*counter.access().unwrap(), 10);
/// ```
///
/// [`access`]: SharedResource::access
/// [`access_within`]: SharedResource::access_within
pub struct SharedResource<T: ?Sized, M> {
    mutex: M,
    value: UnsafeCell<T>,
}

// SAFETY: same impls as the standard library mutex: the resource serializes
// all access to the value, so sharing it only requires the value to move
// between threads.
unsafe impl<T: ?Sized + Send, M: Send> Send for SharedResource<T, M> {}
unsafe impl<T: ?Sized + Send, M: Sync> Sync for SharedResource<T, M> {}

impl<T, M: Default> SharedResource<T, M> {
    /// Creates a resource guarded by a default-constructed mutex.
    pub fn new(value: T) -> Self {
        Self::with_mutex(value, M::default())
    }
}

impl<T, M> SharedResource<T, M> {
    /// Creates a resource guarded by `mutex`.
    pub fn with_mutex(value: T, mutex: M) -> Self {
        Self { mutex, value: UnsafeCell::new(value) }
    }

    /// Consumes the resource, returning the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized, M> SharedResource<T, M> {
    /// Returns a mutable borrow of the value.
    ///
    /// No locking takes place: the exclusive borrow proves that no access
    /// token exists.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Borrows the guarding mutex, e.g. to observe queue statistics.
    pub fn mutex(&self) -> &M {
        &self.mutex
    }
}

impl<T: ?Sized, M: RawMutex> SharedResource<T, M> {
    /// Acquires exclusive access, blocking until the mutex is held.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`] if the mutex rejects this thread for exceeding
    /// its slot count.
    pub fn access(&self) -> Result<ScopedAccess<'_, T, M>, Oversubscribed> {
        self.mutex.lock()?;
        Ok(ScopedAccess { resource: self })
    }
}

impl<T: ?Sized, M: RawMutexTimed> SharedResource<T, M> {
    /// Acquires exclusive access unless `timeout` elapses first.
    ///
    /// `Ok(None)` means the deadline passed before the mutex was acquired;
    /// the value stays out of reach.
    ///
    /// # Errors
    ///
    /// [`Oversubscribed`], as for [`access`](Self::access).
    pub fn access_within(
        &self,
        timeout: M::Duration,
    ) -> Result<Option<ScopedAccess<'_, T, M>>, Oversubscribed> {
        Ok(self.mutex.try_lock_for(timeout)?.then(|| ScopedAccess { resource: self }))
    }
}

impl<T: Default, M: Default> Default for SharedResource<T, M> {
    /// Creates a resource with the `Default` value for `T`.
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T, M: Default> From<T> for SharedResource<T, M> {
    /// Creates a resource guarding an instance of `T`.
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized + Debug, M: RawMutex> Debug for SharedResource<T, M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("SharedResource");
        match self.access() {
            Ok(value) => d.field("value", &&*value),
            Err(_) => d.field("value", &format_args!("<oversubscribed>")),
        };
        d.finish_non_exhaustive()
    }
}

/// Scoped token for exclusive access to a [`SharedResource`].
///
/// Dereferences to the guarded value and releases the mutex when dropped.
#[must_use = "if unused the resource is immediately released"]
pub struct ScopedAccess<'a, T: ?Sized, M: RawMutex> {
    resource: &'a SharedResource<T, M>,
}

impl<T: ?Sized, M: RawMutex> Deref for ScopedAccess<'_, T, M> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the token holds the mutex.
        unsafe { &*self.resource.value.get() }
    }
}

impl<T: ?Sized, M: RawMutex> DerefMut for ScopedAccess<'_, T, M> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the token holds the mutex and is itself borrowed mutably.
        unsafe { &mut *self.resource.value.get() }
    }
}

impl<T: ?Sized, M: RawMutex> Drop for ScopedAccess<'_, T, M> {
    fn drop(&mut self) {
        // SAFETY: the token was created with the mutex held and is dropped
        // exactly once.
        unsafe { self.resource.mutex.unlock() }
    }
}

impl<T: ?Sized + Debug, M: RawMutex> Debug for ScopedAccess<'_, T, M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

impl<T: ?Sized + Display, M: RawMutex> Display for ScopedAccess<'_, T, M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::SharedResource;
    use crate::array;
    use crate::clh;

    type ClhResource<T> = SharedResource<T, clh::spins::Mutex<2>>;
    type ArrayResource<T> = SharedResource<T, array::spins::Mutex<2>>;

    #[derive(Eq, PartialEq, Debug)]
    struct NonCopy(u32);

    #[test]
    fn smoke() {
        let resource = ClhResource::new(1);
        drop(resource.access().unwrap());
        drop(resource.access().unwrap());
    }

    #[test]
    fn tokens_read_and_write() {
        let resource = ArrayResource::new(0);
        *resource.access().unwrap() += 41;
        assert_eq!(*resource.access().unwrap(), 41);
    }

    #[test]
    fn get_mut_skips_locking() {
        let mut resource = ClhResource::new(NonCopy(10));
        *resource.get_mut() = NonCopy(20);
        assert_eq!(*resource.get_mut(), NonCopy(20));
    }

    #[test]
    fn into_inner_returns_the_value() {
        let resource = ClhResource::new(NonCopy(7));
        assert_eq!(resource.into_inner(), NonCopy(7));
    }

    #[test]
    fn from_and_default() {
        let resource: ClhResource<u32> = SharedResource::from(42);
        assert_eq!(*resource.access().unwrap(), 42);

        let resource: ArrayResource<u32> = SharedResource::default();
        assert_eq!(*resource.access().unwrap(), 0);
    }

    #[test]
    fn debug_locks_and_prints_the_value() {
        let resource = ClhResource::new(42);
        let rendered = format!("{resource:?}");
        assert!(rendered.contains("42"), "{rendered}");
        // The debug borrow released the mutex.
        drop(resource.access().unwrap());
    }

    #[test]
    fn guard_debug_and_display_render_the_value() {
        let resource = ClhResource::new(42);
        let token = resource.access().unwrap();
        assert_eq!(format!("{token:?}"), format!("{:?}", 42));
        assert_eq!(format!("{token}"), format!("{}", 42));
    }
}
