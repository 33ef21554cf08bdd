//! Bounded, fair, timed queue locks for mutual exclusion, plus a guarded
//! resource wrapper handing out scoped access tokens.
//!
//! The centerpiece is [`clh::Mutex`], a queue lock in the family of Craig
//! and, independently, Magnussen, Landin, and Hagersten. Waiting threads
//! spin on locally-accessible flags released by their predecessors, which
//! gives first-come-first-served handoff among enqueued threads and O(1)
//! remote traffic per acquisition. This implementation departs from the
//! textbook lock in two ways:
//!
//! - **No per-acquire allocation.** The mutex owns a fixed pool of queue
//!   nodes recycled through an internal lock-free free list; `N`, the
//!   number of concurrent waiters, is picked at compile time.
//! - **Deadlines.** Acquires can be bounded by a time point; a waiter whose
//!   deadline passes abandons the chain, marking its node so successors
//!   skip and recycle it. Timeouts are answers, not errors.
//!
//! [`array::Mutex`] is the simpler sibling for untimed, cache-local
//! workloads: a padded flag array indexed by ticket, with oversubscription
//! detection but no abandonment. [`resource::SharedResource`] binds a value
//! to either mutex (or anything implementing the [`lock`] contract) and
//! only hands it out through RAII tokens.
//!
//! ## Spinlock use cases
//!
//! All waiting is busy-waiting; there is no OS-level parking. That is only
//! efficient for short critical sections with roughly as many active
//! threads as cores. For the general case prefer scheduler-aware mutexes
//! such as [`std::sync::Mutex`]; see
//! [spinlocks are usually not what you want].
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use exclusive::clh::spins::Mutex;
//! use exclusive::resource::SharedResource;
//!
//! const THREADS: u32 = 4;
//!
//! let counter = Arc::new(SharedResource::<u32, Mutex<4>>::new(0));
//!
//! let handles: Vec<_> = (0..THREADS)
//!     .map(|_| {
//!         let counter = Arc::clone(&counter);
//!         thread::spawn(move || {
//!             for _ in 0..100 {
//!                 *counter.access().unwrap() += 1;
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//!
//! assert_eq!(*counter.access().unwrap(), THREADS * 100);
//! ```
//!
//! ## Timed access
//!
//! Timed mutexes are generic over a [`clock::Clock`], so deadline logic can
//! be driven by a hand-cranked [`clock::FakeClock`] in tests and by the
//! monotonic clock in production:
//!
//! ```
//! use std::time::Duration;
//!
//! use exclusive::clh::spins::Mutex;
//!
//! let mutex = Mutex::<2>::new();
//!
//! assert!(mutex.try_lock_for(Duration::ZERO).unwrap());
//! // Held, so a second bounded attempt gives up.
//! assert!(!mutex.try_lock_for(Duration::from_millis(5)).unwrap());
//! // SAFETY: held since the first attempt.
//! unsafe { mutex.unlock() };
//! ```
//!
//! [spinlocks are usually not what you want]:
//!     https://matklad.github.io/2020/01/02/spinlocks-considered-harmful.html

#![warn(rust_2021_compatibility)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::inline_always)]

pub mod array;
pub mod clh;
pub mod clock;
pub mod error;
pub mod failure;
pub mod lock;
pub mod relax;
pub mod resource;
