//! Deterministic queue-mutex scenarios driven by a hand-cranked clock.

use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

use exclusive::clh;
use exclusive::clock::{Clock, FakeClock, Monotonic};
use exclusive::failure::Die;
use exclusive::relax::Spin;

type Mutex<const N: usize> = clh::Mutex<N, Spin, FakeClock>;

const fn ms(n: i64) -> i64 {
    n * 1_000_000
}

/// Blocks until `count` enqueues are visible, i.e. the first `count` waiters
/// are published in the chain.
fn wait_for_enqueues<const N: usize>(mutex: &Mutex<N>, count: usize) {
    while mutex.queue_count() < count {
        thread::yield_now();
    }
}

#[test]
fn uncontested_non_positive_timeouts_succeed() {
    let clock = FakeClock::new();
    let mutex = Mutex::<1>::with_clock(clock.clone());

    assert!(mutex.try_lock_for(0).unwrap());
    // SAFETY: just acquired.
    unsafe { mutex.unlock() };

    assert!(mutex.try_lock_for(ms(-1_000)).unwrap());
    // SAFETY: just acquired.
    unsafe { mutex.unlock() };
}

#[test]
fn enqueued_waiter_times_out_and_lock_recovers() {
    let clock = FakeClock::new();
    let mutex = Arc::new(Mutex::<3>::with_clock(clock.clone()));

    mutex.lock().unwrap();

    let waiter = {
        let mutex = Arc::clone(&mutex);
        let deadline = clock.deadline(ms(1_000));
        thread::spawn(move || mutex.try_lock_until(deadline).unwrap())
    };

    wait_for_enqueues(&mutex, 2);
    clock.advance(ms(1_000));

    assert!(!waiter.join().unwrap());

    // SAFETY: held by this thread since the start of the test.
    unsafe { mutex.unlock() };

    assert!(mutex.try_lock().unwrap());
    // SAFETY: just acquired.
    unsafe { mutex.unlock() };
}

#[test]
fn enqueued_threads_acquire_in_fifo_order() {
    let clock = FakeClock::new();
    let mutex = Arc::new(Mutex::<3>::with_clock(clock.clone()));
    let (order_tx, order_rx) = channel();

    mutex.lock().unwrap();

    let spawn_waiter = |name: &'static str| {
        let mutex = Arc::clone(&mutex);
        let order = order_tx.clone();
        thread::spawn(move || {
            mutex.lock().unwrap();
            order.send(name).unwrap();
            // SAFETY: just acquired.
            unsafe { mutex.unlock() };
        })
    };

    let second = spawn_waiter("second");
    wait_for_enqueues(&mutex, 2);
    let third = spawn_waiter("third");
    wait_for_enqueues(&mutex, 3);

    // SAFETY: held by this thread since the start of the test.
    unsafe { mutex.unlock() };

    second.join().unwrap();
    third.join().unwrap();

    let order: Vec<_> = order_rx.try_iter().collect();
    assert_eq!(order, ["second", "third"]);
}

#[test]
fn abandoned_middle_waiter_is_skipped() {
    let clock = FakeClock::new();
    let mutex = Arc::new(Mutex::<3>::with_clock(clock.clone()));

    mutex.lock().unwrap();

    let impatient = {
        let mutex = Arc::clone(&mutex);
        let deadline = clock.deadline(ms(100));
        thread::spawn(move || mutex.try_lock_until(deadline).unwrap())
    };
    wait_for_enqueues(&mutex, 2);

    let patient = {
        let mutex = Arc::clone(&mutex);
        let deadline = clock.deadline(ms(200));
        thread::spawn(move || {
            let acquired = mutex.try_lock_until(deadline).unwrap();
            if acquired {
                // SAFETY: just acquired.
                unsafe { mutex.unlock() };
            }
            acquired
        })
    };
    wait_for_enqueues(&mutex, 3);

    clock.advance(ms(150));
    assert!(!impatient.join().unwrap());

    // SAFETY: held by this thread since the start of the test.
    unsafe { mutex.unlock() };
    assert!(patient.join().unwrap());

    // The abandoned node was recycled; the mutex is whole again.
    assert!(mutex.try_lock().unwrap());
    // SAFETY: just acquired.
    unsafe { mutex.unlock() };
}

#[test]
fn holder_survives_all_waiters_abandoning() {
    let clock = FakeClock::new();
    let mutex = Arc::new(Mutex::<3>::with_clock(clock.clone()));

    mutex.lock().unwrap();

    let first = {
        let mutex = Arc::clone(&mutex);
        let deadline = clock.deadline(ms(100));
        thread::spawn(move || mutex.try_lock_until(deadline).unwrap())
    };
    wait_for_enqueues(&mutex, 2);

    let second = {
        let mutex = Arc::clone(&mutex);
        let deadline = clock.deadline(ms(200));
        thread::spawn(move || mutex.try_lock_until(deadline).unwrap())
    };
    wait_for_enqueues(&mutex, 3);

    clock.advance(ms(250));
    assert!(!first.join().unwrap());
    assert!(!second.join().unwrap());

    // SAFETY: held by this thread throughout.
    unsafe { mutex.unlock() };

    // A fresh claim walks the abandoned chain and wins immediately.
    assert!(mutex.try_lock().unwrap());
    // SAFETY: just acquired.
    unsafe { mutex.unlock() };
}

#[test]
fn die_policy_reports_oversubscription() {
    let mutex = Arc::new(clh::Mutex::<1, Spin, Monotonic, Die>::new());
    let (result_tx, result_rx) = channel();
    let mut releases = Vec::new();
    let mut claimants = Vec::new();

    for _ in 0..3 {
        let mutex = Arc::clone(&mutex);
        let results = result_tx.clone();
        let (release_tx, release_rx) = channel::<()>();
        releases.push(release_tx);
        claimants.push(thread::spawn(move || match mutex.lock() {
            Ok(()) => {
                results.send(Ok(())).unwrap();
                release_rx.recv().unwrap();
                // SAFETY: acquired above.
                unsafe { mutex.unlock() };
            }
            Err(err) => results.send(Err(err)).unwrap(),
        }));
    }
    drop(result_tx);

    let mut held = 0;
    let mut busy = 0;

    // With one waiter slot and three claimants, at least one claim finds
    // the pool empty and dies; block until the first report comes in.
    loop {
        match result_rx.recv().unwrap() {
            Ok(()) => held += 1,
            Err(err) => {
                assert!(err.to_string().contains("device or resource busy"));
                busy += 1;
                break;
            }
        }
    }

    for release in &releases {
        // Threads that already died have hung up; that is fine.
        let _ = release.send(());
    }
    for result in result_rx {
        match result {
            Ok(()) => held += 1,
            Err(_) => busy += 1,
        }
    }
    for claimant in claimants {
        claimant.join().unwrap();
    }

    assert_eq!(held + busy, 3);
    assert!((1..=2).contains(&held), "held: {held}");
    assert!(busy >= 1, "busy: {busy}");
}

#[test]
fn queue_count_is_monotonic_across_contention() {
    let mutex = Arc::new(Mutex::<3>::new());
    let threads = 3;
    let iterations = 50;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let mutex = Arc::clone(&mutex);
            thread::spawn(move || {
                for _ in 0..iterations {
                    mutex.lock().unwrap();
                    // SAFETY: just acquired.
                    unsafe { mutex.unlock() };
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(mutex.queue_count(), threads * iterations);
}
