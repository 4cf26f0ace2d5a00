/*!
 * Synchronization Primitives Integration Tests
 *
 * Multi-threaded scenarios for mutexes, events, semaphores and the
 * multi-object wait engine
 */

use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use waitable_kernel::sync::{
    event_failed, event_remove, is_registered, is_thread_blocked, wait_for_all, wait_for_any,
    wait_for_multiple_objects, wait_for_single_object, waiter_count, ResetMode, SynchConfig,
    SynchEvent, SynchMutex, SynchSemaphore, WaitOutcome, Waitable, WaitableHandle,
};
use waitable_kernel::SynchError;

fn handle<W: Waitable + 'static>(object: &Arc<W>) -> WaitableHandle {
    object.clone()
}

/// Poll until `id` has `count` registered waiters
fn await_waiters(object: &dyn Waitable, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while waiter_count(object.id()) < count {
        assert!(Instant::now() < deadline, "waiters never registered");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_mutex_serializes_three_threads() {
    let mutex = SynchMutex::new("shared", true);
    let inside = Arc::new(AtomicBool::new(false));
    let acquired = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let mutex = mutex.clone();
            let inside = inside.clone();
            let acquired = acquired.clone();
            thread::spawn(move || {
                assert!(mutex.lock(Some(Duration::from_secs(5))));
                assert!(!inside.swap(true, Ordering::SeqCst), "two owners at once");
                thread::sleep(Duration::from_millis(10));
                inside.store(false, Ordering::SeqCst);
                acquired.fetch_add(1, Ordering::SeqCst);
                mutex.unlock().unwrap();
            })
        })
        .collect();

    await_waiters(&*mutex, 3);
    mutex.unlock().unwrap();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(acquired.load(Ordering::SeqCst), 3);
    assert_eq!(mutex.owner(), None);
    assert!(!is_registered(mutex.id()));
}

#[test]
fn test_mutex_release_wakes_exactly_one_of_two() {
    let mutex = SynchMutex::new("handoff", true);
    let proceed = SynchEvent::new("proceed", false, ResetMode::Manual);
    let acquired = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let mutex = mutex.clone();
            let proceed = proceed.clone();
            let acquired = acquired.clone();
            thread::spawn(move || {
                assert!(mutex.lock(Some(Duration::from_secs(5))));
                acquired.fetch_add(1, Ordering::SeqCst);
                assert!(proceed.wait(Some(Duration::from_secs(5))));
                mutex.unlock().unwrap();
            })
        })
        .collect();

    await_waiters(&*mutex, 2);
    mutex.unlock().unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while acquired.load(Ordering::SeqCst) == 0 {
        assert!(Instant::now() < deadline, "no waiter took the mutex");
        thread::sleep(Duration::from_millis(2));
    }
    thread::sleep(Duration::from_millis(50));
    assert_eq!(acquired.load(Ordering::SeqCst), 1);
    assert_eq!(waiter_count(mutex.id()), 1);
    assert!(mutex.owner().is_some());
    assert_ne!(mutex.owner(), Some(thread::current().id()));

    proceed.set();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(acquired.load(Ordering::SeqCst), 2);
    assert_eq!(mutex.owner(), None);
    assert!(!is_registered(mutex.id()));
}

#[test]
fn test_mutex_recursion_and_foreign_unlock() {
    let mutex = SynchMutex::new("recursive", false);
    assert!(mutex.try_lock());
    assert!(mutex.try_lock());
    assert_eq!(mutex.lock_count(), 2);

    let other = mutex.clone();
    let result = thread::spawn(move || other.unlock()).join().unwrap();
    assert_eq!(result, Err(SynchError::NotOwner("recursive".to_string())));

    mutex.unlock().unwrap();
    assert_eq!(mutex.owner(), Some(thread::current().id()));
    mutex.unlock().unwrap();
    assert_eq!(mutex.owner(), None);
}

#[test]
fn test_wait_all_timeout_consumes_nothing() {
    let auto = SynchEvent::new("auto", true, ResetMode::Auto);
    let never = SynchEvent::new("never", false, ResetMode::Manual);

    let started = Instant::now();
    let outcome = wait_for_all(&[handle(&auto), handle(&never)], Some(Duration::from_millis(100)));

    assert_eq!(outcome, WaitOutcome::Timeout);
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(auto.is_signaled(), "partial ALL match must not consume");
    assert_eq!(waiter_count(auto.id()), 0);
    assert_eq!(waiter_count(never.id()), 0);
}

#[test]
fn test_wait_all_resolves_when_last_object_signals() {
    let first = SynchEvent::new("first", true, ResetMode::Auto);
    let second = SynchEvent::new("second", false, ResetMode::Auto);

    let targets = [handle(&first), handle(&second)];
    let waiter = thread::spawn(move || wait_for_all(&targets, Some(Duration::from_secs(5))));

    await_waiters(&*second, 1);
    second.set();

    assert_eq!(waiter.join().unwrap(), WaitOutcome::AllSignaled);
    assert!(!first.is_signaled());
    assert!(!second.is_signaled());
}

#[test]
fn test_wait_any_prefers_lowest_index() {
    let a = SynchEvent::new("a", true, ResetMode::Manual);
    let b = SynchEvent::new("b", true, ResetMode::Manual);
    assert_eq!(
        wait_for_any(&[handle(&a), handle(&b)], Some(Duration::ZERO)),
        WaitOutcome::Signaled(0)
    );
}

#[test]
fn test_missing_object_fails_its_index() {
    let ev = SynchEvent::new("present", false, ResetMode::Manual);
    let targets = [Some(handle(&ev)), None];
    let outcome = wait_for_multiple_objects(&targets, false, Some(Duration::from_secs(1)));
    assert_eq!(outcome, WaitOutcome::Failed(1));
    assert!(!is_registered(ev.id()));
}

#[test]
fn test_semaphore_bounds() {
    let sem = SynchSemaphore::new("pool", 2, 2).unwrap();
    assert!(sem.acquire(Some(Duration::ZERO)));
    assert!(sem.acquire(Some(Duration::ZERO)));
    assert!(!sem.acquire(Some(Duration::from_millis(20))));
    assert_eq!(sem.count(), 0);

    assert!(sem.release());
    assert!(sem.release());
    assert!(!sem.release(), "release past max must be refused");
    assert_eq!(sem.count(), 2);

    assert!(matches!(
        SynchSemaphore::new("bad", 1, 2),
        Err(SynchError::InvalidArgument(_))
    ));
}

#[test]
fn test_semaphore_release_wakes_one_waiter() {
    let sem = SynchSemaphore::new("slots", 2, 0).unwrap();
    let released = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let sem = sem.clone();
            let released = released.clone();
            thread::spawn(move || {
                if sem.acquire(Some(Duration::from_millis(300))) {
                    released.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    await_waiters(&*sem, 2);
    sem.release();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(sem.count(), 0);
}

#[test]
fn test_semaphore_hands_out_released_slots() {
    let sem = SynchSemaphore::new("scenario", 2, 0).unwrap();
    assert!(sem.release());
    assert!(sem.release());

    assert!(sem.acquire(Some(Duration::ZERO)));
    assert!(sem.acquire(Some(Duration::ZERO)));
    assert_eq!(sem.count(), 0);

    let consumer = sem.clone();
    let third = thread::spawn(move || consumer.acquire(Some(Duration::from_secs(5))));
    await_waiters(&*sem, 1);
    thread::sleep(Duration::from_millis(30));
    assert!(!third.is_finished(), "third consumer must block");

    assert!(sem.release());
    assert!(third.join().unwrap());
    assert_eq!(sem.count(), 0);
    assert!(!is_registered(sem.id()));
}

#[test]
fn test_manual_event_releases_every_waiter() {
    let ev = SynchEvent::new("broadcast", false, ResetMode::Manual);
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let ev = ev.clone();
            thread::spawn(move || ev.wait(Some(Duration::from_secs(5))))
        })
        .collect();

    await_waiters(&*ev, 3);
    ev.set();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert!(ev.is_signaled());
}

#[test]
fn test_auto_event_releases_one_waiter_per_set() {
    let ev = SynchEvent::new("single", false, ResetMode::Auto);
    let woken = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let ev = ev.clone();
            let woken = woken.clone();
            thread::spawn(move || {
                if ev.wait(Some(Duration::from_millis(300))) {
                    woken.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    await_waiters(&*ev, 3);
    ev.set();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(woken.load(Ordering::SeqCst), 1);
    assert!(!ev.is_signaled());
}

#[test]
fn test_pulse_releases_only_current_waiters() {
    let ev = SynchEvent::new("pulse", false, ResetMode::Manual);
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let ev = ev.clone();
            thread::spawn(move || ev.wait(Some(Duration::from_secs(5))))
        })
        .collect();

    await_waiters(&*ev, 2);
    ev.pulse();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert!(!ev.is_signaled());
    assert!(!ev.wait(Some(Duration::from_millis(30))));
}

#[test]
fn test_event_remove_fails_pending_waiters() {
    let other = SynchEvent::new("other", false, ResetMode::Manual);
    let doomed = SynchEvent::new("doomed", false, ResetMode::Manual);

    let targets = [handle(&other), handle(&doomed)];
    let waiter = thread::spawn(move || wait_for_any(&targets, Some(Duration::from_secs(5))));

    await_waiters(&*doomed, 1);
    assert_eq!(event_remove(&*doomed), 1);
    assert_eq!(waiter.join().unwrap(), WaitOutcome::Failed(1));
    assert!(!is_registered(doomed.id()));
    assert!(!is_registered(other.id()));
}

#[test]
fn test_event_failed_fails_pending_waiter() {
    let other = SynchEvent::new("healthy", false, ResetMode::Manual);
    let broken = SynchEvent::new("broken", false, ResetMode::Manual);

    let targets = [handle(&other), handle(&broken)];
    let waiter = thread::spawn(move || wait_for_any(&targets, Some(Duration::from_secs(5))));

    await_waiters(&*broken, 1);
    assert_eq!(event_failed(&*broken), 1);
    assert_eq!(waiter.join().unwrap(), WaitOutcome::Failed(1));

    assert!(!is_registered(broken.id()));
    assert!(!is_registered(other.id()));
    assert_eq!(event_failed(&*broken), 0);
}

#[test]
fn test_registry_is_clean_after_waits() {
    let ev = SynchEvent::new("leak-check", false, ResetMode::Auto);
    let mutex = SynchMutex::new("leak-check-mutex", false);

    for _ in 0..10 {
        let targets = [Some(handle(&ev)), Some(handle(&mutex))];
        let outcome = wait_for_multiple_objects(&targets, true, Some(Duration::from_millis(5)));
        assert_eq!(outcome, WaitOutcome::Timeout);
    }
    let single = handle(&ev);
    assert_eq!(wait_for_single_object(&single, Some(Duration::ZERO)), WaitOutcome::Timeout);

    assert!(!is_registered(ev.id()));
    assert!(!is_registered(mutex.id()));
    assert!(!is_thread_blocked(thread::current().id()));
    assert_eq!(mutex.owner(), None);
}

#[test]
#[serial]
fn test_invalid_object_counts() {
    assert_eq!(wait_for_any(&[], Some(Duration::ZERO)), WaitOutcome::Invalid);

    let ev = SynchEvent::new("many", true, ResetMode::Manual);
    let targets: Vec<_> = (0..33).map(|_| handle(&ev)).collect();
    assert_eq!(wait_for_any(&targets, Some(Duration::ZERO)), WaitOutcome::Invalid);
    assert!(ev.is_signaled());
}

#[test]
#[serial]
fn test_installed_config_limits_object_count() {
    let previous = SynchConfig::active();
    SynchConfig::new().with_max_waiting_objects(4).unwrap().install();

    let ev = SynchEvent::new("limited", true, ResetMode::Manual);
    let five: Vec<_> = (0..5).map(|_| handle(&ev)).collect();
    let four = &five[..4];
    let over = wait_for_any(&five, Some(Duration::ZERO));
    let within = wait_for_any(four, Some(Duration::ZERO));
    previous.install();

    assert_eq!(over, WaitOutcome::Invalid);
    assert_eq!(within, WaitOutcome::Signaled(0));
}
