/*!
 * Wait Engine Benchmarks
 *
 * Cost of the non-blocking fast path, of handing a mutex between threads,
 * and of waking a crowd through a manual-reset event
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::thread;
use std::time::Duration;
use waitable_kernel::sync::{
    wait_for_all, wait_for_any, waiter_count, ResetMode, SynchEvent, SynchMutex, Waitable,
    WaitableHandle,
};

fn bench_signaled_fast_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("signaled_fast_path");

    for objects in [1usize, 4, 16, 32] {
        let events: Vec<WaitableHandle> = (0..objects)
            .map(|i| -> WaitableHandle {
                SynchEvent::new(format!("ev{}", i), true, ResetMode::Manual)
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("any", objects), &events, |b, events| {
            b.iter(|| black_box(wait_for_any(events, Some(Duration::ZERO))));
        });
        group.bench_with_input(BenchmarkId::new("all", objects), &events, |b, events| {
            b.iter(|| black_box(wait_for_all(events, Some(Duration::ZERO))));
        });
    }

    group.finish();
}

fn bench_mutex_handoff(c: &mut Criterion) {
    c.bench_function("mutex_handoff", |b| {
        b.iter(|| {
            let mutex = SynchMutex::new("handoff", true);
            let contender = mutex.clone();
            let handle = thread::spawn(move || {
                let owned = contender.lock(Some(Duration::from_secs(1)));
                if owned {
                    let _ = contender.unlock();
                }
                owned
            });

            while waiter_count(mutex.id()) == 0 {
                thread::yield_now();
            }
            let _ = mutex.unlock();
            black_box(handle.join().unwrap());
        });
    });
}

fn bench_broadcast_wake(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_wake");

    for waiters in [1usize, 4, 8, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(waiters), &waiters, |b, &waiters| {
            b.iter(|| {
                let ev = SynchEvent::new("broadcast", false, ResetMode::Manual);
                let handles: Vec<_> = (0..waiters)
                    .map(|_| {
                        let ev = ev.clone();
                        thread::spawn(move || ev.wait(Some(Duration::from_secs(1))))
                    })
                    .collect();

                while waiter_count(ev.id()) < waiters {
                    thread::yield_now();
                }
                ev.set();

                for handle in handles {
                    black_box(handle.join().unwrap());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_signaled_fast_path,
    bench_mutex_handoff,
    bench_broadcast_wake
);
criterion_main!(benches);
