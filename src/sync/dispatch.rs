/*!
 * Signal Dispatcher
 *
 * Entry points a waitable calls after its state changes. They run on the
 * mutating thread (or the timer callback thread) with the waitable's own lock
 * already released, take the registry lock, and wake the contexts that win
 * ownership.
 */

use super::context::WaitContext;
use super::outcome::WaitOutcome;
use super::registry;
use super::traits::Waitable;
use std::sync::Arc;
use std::thread::ThreadId;
use tracing::{error, trace, warn};

/// Release eligible waiters after `waitable` became signaled
///
/// Walks the waiter list in registration order while the object stays
/// signaled. A context is woken only if its own check passes and the object
/// (or, for ALL-match, every target) grants ownership; losing that race just
/// skips it. Returns the number of threads released, which is also reported
/// to the object through [`Waitable::threads_released`].
pub fn event_signaled(waitable: &dyn Waitable) -> usize {
    let id = waitable.id();
    let map = registry::lock_waitables();

    let Some(waiters) = map.waiters(id) else {
        return 0;
    };

    let multiple = waitable.can_signal_multiple_threads();
    let mut released = 0;

    for context in &waiters {
        if !waitable.is_signaled() || (released > 0 && !multiple) {
            break;
        }
        if !context.is_pending() {
            continue;
        }
        let Some(fired) = context.check_event_fired(id) else {
            continue;
        };
        if context.try_fire(fired) {
            released += 1;
            context.notify_released(fired, Some(id));
            trace!(
                waitable = %waitable.name(),
                thread = ?context.thread(),
                outcome = %fired,
                "Waiter released"
            );
        }
    }

    waitable.threads_released(released);
    drop(map);
    released
}

/// Purge a waitable that is going away
///
/// Every context still blocked on it is woken with `Failed(index)` and the
/// registry entry is deleted. Waiters present here mean an object was
/// destroyed under a blocked thread, which is reported as an error.
pub fn event_remove(waitable: &dyn Waitable) -> usize {
    let id = waitable.id();
    let mut map = registry::lock_waitables();

    let Some(waiters) = map.remove(id) else {
        return 0;
    };

    let failed = fail_waiters(&waiters, waitable);
    drop(map);

    error!(
        waitable = %waitable.name(),
        kind = %waitable.kind(),
        waiters = waiters.len(),
        failed,
        "Waitable destroyed while threads were blocked on it"
    );
    failed
}

/// Report a failure of a waitable that stays alive
///
/// Same wake-with-error as [`event_remove`], but the registry entry is left
/// for the waiters to unregister themselves.
pub fn event_failed(waitable: &dyn Waitable) -> usize {
    let id = waitable.id();
    let map = registry::lock_waitables();

    let Some(waiters) = map.waiters(id) else {
        return 0;
    };

    let failed = fail_waiters(&waiters, waitable);
    drop(map);

    warn!(
        waitable = %waitable.name(),
        kind = %waitable.kind(),
        failed,
        "Waitable reported a failure to its waiters"
    );
    failed
}

fn fail_waiters(waiters: &[Arc<WaitContext>], waitable: &dyn Waitable) -> usize {
    waiters
        .iter()
        .filter(|context| {
            context
                .index_of(waitable.id())
                .is_some_and(|index| context.deliver(WaitOutcome::Failed(index)))
        })
        .count()
}

/// Interject an asynchronous signal into the pending wait of `thread`
///
/// Bypasses the ownership protocol entirely: the blocked call returns
/// `AsyncSignal`. Returns `false` if the thread is not blocked right now or its
/// wait already resolved.
pub fn notify_async_signal(thread: ThreadId) -> bool {
    let delivered = registry::thread_context(thread)
        .is_some_and(|context| context.deliver(WaitOutcome::AsyncSignal));
    trace!(?thread, delivered, "Asynchronous signal");
    delivered
}

/// Tear down the pending wait of `thread` as part of a forced recovery
pub(crate) fn interrupt_wait(thread: ThreadId) -> bool {
    let interrupted = registry::thread_context(thread)
        .is_some_and(|context| context.deliver(WaitOutcome::Interrupted));
    if interrupted {
        warn!(?thread, "Pending wait interrupted");
    }
    interrupted
}
