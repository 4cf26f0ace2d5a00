/*!
 * Multi-Object Wait
 *
 * `WaitForMultipleObjects`-style blocking on top of mutex/condvar pairs.
 *
 * # Algorithm
 *
 * 1. Build a context and register it against the targets while holding the
 *    registry lock for the whole registration loop.
 *    - ANY: register in order and stop at the first target that is already
 *      signaled and grants ownership (the caller never blocks).
 *    - ALL: register every target, then take ownership of all of them as a
 *      group if each one was observed signaled.
 * 2. Otherwise park on the context's private condvar until the dispatcher
 *    resolves it, the deadline passes, or an async signal arrives.
 * 3. Unregister from everything (RAII) and return the outcome.
 */

use super::config::SynchConfig;
use super::context::{Registration, WaitContext};
use super::outcome::{MatchPolicy, WaitOutcome};
use super::registry::{self, WaiterMap};
use super::traits::WaitableHandle;
use crate::monitoring::span_wait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Wait for one object
///
/// `timeout = None` waits forever; `Some(Duration::ZERO)` only polls.
pub fn wait_for_single_object(object: &WaitableHandle, timeout: Option<Duration>) -> WaitOutcome {
    wait_for_multiple_objects(&[Some(Arc::clone(object))], false, timeout)
}

/// Wait until any of `objects` fires
pub fn wait_for_any(objects: &[WaitableHandle], timeout: Option<Duration>) -> WaitOutcome {
    let targets: Vec<_> = objects.iter().cloned().map(Some).collect();
    wait_for_multiple_objects(&targets, false, timeout)
}

/// Wait until all of `objects` fire together
pub fn wait_for_all(objects: &[WaitableHandle], timeout: Option<Duration>) -> WaitOutcome {
    let targets: Vec<_> = objects.iter().cloned().map(Some).collect();
    wait_for_multiple_objects(&targets, true, timeout)
}

/// Wait for several objects
///
/// A `None` entry is a caller error and resolves the call with
/// `Failed(index)`. An empty list or one longer than
/// [`SynchConfig::max_waiting_objects`] returns `Invalid` without blocking.
pub fn wait_for_multiple_objects(
    objects: &[Option<WaitableHandle>],
    match_all: bool,
    timeout: Option<Duration>,
) -> WaitOutcome {
    let config = SynchConfig::active();
    if objects.is_empty() || objects.len() > config.max_waiting_objects {
        warn!(
            count = objects.len(),
            maximum = config.max_waiting_objects,
            "Rejected wait with invalid object count"
        );
        return WaitOutcome::Invalid;
    }

    let policy = MatchPolicy::from_match_all(match_all);
    let mut span = span_wait(policy.as_str(), objects.len(), config.slow_wait_threshold);
    let entered = span.enter();

    let started = Instant::now();
    // A deadline too far away to represent is the same as waiting forever
    let deadline = timeout.and_then(|t| started.checked_add(t));
    let thread = std::thread::current().id();

    let registration = Registration::new(Arc::new(WaitContext::new(
        objects.to_vec(),
        policy,
        thread,
        deadline,
    )));
    let context = registration.context();

    let resolved = {
        let mut map = registry::lock_waitables();
        let resolved = match context.policy() {
            MatchPolicy::Any => register_any(&mut map, context),
            MatchPolicy::All => register_all(&mut map, context),
        };
        match resolved {
            Some(outcome) => {
                context.deliver(outcome);
            }
            None => registry::bind_thread(context),
        }
        resolved
    };

    match resolved {
        Some(outcome) => trace!(outcome = %outcome, "Wait resolved without blocking"),
        None => span.record_blocked(),
    }

    let outcome = context.block();
    drop(registration);

    drop(entered);
    span.record_outcome(&outcome);
    trace!(outcome = %outcome, "Wait finished");
    outcome
}

/// ANY-match registration with the already-signaled fast path
fn register_any(map: &mut WaiterMap, context: &Arc<WaitContext>) -> Option<WaitOutcome> {
    let thread = context.thread();
    for (index, target) in context.targets().iter().enumerate() {
        let Some(target) = target else {
            context.set_registered(index);
            return Some(WaitOutcome::Failed(index));
        };

        map.register(target.id(), context);
        context.set_registered(index + 1);

        if target.is_signaled_for(thread) && target.requests_ownership(thread) {
            target.threads_released(1);
            return Some(WaitOutcome::Signaled(index));
        }
    }
    None
}

/// ALL-match registration: register everything first, then try the group grant
fn register_all(map: &mut WaiterMap, context: &Arc<WaitContext>) -> Option<WaitOutcome> {
    let thread = context.thread();
    let mut all_signaled = true;

    for (index, target) in context.targets().iter().enumerate() {
        let Some(target) = target else {
            context.set_registered(index);
            return Some(WaitOutcome::Failed(index));
        };

        map.register(target.id(), context);
        context.set_registered(index + 1);
        all_signaled &= target.is_signaled_for(thread);
    }

    if all_signaled && context.request_ownership(WaitOutcome::AllSignaled) {
        context.notify_released(WaitOutcome::AllSignaled, None);
        return Some(WaitOutcome::AllSignaled);
    }
    None
}
