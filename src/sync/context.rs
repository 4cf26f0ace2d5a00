/*!
 * Wait Context
 *
 * Per-call bookkeeping of a blocked thread: its targets, match policy,
 * deadline and a private mutex/condvar pair guarding the result slot.
 *
 * # Lock Order
 *
 * registry -> context slot -> waitable. The blocked thread only ever holds its
 * own slot lock, and only while parked on the condvar.
 */

use super::outcome::{MatchPolicy, WaitOutcome};
use super::registry;
use super::traits::WaitableHandle;
use crate::core::types::WaitableId;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Instant;

/// Bookkeeping of one blocked wait call
pub(crate) struct WaitContext {
    targets: Vec<Option<WaitableHandle>>,
    policy: MatchPolicy,
    thread: ThreadId,
    deadline: Option<Instant>,
    /// Number of leading targets registered in the waitable registry
    registered: AtomicUsize,
    slot: Mutex<Option<WaitOutcome>>,
    wake: Condvar,
}

impl WaitContext {
    pub(crate) fn new(
        targets: Vec<Option<WaitableHandle>>,
        policy: MatchPolicy,
        thread: ThreadId,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            targets,
            policy,
            thread,
            deadline,
            registered: AtomicUsize::new(0),
            slot: Mutex::new(None),
            wake: Condvar::new(),
        }
    }

    #[inline]
    pub(crate) fn targets(&self) -> &[Option<WaitableHandle>] {
        &self.targets
    }

    #[inline]
    pub(crate) fn policy(&self) -> MatchPolicy {
        self.policy
    }

    #[inline]
    pub(crate) fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Targets that were actually added to the registry
    #[inline]
    pub(crate) fn registered_targets(&self) -> &[Option<WaitableHandle>] {
        let count = self.registered.load(Ordering::Acquire).min(self.targets.len());
        &self.targets[..count]
    }

    #[inline]
    pub(crate) fn set_registered(&self, count: usize) {
        self.registered.store(count, Ordering::Release);
    }

    /// Position of a waitable in this context's target list
    pub(crate) fn index_of(&self, id: WaitableId) -> Option<usize> {
        self.targets
            .iter()
            .position(|target| target.as_ref().is_some_and(|t| t.id() == id))
    }

    /// Whether the call is still unresolved
    #[inline]
    pub(crate) fn is_pending(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// What firing `id` means for this context, if anything
    ///
    /// ANY-match: the index of `id`, provided it is signaled for our thread.
    /// ALL-match: `AllSignaled` only if every target, scanned in order, is
    /// signaled right now; the scan stops at the first one that is not.
    pub(crate) fn check_event_fired(&self, id: WaitableId) -> Option<WaitOutcome> {
        match self.policy {
            MatchPolicy::Any => {
                let index = self.index_of(id)?;
                let target = self.targets[index].as_ref()?;
                target
                    .is_signaled_for(self.thread)
                    .then_some(WaitOutcome::Signaled(index))
            }
            MatchPolicy::All => {
                for target in &self.targets {
                    match target {
                        Some(target) if target.is_signaled_for(self.thread) => {}
                        _ => return None,
                    }
                }
                Some(WaitOutcome::AllSignaled)
            }
        }
    }

    /// Ask the fired target(s) to hand ownership to our thread
    ///
    /// For `AllSignaled` this is all-or-nothing: the first rejection revokes
    /// every grant made so far.
    pub(crate) fn request_ownership(&self, fired: WaitOutcome) -> bool {
        match fired {
            WaitOutcome::Signaled(index) => self
                .targets
                .get(index)
                .and_then(Option::as_ref)
                .is_some_and(|target| target.requests_ownership(self.thread)),
            WaitOutcome::AllSignaled => {
                for (granted, target) in self.targets.iter().enumerate() {
                    let accepted = target
                        .as_ref()
                        .is_some_and(|t| t.requests_ownership(self.thread));
                    if !accepted {
                        for owned in self.targets[..granted].iter().flatten() {
                            owned.revoke_ownership(self.thread);
                        }
                        return false;
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// Notify every owned target that one thread was released
    pub(crate) fn notify_released(&self, fired: WaitOutcome, except: Option<WaitableId>) {
        let notify = |target: &WaitableHandle| {
            if Some(target.id()) != except {
                target.threads_released(1);
            }
        };
        match fired {
            WaitOutcome::Signaled(index) => {
                if let Some(Some(target)) = self.targets.get(index) {
                    notify(target);
                }
            }
            WaitOutcome::AllSignaled => self.targets.iter().flatten().for_each(notify),
            _ => {}
        }
    }

    /// Grant ownership and resolve the call in one step
    ///
    /// Returns `false` without touching any target if the call was already
    /// resolved (timed out, fired elsewhere) or if ownership was refused.
    pub(crate) fn try_fire(&self, fired: WaitOutcome) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() || !self.request_ownership(fired) {
            return false;
        }
        *slot = Some(fired);
        self.wake.notify_one();
        true
    }

    /// Resolve the call with an outcome that involves no ownership transfer
    pub(crate) fn deliver(&self, outcome: WaitOutcome) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.wake.notify_one();
        true
    }

    /// Park until resolved or the deadline passes
    ///
    /// Spurious wakeups are absorbed by re-checking the slot in a loop.
    pub(crate) fn block(&self) -> WaitOutcome {
        let mut slot = self.slot.lock();
        loop {
            if let Some(outcome) = *slot {
                return outcome;
            }
            match self.deadline {
                Some(deadline) => {
                    if self.wake.wait_until(&mut slot, deadline).timed_out() && slot.is_none() {
                        *slot = Some(WaitOutcome::Timeout);
                    }
                }
                None => self.wake.wait(&mut slot),
            }
        }
    }
}

/// Scoped registration of a wait context
///
/// Dropping it removes the context from every waitable it was registered
/// against and from the blocked-thread table, on every exit path.
pub(crate) struct Registration {
    context: Arc<WaitContext>,
}

impl Registration {
    pub(crate) fn new(context: Arc<WaitContext>) -> Self {
        Self { context }
    }

    #[inline]
    pub(crate) fn context(&self) -> &Arc<WaitContext> {
        &self.context
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        registry::unregister_context(&self.context);
    }
}
