/*!
 * Waitable Timer
 *
 * Timer that becomes signaled when it expires. Expiries are delivered on the
 * timer service thread, which sets the signaled state and dispatches to
 * waiters like any other mutator.
 *
 * A timer can also interject into its owner's pending wait: when enabled and
 * an expiry released nobody through the normal path, the owner thread (the
 * one that called `start`) is woken with `WaitOutcome::AsyncSignal`.
 */

use super::dispatch::{event_failed, event_remove, event_signaled, notify_async_signal};
use super::traits::{ResetMode, SynchKind, Waitable, WaitableHandle};
use super::wait::wait_for_single_object;
use crate::core::errors::SynchResult;
use crate::core::id::next_waitable_id;
use crate::core::types::{OsTimerId, WaitableId};
use crate::timer::service::{deadline_after, TimerPeriod, TimerService};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

#[derive(Debug)]
struct TimerState {
    signaled: bool,
    armed: Option<OsTimerId>,
    /// Bumped on every start/stop so late expiries of an older arming are dropped
    generation: u64,
    owner: Option<ThreadId>,
    fired: u32,
    remaining: Option<u32>,
}

/// Timer usable with [`crate::sync::wait_for_multiple_objects`]
pub struct SynchTimer {
    id: WaitableId,
    name: String,
    reset: ResetMode,
    async_signal: AtomicBool,
    service: Mutex<Option<Arc<TimerService>>>,
    state: Mutex<TimerState>,
}

impl SynchTimer {
    /// Create a stopped timer that uses the process-wide timer service
    pub fn new(name: impl Into<String>, reset: ResetMode) -> Arc<Self> {
        Self::build(name.into(), reset, None)
    }

    /// Create a stopped timer bound to a specific timer service
    pub fn with_service(
        name: impl Into<String>,
        reset: ResetMode,
        service: Arc<TimerService>,
    ) -> Arc<Self> {
        Self::build(name.into(), reset, Some(service))
    }

    fn build(name: String, reset: ResetMode, service: Option<Arc<TimerService>>) -> Arc<Self> {
        Arc::new(Self {
            id: next_waitable_id(),
            name,
            reset,
            async_signal: AtomicBool::new(false),
            service: Mutex::new(service),
            state: Mutex::new(TimerState {
                signaled: false,
                armed: None,
                generation: 0,
                owner: None,
                fired: 0,
                remaining: None,
            }),
        })
    }

    /// Enable or disable interjection into the owner's pending wait
    pub fn with_async_signal(self: Arc<Self>, enabled: bool) -> Arc<Self> {
        self.async_signal.store(enabled, Ordering::Relaxed);
        self
    }

    fn service(&self) -> SynchResult<Arc<TimerService>> {
        let mut service = self.service.lock();
        if let Some(service) = service.as_ref() {
            return Ok(Arc::clone(service));
        }
        let global = TimerService::global()?;
        *service = Some(Arc::clone(&global));
        Ok(global)
    }

    /// Arm the timer; the calling thread becomes its owner
    ///
    /// Restarting a running timer discards its pending expiries and clears
    /// the fired count. A timeout too large to schedule is rejected with
    /// `InvalidArgument` and leaves a running timer untouched.
    pub fn start(self: &Arc<Self>, timeout: Duration, period: TimerPeriod) -> SynchResult<()> {
        period.validate()?;
        deadline_after(timeout)?;
        let service = self.service()?;

        // Armed under the state lock so an early expiry cannot miss `armed`
        let armed = {
            let mut state = self.state.lock();
            state.generation += 1;
            if let Some(previous) = state.armed.take() {
                service.cancel(previous);
            }

            let timer: Weak<Self> = Arc::downgrade(self);
            let armed = service.arm(
                timeout,
                period,
                state.generation,
                Arc::new(move |_, generation| {
                    if let Some(timer) = timer.upgrade() {
                        timer.expired(generation);
                    }
                }),
            );

            if let Ok(os_timer) = armed {
                state.armed = Some(os_timer);
                state.owner = Some(std::thread::current().id());
                state.fired = 0;
                state.remaining = period.total_fires();
            }
            armed
        };

        match armed {
            Ok(_) => {
                debug!(timer = %self.name, ?timeout, ?period, "Timer started");
                Ok(())
            }
            Err(e) => {
                warn!(timer = %self.name, error = %e, "Failed to arm timer");
                event_failed(&**self);
                Err(e)
            }
        }
    }

    /// Disarm the timer; the signaled state is left as is
    pub fn stop(&self) {
        let armed = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.remaining = None;
            state.armed.take()
        };
        if let Some(armed) = armed {
            if let Some(service) = self.service.lock().as_ref() {
                service.cancel(armed);
            }
            debug!(timer = %self.name, "Timer stopped");
        }
    }

    /// Clear the signaled state of a manual-reset timer
    pub fn reset(&self) {
        if self.reset == ResetMode::Auto {
            warn!(timer = %self.name, "Reset called on an auto-reset timer");
            return;
        }
        self.state.lock().signaled = false;
    }

    /// Wait for the next expiry; returns whether it fired
    pub fn wait(self: &Arc<Self>, timeout: Option<Duration>) -> bool {
        let handle: WaitableHandle = self.clone();
        wait_for_single_object(&handle, timeout).is_signaled()
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().armed.is_some()
    }

    /// Expiries since the last `start`
    pub fn fired_count(&self) -> u32 {
        self.state.lock().fired
    }

    /// Due time of the next expiry, `None` while stopped
    pub fn next_due(&self) -> Option<Instant> {
        let armed = self.state.lock().armed?;
        self.service.lock().as_ref()?.next_due(armed)
    }

    pub fn owner_thread(&self) -> Option<ThreadId> {
        self.state.lock().owner
    }

    pub fn reset_mode(&self) -> ResetMode {
        self.reset
    }

    /// Expiry delivered by the timer service
    fn expired(&self, generation: u64) {
        let owner = {
            let mut state = self.state.lock();
            if state.generation != generation || state.armed.is_none() {
                trace!(timer = %self.name, generation, "Stale timer expiry ignored");
                return;
            }
            state.fired += 1;
            state.signaled = true;

            let more = match state.remaining.as_mut() {
                None => true,
                Some(remaining) => {
                    *remaining = remaining.saturating_sub(1);
                    *remaining > 0
                }
            };
            let rescheduled = state.armed.is_some_and(|armed| {
                self.service
                    .lock()
                    .as_ref()
                    .is_some_and(|service| service.next_due(armed).is_some())
            });
            if !more || !rescheduled {
                state.armed = None;
            }
            state.owner
        };

        let released = event_signaled(self);
        trace!(timer = %self.name, released, "Timer expired");

        if released == 0 && self.async_signal.load(Ordering::Relaxed) {
            if let Some(owner) = owner {
                notify_async_signal(owner);
            }
        }
    }
}

impl Waitable for SynchTimer {
    fn id(&self) -> WaitableId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SynchKind {
        SynchKind::Timer
    }

    fn is_signaled(&self) -> bool {
        self.state.lock().signaled
    }

    fn requests_ownership(&self, _thread: ThreadId) -> bool {
        true
    }

    fn can_signal_multiple_threads(&self) -> bool {
        self.reset == ResetMode::Manual
    }

    fn threads_released(&self, released: usize) {
        if self.reset == ResetMode::Auto && released > 0 {
            self.state.lock().signaled = false;
        }
    }
}

impl Drop for SynchTimer {
    fn drop(&mut self) {
        self.stop();
        event_remove(&*self);
    }
}
