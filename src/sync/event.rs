/*!
 * Waitable Event
 *
 * Manual- or auto-reset event. A manual-reset event releases every eligible
 * waiter and stays signaled; an auto-reset event releases one waiter per
 * `set()` and clears itself through `threads_released`.
 */

use super::dispatch::{event_remove, event_signaled};
use super::traits::{ResetMode, SynchKind, Waitable, WaitableHandle};
use super::wait::wait_for_single_object;
use crate::core::id::next_waitable_id;
use crate::core::types::WaitableId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;
use tracing::{trace, warn};

/// Event usable with [`crate::sync::wait_for_multiple_objects`]
#[derive(Debug)]
pub struct SynchEvent {
    id: WaitableId,
    name: String,
    reset: ResetMode,
    signaled: Mutex<bool>,
}

impl SynchEvent {
    pub fn new(name: impl Into<String>, initially_signaled: bool, reset: ResetMode) -> Arc<Self> {
        Arc::new(Self {
            id: next_waitable_id(),
            name: name.into(),
            reset,
            signaled: Mutex::new(initially_signaled),
        })
    }

    /// Signal the event; a no-op if it is already signaled
    pub fn set(&self) {
        {
            let mut signaled = self.signaled.lock();
            if *signaled {
                return;
            }
            *signaled = true;
        }
        event_signaled(self);
    }

    /// Clear the event
    ///
    /// Auto-reset events clear themselves; resetting one is reported and ignored.
    pub fn reset(&self) {
        if self.reset == ResetMode::Auto {
            warn!(event = %self.name, "Reset called on an auto-reset event");
            return;
        }
        *self.signaled.lock() = false;
    }

    /// Release the threads blocked right now, then leave the event cleared
    ///
    /// The event lock is dropped around the dispatch, so another thread may
    /// observe or change the state inside that window.
    pub fn pulse(&self) {
        let mut signaled = self.signaled.lock();
        if *signaled {
            return;
        }
        *signaled = true;
        drop(signaled);

        let released = event_signaled(self);

        *self.signaled.lock() = false;
        trace!(event = %self.name, released, "Event pulsed");
    }

    /// Wait for the event; returns whether it fired
    pub fn wait(self: &Arc<Self>, timeout: Option<Duration>) -> bool {
        let handle: WaitableHandle = self.clone();
        wait_for_single_object(&handle, timeout).is_signaled()
    }

    pub fn reset_mode(&self) -> ResetMode {
        self.reset
    }
}

impl Waitable for SynchEvent {
    fn id(&self) -> WaitableId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SynchKind {
        SynchKind::Event
    }

    fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    fn requests_ownership(&self, _thread: ThreadId) -> bool {
        true
    }

    fn can_signal_multiple_threads(&self) -> bool {
        self.reset == ResetMode::Manual
    }

    fn threads_released(&self, released: usize) {
        if self.reset == ResetMode::Auto && released > 0 {
            *self.signaled.lock() = false;
        }
    }
}

impl Drop for SynchEvent {
    fn drop(&mut self) {
        event_remove(&*self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_reset_stays_signaled() {
        let event = SynchEvent::new("manual", false, ResetMode::Manual);
        event.set();
        assert!(event.wait(Some(Duration::ZERO)));
        assert!(event.wait(Some(Duration::ZERO)));
        assert!(event.is_signaled());

        event.reset();
        assert!(!event.is_signaled());
        assert!(!event.wait(Some(Duration::ZERO)));
    }

    #[test]
    fn test_auto_reset_consumed_once() {
        let event = SynchEvent::new("auto", true, ResetMode::Auto);
        assert!(event.wait(Some(Duration::ZERO)));
        assert!(!event.is_signaled());
        assert!(!event.wait(Some(Duration::ZERO)));
    }

    #[test]
    fn test_reset_ignored_for_auto_reset() {
        let event = SynchEvent::new("auto-reset", true, ResetMode::Auto);
        event.reset();
        assert!(event.is_signaled());
    }

    #[test]
    fn test_pulse_without_waiters_leaves_event_clear() {
        let event = SynchEvent::new("pulse", false, ResetMode::Manual);
        event.pulse();
        assert!(!event.is_signaled());
        assert!(!event.wait(Some(Duration::ZERO)));
    }

    #[test]
    fn test_set_is_idempotent() {
        let event = SynchEvent::new("idempotent", false, ResetMode::Manual);
        event.set();
        event.set();
        assert!(event.is_signaled());
    }
}
