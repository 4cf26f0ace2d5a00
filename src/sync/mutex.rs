/*!
 * Waitable Mutex
 *
 * Exclusive, recursive mutex that can take part in multi-object waits.
 * Signaled means "unowned". Releasing the last recursion level hands the
 * mutex to exactly one waiter.
 */

use super::dispatch::{event_remove, event_signaled};
use super::traits::{SynchKind, Waitable, WaitableHandle};
use super::wait::wait_for_single_object;
use crate::core::errors::{SynchError, SynchResult};
use crate::core::id::next_waitable_id;
use crate::core::types::WaitableId;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Default)]
struct MutexState {
    owner: Option<ThreadId>,
    lock_count: u32,
}

/// Recursive mutex usable with [`crate::sync::wait_for_multiple_objects`]
#[derive(Debug)]
pub struct SynchMutex {
    id: WaitableId,
    name: String,
    state: Mutex<MutexState>,
}

impl SynchMutex {
    /// Create a mutex, optionally owned by the calling thread
    pub fn new(name: impl Into<String>, initially_owned: bool) -> Arc<Self> {
        let state = if initially_owned {
            MutexState {
                owner: Some(std::thread::current().id()),
                lock_count: 1,
            }
        } else {
            MutexState::default()
        };
        Arc::new(Self {
            id: next_waitable_id(),
            name: name.into(),
            state: Mutex::new(state),
        })
    }

    /// Lock, blocking up to `timeout`; returns whether the caller now owns it
    pub fn lock(self: &Arc<Self>, timeout: Option<Duration>) -> bool {
        let handle: WaitableHandle = self.clone();
        wait_for_single_object(&handle, timeout).is_signaled()
    }

    /// Lock without blocking
    pub fn try_lock(self: &Arc<Self>) -> bool {
        self.lock(Some(Duration::ZERO))
    }

    /// Release one recursion level
    ///
    /// Fails with [`SynchError::NotOwner`] unless called by the owner.
    pub fn unlock(&self) -> SynchResult<()> {
        let caller = std::thread::current().id();
        {
            let mut state = self.state.lock();
            if state.owner != Some(caller) {
                drop(state);
                warn!(
                    mutex = %self.name,
                    "Unlock attempted by a thread that does not own the mutex"
                );
                return Err(SynchError::NotOwner(self.name.clone()));
            }
            state.lock_count -= 1;
            if state.lock_count > 0 {
                return Ok(());
            }
            state.owner = None;
        }
        event_signaled(self);
        Ok(())
    }

    /// Current owner, if locked
    pub fn owner(&self) -> Option<ThreadId> {
        self.state.lock().owner
    }

    /// Recursion depth of the current owner (0 when unlocked)
    pub fn lock_count(&self) -> u32 {
        self.state.lock().lock_count
    }
}

impl Waitable for SynchMutex {
    fn id(&self) -> WaitableId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SynchKind {
        SynchKind::Mutex
    }

    fn is_signaled(&self) -> bool {
        self.state.lock().owner.is_none()
    }

    fn is_signaled_for(&self, thread: ThreadId) -> bool {
        self.state.lock().owner.map_or(true, |owner| owner == thread)
    }

    fn requests_ownership(&self, thread: ThreadId) -> bool {
        let mut state = self.state.lock();
        match state.owner {
            None => {
                state.owner = Some(thread);
                state.lock_count = 1;
                true
            }
            Some(owner) if owner == thread => {
                state.lock_count += 1;
                true
            }
            Some(_) => false,
        }
    }

    fn revoke_ownership(&self, thread: ThreadId) {
        let mut state = self.state.lock();
        if state.owner == Some(thread) {
            state.lock_count -= 1;
            if state.lock_count == 0 {
                state.owner = None;
            }
        }
    }

    fn can_signal_multiple_threads(&self) -> bool {
        false
    }
}

impl Drop for SynchMutex {
    fn drop(&mut self) {
        event_remove(&*self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    #[test]
    fn test_recursive_lock() {
        let mutex = SynchMutex::new("recursive", false);
        let me = thread::current().id();

        assert!(mutex.lock(None));
        assert!(mutex.lock(None));
        assert_eq!(mutex.lock_count(), 2);
        assert_eq!(mutex.owner(), Some(me));
        assert!(!mutex.is_signaled());

        mutex.unlock().unwrap();
        assert_eq!(mutex.lock_count(), 1);
        assert!(!mutex.is_signaled());

        mutex.unlock().unwrap();
        assert_eq!(mutex.lock_count(), 0);
        assert!(mutex.is_signaled());
    }

    #[test]
    fn test_unlock_by_non_owner_rejected() {
        let mutex = SynchMutex::new("foreign", true);
        let other = Arc::clone(&mutex);
        let result = thread::spawn(move || other.unlock()).join().unwrap();
        assert!(matches!(result, Err(SynchError::NotOwner(_))));
        assert_eq!(mutex.lock_count(), 1);
    }

    #[test]
    fn test_try_lock_contended() {
        let mutex = SynchMutex::new("contended", true);
        let other = Arc::clone(&mutex);
        let acquired = thread::spawn(move || other.try_lock()).join().unwrap();
        assert!(!acquired);
    }

    #[test]
    fn test_revoke_restores_state() {
        let mutex = SynchMutex::new("revoke", false);
        let me = thread::current().id();
        assert!(mutex.requests_ownership(me));
        mutex.revoke_ownership(me);
        assert_eq!(mutex.owner(), None);
        assert!(mutex.is_signaled());
    }
}
