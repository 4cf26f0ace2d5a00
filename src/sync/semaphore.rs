/*!
 * Waitable Semaphore
 *
 * Counting semaphore in the range `[0, max]`. Signaled while the count is
 * positive; each granted waiter consumes one unit.
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
use tracing::debug;

/// Counting semaphore usable with [`crate::sync::wait_for_multiple_objects`]
#[derive(Debug)]
pub struct SynchSemaphore {
    id: WaitableId,
    name: String,
    max_count: u32,
    count: Mutex<u32>,
}

impl SynchSemaphore {
    /// Create a semaphore holding `initial` of `max` units
    pub fn new(name: impl Into<String>, max_count: u32, initial: u32) -> SynchResult<Arc<Self>> {
        if max_count == 0 || initial > max_count {
            return Err(SynchError::InvalidArgument(format!(
                "semaphore count {} outside 0..={} (max must be positive)",
                initial, max_count
            )));
        }
        Ok(Arc::new(Self {
            id: next_waitable_id(),
            name: name.into(),
            max_count,
            count: Mutex::new(initial),
        }))
    }

    /// Add one unit and wake a waiter
    ///
    /// Returns `false` if the semaphore is already full.
    pub fn release(&self) -> bool {
        {
            let mut count = self.count.lock();
            if *count >= self.max_count {
                debug!(semaphore = %self.name, max = self.max_count, "Release on a full semaphore");
                return false;
            }
            *count += 1;
        }
        event_signaled(self);
        true
    }

    /// Take one unit, blocking up to `timeout`
    pub fn acquire(self: &Arc<Self>, timeout: Option<Duration>) -> bool {
        let handle: WaitableHandle = self.clone();
        wait_for_single_object(&handle, timeout).is_signaled()
    }

    pub fn count(&self) -> u32 {
        *self.count.lock()
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }
}

impl Waitable for SynchSemaphore {
    fn id(&self) -> WaitableId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SynchKind {
        SynchKind::Semaphore
    }

    fn is_signaled(&self) -> bool {
        *self.count.lock() > 0
    }

    fn requests_ownership(&self, _thread: ThreadId) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    fn revoke_ownership(&self, _thread: ThreadId) {
        let mut count = self.count.lock();
        if *count < self.max_count {
            *count += 1;
        }
    }

    fn can_signal_multiple_threads(&self) -> bool {
        true
    }
}

impl Drop for SynchSemaphore {
    fn drop(&mut self) {
        event_remove(&*self);
    }
}
