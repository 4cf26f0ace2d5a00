/*!
 * Waitable Registry
 *
 * Two process-wide tables, each behind a single lock:
 * - waitable id -> contexts blocked on it, in registration (FIFO) order
 * - thread id -> the context that thread is currently blocked in
 *
 * A waitable has an entry iff at least one context is registered against it;
 * lists are never left empty. Locks are held only for the map operation and
 * never across a condvar wait. The waitable table is always taken before the
 * thread table.
 */

use super::context::WaitContext;
use crate::core::limits::WAITER_LIST_CAPACITY;
use crate::core::types::WaitableId;
use ahash::RandomState;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::thread::ThreadId;

/// Waitable id -> blocked contexts
pub(crate) struct WaiterMap {
    entries: HashMap<WaitableId, Vec<Arc<WaitContext>>, RandomState>,
}

impl WaiterMap {
    fn new() -> Self {
        Self {
            entries: HashMap::with_hasher(RandomState::new()),
        }
    }

    /// Append `context` to the waiter list of `id`
    ///
    /// Registering the same pair twice is a no-op.
    pub(crate) fn register(&mut self, id: WaitableId, context: &Arc<WaitContext>) {
        let list = self
            .entries
            .entry(id)
            .or_insert_with(|| Vec::with_capacity(WAITER_LIST_CAPACITY));
        if !list.iter().any(|c| Arc::ptr_eq(c, context)) {
            list.push(Arc::clone(context));
        }
    }

    /// Remove `context` from the waiter list of `id`, dropping empty lists
    pub(crate) fn unregister(&mut self, id: WaitableId, context: &Arc<WaitContext>) -> bool {
        let Some(list) = self.entries.get_mut(&id) else {
            return false;
        };
        let before = list.len();
        list.retain(|c| !Arc::ptr_eq(c, context));
        let removed = list.len() != before;
        if list.is_empty() {
            self.entries.remove(&id);
        }
        removed
    }

    /// Snapshot of the waiter list of `id`
    pub(crate) fn waiters(&self, id: WaitableId) -> Option<Vec<Arc<WaitContext>>> {
        self.entries.get(&id).cloned()
    }

    /// Take the whole entry of `id` out of the table
    pub(crate) fn remove(&mut self, id: WaitableId) -> Option<Vec<Arc<WaitContext>>> {
        self.entries.remove(&id)
    }

    fn count(&self, id: WaitableId) -> usize {
        self.entries.get(&id).map_or(0, Vec::len)
    }
}

static WAITABLES: LazyLock<Mutex<WaiterMap>> = LazyLock::new(|| Mutex::new(WaiterMap::new()));

static THREADS: LazyLock<Mutex<HashMap<ThreadId, Arc<WaitContext>, RandomState>>> =
    LazyLock::new(|| Mutex::new(HashMap::with_hasher(RandomState::new())));

/// Lock the waitable table
#[inline]
pub(crate) fn lock_waitables() -> MutexGuard<'static, WaiterMap> {
    WAITABLES.lock()
}

/// Record `context` as the active wait of its thread
pub(crate) fn bind_thread(context: &Arc<WaitContext>) {
    let previous = THREADS.lock().insert(context.thread(), Arc::clone(context));
    if previous.is_some() {
        tracing::warn!(thread = ?context.thread(), "Thread already had an active wait context");
    }
}

/// Active wait context of `thread`, if it is blocked
pub(crate) fn thread_context(thread: ThreadId) -> Option<Arc<WaitContext>> {
    THREADS.lock().get(&thread).cloned()
}

/// Remove `context` from every table it appears in
pub(crate) fn unregister_context(context: &Arc<WaitContext>) {
    {
        let mut map = lock_waitables();
        for target in context.registered_targets().iter().flatten() {
            map.unregister(target.id(), context);
        }
    }

    let mut threads = THREADS.lock();
    if threads
        .get(&context.thread())
        .is_some_and(|active| Arc::ptr_eq(active, context))
    {
        threads.remove(&context.thread());
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Number of contexts currently blocked on a waitable
pub fn waiter_count(id: WaitableId) -> usize {
    WAITABLES.lock().count(id)
}

/// Whether a waitable currently has a registry entry
pub fn is_registered(id: WaitableId) -> bool {
    WAITABLES.lock().entries.contains_key(&id)
}

/// Number of threads currently parked in a wait call
pub fn blocked_thread_count() -> usize {
    THREADS.lock().len()
}

/// Whether `thread` is currently parked in a wait call
pub fn is_thread_blocked(thread: ThreadId) -> bool {
    THREADS.lock().contains_key(&thread)
}
