/*!
 * Synchronization Primitives
 *
 * `WaitForMultipleObjects` semantics built from mutexes and condition
 * variables:
 * - Waitable mutex, event, semaphore and timer objects
 * - Single- and multi-object waits with ANY/ALL matching and deadlines
 * - A signal dispatcher that hands ownership to blocked waiters
 * - Asynchronous interjection into a thread's pending wait
 *
 * # Architecture
 *
 * Each blocked call owns a wait context (targets, policy, deadline, result
 * slot, private mutex/condvar). A global registry maps every waitable to the
 * contexts blocked on it. When a waitable becomes signaled it calls
 * [`event_signaled`], which walks that list in FIFO order, asks the object to
 * grant ownership, and wakes the winners.
 *
 * # Lock Order
 *
 * registry -> wait context -> waitable. Waitables release their own lock
 * before calling any dispatcher entry point.
 */

mod config;
mod context;
mod dispatch;
mod event;
mod mutex;
mod outcome;
mod registry;
mod semaphore;
mod timer;
mod traits;
mod wait;

pub use config::{SynchConfig, MAX_WAITING_OBJECTS_ENV};
pub use dispatch::{event_failed, event_remove, event_signaled, notify_async_signal};
pub use event::SynchEvent;
pub use mutex::SynchMutex;
pub use outcome::{MatchPolicy, WaitOutcome};
pub use registry::{blocked_thread_count, is_registered, is_thread_blocked, waiter_count};
pub use semaphore::SynchSemaphore;
pub use timer::SynchTimer;
pub use traits::{ResetMode, SynchKind, Waitable, WaitableHandle};
pub use wait::{wait_for_all, wait_for_any, wait_for_multiple_objects, wait_for_single_object};

pub(crate) use dispatch::interrupt_wait;
