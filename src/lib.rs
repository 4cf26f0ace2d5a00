/*!
 * Waitable Kernel Library
 * Multi-object wait subsystem with timers and watchdogs
 *
 * - `sync`: waitable objects, the wait engine and the signal dispatcher
 * - `timer`: timer service, application timers and thread watchdogs
 * - `monitoring`: tracing setup and wait instrumentation
 */

pub mod core;
pub mod monitoring;
pub mod sync;
pub mod timer;

// Re-exports
pub use crate::core::errors::{SynchError, SynchResult};
pub use crate::core::types::{CompositeId, GuardId, OsTimerId, WaitableId};
pub use monitoring::{init_tracing, try_init_tracing};
pub use sync::{
    wait_for_all, wait_for_any, wait_for_multiple_objects, wait_for_single_object, MatchPolicy,
    ResetMode, SynchConfig, SynchEvent, SynchKind, SynchMutex, SynchSemaphore, SynchTimer,
    WaitOutcome, Waitable, WaitableHandle,
};
pub use timer::{
    ThreadSupervisor, Timer, TimerConfig, TimerHandler, TimerManager, TimerPeriod, TimerService,
    Watchdog, WatchdogManager,
};
