/*!
 * Waitable Traits
 *
 * Capability set shared by every object a thread can block on.
 *
 * # Design: Trait Object Over Inheritance
 *
 * The wait engine only needs a handful of state queries and ownership hooks,
 * so each variant (mutex, event, semaphore, timer) implements this trait
 * directly and is handled as `Arc<dyn Waitable>`. All methods take the
 * object's own internal lock; none of them may call back into the dispatcher.
 */

use crate::core::types::WaitableId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

/// Shared handle to a waitable object
pub type WaitableHandle = Arc<dyn Waitable>;

/// Kind tag of a waitable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynchKind {
    Mutex,
    Event,
    Semaphore,
    Timer,
    /// Caller-defined waitable
    Custom,
}

impl fmt::Display for SynchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mutex => "mutex",
            Self::Event => "event",
            Self::Semaphore => "semaphore",
            Self::Timer => "timer",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Reset policy of events and timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetMode {
    /// Stays signaled until explicitly reset
    Manual,
    /// Clears itself after releasing one waiter
    Auto,
}

/// An object with a signaled state that threads can block on
///
/// Implementations must be:
/// - **Thread-safe**: every state read and transition happens under the
///   object's own lock
/// - **Non-reentrant**: never call `event_signaled` or any other dispatcher
///   entry point while holding that lock
///
/// State changes that may unblock waiters must be followed, after the object's
/// lock is released, by a call to [`crate::sync::event_signaled`].
pub trait Waitable: Send + Sync {
    /// Registry identity of this object
    fn id(&self) -> WaitableId;

    /// Human-readable name for logs
    fn name(&self) -> &str;

    /// Kind tag
    fn kind(&self) -> SynchKind;

    /// Whether the object is currently signaled
    fn is_signaled(&self) -> bool;

    /// Whether the object counts as signaled for a specific waiting thread
    ///
    /// Defaults to [`Waitable::is_signaled`]. Ownership-tracking objects
    /// override this so their owner may re-acquire them.
    fn is_signaled_for(&self, thread: ThreadId) -> bool {
        let _ = thread;
        self.is_signaled()
    }

    /// Atomically try to hand ownership to `thread`
    ///
    /// Returns `true` if the object moved into the owned (or consumed) state
    /// on behalf of `thread`.
    fn requests_ownership(&self, thread: ThreadId) -> bool;

    /// Undo a successful [`Waitable::requests_ownership`]
    ///
    /// Only used to roll back a partially granted ALL-match request.
    fn revoke_ownership(&self, thread: ThreadId) {
        let _ = thread;
    }

    /// Whether one signal may release more than one waiter
    fn can_signal_multiple_threads(&self) -> bool;

    /// Notification that `released` waiters were just let through
    fn threads_released(&self, released: usize) {
        let _ = released;
    }
}

impl fmt::Debug for dyn Waitable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waitable")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}
