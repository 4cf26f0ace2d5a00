/*!
 * Timer Service
 *
 * Stand-in for POSIX `timer_create` with `SIGEV_THREAD` delivery: one
 * dedicated thread keeps a min-heap of due times and runs expiry callbacks.
 *
 * # Design
 *
 * - Callbacks run on the service thread with the service lock released, so a
 *   callback may arm or cancel timers (including its own).
 * - Each arming gets a fresh `OsTimerId`; a cancelled id simply has no entry
 *   left when its heap slot comes due.
 * - The opaque `context` is handed back verbatim, which is how managers carry
 *   their `(guard, sequence)` composite through an expiry.
 */

use super::config::TimerConfig;
use crate::core::errors::{SynchError, SynchResult};
use crate::core::id::next_os_timer_id;
use crate::core::limits::TIMER_HEAP_CAPACITY;
use crate::core::types::OsTimerId;
use ahash::RandomState;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Expiry callback: receives the timer handle and the opaque context
pub type TimerCallback = Arc<dyn Fn(OsTimerId, u64) + Send + Sync>;

/// How often an armed timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPeriod {
    /// Fire once
    Once,
    /// Fire this many times, one interval apart
    Times(u32),
    /// Fire every interval until cancelled
    Continuous,
}

impl TimerPeriod {
    /// Total number of expiries, `None` for continuous timers
    #[inline]
    pub const fn total_fires(&self) -> Option<u32> {
        match self {
            Self::Once => Some(1),
            Self::Times(n) => Some(*n),
            Self::Continuous => None,
        }
    }

    pub fn validate(&self) -> SynchResult<()> {
        match self {
            Self::Times(0) => Err(SynchError::InvalidArgument(
                "timer period Times(0) never fires".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Absolute due time `delay` from now
///
/// Fails with `InvalidArgument` when the sum is not representable as an
/// `Instant`, such as for `Duration::MAX`.
pub fn deadline_after(delay: Duration) -> SynchResult<Instant> {
    Instant::now().checked_add(delay).ok_or_else(|| {
        SynchError::InvalidArgument(format!("timer due time {:?} is out of range", delay))
    })
}

struct Armed {
    interval: Duration,
    due: Instant,
    remaining: Option<u32>,
    context: u64,
    callback: TimerCallback,
}

struct ServiceState {
    heap: BinaryHeap<Reverse<(Instant, OsTimerId)>>,
    armed: HashMap<OsTimerId, Armed, RandomState>,
    running: bool,
}

struct Shared {
    state: Mutex<ServiceState>,
    wake: Condvar,
}

/// Dedicated thread delivering timer expiries
pub struct TimerService {
    config: TimerConfig,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

static GLOBAL: OnceLock<Arc<TimerService>> = OnceLock::new();

impl TimerService {
    /// Start a service thread
    pub fn new(config: TimerConfig) -> SynchResult<Arc<Self>> {
        let shared = Arc::new(Shared {
            state: Mutex::new(ServiceState {
                heap: BinaryHeap::with_capacity(TIMER_HEAP_CAPACITY),
                armed: HashMap::with_hasher(RandomState::new()),
                running: true,
            }),
            wake: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(config.service_thread_name.clone())
            .spawn(move || run(&worker))
            .map_err(|e| SynchError::ThreadSpawn {
                name: config.service_thread_name.clone(),
                reason: e.to_string(),
            })?;

        info!(thread = %config.service_thread_name, "Timer service started");
        Ok(Arc::new(Self {
            config,
            shared,
            thread: Mutex::new(Some(handle)),
        }))
    }

    /// Process-wide service, started on first use
    pub fn global() -> SynchResult<Arc<Self>> {
        if let Some(service) = GLOBAL.get() {
            return Ok(Arc::clone(service));
        }
        let service = Self::new(TimerConfig::default())?;
        match GLOBAL.set(Arc::clone(&service)) {
            Ok(()) => Ok(service),
            Err(_) => {
                // Lost the race; keep the winner
                service.shutdown();
                GLOBAL
                    .get()
                    .cloned()
                    .ok_or(SynchError::ServiceStopped)
            }
        }
    }

    /// Arm a timer due after `due`, repeating per `period`
    pub fn arm(
        &self,
        due: Duration,
        period: TimerPeriod,
        context: u64,
        callback: TimerCallback,
    ) -> SynchResult<OsTimerId> {
        period.validate()?;
        let interval = self.config.clamp_due(due);
        let id = next_os_timer_id();

        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(SynchError::ServiceStopped);
        }
        let due_at = deadline_after(interval)?;
        state.armed.insert(
            id,
            Armed {
                interval,
                due: due_at,
                remaining: period.total_fires(),
                context,
                callback,
            },
        );
        state.heap.push(Reverse((due_at, id)));
        drop(state);

        self.shared.wake.notify_one();
        trace!(timer = %id, ?interval, ?period, context, "Timer armed");
        Ok(id)
    }

    /// Disarm a timer; returns `false` if it already finished or never existed
    pub fn cancel(&self, id: OsTimerId) -> bool {
        let removed = self.shared.state.lock().armed.remove(&id).is_some();
        trace!(timer = %id, removed, "Timer cancelled");
        removed
    }

    /// Next due time of an armed timer
    pub fn next_due(&self, id: OsTimerId) -> Option<Instant> {
        self.shared.state.lock().armed.get(&id).map(|armed| armed.due)
    }

    /// Number of armed timers
    pub fn active_count(&self) -> usize {
        self.shared.state.lock().armed.len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Stop the service thread and drop every armed timer
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
            state.armed.clear();
            state.heap.clear();
        }
        self.shared.wake.notify_all();

        if let Some(handle) = self.thread.lock().take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
        info!(thread = %self.config.service_thread_name, "Timer service stopped");
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: &Shared) {
    let mut state = shared.state.lock();
    while state.running {
        let next = state.heap.peek().map(|Reverse(entry)| *entry);
        match next {
            None => shared.wake.wait(&mut state),
            Some((due, _)) if due > Instant::now() => {
                shared.wake.wait_until(&mut state, due);
            }
            Some((due, id)) => {
                state.heap.pop();
                if let Some((callback, context)) = take_expiry(&mut state, id, due) {
                    MutexGuard::unlocked(&mut state, || callback(id, context));
                }
            }
        }
    }
    debug!("Timer service loop exited");
}

/// Consume one expiry of `id` and reschedule it if it repeats
///
/// A repeat whose next due time overflows `Instant` ends the timer instead.
fn take_expiry(
    state: &mut ServiceState,
    id: OsTimerId,
    due: Instant,
) -> Option<(TimerCallback, u64)> {
    let armed = state.armed.get_mut(&id)?;
    if armed.due != due {
        return None;
    }

    let callback = Arc::clone(&armed.callback);
    let context = armed.context;
    let repeat = match armed.remaining.as_mut() {
        None => true,
        Some(remaining) => {
            *remaining -= 1;
            *remaining > 0
        }
    };

    match due.checked_add(armed.interval).filter(|_| repeat) {
        Some(next) => {
            armed.due = next;
            state.heap.push(Reverse((next, id)));
        }
        None => {
            state.armed.remove(&id);
        }
    }
    Some((callback, context))
}
