/*!
 * Timer Manager
 *
 * Application timers driven by one dispatcher thread.
 *
 * # Flow
 *
 * - `start_timer` bumps the timer's sequence, registers it and posts a start
 *   request; the dispatcher thread arms the service with the composite
 *   `(guard, sequence)` as the opaque context.
 * - `stop_timer` unregisters and cancels directly, without a hand-off.
 * - An expiry is posted back to the dispatcher, which drops it if the guard
 *   is gone or the sequence moved on, and otherwise invokes the handler.
 */

use super::config::TimerConfig;
use super::dispatcher::{DispatcherThread, Poster};
use super::service::{deadline_after, TimerPeriod, TimerService};
use crate::core::errors::{SynchError, SynchResult};
use crate::core::id::next_guard_id;
use crate::core::types::{CompositeId, GuardId, OsTimerId};
use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Receiver of timer expiries
///
/// Called on the timer manager's dispatcher thread.
pub trait TimerHandler: Send + Sync {
    fn on_timer_expired(&self, timer: &Timer);
}

impl<F> TimerHandler for F
where
    F: Fn(&Timer) + Send + Sync,
{
    fn on_timer_expired(&self, timer: &Timer) {
        self(timer)
    }
}

/// Application timer
pub struct Timer {
    id: GuardId,
    name: String,
    timeout: Duration,
    period: TimerPeriod,
    sequence: AtomicU32,
    fired: AtomicU32,
    handler: Arc<dyn TimerHandler>,
}

impl Timer {
    pub fn new(
        name: impl Into<String>,
        timeout: Duration,
        period: TimerPeriod,
        handler: Arc<dyn TimerHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: next_guard_id(),
            name: name.into(),
            timeout,
            period,
            sequence: AtomicU32::new(0),
            fired: AtomicU32::new(0),
            handler,
        })
    }

    #[inline]
    pub fn id(&self) -> GuardId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn period(&self) -> TimerPeriod {
        self.period
    }

    /// Sequence number of the current (or last) arming
    pub fn sequence(&self) -> u32 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Expiries delivered since the last start
    pub fn fired_count(&self) -> u32 {
        self.fired.load(Ordering::Acquire)
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("period", &self.period)
            .field("sequence", &self.sequence())
            .field("fired", &self.fired_count())
            .finish()
    }
}

struct Entry {
    timer: Arc<Timer>,
    sequence: u32,
    armed: Option<OsTimerId>,
}

enum Command {
    Start(CompositeId),
    Expired(CompositeId),
}

struct Shared {
    service: Arc<TimerService>,
    timers: Mutex<HashMap<GuardId, Entry, RandomState>>,
}

/// Owner of application timers
pub struct TimerManager {
    shared: Arc<Shared>,
    dispatcher: DispatcherThread<Command>,
}

impl TimerManager {
    /// Manager on the process-wide timer service
    pub fn new(config: TimerConfig) -> SynchResult<Self> {
        Self::with_service(config, TimerService::global()?)
    }

    pub fn with_service(config: TimerConfig, service: Arc<TimerService>) -> SynchResult<Self> {
        let shared = Arc::new(Shared {
            service,
            timers: Mutex::new(HashMap::with_hasher(RandomState::new())),
        });

        // The dispatcher needs a poster for expiry callbacks, which only
        // exists once the thread does; hand it over through a slot.
        let poster_slot: Arc<Mutex<Option<Poster<Command>>>> = Arc::new(Mutex::new(None));
        let worker = Arc::clone(&shared);
        let slot = Arc::clone(&poster_slot);
        let dispatcher = DispatcherThread::spawn(
            &config.timer_manager_thread_name,
            config.startup_timeout,
            move |command| {
                let poster = slot.lock().clone();
                if let Some(poster) = poster {
                    worker.process(command, &poster);
                }
            },
        )?;
        *poster_slot.lock() = Some(dispatcher.poster());

        Ok(Self { shared, dispatcher })
    }

    /// Start (or restart) a timer
    ///
    /// Any expiry still in flight from a previous start is discarded.
    pub fn start_timer(&self, timer: &Arc<Timer>) -> SynchResult<()> {
        timer.period.validate()?;
        deadline_after(timer.timeout)?;
        let sequence = timer.next_sequence();
        timer.fired.store(0, Ordering::Release);

        let previous = self.shared.timers.lock().insert(
            timer.id,
            Entry {
                timer: Arc::clone(timer),
                sequence,
                armed: None,
            },
        );
        if let Some(armed) = previous.and_then(|entry| entry.armed) {
            self.shared.service.cancel(armed);
        }

        let composite = CompositeId::new(timer.id, sequence);
        if !self.dispatcher.post(Command::Start(composite)) {
            self.shared.timers.lock().remove(&timer.id);
            return Err(SynchError::ManagerStopped(timer.name.clone()));
        }
        debug!(timer = %timer.name, id = %composite, "Timer start posted");
        Ok(())
    }

    /// Stop a timer; returns `false` if it was not running
    pub fn stop_timer(&self, timer: &Timer) -> bool {
        let entry = self.shared.timers.lock().remove(&timer.id);
        match entry {
            Some(entry) => {
                if let Some(armed) = entry.armed {
                    self.shared.service.cancel(armed);
                }
                debug!(timer = %timer.name, "Timer stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, timer: &Timer) -> bool {
        self.shared.timers.lock().contains_key(&timer.id)
    }

    /// Number of running timers
    pub fn active_count(&self) -> usize {
        self.shared.timers.lock().len()
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Stop every timer and the dispatcher thread
    pub fn shutdown(&self) {
        let entries: Vec<Entry> = self.shared.timers.lock().drain().map(|(_, e)| e).collect();
        for armed in entries.iter().filter_map(|entry| entry.armed) {
            self.shared.service.cancel(armed);
        }
        self.dispatcher.shutdown();
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn process(&self, command: Command, poster: &Poster<Command>) {
        match command {
            Command::Start(composite) => self.arm(composite, poster),
            Command::Expired(composite) => self.expired(composite),
        }
    }

    fn arm(&self, composite: CompositeId, poster: &Poster<Command>) {
        // Registry lock held across arming so a concurrent stop sees `armed`
        let mut timers = self.timers.lock();
        let Some(entry) = timers.get_mut(&composite.guard) else {
            trace!(id = %composite, "Start of a stopped timer skipped");
            return;
        };
        if entry.sequence != composite.sequence {
            trace!(id = %composite, "Superseded timer start skipped");
            return;
        }

        let poster = poster.clone();
        let armed = self.service.arm(
            entry.timer.timeout,
            entry.timer.period,
            composite.pack(),
            Arc::new(move |_, context| {
                poster.post(Command::Expired(CompositeId::unpack(context)));
            }),
        );
        match armed {
            Ok(os_timer) => entry.armed = Some(os_timer),
            Err(e) => {
                warn!(timer = %entry.timer.name, error = %e, "Failed to arm timer");
                timers.remove(&composite.guard);
            }
        }
    }

    fn expired(&self, composite: CompositeId) {
        let timer = {
            let mut timers = self.timers.lock();
            let Some(entry) = timers.get(&composite.guard) else {
                trace!(id = %composite, "Expiry of a stopped timer ignored");
                return;
            };
            if entry.sequence != composite.sequence {
                trace!(id = %composite, "Stale timer expiry ignored");
                return;
            }

            let timer = Arc::clone(&entry.timer);
            let fired = timer.fired.fetch_add(1, Ordering::AcqRel) + 1;
            if timer.period.total_fires().is_some_and(|total| fired >= total) {
                timers.remove(&composite.guard);
            }
            timer
        };

        trace!(timer = %timer.name, fired = timer.fired_count(), "Timer expired");
        timer.handler.on_timer_expired(&timer);
    }
}
