/*!
 * Watchdog Manager
 *
 * Liveness guards for component threads. A guard that is not stopped in time
 * interrupts its owner's pending wait and asks the supervisor to recreate the
 * thread. Recovery is a corrective action, never a retry.
 *
 * Starts are serialized through the manager's dispatcher thread, stops cancel
 * directly. Every start bumps the guard's sequence, and an expiry carrying an
 * older `(guard, sequence)` composite is dropped.
 */

use super::config::TimerConfig;
use super::dispatcher::{DispatcherThread, Poster};
use super::service::{deadline_after, TimerPeriod, TimerService};
use crate::core::errors::{SynchError, SynchResult};
use crate::core::id::next_guard_id;
use crate::core::types::{CompositeId, GuardId, OsTimerId};
use crate::sync::interrupt_wait;
use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Recreates component threads whose watchdog expired
///
/// Called on the watchdog manager's dispatcher thread.
pub trait ThreadSupervisor: Send + Sync {
    fn recreate_thread(&self, watchdog: &Watchdog);
}

impl<F> ThreadSupervisor for F
where
    F: Fn(&Watchdog) + Send + Sync,
{
    fn recreate_thread(&self, watchdog: &Watchdog) {
        self(watchdog)
    }
}

/// Liveness guard for one thread
pub struct Watchdog {
    id: GuardId,
    name: String,
    timeout: Duration,
    owner: ThreadId,
    sequence: AtomicU32,
}

impl Watchdog {
    pub fn new(name: impl Into<String>, timeout: Duration, owner: ThreadId) -> Arc<Self> {
        Arc::new(Self {
            id: next_guard_id(),
            name: name.into(),
            timeout,
            owner,
            sequence: AtomicU32::new(0),
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

    /// Thread this watchdog supervises
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn sequence(&self) -> u32 {
        self.sequence.load(Ordering::Acquire)
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}

impl fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchdog")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("owner", &self.owner)
            .field("sequence", &self.sequence())
            .finish()
    }
}

struct Guard {
    watchdog: Arc<Watchdog>,
    sequence: u32,
    armed: Option<OsTimerId>,
}

enum Command {
    Start(CompositeId),
    Recover(Arc<Watchdog>),
}

struct Shared {
    service: Arc<TimerService>,
    supervisor: Arc<dyn ThreadSupervisor>,
    guards: Mutex<HashMap<GuardId, Guard, RandomState>>,
}

/// Owner of watchdog guards
pub struct WatchdogManager {
    shared: Arc<Shared>,
    dispatcher: DispatcherThread<Command>,
}

impl WatchdogManager {
    /// Manager on the process-wide timer service
    pub fn new(config: TimerConfig, supervisor: Arc<dyn ThreadSupervisor>) -> SynchResult<Self> {
        Self::with_service(config, TimerService::global()?, supervisor)
    }

    pub fn with_service(
        config: TimerConfig,
        service: Arc<TimerService>,
        supervisor: Arc<dyn ThreadSupervisor>,
    ) -> SynchResult<Self> {
        let shared = Arc::new(Shared {
            service,
            supervisor,
            guards: Mutex::new(HashMap::with_hasher(RandomState::new())),
        });

        let poster_slot: Arc<Mutex<Option<Poster<Command>>>> = Arc::new(Mutex::new(None));
        let worker = Arc::clone(&shared);
        let slot = Arc::clone(&poster_slot);
        let dispatcher = DispatcherThread::spawn(
            &config.watchdog_thread_name,
            config.startup_timeout,
            move |command| match command {
                Command::Start(composite) => {
                    let poster = slot.lock().clone();
                    if let Some(poster) = poster {
                        Shared::arm(&worker, composite, poster);
                    }
                }
                Command::Recover(watchdog) => {
                    debug!(watchdog = %watchdog.name, "Recreating supervised thread");
                    worker.supervisor.recreate_thread(&watchdog);
                }
            },
        )?;
        *poster_slot.lock() = Some(dispatcher.poster());

        Ok(Self { shared, dispatcher })
    }

    /// Start (or restart) a guard
    ///
    /// Restarting supersedes the previous arming; its expiry is ignored even
    /// if the OS callback is already in flight.
    pub fn start_guard(&self, watchdog: &Arc<Watchdog>) -> SynchResult<()> {
        deadline_after(watchdog.timeout)?;
        let sequence = watchdog.next_sequence();
        let previous = self.shared.guards.lock().insert(
            watchdog.id,
            Guard {
                watchdog: Arc::clone(watchdog),
                sequence,
                armed: None,
            },
        );
        if let Some(armed) = previous.and_then(|guard| guard.armed) {
            self.shared.service.cancel(armed);
        }

        let composite = CompositeId::new(watchdog.id, sequence);
        if !self.dispatcher.post(Command::Start(composite)) {
            self.shared.guards.lock().remove(&watchdog.id);
            return Err(SynchError::ManagerStopped(watchdog.name.clone()));
        }
        trace!(watchdog = %watchdog.name, id = %composite, "Guard start posted");
        Ok(())
    }

    /// Stop a guard; returns `false` if it was not guarding
    pub fn stop_guard(&self, watchdog: &Watchdog) -> bool {
        let guard = self.shared.guards.lock().remove(&watchdog.id);
        match guard {
            Some(guard) => {
                if let Some(armed) = guard.armed {
                    self.shared.service.cancel(armed);
                }
                trace!(watchdog = %watchdog.name, "Guard stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_guarding(&self, watchdog: &Watchdog) -> bool {
        self.shared.guards.lock().contains_key(&watchdog.id)
    }

    /// Number of live guards
    pub fn active_count(&self) -> usize {
        self.shared.guards.lock().len()
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    /// Stop every guard and the dispatcher thread
    pub fn shutdown(&self) {
        let guards: Vec<Guard> = self.shared.guards.lock().drain().map(|(_, g)| g).collect();
        for armed in guards.iter().filter_map(|guard| guard.armed) {
            self.shared.service.cancel(armed);
        }
        self.dispatcher.shutdown();
    }
}

impl Drop for WatchdogManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn arm(this: &Arc<Self>, composite: CompositeId, poster: Poster<Command>) {
        let mut guards = this.guards.lock();
        let Some(guard) = guards.get_mut(&composite.guard) else {
            trace!(id = %composite, "Start of a stopped guard skipped");
            return;
        };
        if guard.sequence != composite.sequence {
            trace!(id = %composite, "Superseded guard start skipped");
            return;
        }

        let manager: Weak<Self> = Arc::downgrade(this);
        let armed = this.service.arm(
            guard.watchdog.timeout,
            TimerPeriod::Once,
            composite.pack(),
            Arc::new(move |_, context| {
                if let Some(manager) = manager.upgrade() {
                    manager.on_os_expiry(context, &poster);
                }
            }),
        );
        match armed {
            Ok(os_timer) => guard.armed = Some(os_timer),
            Err(e) => {
                warn!(watchdog = %guard.watchdog.name, error = %e, "Failed to arm watchdog");
                guards.remove(&composite.guard);
            }
        }
    }

    /// Expiry from the timer service; returns whether recovery was triggered
    fn on_os_expiry(&self, context: u64, poster: &Poster<Command>) -> bool {
        let composite = CompositeId::unpack(context);
        let watchdog = {
            let mut guards = self.guards.lock();
            match guards.get(&composite.guard) {
                None => {
                    trace!(id = %composite, "Expiry of a stopped guard ignored");
                    return false;
                }
                Some(guard) if guard.sequence != composite.sequence => {
                    trace!(id = %composite, current = guard.sequence, "Stale guard expiry ignored");
                    return false;
                }
                Some(_) => {}
            }
            match guards.remove(&composite.guard) {
                Some(guard) => {
                    if let Some(armed) = guard.armed {
                        self.service.cancel(armed);
                    }
                    guard.watchdog
                }
                None => return false,
            }
        };

        let interrupted = interrupt_wait(watchdog.owner);
        error!(
            watchdog = %watchdog.name,
            id = %composite,
            owner = ?watchdog.owner,
            interrupted,
            "Watchdog expired, recreating thread"
        );
        if !poster.post(Command::Recover(watchdog)) {
            warn!(id = %composite, "Watchdog manager stopped before recovery");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        recreated: AtomicUsize,
    }

    impl ThreadSupervisor for Counting {
        fn recreate_thread(&self, _watchdog: &Watchdog) {
            self.recreated.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager() -> (WatchdogManager, Arc<Counting>) {
        let supervisor = Arc::new(Counting {
            recreated: AtomicUsize::new(0),
        });
        let config = TimerConfig::new()
            .with_watchdog_thread_name("test-watchdog")
            .with_service_thread_name("test-watchdog-service");
        let service = TimerService::new(config.clone()).unwrap();
        let manager =
            WatchdogManager::with_service(config, service, supervisor.clone()).unwrap();
        (manager, supervisor)
    }

    #[test]
    fn test_expired_guard_recreates_thread() {
        let (manager, supervisor) = manager();
        let watchdog =
            Watchdog::new("worker", Duration::from_millis(50), std::thread::current().id());

        manager.start_guard(&watchdog).unwrap();
        assert!(manager.is_guarding(&watchdog));
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(supervisor.recreated.load(Ordering::SeqCst), 1);
        assert!(!manager.is_guarding(&watchdog));
    }

    #[test]
    fn test_stopped_guard_does_not_fire() {
        let (manager, supervisor) = manager();
        let watchdog =
            Watchdog::new("kicked", Duration::from_millis(50), std::thread::current().id());

        manager.start_guard(&watchdog).unwrap();
        assert!(manager.stop_guard(&watchdog));
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(supervisor.recreated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stale_expiry_after_restart_ignored() {
        let (manager, supervisor) = manager();
        let watchdog =
            Watchdog::new("restarted", Duration::from_secs(60), std::thread::current().id());

        manager.start_guard(&watchdog).unwrap();
        let stale = CompositeId::new(watchdog.id(), watchdog.sequence());
        manager.stop_guard(&watchdog);
        manager.start_guard(&watchdog).unwrap();

        let poster = manager.dispatcher.poster();
        assert!(!manager.shared.on_os_expiry(stale.pack(), &poster));
        assert!(manager.is_guarding(&watchdog));

        let live = CompositeId::new(watchdog.id(), watchdog.sequence());
        assert!(manager.shared.on_os_expiry(live.pack(), &poster));
        assert!(!manager.is_guarding(&watchdog));

        manager.shutdown();
        assert_eq!(supervisor.recreated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unrepresentable_timeout_rejected() {
        let (manager, supervisor) = manager();
        let owner = std::thread::current().id();
        let forever = Watchdog::new("forever", Duration::MAX, owner);

        let result = manager.start_guard(&forever);
        assert!(matches!(result, Err(SynchError::InvalidArgument(_))));
        assert!(!manager.is_guarding(&forever));

        let watchdog = Watchdog::new("after", Duration::from_millis(20), owner);
        manager.start_guard(&watchdog).unwrap();
        std::thread::sleep(Duration::from_millis(150));
        assert!(manager.is_running());
        assert_eq!(supervisor.recreated.load(Ordering::SeqCst), 1);
    }
}
