/*!
 * Dispatcher Thread
 *
 * Single named worker thread fed by a `flume` channel. Managers use it to
 * serialize their start requests and expiry handling onto one thread.
 *
 * Spawning performs a readiness handshake through the wait engine itself:
 * the new thread sets a manual-reset event and the spawner waits on it.
 */

use crate::core::errors::{SynchError, SynchResult};
use crate::sync::{ResetMode, SynchEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

enum Envelope<E> {
    Event(E),
    Exit,
}

/// Cloneable handle for posting events to a dispatcher thread
pub(crate) struct Poster<E> {
    sender: flume::Sender<Envelope<E>>,
}

impl<E> Clone for Poster<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<E> Poster<E> {
    /// Queue an event; `false` once the thread has exited
    pub(crate) fn post(&self, event: E) -> bool {
        self.sender.send(Envelope::Event(event)).is_ok()
    }
}

/// Worker thread draining an event queue in order
pub(crate) struct DispatcherThread<E> {
    name: String,
    poster: Poster<E>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Send + 'static> DispatcherThread<E> {
    /// Spawn the thread and wait until it reports readiness
    pub(crate) fn spawn<F>(
        name: &str,
        startup_timeout: Duration,
        mut handler: F,
    ) -> SynchResult<Self>
    where
        F: FnMut(E) + Send + 'static,
    {
        let (sender, receiver) = flume::unbounded::<Envelope<E>>();
        let ready = SynchEvent::new(format!("{}-ready", name), false, ResetMode::Manual);
        let started = Arc::clone(&ready);
        let thread_name = name.to_string();

        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                started.set();
                drop(started);
                while let Ok(envelope) = receiver.recv() {
                    match envelope {
                        Envelope::Event(event) => handler(event),
                        Envelope::Exit => break,
                    }
                }
                debug!(thread = %thread_name, "Dispatcher loop exited");
            })
            .map_err(|e| SynchError::ThreadSpawn {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let poster = Poster { sender };
        if !ready.wait(Some(startup_timeout)) {
            warn!(thread = %name, ?startup_timeout, "Dispatcher thread did not start in time");
            let _ = poster.sender.send(Envelope::Exit);
            return Err(SynchError::StartupTimeout(name.to_string()));
        }

        info!(thread = %name, "Dispatcher thread started");
        Ok(Self {
            name: name.to_string(),
            poster,
            thread: Mutex::new(Some(handle)),
        })
    }

    /// Queue an event for the thread
    pub(crate) fn post(&self, event: E) -> bool {
        self.poster.post(event)
    }

    pub(crate) fn poster(&self) -> Poster<E> {
        self.poster.clone()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Stop after the events already queued and join the thread
    pub(crate) fn shutdown(&self) {
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        let _ = self.poster.sender.send(Envelope::Exit);
        if handle.thread().id() != std::thread::current().id() {
            let _ = handle.join();
        }
        info!(thread = %self.name, "Dispatcher thread stopped");
    }
}

impl<E> Drop for DispatcherThread<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.thread.get_mut().take() {
            let _ = self.poster.sender.send(Envelope::Exit);
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
