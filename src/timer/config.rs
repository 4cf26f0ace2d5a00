/*!
 * Timer Configuration
 *
 * Thread names and timing knobs for the timer service and the managers
 */

use crate::core::limits::{
    DEFAULT_STARTUP_TIMEOUT, MIN_TIMER_RESOLUTION, TIMER_MANAGER_THREAD, TIMER_SERVICE_THREAD,
    WATCHDOG_MANAGER_THREAD,
};
use std::time::Duration;

/// Timer subsystem configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    /// Name of the timer service (callback) thread
    pub service_thread_name: String,
    /// Name of the timer manager dispatcher thread
    pub timer_manager_thread_name: String,
    /// Name of the watchdog manager dispatcher thread
    pub watchdog_thread_name: String,
    /// How long spawning a dispatcher waits for its readiness handshake
    pub startup_timeout: Duration,
    /// Shortest due time the service will arm (shorter values are rounded up)
    pub min_resolution: Duration,
}

impl TimerConfig {
    pub fn new() -> Self {
        Self {
            service_thread_name: TIMER_SERVICE_THREAD.to_string(),
            timer_manager_thread_name: TIMER_MANAGER_THREAD.to_string(),
            watchdog_thread_name: WATCHDOG_MANAGER_THREAD.to_string(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            min_resolution: MIN_TIMER_RESOLUTION,
        }
    }

    pub fn with_service_thread_name(mut self, name: impl Into<String>) -> Self {
        self.service_thread_name = name.into();
        self
    }

    pub fn with_timer_manager_thread_name(mut self, name: impl Into<String>) -> Self {
        self.timer_manager_thread_name = name.into();
        self
    }

    pub fn with_watchdog_thread_name(mut self, name: impl Into<String>) -> Self {
        self.watchdog_thread_name = name.into();
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_min_resolution(mut self, resolution: Duration) -> Self {
        self.min_resolution = resolution;
        self
    }

    /// Clamp a requested due time to the configured resolution
    #[inline]
    pub fn clamp_due(&self, due: Duration) -> Duration {
        due.max(self.min_resolution)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_due() {
        let config = TimerConfig::new().with_min_resolution(Duration::from_millis(5));
        assert_eq!(config.clamp_due(Duration::ZERO), Duration::from_millis(5));
        assert_eq!(config.clamp_due(Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[test]
    fn test_builder_names() {
        let config = TimerConfig::new().with_watchdog_thread_name("wd");
        assert_eq!(config.watchdog_thread_name, "wd");
        assert_eq!(config.service_thread_name, TIMER_SERVICE_THREAD);
    }
}
