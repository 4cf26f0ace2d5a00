/*!
 * Wait Engine Configuration
 *
 * Runtime configuration read by every wait call
 */

use crate::core::errors::{SynchError, SynchResult};
use crate::core::limits::{DEFAULT_SLOW_WAIT_THRESHOLD, MAXIMUM_WAITING_OBJECTS};
use parking_lot::{const_rwlock, RwLock};
use std::time::Duration;

/// Environment variable overriding [`SynchConfig::max_waiting_objects`]
pub const MAX_WAITING_OBJECTS_ENV: &str = "SYNCH_MAX_WAITING_OBJECTS";

/// Wait engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynchConfig {
    /// Upper bound on targets per wait call (1..=32)
    pub max_waiting_objects: usize,
    /// Waits that block longer than this are logged; `None` disables it
    pub slow_wait_threshold: Option<Duration>,
}

static ACTIVE: RwLock<SynchConfig> = const_rwlock(SynchConfig::new());

impl Default for SynchConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SynchConfig {
    /// Default configuration
    pub const fn new() -> Self {
        Self {
            max_waiting_objects: MAXIMUM_WAITING_OBJECTS,
            slow_wait_threshold: Some(DEFAULT_SLOW_WAIT_THRESHOLD),
        }
    }

    /// Set the per-call target limit
    pub fn with_max_waiting_objects(mut self, max: usize) -> SynchResult<Self> {
        if max == 0 || max > MAXIMUM_WAITING_OBJECTS {
            return Err(SynchError::TooManyObjects {
                requested: max,
                maximum: MAXIMUM_WAITING_OBJECTS,
            });
        }
        self.max_waiting_objects = max;
        Ok(self)
    }

    /// Set or disable the slow-wait log threshold
    pub fn with_slow_wait_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.slow_wait_threshold = threshold;
        self
    }

    /// Defaults overridden by `SYNCH_MAX_WAITING_OBJECTS` when it parses
    pub fn from_env() -> SynchResult<Self> {
        let config = Self::new();
        match std::env::var(MAX_WAITING_OBJECTS_ENV) {
            Ok(raw) => {
                let max = raw.trim().parse::<usize>().map_err(|e| {
                    let setting = format!("{}={}", MAX_WAITING_OBJECTS_ENV, raw);
                    SynchError::InvalidArgument(format!("{}: {}", setting, e))
                })?;
                config.with_max_waiting_objects(max)
            }
            Err(_) => Ok(config),
        }
    }

    /// Make this the configuration used by all subsequent wait calls
    pub fn install(self) {
        *ACTIVE.write() = self;
        tracing::debug!(
            max_waiting_objects = self.max_waiting_objects,
            slow_wait_threshold = ?self.slow_wait_threshold,
            "Wait engine configuration installed"
        );
    }

    /// Configuration currently in effect
    pub fn active() -> Self {
        *ACTIVE.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = SynchConfig::default();
        assert_eq!(config.max_waiting_objects, 32);
        assert!(config.slow_wait_threshold.is_some());
    }

    #[test]
    fn test_limit_validation() {
        assert!(SynchConfig::new().with_max_waiting_objects(0).is_err());
        assert!(SynchConfig::new().with_max_waiting_objects(33).is_err());
        let config = SynchConfig::new().with_max_waiting_objects(8).unwrap();
        assert_eq!(config.max_waiting_objects, 8);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::remove_var(MAX_WAITING_OBJECTS_ENV);
        assert_eq!(SynchConfig::from_env(), Ok(SynchConfig::new()));

        std::env::set_var(MAX_WAITING_OBJECTS_ENV, " 8 ");
        let parsed = SynchConfig::from_env();

        std::env::set_var(MAX_WAITING_OBJECTS_ENV, "eight");
        let garbage = SynchConfig::from_env();

        std::env::set_var(MAX_WAITING_OBJECTS_ENV, "40");
        let too_many = SynchConfig::from_env();
        std::env::remove_var(MAX_WAITING_OBJECTS_ENV);

        assert_eq!(parsed.map(|config| config.max_waiting_objects), Ok(8));
        assert!(matches!(garbage, Err(SynchError::InvalidArgument(_))));
        assert_eq!(
            too_many,
            Err(SynchError::TooManyObjects {
                requested: 40,
                maximum: MAXIMUM_WAITING_OBJECTS,
            })
        );
    }
}
