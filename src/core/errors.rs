/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 *
 * Only the object-management paths fail with an error. Wait calls never do:
 * every wait result, including timeouts and per-index failures, is a
 * `WaitOutcome` value.
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for synchronization object management
pub type SynchResult<T> = Result<T, SynchError>;

/// Synchronization errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SynchError {
    #[error("Mutex '{0}' is not owned by the calling thread")]
    #[diagnostic(
        code(synch::not_owner),
        help("Only the thread that locked a mutex may unlock it.")
    )]
    NotOwner(String),

    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(synch::invalid_argument),
        help("Check counts, periods and timeouts passed to the constructor.")
    )]
    InvalidArgument(String),

    #[error("Too many wait objects: {requested} (maximum {maximum})")]
    #[diagnostic(
        code(synch::too_many_objects),
        help("Split the wait into several calls or lower the object count.")
    )]
    TooManyObjects { requested: usize, maximum: usize },

    #[error("Timer service is stopped")]
    #[diagnostic(
        code(synch::service_stopped),
        help("The timer service was shut down. Create a new service or use the global one.")
    )]
    ServiceStopped,

    #[error("Manager '{0}' is stopped")]
    #[diagnostic(
        code(synch::manager_stopped),
        help("The manager's dispatcher thread has exited. Create a new manager.")
    )]
    ManagerStopped(String),

    #[error("Failed to spawn thread '{name}': {reason}")]
    #[diagnostic(
        code(synch::thread_spawn),
        help("System may be out of threads or memory. View logs for details.")
    )]
    ThreadSpawn { name: String, reason: String },

    #[error("Thread '{0}' did not report readiness in time")]
    #[diagnostic(
        code(synch::startup_timeout),
        help("Increase TimerConfig::startup_timeout or check for a stuck system.")
    )]
    StartupTimeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SynchError::TooManyObjects {
            requested: 40,
            maximum: 32,
        };
        assert_eq!(err.to_string(), "Too many wait objects: 40 (maximum 32)");
    }

    #[test]
    fn test_error_diagnostic_code() {
        let err = SynchError::NotOwner("m".into());
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("synch::not_owner"));
    }
}
