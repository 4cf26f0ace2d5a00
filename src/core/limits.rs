/*!
 * System Limits and Constants
 *
 * Centralized location for all wait-subsystem limits, thresholds, and magic numbers.
 * Organized by domain for maintainability and discoverability.
 *
 * ## Conventions
 * - Values are grouped by domain (wait engine, timers, watchdog)
 * - Performance-critical constants are marked with [PERF]
 * - POSIX/Win32-compatible values are marked with [COMPAT]
 */

use std::time::Duration;

// =============================================================================
// WAIT ENGINE
// =============================================================================

/// Maximum number of objects a single multi-object wait may target
/// [COMPAT] Mirrors MAXIMUM_WAIT_OBJECTS of the Win32 API this layer emulates
pub const MAXIMUM_WAITING_OBJECTS: usize = 32;

/// Waits longer than this are reported at debug level when slow-wait logging is on
pub const DEFAULT_SLOW_WAIT_THRESHOLD: Duration = Duration::from_millis(500);

/// Initial capacity of a waitable's waiter list
/// [PERF] Most waitables have one or two blocked threads at a time
pub const WAITER_LIST_CAPACITY: usize = 4;

// =============================================================================
// TIMERS
// =============================================================================

/// Finest due-time granularity accepted by the timer service (1ms)
/// Shorter timeouts are rounded up to this value
pub const MIN_TIMER_RESOLUTION: Duration = Duration::from_millis(1);

/// How long a manager waits for its dispatcher thread to report readiness
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Initial heap capacity of the timer service
pub const TIMER_HEAP_CAPACITY: usize = 64;

// =============================================================================
// THREAD NAMES
// =============================================================================

/// Name of the timer service (system callback) thread
pub const TIMER_SERVICE_THREAD: &str = "synch-timer-service";

/// Name of the timer manager dispatcher thread
pub const TIMER_MANAGER_THREAD: &str = "synch-timer-manager";

/// Name of the watchdog manager dispatcher thread
pub const WATCHDOG_MANAGER_THREAD: &str = "synch-watchdog-manager";
