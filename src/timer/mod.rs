/*!
 * Timers
 *
 * - `service`: dedicated thread delivering OS-style timer expiries
 * - `manager`: application timers with sequence-guarded expiry
 * - `watchdog`: thread liveness guards with forced recovery
 */

pub mod config;
mod dispatcher;
pub mod manager;
pub mod service;
pub mod watchdog;

pub use config::TimerConfig;
pub use manager::{Timer, TimerHandler, TimerManager};
pub use service::{TimerCallback, TimerPeriod, TimerService};
pub use watchdog::{ThreadSupervisor, Watchdog, WatchdogManager};
