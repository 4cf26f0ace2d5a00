/*!
 * ID Generation System
 * Process-wide identity allocation for waitables, guards and OS timers
 */

use super::types::{GuardId, OsTimerId, WaitableId};
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// ID Generator Trait
// ============================================================================

/// Generic ID generator interface
pub trait IdGenerator<T> {
    /// Generate next ID
    fn next(&self) -> T;

    /// Get current counter value (for debugging)
    fn current(&self) -> T;
}

// ============================================================================
// Atomic Counter Generator
// ============================================================================

/// Lock-free monotonically increasing counter
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Identities are never recycled, so a stale id can never alias a live object
#[repr(C, align(64))]
pub struct AtomicGenerator {
    counter: AtomicU64,
}

impl AtomicGenerator {
    /// Create new generator starting at given value
    #[inline]
    pub const fn new(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }
}

impl IdGenerator<u64> for AtomicGenerator {
    #[inline]
    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    fn current(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Process-Wide Generators
// ============================================================================

static WAITABLE_IDS: AtomicGenerator = AtomicGenerator::new(1);
static OS_TIMER_IDS: AtomicGenerator = AtomicGenerator::new(1);
static GUARD_IDS: AtomicGenerator = AtomicGenerator::new(1);

/// Allocate a fresh waitable identity
#[inline]
pub fn next_waitable_id() -> WaitableId {
    WaitableId(WAITABLE_IDS.next())
}

/// Allocate a fresh timer-service handle
#[inline]
pub fn next_os_timer_id() -> OsTimerId {
    OsTimerId(OS_TIMER_IDS.next())
}

/// Allocate a fresh guard identity for a timer or watchdog
///
/// Zero is never handed out so that a zeroed context cannot match a live guard.
#[inline]
pub fn next_guard_id() -> GuardId {
    loop {
        // Truncation wraps after 2^32 guards; zero is skipped below
        let id = GUARD_IDS.next() as u32;
        if id != 0 {
            return GuardId(id);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
