/*!
 * Core Types
 * Identity types shared by the wait engine, the timer service and the managers
 */

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type-Safe ID Wrappers
// ============================================================================

/// Stable identity of a waitable object
///
/// Used as the registry key instead of the object's address, so a registry
/// entry can never outlive or alias the object it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaitableId(pub u64);

/// Numeric identity of a timer or watchdog registered with a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuardId(pub u32);

/// Handle of an armed timer inside the timer service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OsTimerId(pub u64);

impl fmt::Display for WaitableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GuardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OsTimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Composite Guard Identity
// ============================================================================

/// `(guard, sequence)` pair passed through the timer service as an opaque `u64`
///
/// The guard id occupies the high 32 bits and the sequence number the low 32 bits.
/// An expiry carrying a sequence other than the guard's current one belongs to a
/// superseded arming and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeId {
    pub guard: GuardId,
    pub sequence: u32,
}

impl CompositeId {
    #[inline]
    pub const fn new(guard: GuardId, sequence: u32) -> Self {
        Self { guard, sequence }
    }

    /// Pack into the opaque timer context
    #[inline]
    pub const fn pack(self) -> u64 {
        ((self.guard.0 as u64) << 32) | self.sequence as u64
    }

    /// Decode an opaque timer context
    #[inline]
    pub const fn unpack(context: u64) -> Self {
        Self {
            guard: GuardId((context >> 32) as u32),
            sequence: context as u32,
        }
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.guard, self.sequence)
    }
}
