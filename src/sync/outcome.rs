/*!
 * Wait Outcomes
 *
 * Every way a wait call can end. Nothing on the wait path returns an error:
 * callers match on the outcome instead.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Match policy of a multi-object wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Resolve on the first target that grants ownership
    Any,
    /// Resolve only when every target grants ownership together
    All,
}

impl MatchPolicy {
    #[inline]
    pub const fn from_match_all(match_all: bool) -> Self {
        if match_all {
            Self::All
        } else {
            Self::Any
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }
}

/// Result of a wait call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "index", rename_all = "snake_case")]
pub enum WaitOutcome {
    /// The target at this index fired and the caller owns it
    Signaled(usize),
    /// Every target fired and the caller owns all of them
    AllSignaled,
    /// The deadline passed first
    Timeout,
    /// The wait was torn down by a forced thread recovery
    Interrupted,
    /// An asynchronous signal addressed to the calling thread arrived
    AsyncSignal,
    /// The target at this index is missing, failed or was destroyed
    Failed(usize),
    /// The call itself was malformed; nothing was waited on
    Invalid,
}

impl WaitOutcome {
    /// Whether the caller now owns what it asked for
    #[inline]
    pub const fn is_signaled(&self) -> bool {
        matches!(self, Self::Signaled(_) | Self::AllSignaled)
    }

    /// Index of the fired object for an ANY-match or single-object wait
    #[inline]
    pub const fn fired_index(&self) -> Option<usize> {
        match self {
            Self::Signaled(index) => Some(*index),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Whether the outcome is a caller or object error
    #[inline]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Invalid)
    }
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signaled(index) => write!(f, "signaled[{}]", index),
            Self::AllSignaled => f.write_str("all-signaled"),
            Self::Timeout => f.write_str("timeout"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::AsyncSignal => f.write_str("async-signal"),
            Self::Failed(index) => write!(f, "failed[{}]", index),
            Self::Invalid => f.write_str("invalid"),
        }
    }
}
