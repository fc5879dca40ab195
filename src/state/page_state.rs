/// Page state definitions for tracking mirror progress
///
/// This module defines all possible states a URL can be in once the
/// frontier has accepted it.
use std::fmt;

/// Represents the current state of a URL in the mirror process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    // ===== Active States =====
    /// URL is queued and waiting to be fetched
    Queued,

    /// URL is currently being fetched, rewritten and written
    Fetching,

    /// Fetch failed at the transport level and the URL was queued again
    Retrying,

    // ===== Terminal Success States =====
    /// Resource was written to its destination path
    Mirrored,

    // ===== Terminal Skip States =====
    /// Server answered with a non-success status, or redirected off-site
    Skipped,

    // ===== Terminal Error States =====
    /// Rewriting or writing the resource failed
    Failed,

    /// Transport failures exhausted the retry budget
    Abandoned,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state (URL may still be processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Fetching | Self::Retrying)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Mirrored)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed | Self::Abandoned)
    }

    /// Returns the short name used in logs and statistics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Retrying => "retrying",
            Self::Mirrored => "mirrored",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Queued,
            Self::Fetching,
            Self::Retrying,
            Self::Mirrored,
            Self::Skipped,
            Self::Failed,
            Self::Abandoned,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
