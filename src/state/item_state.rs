/// Queue item state definitions
///
/// Items move `Pending -> Processing -> Completed` and never backward,
/// except that an abandoned claim may be released back to `Pending`.
use std::fmt;

/// Represents where a queue item is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Queued and waiting to be claimed
    Pending,

    /// Claimed by a worker
    Processing,

    /// Processed, with or without an error
    Completed,
}

impl ItemState {
    /// Derives the state from the persisted `processing`/`completed` flags
    ///
    /// `completed` wins if both flags are somehow set, so a finished item is
    /// never handed out again.
    pub fn from_flags(processing: bool, completed: bool) -> Self {
        if completed {
            Self::Completed
        } else if processing {
            Self::Processing
        } else {
            Self::Pending
        }
    }

    /// Returns the `(processing, completed)` flags for this state
    pub fn to_flags(&self) -> (bool, bool) {
        match self {
            Self::Pending => (false, false),
            Self::Processing => (true, false),
            Self::Completed => (false, true),
        }
    }

    /// Returns true if the item can be claimed
    pub fn is_claimable(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
