/// Lifecycle state definitions for the crawl engine
///
/// The engine moves through these states only via its own control
/// operations (crawl, pause, resume, abort) and the drain condition.
use std::fmt;

/// Represents the current lifecycle state of a crawler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CrawlState {
    /// Constructed but never started
    #[default]
    Idle,

    /// Claiming and processing queue items
    Running,

    /// No new items are claimed; in-flight items keep going
    Paused,

    /// Queued work discarded; waiting for in-flight items to drain
    Aborted,

    /// No work remains and nothing is in flight
    Completed,
}

impl CrawlState {
    /// Returns true if no further transitions are possible
    ///
    /// `Aborted` only waits for the drain and always ends in `Completed`,
    /// so both count as terminal for control operations.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Aborted | Self::Completed)
    }

    /// Returns true if the engine may claim new items in this state
    pub fn admits_claims(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if `next` is a legal transition from this state
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;

        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Idle, Aborted)
                | (Running, Aborted)
                | (Paused, Aborted)
                | (Running, Completed)
                | (Aborted, Completed)
        )
    }

    /// Short lowercase name, used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Aborted => "aborted",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
