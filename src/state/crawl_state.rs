/// Session lifecycle states for the crawl controller
use std::fmt;

/// Represents where a crawl session is in its lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// No session has been started yet
    #[default]
    Idle,

    /// The per-page loop is running
    Active,

    // ===== Terminal States =====
    /// Pagination ran out naturally
    Complete,

    /// The session was cancelled or a listing fetch failed unrecoverably
    Aborted,
}

impl CrawlState {
    /// Returns true if the session has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Aborted)
    }

    /// Returns true if a new session may be started from this state
    pub fn can_start(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Short uppercase label for status displays
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::Complete => "COMPLETE",
            Self::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
