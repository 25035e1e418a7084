/// URL state definitions for the crawl frontier
use std::fmt;

/// The lifecycle state of a URL in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlState {
    /// Eligible for dequeue, not yet claimed by any worker
    Ready,

    /// Claimed by a worker, fetch/parse in flight
    Pending,

    /// Successfully fetched and parsed; never re-admitted
    Done,

    /// Fetch or parse failed; terminal for the run
    Failed,
}

impl UrlState {
    /// Returns true for `Done` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if the lifecycle allows moving from this state to `to`
    ///
    /// Only `Ready -> Pending` and `Pending -> Done | Failed` are legal.
    /// Terminal states never move, and nothing but `repair` re-enters `Ready`.
    pub fn can_move_to(&self, to: UrlState) -> bool {
        match self {
            Self::Ready => to == Self::Pending,
            Self::Pending => to.is_terminal(),
            Self::Done | Self::Failed => false,
        }
    }

    /// Converts the state to its stored string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Parses a state from its stored string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(Self::Ready),
            "pending" => Some(Self::Pending),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for UrlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
