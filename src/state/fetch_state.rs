/// Fetch state definitions for a single logical fetch
///
/// A logical fetch moves through a small state machine: the policy check runs
/// once, then the attempt loop runs until it succeeds or spends its budget.
use std::fmt;

/// Represents the current state of a logical fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    // ===== Active States =====
    /// Request accepted, nothing checked yet
    Init,

    /// Waiting on the robots.txt decision
    CheckPolicy,

    /// Inside the attempt loop
    Attempting,

    // ===== Terminal States =====
    /// Robots.txt denied the URL; no request was issued
    Denied,

    /// An attempt produced an acceptable response
    Succeeded,

    /// The attempt budget ran out without success
    Exhausted,
}

impl FetchState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Denied | Self::Succeeded | Self::Exhausted)
    }

    /// Returns true if this is an active state
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// `Attempting -> Attempting` is the retry edge.
    pub fn can_transition_to(&self, next: FetchState) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::CheckPolicy)
                | (Self::CheckPolicy, Self::Denied)
                | (Self::CheckPolicy, Self::Attempting)
                | (Self::Attempting, Self::Attempting)
                | (Self::Attempting, Self::Succeeded)
                | (Self::Attempting, Self::Exhausted)
        )
    }

    /// Short name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::CheckPolicy => "check_policy",
            Self::Attempting => "attempting",
            Self::Denied => "denied",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
        }
    }

    /// Returns all possible fetch states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Init,
            Self::CheckPolicy,
            Self::Attempting,
            Self::Denied,
            Self::Succeeded,
            Self::Exhausted,
        ]
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
