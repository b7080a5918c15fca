use crate::fetcher::Verdict;
use crate::state::FetchState;

/// Transition function for one logical fetch
///
/// Drives `Init -> CheckPolicy -> (Denied | Attempting)`, then consumes one
/// classified verdict per attempt until the fetch succeeds or its budget is
/// spent. The caller never sets states directly.
#[derive(Debug, Clone)]
pub struct FetchMachine {
    state: FetchState,
    budget: u32,
    attempts_used: u32,
}

impl FetchMachine {
    pub fn new(budget: u32) -> Self {
        Self {
            state: FetchState::Init,
            budget: budget.max(1),
            attempts_used: 0,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts_used
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Index of the next attempt (1-based)
    pub fn next_attempt(&self) -> u32 {
        self.attempts_used + 1
    }

    pub fn begin_policy_check(&mut self) -> FetchState {
        self.move_to(FetchState::CheckPolicy)
    }

    pub fn policy_decided(&mut self, allowed: bool) -> FetchState {
        if allowed {
            self.move_to(FetchState::Attempting)
        } else {
            self.move_to(FetchState::Denied)
        }
    }

    /// Feeds the verdict of the attempt that just finished
    pub fn record_attempt(&mut self, verdict: Verdict) -> FetchState {
        self.attempts_used += 1;
        let next = if verdict == Verdict::Success {
            FetchState::Succeeded
        } else if self.attempts_used >= self.budget {
            FetchState::Exhausted
        } else {
            FetchState::Attempting
        };
        self.move_to(next)
    }

    fn move_to(&mut self, next: FetchState) -> FetchState {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal fetch transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!("Fetch state {} -> {}", self.state, next);
        self.state = next;
        next
    }
}
