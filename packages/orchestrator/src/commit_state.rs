//! Per-commit run state (§4), generalized from the teacher's
//! `JobStateMachine` (queued/running/completed/failed/cancelled with retry
//! backoff) down to the two-phase discipline a single commit's pass
//! invocations need: pending, running, then completed or failed. There is no
//! retry/backoff here — the range aborts on first failure (§4.4) rather than
//! rescheduling the commit.

use crate::error::{OrchestratorError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitState {
    Pending,
    Running,
    Completed,
    Failed { error: String },
}

impl CommitState {
    pub fn state_name(&self) -> &'static str {
        match self {
            CommitState::Pending => "pending",
            CommitState::Running => "running",
            CommitState::Completed => "completed",
            CommitState::Failed { .. } => "failed",
        }
    }
}

/// Tracks one commit's progress through the range. Not `Clone`: a run is a
/// one-way trip through its states.
pub struct CommitRun {
    pub hash: String,
    state: CommitState,
}

impl CommitRun {
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            state: CommitState::Pending,
        }
    }

    pub fn state(&self) -> &CommitState {
        &self.state
    }

    pub fn start(&mut self) -> Result<()> {
        match self.state {
            CommitState::Pending => {
                self.state = CommitState::Running;
                Ok(())
            }
            _ => Err(self.invalid_transition("running")),
        }
    }

    pub fn complete(&mut self) -> Result<()> {
        match self.state {
            CommitState::Running => {
                self.state = CommitState::Completed;
                Ok(())
            }
            _ => Err(self.invalid_transition("completed")),
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        match self.state {
            CommitState::Running => {
                self.state = CommitState::Failed { error: error.into() };
                Ok(())
            }
            _ => Err(self.invalid_transition("failed")),
        }
    }

    fn invalid_transition(&self, to: &str) -> OrchestratorError {
        OrchestratorError::InvalidStateTransition {
            from: self.state.state_name().to_string(),
            to: to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_to_running_to_completed() {
        let mut run = CommitRun::new("abc123");
        run.start().unwrap();
        assert_eq!(run.state(), &CommitState::Running);
        run.complete().unwrap();
        assert_eq!(run.state(), &CommitState::Completed);
    }

    #[test]
    fn running_to_failed_carries_message() {
        let mut run = CommitRun::new("abc123");
        run.start().unwrap();
        run.fail("tool exited non-zero").unwrap();
        match run.state() {
            CommitState::Failed { error } => assert_eq!(error, "tool exited non-zero"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn cannot_complete_before_running() {
        let mut run = CommitRun::new("abc123");
        assert!(run.complete().is_err());
    }

    #[test]
    fn cannot_restart_a_completed_run() {
        let mut run = CommitRun::new("abc123");
        run.start().unwrap();
        run.complete().unwrap();
        assert!(run.start().is_err());
    }
}
