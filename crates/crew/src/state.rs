//! Run lifecycle with validated transitions
//!
//! ```text
//! Pending    → Running(0)
//! Running(i) → Running(i + 1) | Completed | Failed(i) | Cancelled(i)
//! ```

use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::{CrewError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    /// Executing the unit at this schedule position
    Running(usize),
    Completed,
    Failed(usize),
    Cancelled(usize),
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed(_) | Self::Cancelled(_)
        )
    }

    fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Pending, Running(0)) => true,
            (Running(i), Running(j)) => j == i + 1,
            (Running(_), Completed) => true,
            (Running(i), Failed(j)) | (Running(i), Cancelled(j)) => i == j,
            _ => false,
        }
    }

    /// Move to `next`, rejecting edges outside the lifecycle
    pub fn advance(self, next: RunState) -> Result<RunState> {
        if !self.can_advance_to(next) {
            return Err(CrewError::IllegalTransition {
                from: self,
                to: next,
            });
        }
        info!("◆ STATE {} -> {}", self, next);
        Ok(next)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running(i) => write!(f, "RUNNING({})", i),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed(i) => write!(f, "FAILED({})", i),
            Self::Cancelled(i) => write!(f, "CANCELLED({})", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RunState::*;

    #[test]
    fn test_happy_path() {
        let state = Pending.advance(Running(0)).unwrap();
        let state = state.advance(Running(1)).unwrap();
        let state = state.advance(Completed).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn test_failure_and_cancel_keep_index() {
        assert_eq!(Running(2).advance(Failed(2)).unwrap(), Failed(2));
        assert_eq!(Running(0).advance(Cancelled(0)).unwrap(), Cancelled(0));
        assert!(Running(2).advance(Failed(1)).is_err());
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(Pending.advance(Running(1)).is_err());
        assert!(Pending.advance(Completed).is_err());
        assert!(Running(0).advance(Running(2)).is_err());
        assert!(Completed.advance(Running(0)).is_err());
        assert!(Failed(1).advance(Running(2)).is_err());

        let err = Cancelled(0).advance(Completed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "◆ ILLEGAL TRANSITION: CANCELLED(0) -> COMPLETED"
        );
    }
}
