//! GARAGE: Crew orchestration
//!
//! A [`Crew`] runs an ordered list of [`WorkUnit`]s, each performed by its
//! own worker, threading results through an [`ExecutionContext`] and
//! persisting the final report.

use thiserror::Error;

use motorcrew_agent::{AgentError, ExecutionContext, WorkerError};

pub mod automobile;
pub mod crew;
pub mod process;
pub mod report;
pub mod state;
pub mod unit;

pub use crew::{Crew, CrewOutput, StepOutcome, StepRecord};
pub use process::{Process, ProcessPolicy, Sequential};
pub use report::{PersistenceError, ReportSection};
pub use state::RunState;
pub use unit::{UnitTemplate, WorkUnit};

#[derive(Error, Debug)]
pub enum CrewError {
    #[error("◆ CREW HAS NO WORK UNITS")]
    Empty,

    #[error("◆ DUPLICATE UNIT ID: {0}")]
    DuplicateUnit(String),

    #[error("◆ NO WORKER FOR UNIT: {0}")]
    UnknownWorker(String),

    #[error("◆ UNKNOWN PROCESS: {0}")]
    UnknownProcess(String),

    #[error("◆ INVALID SCHEDULE FROM {policy}: {reason}")]
    InvalidSchedule { policy: String, reason: String },

    #[error("◆ ILLEGAL TRANSITION: {from} -> {to}")]
    IllegalTransition { from: RunState, to: RunState },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

pub type Result<T> = std::result::Result<T, CrewError>;

/// A run that stopped before completing. Keeps what was finished.
#[derive(Error, Debug)]
#[error("◆ RUN {state} AT UNIT {unit_index} ({unit_id}): {error}")]
pub struct CrewFailure {
    pub unit_index: usize,
    pub unit_id: String,
    #[source]
    pub error: CrewError,
    pub state: RunState,
    pub context: ExecutionContext,
    pub steps: Vec<StepRecord>,
}

impl CrewFailure {
    pub fn worker_error(&self) -> Option<&WorkerError> {
        match &self.error {
            CrewError::Worker(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, RunState::Cancelled(_))
    }
}
