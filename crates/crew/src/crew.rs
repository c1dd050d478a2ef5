//! Crew: runs work units in order and threads results between them

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use motorcrew_agent::{ExecutionContext, RetryPolicy, Worker, WorkerError};

use crate::process::{validate_schedule, ProcessPolicy, Sequential};
use crate::report::{self, PersistenceError};
use crate::state::RunState;
use crate::unit::WorkUnit;
use crate::{CrewError, CrewFailure, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed(String),
    Cancelled,
}

/// Timing and outcome of one unit within a run
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub position: usize,
    pub unit_id: String,
    pub worker_role: String,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: StepOutcome,
}

/// A completed run
#[derive(Debug)]
pub struct CrewOutput {
    pub run_id: Uuid,
    /// Output of the last unit
    pub result: String,
    pub context: ExecutionContext,
    pub steps: Vec<StepRecord>,
    pub artifacts: Vec<PathBuf>,
    /// Set when an artifact could not be written
    pub persistence: Option<PersistenceError>,
}

/// An ordered set of work units performed by their workers
#[derive(Debug)]
pub struct Crew {
    units: Vec<WorkUnit>,
    policy: Box<dyn ProcessPolicy>,
    order: Vec<usize>,
    retry: RetryPolicy,
    output_dir: PathBuf,
    cancel: CancellationToken,
}

impl Crew {
    /// Sequential crew with the default retry policy, writing to `.`
    pub fn new(units: Vec<WorkUnit>) -> Result<Self> {
        if units.is_empty() {
            return Err(CrewError::Empty);
        }
        let mut ids = HashSet::new();
        for unit in &units {
            if !ids.insert(unit.id()) {
                return Err(CrewError::DuplicateUnit(unit.id().to_string()));
            }
        }

        let policy: Box<dyn ProcessPolicy> = Box::new(Sequential);
        let order = validate_schedule(policy.as_ref(), units.len())?;
        Ok(Self {
            units,
            policy,
            order,
            retry: RetryPolicy::default(),
            output_dir: PathBuf::from("."),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_policy(mut self, policy: Box<dyn ProcessPolicy>) -> Result<Self> {
        self.order = validate_schedule(policy.as_ref(), self.units.len())?;
        self.policy = policy;
        Ok(self)
    }

    /// Crew-wide retry policy, used by workers without their own
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn units(&self) -> &[WorkUnit] {
        &self.units
    }

    /// Distinct workers, in order of first appearance
    pub fn workers(&self) -> Vec<Arc<Worker>> {
        let mut workers: Vec<Arc<Worker>> = Vec::new();
        for unit in &self.units {
            if !workers.iter().any(|w| Arc::ptr_eq(w, unit.shared_worker())) {
                workers.push(unit.shared_worker().clone());
            }
        }
        workers
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn policy(&self) -> &dyn ProcessPolicy {
        self.policy.as_ref()
    }

    /// Run every unit for `subject`.
    ///
    /// Stops at the first failing unit; the failure carries the context
    /// accumulated up to that point.
    pub async fn kickoff(&self, subject: &str) -> std::result::Result<CrewOutput, CrewFailure> {
        let run_id = Uuid::new_v4();
        info!(
            "◆ CREW ROLLING OUT [{}]: {} ({} units, {})",
            run_id,
            subject,
            self.units.len(),
            self.policy.name()
        );

        let mut run = Run {
            state: RunState::Pending,
            context: ExecutionContext::new(subject),
            steps: Vec::new(),
        };
        let mut artifacts = Vec::new();
        let mut persistence = None;

        for (position, &index) in self.order.iter().enumerate() {
            let unit = &self.units[index];
            run.advance(RunState::Running(position), position, unit.id())?;

            if self.cancel.is_cancelled() {
                return Err(run.cancel(position, unit, 0));
            }

            let artifact = unit.artifact().map(|name| self.output_dir.join(name));
            let before = match &artifact {
                Some(path) => report::stamp(path).await,
                None => None,
            };

            let started_at = Utc::now();
            let clock = Instant::now();
            let (outcome, attempts) = self.perform(unit, &run.context).await;
            let mut step = StepRecord {
                position,
                unit_id: unit.id().to_string(),
                worker_role: unit.worker().role().to_string(),
                attempts,
                started_at,
                finished_at: Utc::now(),
                duration_ms: clock.elapsed().as_millis() as u64,
                outcome: StepOutcome::Succeeded,
            };

            let output = match outcome {
                Ok(output) => output,
                Err(WorkerError::Cancelled { .. }) => {
                    step.outcome = StepOutcome::Cancelled;
                    run.steps.push(step);
                    return Err(run.cancel(position, unit, attempts));
                }
                Err(e) => {
                    step.outcome = StepOutcome::Failed(e.to_string());
                    run.steps.push(step);
                    return Err(run.fail(position, unit, CrewError::Worker(e)));
                }
            };
            run.steps.push(step);

            if let Err(e) = run
                .context
                .record(unit.id(), unit.worker().role(), output.as_str())
            {
                return Err(run.fail(position, unit, CrewError::Agent(e)));
            }

            if let (Some(name), Some(path)) = (unit.artifact(), artifact) {
                // Written by the worker during this unit: keep it
                let after = report::stamp(&path).await;
                if after.is_some() && after != before {
                    info!(
                        "◆ {} SAVED {} DURING {}",
                        unit.worker().role(),
                        path.display(),
                        unit.id()
                    );
                    artifacts.push(path);
                    continue;
                }

                match report::persist(&self.output_dir, name, &output).await {
                    Ok(path) => artifacts.push(path),
                    Err(e) => {
                        warn!("{}", e);
                        if persistence.is_none() {
                            persistence = Some(e);
                        }
                    }
                }
            }
        }

        let last = self.order.len().saturating_sub(1);
        let last_id = self.units[self.order[last]].id();
        run.advance(RunState::Completed, last, last_id)?;

        let result = run
            .context
            .last()
            .map(|e| e.output.clone())
            .unwrap_or_default();
        info!("◆ CREW FINISHED [{}]: {} units", run_id, run.steps.len());

        Ok(CrewOutput {
            run_id,
            result,
            context: run.context,
            steps: run.steps,
            artifacts,
            persistence,
        })
    }

    /// Execute one unit under its retry policy, racing cancellation
    async fn perform(
        &self,
        unit: &WorkUnit,
        context: &ExecutionContext,
    ) -> (std::result::Result<String, WorkerError>, u32) {
        let worker = unit.worker();
        let policy = worker.retry().unwrap_or(&self.retry);
        let cancelled = || WorkerError::Cancelled {
            worker: worker.role().to_string(),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(cancelled()),
                result = worker.execute(unit.brief(), context) => result,
            };

            match outcome {
                Err(e) if e.is_retryable() && policy.allows_retry(attempt) => {
                    let delay = policy.backoff_for(attempt);
                    warn!(
                        "◆ RETRYING {} (attempt {}/{}) in {:?}: {}",
                        unit.id(),
                        attempt + 1,
                        policy.max_attempts,
                        delay,
                        e
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return (Err(cancelled()), attempt),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                other => return (other, attempt),
            }
        }
    }
}

/// Mutable state of a single kickoff
struct Run {
    state: RunState,
    context: ExecutionContext,
    steps: Vec<StepRecord>,
}

impl Run {
    fn advance(
        &mut self,
        next: RunState,
        position: usize,
        unit_id: &str,
    ) -> std::result::Result<(), CrewFailure> {
        match self.state.advance(next) {
            Ok(state) => {
                self.state = state;
                Ok(())
            }
            Err(error) => Err(self.failure(position, unit_id, error)),
        }
    }

    fn fail(&mut self, position: usize, unit: &WorkUnit, error: CrewError) -> CrewFailure {
        warn!("◆ UNIT {} FAILED: {}", unit.id(), error);
        if let Ok(state) = self.state.advance(RunState::Failed(position)) {
            self.state = state;
        }
        self.failure(position, unit.id(), error)
    }

    fn cancel(&mut self, position: usize, unit: &WorkUnit, attempts: u32) -> CrewFailure {
        warn!("◆ RUN CANCELLED BEFORE COMPLETING {} ({} attempts)", unit.id(), attempts);
        if let Ok(state) = self.state.advance(RunState::Cancelled(position)) {
            self.state = state;
        }
        let error = CrewError::Worker(WorkerError::Cancelled {
            worker: unit.worker().role().to_string(),
        });
        self.failure(position, unit.id(), error)
    }

    fn failure(&mut self, position: usize, unit_id: &str, error: CrewError) -> CrewFailure {
        CrewFailure {
            unit_index: position,
            unit_id: unit_id.to_string(),
            error,
            state: self.state,
            context: std::mem::replace(&mut self.context, ExecutionContext::new("")),
            steps: std::mem::take(&mut self.steps),
        }
    }
}
