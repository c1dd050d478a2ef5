//! Work units and the templates they are stamped from

use std::sync::Arc;

use motorcrew_agent::{UnitBrief, Worker};
use motorcrew_config::safe_filename;

const SUBJECT: &str = "{subject}";

/// One assignment bound to the worker that performs it
#[derive(Debug, Clone)]
pub struct WorkUnit {
    brief: UnitBrief,
    worker: Arc<Worker>,
    artifact: Option<String>,
}

impl WorkUnit {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        worker: Arc<Worker>,
    ) -> Self {
        Self {
            brief: UnitBrief::new(id, description, expected_output),
            worker,
            artifact: None,
        }
    }

    /// Persist this unit's output under `name` in the output directory
    pub fn with_artifact(mut self, name: impl Into<String>) -> Self {
        self.artifact = Some(name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.brief.id
    }

    pub fn brief(&self) -> &UnitBrief {
        &self.brief
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn shared_worker(&self) -> &Arc<Worker> {
        &self.worker
    }

    pub fn artifact(&self) -> Option<&str> {
        self.artifact.as_deref()
    }
}

/// A unit with `{subject}` placeholders, instantiated once per subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitTemplate {
    pub id: String,
    pub description: String,
    pub expected_output: String,
    pub artifact: Option<String>,
}

impl UnitTemplate {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, pattern: impl Into<String>) -> Self {
        self.artifact = Some(pattern.into());
        self
    }

    pub fn instantiate(&self, subject: &str, worker: Arc<Worker>) -> WorkUnit {
        let unit = WorkUnit::new(
            self.id.clone(),
            self.description.replace(SUBJECT, subject),
            self.expected_output.replace(SUBJECT, subject),
            worker,
        );
        match &self.artifact {
            Some(pattern) => unit.with_artifact(safe_filename(&pattern.replace(SUBJECT, subject))),
            None => unit,
        }
    }
}
