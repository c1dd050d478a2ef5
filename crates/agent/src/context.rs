//! Append-only record of completed work units

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AgentError, Result};

/// Output of one completed unit
#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub unit_id: String,
    pub worker_role: String,
    pub output: String,
    pub completed_at: DateTime<Utc>,
}

/// Results accumulated during a single run, in completion order.
///
/// Entries can be appended but never replaced or removed.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    subject: String,
    entries: Vec<ContextEntry>,
}

impl ExecutionContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            entries: Vec::new(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Append a unit's output. A unit id may be recorded once.
    pub fn record(
        &mut self,
        unit_id: impl Into<String>,
        worker_role: impl Into<String>,
        output: impl Into<String>,
    ) -> Result<()> {
        let unit_id = unit_id.into();
        if self.get(&unit_id).is_some() {
            return Err(AgentError::ContextOverwrite(unit_id));
        }
        self.entries.push(ContextEntry {
            unit_id,
            worker_role: worker_role.into(),
            output: output.into(),
            completed_at: Utc::now(),
        });
        Ok(())
    }

    pub fn get(&self, unit_id: &str) -> Option<&ContextEntry> {
        self.entries.iter().find(|e| e.unit_id == unit_id)
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ContextEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Markdown digest of prior results for inclusion in a prompt
    pub fn render_for_prompt(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let sections: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("## {} ({})\n\n{}", e.unit_id, e.worker_role, e.output.trim()))
            .collect();
        format!("# Results so far\n\n{}", sections.join("\n\n"))
    }
}
