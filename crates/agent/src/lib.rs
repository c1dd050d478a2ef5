//! PIT CREW: Workers and their tools
//!
//! A [`Worker`] is a role bound to a model client and a fixed [`ToolSet`].
//! Work results accumulate in an append-only [`ExecutionContext`].

use thiserror::Error;

use motorcrew_provider::ProviderError;

pub mod context;
pub mod prompt;
pub mod retry;
pub mod tools;
pub mod worker;

pub use context::{ContextEntry, ExecutionContext};
pub use retry::RetryPolicy;
pub use tools::{ToolError, ToolRegistry, ToolSet, ToolTrait};
pub use worker::{UnitBrief, Worker};

/// Registry and context errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("◆ DUPLICATE TOOL: {0}")]
    DuplicateTool(String),

    #[error("◆ UNKNOWN TOOL: {0}")]
    UnknownTool(String),

    #[error("◆ TOOL NOT PERMITTED: {tool} (allowed: {allowed})")]
    ToolNotPermitted { tool: String, allowed: String },

    #[error("◆ CONTEXT ENTRY ALREADY RECORDED: {0}")]
    ContextOverwrite(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Failures that end a worker's execution of a unit
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("◆ {worker}: TOOL NOT PERMITTED: {tool}")]
    ToolNotPermitted { worker: String, tool: String },

    #[error("◆ {worker}: MODEL UNAVAILABLE: {source}")]
    ModelUnavailable {
        worker: String,
        #[source]
        source: ProviderError,
    },

    #[error("◆ {worker}: MAX ITERATIONS ({limit}) EXCEEDED")]
    MaxIterations { worker: String, limit: u32 },

    #[error("◆ {worker}: EMPTY MODEL RESPONSE")]
    EmptyResponse { worker: String },

    #[error("◆ {worker}: CANCELLED")]
    Cancelled { worker: String },
}

impl WorkerError {
    /// Errors worth another attempt under a retry policy: model outages
    /// the provider reports as transient
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelUnavailable { source, .. } if source.is_transient())
    }

    pub fn worker(&self) -> &str {
        match self {
            Self::ToolNotPermitted { worker, .. }
            | Self::ModelUnavailable { worker, .. }
            | Self::MaxIterations { worker, .. }
            | Self::EmptyResponse { worker }
            | Self::Cancelled { worker } => worker,
        }
    }
}
