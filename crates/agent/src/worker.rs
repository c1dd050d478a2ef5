//! Worker: a role bound to a model client and a fixed tool set

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use motorcrew_provider::{ChatParams, Provider, ToolCallDef, ToolChoice};

use crate::context::ExecutionContext;
use crate::prompt;
use crate::retry::RetryPolicy;
use crate::tools::ToolSet;
use crate::WorkerError;

/// The read-only view of a work unit handed to its worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitBrief {
    pub id: String,
    pub description: String,
    pub expected_output: String,
}

impl UnitBrief {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// A role-bearing actor that performs one unit at a time.
///
/// Workers are immutable once built and may be shared across runs via `Arc`.
pub struct Worker {
    role: String,
    goal: String,
    backstory: String,
    provider: Arc<dyn Provider>,
    tools: ToolSet,
    model: Option<String>,
    temperature: f32,
    max_tokens: u32,
    max_iterations: u32,
    retry: Option<RetryPolicy>,
}

impl Worker {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        provider: Arc<dyn Provider>,
        tools: ToolSet,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            provider,
            tools,
            model: None,
            temperature: 0.7,
            max_tokens: 4096,
            max_iterations: 15,
            retry: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Overrides the crew-wide retry policy for this worker
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// Perform one unit and return its text output.
    ///
    /// Every requested tool call is checked against this worker's tool set
    /// before anything is dispatched.
    pub async fn execute(
        &self,
        brief: &UnitBrief,
        context: &ExecutionContext,
    ) -> Result<String, WorkerError> {
        info!("◆ {} ENGAGED ON {}", self.role, brief.id);
        let mut messages = prompt::build_messages(self, brief, context);
        let definitions = self.tools.definitions();
        let tool_choice = if definitions.is_empty() {
            ToolChoice::None
        } else {
            ToolChoice::Auto
        };

        for iteration in 1..=self.max_iterations {
            debug!("◆ {} ITERATION {}", self.role, iteration);

            let params = ChatParams {
                model: self.model(),
                messages: messages.clone(),
                tools: definitions.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                tool_choice: tool_choice.clone(),
            };

            let response =
                self.provider
                    .chat(params)
                    .await
                    .map_err(|source| WorkerError::ModelUnavailable {
                        worker: self.role.clone(),
                        source,
                    })?;

            if !response.has_tool_calls() {
                let content = response.content.unwrap_or_default();
                if content.trim().is_empty() {
                    return Err(WorkerError::EmptyResponse {
                        worker: self.role.clone(),
                    });
                }
                info!("◆ {} COMPLETED {}", self.role, brief.id);
                return Ok(content);
            }

            // Reject the whole turn if any call is out of bounds
            if let Some(call) = response
                .tool_calls
                .iter()
                .find(|c| !self.tools.permits(&c.name))
            {
                warn!("◆ {} REQUESTED FORBIDDEN TOOL {}", self.role, call.name);
                return Err(WorkerError::ToolNotPermitted {
                    worker: self.role.clone(),
                    tool: call.name.clone(),
                });
            }

            let calls: Vec<ToolCallDef> = response.tool_calls.iter().map(ToolCallDef::from).collect();
            prompt::add_assistant_message(&mut messages, response.content.as_deref(), Some(calls));

            for call in &response.tool_calls {
                debug!("◆ {} CALLING {}", self.role, call.name);
                let result = self
                    .tools
                    .invoke(&call.name, call.arguments.clone())
                    .await
                    .map_err(|_| WorkerError::ToolNotPermitted {
                        worker: self.role.clone(),
                        tool: call.name.clone(),
                    })?;
                prompt::add_tool_result(&mut messages, &call.id, &call.name, &result);
            }
        }

        Err(WorkerError::MaxIterations {
            worker: self.role.clone(),
            limit: self.max_iterations,
        })
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("role", &self.role)
            .field("tools", &self.tools)
            .field("model", &self.model)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}
