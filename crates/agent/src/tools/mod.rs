//! Tools: named capabilities with a uniform invoke contract

pub mod filesystem;
pub mod path_utils;
pub mod web;

pub use filesystem::FileWriterTool;
pub use web::{WebScrapeTool, WebSearchTool};

use async_trait::async_trait;
use motorcrew_provider::Tool;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{AgentError, Result};

/// A failed tool invocation. Rendered as text so a worker can reason over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    pub tool: String,
    pub message: String,
    transient: bool,
}

impl ToolError {
    pub fn new(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            message: message.into(),
            transient: false,
        }
    }

    /// Timeouts and connection failures
    pub fn transient(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            transient: true,
            ..Self::new(tool, message)
        }
    }

    /// Classify a transport error from reqwest
    pub fn from_http(tool: &str, target: &str, timeout_secs: u64, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::transient(
                tool,
                format!("timed out after {}s fetching {}", timeout_secs, target),
            )
        } else if e.is_connect() {
            Self::transient(tool, format!("could not connect to {}: {}", target, e))
        } else {
            Self::new(tool, format!("request to {} failed: {}", target, e))
        }
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "◆ TOOL ERROR [{}]: {}", self.tool, self.message)
    }
}

impl std::error::Error for ToolError {}

pub type ToolResult = std::result::Result<String, ToolError>;

#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> ToolResult;
}

pub fn to_provider_tool(tool: &dyn ToolTrait) -> Tool {
    Tool::new(tool.name(), tool.description(), tool.parameters())
}

/// All tools known to a process. Populated at startup, read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolTrait>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn ToolTrait>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        debug!("◆ REGISTERED TOOL {}", name);
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolTrait> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted tool names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.names()
            .iter()
            .filter_map(|n| self.get(n))
            .map(to_provider_tool)
            .collect()
    }

    /// Run a tool and keep its failure structured.
    ///
    /// Only an unknown name is an `Err`; tool failures, including a panic
    /// inside the tool, come back as `Ok(Err(ToolError))`.
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<ToolResult> {
        let tool = self
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))?;

        let mut task = AbortOnDrop(tokio::spawn(async move { tool.execute(args).await }));
        let outcome = match (&mut task.0).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(ToolError::new(name, "tool panicked")),
            Err(e) => Err(ToolError::new(name, format!("tool task aborted: {}", e))),
        };

        if let Err(e) = &outcome {
            warn!("{}", e);
        }
        Ok(outcome)
    }

    /// Run a tool; failures are folded into the returned text
    pub async fn invoke(&self, name: &str, args: Value) -> Result<String> {
        Ok(match self.dispatch(name, args).await? {
            Ok(output) => output,
            Err(e) => e.to_string(),
        })
    }
}

/// Aborts a spawned tool call when the caller stops waiting on it, so a
/// cancelled unit leaves no tool running behind it
struct AbortOnDrop(JoinHandle<ToolResult>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// A worker's permitted subset of the registry
#[derive(Clone)]
pub struct ToolSet {
    registry: Arc<ToolRegistry>,
    allowed: BTreeSet<String>,
}

impl ToolSet {
    /// Every name must already be registered
    pub fn new<I, S>(registry: Arc<ToolRegistry>, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed = BTreeSet::new();
        for name in names {
            let name = name.into();
            if !registry.has(&name) {
                return Err(AgentError::UnknownTool(name));
            }
            allowed.insert(name);
        }
        Ok(Self { registry, allowed })
    }

    pub fn empty(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            allowed: BTreeSet::new(),
        }
    }

    pub fn permits(&self, name: &str) -> bool {
        self.allowed.contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.allowed.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn definitions(&self) -> Vec<Tool> {
        self.allowed
            .iter()
            .filter_map(|n| self.registry.get(n))
            .map(to_provider_tool)
            .collect()
    }

    /// Invoke a permitted tool. The permission check happens before dispatch.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<String> {
        if !self.permits(name) {
            return Err(AgentError::ToolNotPermitted {
                tool: name.to_string(),
                allowed: self.names().join(", "),
            });
        }
        self.registry.invoke(name, args).await
    }
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("allowed", &self.allowed)
            .finish()
    }
}

/// Register search, scrape, and file-writer tools from configuration
pub fn register_default_tools(
    registry: &mut ToolRegistry,
    config: &motorcrew_config::Config,
) -> Result<()> {
    registry.register(WebSearchTool::from_config(&config.tools.search))?;
    registry.register(WebScrapeTool::from_config(&config.tools.scrape))?;
    registry.register(FileWriterTool::new(config.output_dir()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolTrait for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo input"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, args: Value) -> ToolResult {
            Ok(args.to_string())
        }
    }

    /// Sleeps, then flips a flag
    struct Slow(Arc<std::sync::atomic::AtomicBool>);

    #[async_trait]
    impl ToolTrait for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Finishes late"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _args: Value) -> ToolResult {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            self.0.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok("done".to_string())
        }
    }

    #[tokio::test]
    async fn test_dropped_call_aborts_tool() {
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let mut registry = ToolRegistry::new();
        registry.register(Slow(finished.clone())).unwrap();

        let call = registry.dispatch("slow", json!({}));
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), call)
                .await
                .is_err()
        );

        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
        assert!(!finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_tool_error_display() {
        let e = ToolError::new("web_scrape", "HTTP 404");
        assert_eq!(e.to_string(), "◆ TOOL ERROR [web_scrape]: HTTP 404");
        assert!(!e.is_transient());
        assert!(ToolError::transient("web_scrape", "timeout").is_transient());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let err = registry.register(Echo).unwrap_err();
        assert!(matches!(err, AgentError::DuplicateTool(name) if name == "echo"));
        assert_eq!(registry.names(), vec!["echo".to_string()]);
    }

    #[test]
    fn test_toolset_rejects_unregistered_names() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let registry = Arc::new(registry);

        assert!(ToolSet::new(registry.clone(), ["echo"]).is_ok());
        let err = ToolSet::new(registry, ["echo", "web_search"]).unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "web_search"));
    }

    #[tokio::test]
    async fn test_toolset_blocks_unpermitted_even_if_registered() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let set = ToolSet::empty(Arc::new(registry));

        let err = set.invoke("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolNotPermitted { .. }));
        assert!(set.definitions().is_empty());
    }
}
