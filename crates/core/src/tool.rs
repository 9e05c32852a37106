//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act: read and write files,
//! move around the workspace, run terminal commands, search the web, and
//! talk to the user. Every invocation receives the session's
//! [`ToolExecutionContext`] and may replace its working directory.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ToolError;

/// Arguments of one tool invocation, as raw strings.
pub type ToolArgs = HashMap<String, String>;

/// Mutable session state handed to each tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecutionContext {
    /// The directory filesystem tools resolve names against.
    pub current_working_directory: String,
}

impl ToolExecutionContext {
    pub fn new(cwd: impl Into<String>) -> Self {
        Self {
            current_working_directory: cwd.into(),
        }
    }

    /// Resolve a name relative to the current working directory.
    pub fn resolve(&self, name: &str) -> PathBuf {
        PathBuf::from(&self.current_working_directory).join(name)
    }
}

/// A tool description shown to the user and embedded in the instructions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (lowercase)
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// Names of the arguments the tool reads
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
}

/// The core Tool trait.
///
/// Each tool implements this trait and is registered in the [`ToolRegistry`]
/// at startup. The agent loop treats tools purely as capabilities: it never
/// needs to know the concrete type behind a name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "readfile", "changedirectory").
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// Names of the arguments this tool reads.
    fn arguments(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether a successful call reports the task as complete.
    fn ends_task(&self) -> bool {
        false
    }

    /// Execute the tool.
    ///
    /// The context is a private copy; the caller adopts changes to it only
    /// when this returns `Ok`.
    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_lowercase(),
            description: self.description().to_string(),
            arguments: self.arguments().iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Fetch a required argument or fail with `InvalidArguments`.
pub fn required_arg<'a>(
    args: &'a ToolArgs,
    tool: &str,
    key: &str,
) -> std::result::Result<&'a str, ToolError> {
    args.get(key)
        .map(String::as_str)
        .ok_or_else(|| ToolError::InvalidArguments(format!("{tool}: missing '{key}' argument")))
}

/// A registry of available tools, keyed by lowercase name.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_lowercase();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!(tool = %name, "Replaced registered tool");
        }
    }

    /// Get a tool by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(&name.trim().to_lowercase()).map(|t| t.as_ref())
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
