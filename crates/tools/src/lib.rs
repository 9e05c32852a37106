//! Built-in tools for TaskClaw.
//!
//! Tools give the agent the ability to act inside its workspace: move
//! around and manage files, run terminal commands, read the web, and talk
//! to the user. [`default_registry`] wires all of them up.

pub mod filesystem;
pub mod pdf;
pub mod task;
pub mod terminal;
pub mod web;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskclaw_core::channel::UserInput;
use taskclaw_core::event::EventSink;
use taskclaw_core::tool::ToolRegistry;

/// Knobs for the built-in tools.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Directory the filesystem tools are confined to; `changedirectory "/"`
    /// returns here.
    pub workspace_root: PathBuf,
    pub terminal_timeout: Duration,
    /// Longest page text `gettextfromwebpage` returns.
    pub web_max_chars: usize,
    pub search_results: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("environment"),
            terminal_timeout: Duration::from_secs(120),
            web_max_chars: 8000,
            search_results: 5,
        }
    }
}

/// Create a registry with every built-in tool.
///
/// `askuser` reads from `input`; `askuser` and `taskdone` write to `sink`.
pub fn default_registry(
    settings: &ToolSettings,
    input: Arc<dyn UserInput>,
    sink: Arc<dyn EventSink>,
) -> ToolRegistry {
    let workspace = filesystem::Workspace::new(settings.workspace_root.clone());
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(filesystem::ChangeDirectoryTool::new(workspace.clone())));
    registry.register(Box::new(filesystem::CreateDirectoryTool::new(workspace.clone())));
    registry.register(Box::new(filesystem::CreateFileTool::new(workspace.clone())));
    registry.register(Box::new(filesystem::WriteFileTool::new(workspace.clone())));
    registry.register(Box::new(filesystem::ReadFileTool::new(workspace.clone())));
    registry.register(Box::new(filesystem::CreatePdfFileTool::new(workspace)));
    registry.register(Box::new(filesystem::ListDirectoryTool));
    registry.register(Box::new(terminal::ExecuteTerminalTool::new(
        settings.terminal_timeout,
    )));
    registry.register(Box::new(web::WebSearchTool::new(settings.search_results)));
    registry.register(Box::new(web::WebPageTextTool::new(settings.web_max_chars)));
    registry.register(Box::new(task::AskUserTool::new(input, sink.clone())));
    registry.register(Box::new(task::TaskDoneTool::new(sink)));
    registry
}
