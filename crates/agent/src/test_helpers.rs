//! Shared test doubles for the agent crate.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use taskclaw_core::channel::UserInput;
use taskclaw_core::error::{ChannelError, ProviderError, ToolError};
use taskclaw_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk};
use taskclaw_core::tool::{Tool, ToolArgs, ToolExecutionContext};
use tokio::sync::mpsc;

/// A provider that streams scripted replies, already split into chunks.
///
/// Each call to `stream` plays the next reply and records the request.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Vec<String>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Vec<&str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|chunks| chunks.into_iter().map(String::from).collect())
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies split into chunks of `size` characters.
    pub fn chunked(replies: &[&str], size: usize) -> Self {
        let split: Vec<Vec<String>> = replies
            .iter()
            .map(|reply| {
                let chars: Vec<char> = reply.chars().collect();
                chars.chunks(size).map(|c| c.iter().collect()).collect()
            })
            .collect();
        Self {
            replies: Mutex::new(split.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Content of the last user message of every request, in order.
    pub fn user_inputs(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let chunks = self.replies.lock().unwrap().pop_front().ok_or_else(|| {
            ProviderError::ApiError {
                status_code: 500,
                message: "no scripted reply left".into(),
            }
        })?;

        let (tx, rx) = mpsc::channel(chunks.len() + 1);
        for chunk in chunks {
            let _ = tx.send(Ok(StreamChunk::text(chunk))).await;
        }
        let _ = tx.send(Ok(StreamChunk::finished(None))).await;
        Ok(rx)
    }
}

/// Answers prompts from a fixed list, then reports end of input.
pub struct ScriptedInput {
    lines: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInput {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: Mutex::new(lines.iter().map(|l| l.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl UserInput for ScriptedInput {
    async fn read_line(&self, prompt: &str) -> Result<Option<String>, ChannelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.lines.lock().unwrap().pop_front())
    }
}

/// Records every call, with the working directory it saw, and echoes
/// its `value` argument.
pub struct RecordingTool {
    name: &'static str,
    calls: Arc<Mutex<Vec<(ToolArgs, String)>>>,
}

impl RecordingTool {
    pub fn new(name: &'static str) -> (Self, Arc<Mutex<Vec<(ToolArgs, String)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                name,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Records its calls"
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((args.clone(), context.current_working_directory.clone()));
        Ok(format!(
            "recorded {}",
            args.get("value").map(String::as_str).unwrap_or("-")
        ))
    }
}

/// Moves into `dir` under the current directory.
pub struct MoveTool;

#[async_trait]
impl Tool for MoveTool {
    fn name(&self) -> &str {
        "move"
    }

    fn description(&self) -> &str {
        "Changes the working directory"
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let dir = args.get("dir").cloned().unwrap_or_default();
        context.current_working_directory = format!("{}/{}", context.current_working_directory, dir);
        Ok(format!("moved to {dir}"))
    }
}

/// Changes the working directory, then fails.
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "explode"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    async fn execute(
        &self,
        _args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        context.current_working_directory = "/nowhere".into();
        Err(ToolError::ExecutionFailed {
            tool_name: "explode".into(),
            reason: "boom".into(),
        })
    }
}

/// Ends the task.
pub struct DoneTool;

#[async_trait]
impl Tool for DoneTool {
    fn name(&self) -> &str {
        "taskdone"
    }

    fn description(&self) -> &str {
        "Marks the task as finished"
    }

    fn ends_task(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        _args: &ToolArgs,
        _context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        Ok("Task completion message displayed.".into())
    }
}
