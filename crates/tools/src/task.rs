//! Tools that talk to the user: asking a question and finishing a task.

use async_trait::async_trait;
use std::sync::Arc;
use taskclaw_core::channel::UserInput;
use taskclaw_core::error::ToolError;
use taskclaw_core::event::{AgentEvent, EventSink};
use taskclaw_core::tool::{Tool, ToolArgs, ToolExecutionContext, required_arg};

pub struct AskUserTool {
    input: Arc<dyn UserInput>,
    sink: Arc<dyn EventSink>,
}

impl AskUserTool {
    pub fn new(input: Arc<dyn UserInput>, sink: Arc<dyn EventSink>) -> Self {
        Self { input, sink }
    }
}

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        "askuser"
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for the answer."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["question"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        _context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let question = required_arg(args, self.name(), "question")?;
        self.sink.emit(AgentEvent::Question {
            content: question.to_string(),
        });

        match self.input.read_line("Response: ").await {
            Ok(Some(answer)) => Ok(answer.trim().to_string()),
            Ok(None) => Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: "the user closed the input".into(),
            }),
            Err(e) => Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            }),
        }
    }
}

/// The termination tool: shows the final message and ends the task.
pub struct TaskDoneTool {
    sink: Arc<dyn EventSink>,
}

impl TaskDoneTool {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Tool for TaskDoneTool {
    fn name(&self) -> &str {
        "taskdone"
    }

    fn description(&self) -> &str {
        "Finish the task with a message for the user. Call this once the task is complete."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["message"]
    }

    fn ends_task(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        _context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let message = required_arg(args, self.name(), "message")?;
        self.sink.emit(AgentEvent::AgentMessage {
            content: message.to_string(),
        });
        Ok("Task completion message displayed.".into())
    }
}
