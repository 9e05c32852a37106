//! The agent control loop.
//!
//! One task runs as a sequence of turns. Each turn sends a message, streams
//! the reply through a [`StreamInterpreter`], parses the tool calls and runs
//! them strictly one after another. The collected results become the next
//! message, until the termination tool runs and the user is asked for a
//! follow-up task.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use taskclaw_core::channel::UserInput;
use taskclaw_core::error::{Error, Result};
use taskclaw_core::event::{AgentEvent, EventSink};
use taskclaw_core::tool::{ToolExecutionContext, ToolRegistry};
use tracing::{debug, info, warn};

use crate::parser::{ParsedCommand, ToolCallParser};
use crate::session::ChatSession;
use crate::stream::{DisplayMask, StreamInterpreter};

/// Keyword that ends the session at the follow-up prompt.
pub const DEFAULT_TERMINATION_KEYWORD: &str = "end";

/// What happened to one requested call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult {
    Output(String),
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub tool: String,
    pub result: CallResult,
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            CallResult::Output(output) => write!(f, "{} output: {}", self.tool, output),
            CallResult::NotFound => write!(f, "{} error: Tool not found.", self.tool),
            CallResult::Failed(message) => write!(
                f,
                "An exception occurred during {} execution: {}",
                self.tool, message
            ),
        }
    }
}

/// Outcomes of one batch of calls, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<CallOutcome>,
    /// A call failed and the rest of the batch was skipped.
    pub aborted: bool,
    /// The termination tool ran successfully.
    pub completed_task: bool,
}

impl BatchReport {
    /// The accumulated result text sent back to the model.
    pub fn render(&self) -> String {
        self.outcomes.iter().map(|o| format!("{o}\n")).collect()
    }
}

/// Loop state. Each variant carries what its step needs.
#[derive(Debug)]
enum LoopState {
    Dispatching(String),
    ExecutingTools(Vec<ParsedCommand>),
    Continuing(BatchReport),
    AwaitingFollowup,
    Terminated,
}

/// Totals for a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub turns: usize,
    pub tool_calls: usize,
    pub working_directory: String,
}

/// Drives a session: one initial task plus any follow-ups.
pub struct AgentLoop {
    session: ChatSession,
    tools: ToolRegistry,
    input: Arc<dyn UserInput>,
    sink: Arc<dyn EventSink>,
    mask: DisplayMask,
    context: ToolExecutionContext,
    termination_keyword: String,
    max_turns: Option<u32>,
    turns: usize,
    tool_calls: usize,
}

impl AgentLoop {
    pub fn new(
        session: ChatSession,
        tools: ToolRegistry,
        input: Arc<dyn UserInput>,
        sink: Arc<dyn EventSink>,
        working_directory: impl Into<String>,
    ) -> Self {
        Self {
            session,
            tools,
            input,
            sink,
            mask: DisplayMask::ALL,
            context: ToolExecutionContext::new(working_directory),
            termination_keyword: DEFAULT_TERMINATION_KEYWORD.into(),
            max_turns: None,
            turns: 0,
            tool_calls: 0,
        }
    }

    pub fn with_display_mask(mut self, mask: DisplayMask) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_termination_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.termination_keyword = keyword.into();
        self
    }

    /// Cap the turns spent on one task before asking for a follow-up.
    pub fn with_max_turns(mut self, max: u32) -> Self {
        self.max_turns = Some(max);
        self
    }

    pub fn working_directory(&self) -> &str {
        &self.context.current_working_directory
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Run `task` and any follow-ups until the user ends the session.
    pub async fn run(&mut self, task: &str) -> Result<SessionReport> {
        let task = task.trim();
        if task.is_empty() {
            return Err(Error::InvalidTask("the task is empty".into()));
        }

        info!(tools = self.tools.len(), cwd = %self.working_directory(), "Starting session");
        let mut state = LoopState::Dispatching(format!("{task}\n{}", self.cwd_line()));
        let mut task_turns = 0u32;

        loop {
            state = match state {
                LoopState::Dispatching(input) => {
                    if self.max_turns.is_some_and(|max| task_turns >= max) {
                        warn!(turns = task_turns, "Turn limit reached, waiting for a new task");
                        self.sink.emit(AgentEvent::Notice {
                            content: format!("Stopped after {task_turns} turns without finishing the task."),
                        });
                        LoopState::AwaitingFollowup
                    } else {
                        task_turns += 1;
                        self.dispatch(&input).await?
                    }
                }
                LoopState::ExecutingTools(commands) => {
                    let report = self.execute_batch(&commands).await;
                    let rendered = report.render();
                    if !rendered.is_empty() {
                        self.sink.emit(AgentEvent::ToolOutput { content: rendered });
                    }
                    if report.completed_task {
                        self.sink.emit(AgentEvent::TaskCompleted);
                        LoopState::AwaitingFollowup
                    } else {
                        LoopState::Continuing(report)
                    }
                }
                LoopState::Continuing(report) => LoopState::Dispatching(format!(
                    "Tool result: \"{}\"\n{}",
                    report.render(),
                    self.cwd_line()
                )),
                LoopState::AwaitingFollowup => {
                    task_turns = 0;
                    self.await_followup().await?
                }
                LoopState::Terminated => break,
            };
        }

        info!(turns = self.turns, tool_calls = self.tool_calls, "Session ended");
        Ok(SessionReport {
            turns: self.turns,
            tool_calls: self.tool_calls,
            working_directory: self.context.current_working_directory.clone(),
        })
    }

    fn cwd_line(&self) -> String {
        format!("Current cwd: \"{}\"", self.context.current_working_directory)
    }

    /// Send one message, interpret the streamed reply and parse its calls.
    async fn dispatch(&mut self, input: &str) -> Result<LoopState> {
        self.turns += 1;
        self.sink.emit(AgentEvent::TurnStarted { turn: self.turns });
        debug!(turn = self.turns, "Dispatching message");

        let mut chunks = self.session.send(input).await?;
        let mut interpreter = StreamInterpreter::new(self.mask);
        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk?;
            if let Some(text) = &chunk.content {
                interpreter.push(text, self.sink.as_ref());
            }
            if let Some(usage) = &chunk.usage {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Token usage"
                );
            }
            if chunk.done {
                break;
            }
        }
        let reply = interpreter.finish(self.sink.as_ref());
        self.session.record_reply(&reply);

        let commands = ToolCallParser::parse(&reply);
        if let [only] = commands.as_slice()
            && let Some(error) = &only.error
        {
            warn!(turn = self.turns, %error, "Could not parse tool calls");
            self.sink.emit(AgentEvent::ToolOutput {
                content: error.clone(),
            });
            return Ok(LoopState::Dispatching(format!(
                "Tool result: {error}\n{}",
                self.cwd_line()
            )));
        }

        debug!(count = commands.len(), "Parsed tool calls");
        Ok(LoopState::ExecutingTools(commands))
    }

    /// Run calls in order. A missing tool is recorded and skipped; a failing
    /// tool is recorded and ends the batch.
    async fn execute_batch(&mut self, commands: &[ParsedCommand]) -> BatchReport {
        let mut report = BatchReport::default();

        for command in commands {
            let Some(tool) = self.tools.get(&command.tool) else {
                warn!(tool = %command.tool, "Tool not found");
                report.outcomes.push(CallOutcome {
                    tool: command.tool.clone(),
                    result: CallResult::NotFound,
                });
                continue;
            };

            self.tool_calls += 1;
            let mut scratch = self.context.clone();
            let start = Instant::now();
            let result = tool.execute(&command.args, &mut scratch).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(output) => {
                    debug!(tool = %command.tool, duration_ms, "Tool finished");
                    if scratch != self.context {
                        info!(
                            from = %self.context.current_working_directory,
                            to = %scratch.current_working_directory,
                            "Working directory changed"
                        );
                        self.context = scratch;
                    }
                    if tool.ends_task() {
                        report.completed_task = true;
                    }
                    report.outcomes.push(CallOutcome {
                        tool: command.tool.clone(),
                        result: CallResult::Output(output),
                    });
                }
                Err(e) => {
                    warn!(tool = %command.tool, error = %e, duration_ms, "Tool execution failed");
                    report.outcomes.push(CallOutcome {
                        tool: command.tool.clone(),
                        result: CallResult::Failed(e.to_string()),
                    });
                    report.aborted = true;
                    break;
                }
            }
        }

        report
    }

    async fn await_followup(&mut self) -> Result<LoopState> {
        let prompt = format!(
            "New task: (type \"{}\" to end the process)",
            self.termination_keyword
        );
        let Some(line) = self.input.read_line(&prompt).await? else {
            info!("Input closed, ending session");
            return Ok(LoopState::Terminated);
        };

        let task = line.trim();
        if task.is_empty() {
            return Err(Error::InvalidTask("the follow-up task is empty".into()));
        }
        if task.eq_ignore_ascii_case(&self.termination_keyword) {
            return Ok(LoopState::Terminated);
        }
        Ok(LoopState::Dispatching(format!(
            "User followup question/task: {task}\n{}",
            self.cwd_line()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use taskclaw_core::event::MemorySink;

    const DONE: &str = r#"{"thought": "All finished.", "tool_calls": [{"tool": "taskdone", "args": {"message": "done"}}]}"#;

    struct Harness {
        provider: Arc<ScriptedProvider>,
        input: Arc<ScriptedInput>,
        sink: Arc<MemorySink>,
    }

    fn build(provider: ScriptedProvider, input: &[&str], tools: ToolRegistry) -> (AgentLoop, Harness) {
        let provider = Arc::new(provider);
        let input = Arc::new(ScriptedInput::new(input));
        let sink = Arc::new(MemorySink::new());
        let session = ChatSession::new(provider.clone(), "test-model", 0.0, "instructions");
        let agent = AgentLoop::new(session, tools, input.clone(), sink.clone(), "/work");
        (agent, Harness { provider, input, sink })
    }

    fn registry_with(tools: Vec<Box<dyn taskclaw_core::tool::Tool>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    #[tokio::test]
    async fn empty_task_is_rejected() {
        let (mut agent, harness) = build(ScriptedProvider::new(vec![]), &[], ToolRegistry::new());
        let err = agent.run("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidTask(_)));
        assert!(harness.provider.requests().is_empty());
    }

    #[tokio::test]
    async fn three_calls_then_done_awaits_followup() {
        let (recorder, calls) = RecordingTool::new("record");
        let reply = r#"{"thought": "Three steps.", "tool_calls": [
            {"tool": "record", "args": {"value": "1"}},
            {"tool": "record", "args": {"value": "2"}},
            {"tool": "taskdone", "args": {"message": "ok"}}
        ]}"#;
        let (mut agent, harness) = build(
            ScriptedProvider::chunked(&[reply], 7),
            &["end"],
            registry_with(vec![Box::new(recorder), Box::new(DoneTool)]),
        );

        let report = agent.run("do three things").await.unwrap();

        assert_eq!(report.turns, 1);
        assert_eq!(report.tool_calls, 3);
        assert_eq!(calls.lock().unwrap().len(), 2);
        assert_eq!(
            harness.input.prompts(),
            vec!["New task: (type \"end\" to end the process)".to_string()]
        );
        assert_eq!(
            harness.provider.user_inputs(),
            vec!["do three things\nCurrent cwd: \"/work\"".to_string()]
        );
        assert_eq!(harness.sink.thought_text(), "Three steps.");
        assert!(harness.sink.events().contains(&AgentEvent::TaskCompleted));
    }

    #[tokio::test]
    async fn results_are_sent_back_in_order() {
        let (recorder, _) = RecordingTool::new("record");
        let first = r#"{"thought": "go", "tool_calls": [
            {"tool": "record", "args": {"value": "a"}},
            {"tool": "missing", "args": {}},
            {"tool": "record", "args": {"value": "b"}}
        ]}"#;
        let (mut agent, harness) = build(
            ScriptedProvider::new(vec![vec![first], vec![DONE]]),
            &[],
            registry_with(vec![Box::new(recorder), Box::new(DoneTool)]),
        );

        agent.run("task").await.unwrap();

        let inputs = harness.provider.user_inputs();
        assert_eq!(inputs.len(), 2);
        assert_eq!(
            inputs[1],
            "Tool result: \"record output: recorded a\nmissing error: Tool not found.\nrecord output: recorded b\n\"\nCurrent cwd: \"/work\""
        );
    }

    #[tokio::test]
    async fn failure_aborts_rest_of_batch() {
        let (recorder, calls) = RecordingTool::new("record");
        let first = r#"{"thought": "try", "tool_calls": [
            {"tool": "record", "args": {"value": "1"}},
            {"tool": "explode", "args": {}},
            {"tool": "record", "args": {"value": "3"}}
        ]}"#;
        let (mut agent, harness) = build(
            ScriptedProvider::new(vec![vec![first], vec![DONE]]),
            &[],
            registry_with(vec![Box::new(recorder), Box::new(FailingTool), Box::new(DoneTool)]),
        );

        let report = agent.run("task").await.unwrap();

        assert_eq!(calls.lock().unwrap().len(), 1);
        let inputs = harness.provider.user_inputs();
        assert!(inputs[1].contains("record output: recorded 1\n"));
        assert!(inputs[1].contains("An exception occurred during explode execution: "));
        assert!(!inputs[1].contains("recorded 3"));
        // The failed call's directory change is discarded.
        assert!(inputs[1].ends_with("Current cwd: \"/work\""));
        assert_eq!(report.working_directory, "/work");
    }

    #[tokio::test]
    async fn directory_change_is_visible_to_next_call() {
        let (recorder, calls) = RecordingTool::new("record");
        let first = r#"{"thought": "move then look", "tool_calls": [
            {"tool": "move", "args": {"dir": "sub"}},
            {"tool": "record", "args": {}}
        ]}"#;
        let (mut agent, harness) = build(
            ScriptedProvider::new(vec![vec![first], vec![DONE]]),
            &[],
            registry_with(vec![Box::new(MoveTool), Box::new(recorder), Box::new(DoneTool)]),
        );

        let report = agent.run("task").await.unwrap();

        assert_eq!(calls.lock().unwrap()[0].1, "/work/sub");
        assert!(harness.provider.user_inputs()[1].ends_with("Current cwd: \"/work/sub\""));
        assert_eq!(report.working_directory, "/work/sub");
    }

    #[tokio::test]
    async fn malformed_reply_is_reported_without_running_tools() {
        let (recorder, calls) = RecordingTool::new("record");
        let broken = r#"{"thought": "hmm", "tool_calls": [{"tool": "record", "args": {}}"#;
        let (mut agent, harness) = build(
            ScriptedProvider::new(vec![vec![broken], vec![DONE]]),
            &[],
            registry_with(vec![Box::new(recorder), Box::new(DoneTool)]),
        );

        agent.run("task").await.unwrap();

        assert!(calls.lock().unwrap().is_empty());
        let inputs = harness.provider.user_inputs();
        assert!(inputs[1].starts_with("Tool result: Malformed tool call list"));
        assert!(inputs[1].ends_with("\nCurrent cwd: \"/work\""));
    }

    #[tokio::test]
    async fn empty_call_list_continues_with_empty_result() {
        let (mut agent, harness) = build(
            ScriptedProvider::new(vec![vec![r#"{"thought": "wait", "tool_calls": []}"#], vec![DONE]]),
            &[],
            registry_with(vec![Box::new(DoneTool)]),
        );

        agent.run("task").await.unwrap();

        assert_eq!(
            harness.provider.user_inputs()[1],
            "Tool result: \"\"\nCurrent cwd: \"/work\""
        );
    }

    #[tokio::test]
    async fn followup_task_continues_conversation() {
        let (mut agent, harness) = build(
            ScriptedProvider::new(vec![vec![DONE], vec![DONE]]),
            &["and now this", "END"],
            registry_with(vec![Box::new(DoneTool)]),
        );

        let report = agent.run("first").await.unwrap();

        assert_eq!(report.turns, 2);
        assert_eq!(
            harness.provider.user_inputs()[1],
            "User followup question/task: and now this\nCurrent cwd: \"/work\""
        );
        assert_eq!(harness.input.prompts().len(), 2);
        // system + 2 * (user + assistant)
        assert_eq!(agent.session().conversation().messages.len(), 5);
    }

    #[tokio::test]
    async fn empty_followup_is_fatal() {
        let (mut agent, _) = build(
            ScriptedProvider::new(vec![vec![DONE]]),
            &["  "],
            registry_with(vec![Box::new(DoneTool)]),
        );
        assert!(matches!(agent.run("task").await, Err(Error::InvalidTask(_))));
    }

    #[tokio::test]
    async fn custom_termination_keyword() {
        let (agent, harness) = build(
            ScriptedProvider::new(vec![vec![DONE]]),
            &["quit"],
            registry_with(vec![Box::new(DoneTool)]),
        );
        let mut agent = agent.with_termination_keyword("quit");

        agent.run("task").await.unwrap();
        assert_eq!(
            harness.input.prompts(),
            vec!["New task: (type \"quit\" to end the process)".to_string()]
        );
    }

    #[tokio::test]
    async fn turn_limit_asks_for_new_task() {
        let (recorder, _) = RecordingTool::new("record");
        let busy = r#"{"thought": "again", "tool_calls": [{"tool": "record", "args": {}}]}"#;
        let (agent, harness) = build(
            ScriptedProvider::new(vec![vec![busy], vec![busy], vec![busy]]),
            &[],
            registry_with(vec![Box::new(recorder)]),
        );
        let mut agent = agent.with_max_turns(2);

        let report = agent.run("loop forever").await.unwrap();

        assert_eq!(report.turns, 2);
        assert_eq!(harness.provider.requests().len(), 2);
        assert!(harness
            .sink
            .events()
            .iter()
            .any(|e| matches!(e, AgentEvent::Notice { .. })));
    }

    #[tokio::test]
    async fn display_mask_hides_stream_but_not_results() {
        let (mut agent, harness) = build(
            ScriptedProvider::new(vec![vec![DONE]]),
            &[],
            registry_with(vec![Box::new(DoneTool)]),
        );
        agent = agent.with_display_mask(DisplayMask::NONE);

        agent.run("task").await.unwrap();

        let events = harness.sink.events();
        assert!(harness.sink.thought_text().is_empty());
        assert!(harness.sink.tool_call_text().is_empty());
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolOutput { .. })));
    }

    #[test]
    fn outcome_lines() {
        let report = BatchReport {
            outcomes: vec![
                CallOutcome { tool: "a".into(), result: CallResult::Output("x".into()) },
                CallOutcome { tool: "b".into(), result: CallResult::NotFound },
                CallOutcome { tool: "c".into(), result: CallResult::Failed("bad".into()) },
            ],
            aborted: true,
            completed_task: false,
        };
        assert_eq!(
            report.render(),
            "a output: x\nb error: Tool not found.\nAn exception occurred during c execution: bad\n"
        );
    }
}
