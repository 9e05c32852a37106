//! End-to-end tests: the agent loop driving the real built-in tools.
//!
//! The model is replaced by a scripted provider that streams canned replies
//! in small chunks; everything else (interpreter, parser, registry, tools)
//! is the production code, working in a temporary workspace.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use taskclaw_agent::{AgentLoop, ChatSession, system_prompt};
use taskclaw_core::channel::UserInput;
use taskclaw_core::error::{ChannelError, ProviderError};
use taskclaw_core::event::{AgentEvent, MemorySink};
use taskclaw_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk};
use taskclaw_tools::{ToolSettings, default_registry};
use tokio::sync::mpsc;

// ── Scripted model ───────────────────────────────────────────────────────

struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    chunk_size: usize,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str], chunk_size: usize) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            chunk_size,
            inputs: Mutex::new(Vec::new()),
        }
    }

    fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.inputs.lock().unwrap().push(last);

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider exhausted"));
        let chars: Vec<char> = reply.chars().collect();
        let chunks: Vec<String> = chars.chunks(self.chunk_size).map(|c| c.iter().collect()).collect();

        let (tx, rx) = mpsc::channel(chunks.len() + 1);
        for chunk in chunks {
            tx.send(Ok(StreamChunk::text(chunk))).await.unwrap();
        }
        tx.send(Ok(StreamChunk::finished(None))).await.unwrap();
        Ok(rx)
    }
}

struct ScriptedUser {
    lines: Mutex<VecDeque<String>>,
}

impl ScriptedUser {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: Mutex::new(lines.iter().map(|l| l.to_string()).collect()),
        }
    }
}

#[async_trait::async_trait]
impl UserInput for ScriptedUser {
    async fn read_line(&self, _prompt: &str) -> Result<Option<String>, ChannelError> {
        Ok(self.lines.lock().unwrap().pop_front())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Run {
    provider: Arc<ScriptedProvider>,
    sink: Arc<MemorySink>,
    agent: AgentLoop,
}

fn setup(workspace: &Path, replies: &[&str], user: &[&str]) -> Run {
    let provider = Arc::new(ScriptedProvider::new(replies, 5));
    let sink = Arc::new(MemorySink::new());
    let user = Arc::new(ScriptedUser::new(user));

    let settings = ToolSettings {
        workspace_root: workspace.to_path_buf(),
        ..ToolSettings::default()
    };
    let tools = default_registry(&settings, user.clone(), sink.clone());
    let instructions = system_prompt("Reply with JSON.", &tools.definitions());
    let session = ChatSession::new(provider.clone(), "e2e-model", 0.0, &instructions);
    let agent = AgentLoop::new(session, tools, user, sink.clone(), workspace.to_string_lossy());

    Run { provider, sink, agent }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_list_then_create_file() {
    let workspace = tempfile::tempdir().unwrap();
    let replies = [
        r#"{"thought": "Look around first, then write the file.", "tool_calls": [
            {"tool": "listdirectory", "args": {}},
            {"tool": "createfile", "args": {"filename": "a.txt", "content": "hi"}}
        ]}"#,
        r#"{"thought": "The file exists now.", "tool_calls": [{"tool": "taskdone", "args": {"message": "Created a.txt"}}]}"#,
    ];
    let mut run = setup(workspace.path(), &replies, &["end"]);

    let report = run.agent.run("create a.txt with hi").await.unwrap();

    assert_eq!(report.turns, 2);
    assert_eq!(report.tool_calls, 3);
    assert_eq!(std::fs::read_to_string(workspace.path().join("a.txt")).unwrap(), "hi");

    let cwd = workspace.path().to_string_lossy().into_owned();
    let inputs = run.provider.inputs();
    assert_eq!(inputs[0], format!("create a.txt with hi\nCurrent cwd: \"{cwd}\""));
    assert_eq!(
        inputs[1],
        format!(
            "Tool result: \"listdirectory output: Current directory: {cwd}\n\ncreatefile output: File has been created: \"a.txt\" and content written into it\n\"\nCurrent cwd: \"{cwd}\""
        )
    );

    assert_eq!(
        run.sink.thought_text(),
        "Look around first, then write the file.The file exists now."
    );
    assert!(run.sink.events().contains(&AgentEvent::AgentMessage {
        content: "Created a.txt".into()
    }));
}

#[tokio::test]
async fn e2e_change_directory_carries_over() {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::create_dir(workspace.path().join("docs")).unwrap();
    let replies = [
        r#"{"thought": "Go into docs and write there.", "tool_calls": [
            {"tool": "changedirectory", "args": {"dirname": "docs"}},
            {"tool": "writefile", "args": {"filename": "notes.md", "content": "line1\\nline2"}}
        ]}"#,
        r#"{"thought": "Done.", "tool_calls": [{"tool": "taskdone", "args": {"message": "ok"}}]}"#,
    ];
    let mut run = setup(workspace.path(), &replies, &[]);

    let report = run.agent.run("write notes").await.unwrap();

    let written = std::fs::read_to_string(workspace.path().join("docs").join("notes.md")).unwrap();
    assert_eq!(written, "line1\nline2");
    assert!(report.working_directory.ends_with("docs"));
    assert!(run.provider.inputs()[1].ends_with(&format!("Current cwd: \"{}\"", report.working_directory)));
}

#[tokio::test]
async fn e2e_unknown_tool_and_bad_arguments() {
    let workspace = tempfile::tempdir().unwrap();
    let replies = [
        r#"{"thought": "Try things.", "tool_calls": [
            {"tool": "teleport", "args": {}},
            {"tool": "readfile", "args": {}},
            {"tool": "createdirectory", "args": {"dirname": "never"}}
        ]}"#,
        r#"{"thought": "Give up.", "tool_calls": [{"tool": "taskdone", "args": {"message": "stopped"}}]}"#,
    ];
    let mut run = setup(workspace.path(), &replies, &[]);

    run.agent.run("do something").await.unwrap();

    let feedback = &run.provider.inputs()[1];
    assert!(feedback.contains("teleport error: Tool not found.\n"));
    assert!(feedback.contains("An exception occurred during readfile execution: "));
    assert!(!feedback.contains("createdirectory"));
    assert!(!workspace.path().join("never").exists());
}

#[tokio::test]
async fn e2e_malformed_reply_then_recovery() {
    let workspace = tempfile::tempdir().unwrap();
    let replies = [
        "I will just talk instead of using JSON.",
        r#"{"thought": "Sorry, JSON now.", "tool_calls": [{"tool": "taskdone", "args": {"message": "ok"}}]}"#,
    ];
    let mut run = setup(workspace.path(), &replies, &[]);

    let report = run.agent.run("anything").await.unwrap();

    assert_eq!(report.turns, 2);
    assert_eq!(report.tool_calls, 1);
    assert!(run.provider.inputs()[1].starts_with("Tool result: No tool calls found."));
}

#[tokio::test]
async fn e2e_askuser_answer_reaches_model() {
    let workspace = tempfile::tempdir().unwrap();
    let replies = [
        r#"{"thought": "Need a name.", "tool_calls": [{"tool": "askuser", "args": {"question": "File name?"}}]}"#,
        r#"{"thought": "Got it.", "tool_calls": [{"tool": "taskdone", "args": {"message": "ok"}}]}"#,
        r#"{"thought": "Second task.", "tool_calls": [{"tool": "taskdone", "args": {"message": "again"}}]}"#,
    ];
    let mut run = setup(workspace.path(), &replies, &["report.txt", "one more thing", "end"]);

    let report = run.agent.run("ask me").await.unwrap();

    assert_eq!(report.turns, 3);
    let inputs = run.provider.inputs();
    assert!(inputs[1].starts_with("Tool result: \"askuser output: report.txt\n\""));
    assert!(inputs[2].starts_with("User followup question/task: one more thing\n"));
    assert!(run.sink.events().contains(&AgentEvent::Question {
        content: "File name?".into()
    }));
}

#[tokio::test]
async fn e2e_writes_stay_inside_workspace() {
    let outer = tempfile::tempdir().unwrap();
    let workspace = outer.path().join("ws");
    std::fs::create_dir(&workspace).unwrap();
    let replies = [
        r##"{"thought": "Write next to the workspace, then make a PDF.", "tool_calls": [
            {"tool": "writefile", "args": {"filename": "../escaped.txt", "content": "x"}},
            {"tool": "createpdffile", "args": {"filename": "summary.pdf", "markdown_content": "# Summary\\nAll good."}},
            {"tool": "readfile", "args": {"filename": "summary.pdf"}}
        ]}"##,
        r#"{"thought": "Done.", "tool_calls": [{"tool": "taskdone", "args": {"message": "ok"}}]}"#,
    ];
    let mut run = setup(&workspace, &replies, &[]);

    let report = run.agent.run("summarize").await.unwrap();

    assert_eq!(report.tool_calls, 4);
    assert!(!outer.path().join("escaped.txt").exists());
    assert!(workspace.join("summary.pdf").is_file());

    let feedback = &run.provider.inputs()[1];
    assert!(feedback.contains("writefile output: Cannot access \"../escaped.txt\""));
    assert!(feedback.contains("readfile output: summary.pdf content:"));
    assert!(feedback.contains("All good."));
}
