//! Agent events: what the agent shows to the person at the console.
//!
//! The agent never writes to a terminal directly. It emits `AgentEvent`s
//! into an [`EventSink`], and the sink decides how (and whether) to render
//! them. This keeps the stream interpreter and the loop independent of any
//! output device.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Events emitted by the agent during a session.
///
/// - `turn_started`: a request was sent to the model
/// - `thought_delta`: new, decoded thought text from the live stream
/// - `thought_finished`: the thought's end marker was seen
/// - `tool_call_text`: raw tool-call region text, passed through as it streams
/// - `tool_output`: concatenated tool results (or a parse error) for a turn
/// - `agent_message`: a message the agent addresses to the user
/// - `question`: the agent asks the user something
/// - `task_completed`: the termination tool ran
/// - `notice`: an out-of-band status line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    TurnStarted { turn: usize },
    ThoughtDelta { content: String },
    ThoughtFinished,
    ToolCallText { content: String },
    ToolOutput { content: String },
    AgentMessage { content: String },
    Question { content: String },
    TaskCompleted,
    Notice { content: String },
}

impl AgentEvent {
    /// Stable name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnStarted { .. } => "turn_started",
            Self::ThoughtDelta { .. } => "thought_delta",
            Self::ThoughtFinished => "thought_finished",
            Self::ToolCallText { .. } => "tool_call_text",
            Self::ToolOutput { .. } => "tool_output",
            Self::AgentMessage { .. } => "agent_message",
            Self::Question { .. } => "question",
            Self::TaskCompleted => "task_completed",
            Self::Notice { .. } => "notice",
        }
    }
}

/// A write-only destination for agent events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: AgentEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AgentEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events emitted so far.
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Concatenation of all `ThoughtDelta` contents.
    pub fn thought_text(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AgentEvent::ThoughtDelta { content } => Some(content),
                _ => None,
            })
            .collect()
    }

    /// Concatenation of all `ToolCallText` contents.
    pub fn tool_call_text(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                AgentEvent::ToolCallText { content } => Some(content),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
