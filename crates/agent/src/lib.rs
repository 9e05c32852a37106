//! The agent side of TaskClaw.
//!
//! - [`stream`] classifies a reply while it streams in (thought vs. tool calls)
//! - [`parser`] turns the completed reply into an ordered list of calls
//! - [`session`] keeps the conversation with the model
//! - [`loop_runner`] drives turns, runs tools and asks for follow-up tasks

pub mod loop_runner;
pub mod parser;
pub mod session;
pub mod stream;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::{AgentLoop, BatchReport, CallOutcome, CallResult, SessionReport};
pub use parser::{ParsedCommand, ToolCallParser};
pub use session::{ChatSession, system_prompt};
pub use stream::{DisplayMask, Phase, StreamInterpreter};
