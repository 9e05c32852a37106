//! Console channel for TaskClaw.
//!
//! The agent reads tasks and answers through [`UserInput`] and reports
//! through [`EventSink`]; [`ConsoleChannel`] implements both on top of the
//! terminal.
//!
//! [`UserInput`]: taskclaw_core::channel::UserInput
//! [`EventSink`]: taskclaw_core::event::EventSink

pub mod console;

pub use console::ConsoleChannel;
