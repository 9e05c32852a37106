//! # TaskClaw Core
//!
//! Domain types, traits, and error definitions for the TaskClaw agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Each collaborator of the agent loop is a trait here:
//! - [`Provider`] is the model transport (streamed text in arrival order)
//! - [`Tool`] is a capability the model can invoke by name
//! - [`UserInput`] and [`EventSink`] are the console, split into its
//!   read side and its write side
//!
//! Implementations live in their respective crates, which keeps the agent
//! loop testable with scripted stand-ins.

pub mod channel;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::UserInput;
pub use error::{Error, Result};
pub use event::{AgentEvent, EventSink, MemorySink, NullSink};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, Usage};
pub use tool::{Tool, ToolArgs, ToolDefinition, ToolExecutionContext, ToolRegistry};
