//! A stateful chat session with the model.

use std::sync::Arc;
use taskclaw_core::error::ProviderError;
use taskclaw_core::message::{Conversation, Message};
use taskclaw_core::provider::{ChunkReceiver, Provider, ProviderRequest};
use taskclaw_core::tool::ToolDefinition;
use tracing::debug;

/// Instructions followed by the list of tools the model may call.
pub fn system_prompt(instructions: &str, tools: &[ToolDefinition]) -> String {
    let mut prompt = instructions.trim_end().to_string();
    prompt.push_str("\n\nAvailable tools:\n");
    for tool in tools {
        let args = if tool.arguments.is_empty() {
            "none".to_string()
        } else {
            tool.arguments.join(", ")
        };
        prompt.push_str(&format!("- {} (args: {}): {}\n", tool.name, args, tool.description));
    }
    prompt
}

/// Owns the conversation history and sends each new user message, with
/// that history, to the provider.
pub struct ChatSession {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    conversation: Conversation,
}

impl ChatSession {
    /// Start a session whose first message is the system instructions.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        instructions: &str,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            conversation: Conversation::with_system(instructions),
        }
    }

    /// Cap the length of each reply.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Append `text` as a user message and open a reply stream.
    pub async fn send(&mut self, text: &str) -> Result<ChunkReceiver, ProviderError> {
        self.conversation.push(Message::user(text));
        debug!(
            conversation_id = %self.conversation.id,
            messages = self.conversation.messages.len(),
            provider = self.provider.name(),
            "Sending message"
        );

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: self.conversation.messages.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        self.provider.stream(request).await
    }

    /// Record the model's full reply once its stream has ended.
    pub fn record_reply(&mut self, text: &str) {
        self.conversation.push(Message::assistant(text));
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}
