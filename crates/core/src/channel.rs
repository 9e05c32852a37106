//! User input: the read side of the console.
//!
//! The agent asks for input in exactly two places: when the model calls the
//! `askuser` tool, and after a task is reported complete (follow-up task or
//! termination keyword). Both go through this trait.

use async_trait::async_trait;

use crate::error::ChannelError;

#[async_trait]
pub trait UserInput: Send + Sync {
    /// Show `prompt` and read one line.
    ///
    /// Returns `Ok(None)` when the input is exhausted (EOF).
    async fn read_line(&self, prompt: &str) -> Result<Option<String>, ChannelError>;
}
