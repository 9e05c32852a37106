//! Model transport implementations for TaskClaw.
//!
//! All providers implement the `taskclaw_core::Provider` trait. The agent
//! only needs an ordered stream of text chunks, so one OpenAI-compatible
//! implementation covers Ollama, OpenAI, OpenRouter, vLLM and friends.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
