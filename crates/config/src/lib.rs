//! Configuration loading, validation, and management for TaskClaw.
//!
//! Loads configuration from `~/.taskclaw/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Built-in system instructions, used when no instructions file is configured.
pub const DEFAULT_INSTRUCTIONS: &str = r#"You are TaskClaw, an autonomous agent that completes tasks inside a workspace directory by calling tools.

Every reply MUST be a single JSON object and nothing else:
{"thought": "<your reasoning for this step>", "tool_calls": [{"tool": "<tool name>", "args": {"<argument>": "<value>"}}]}

Rules:
- "thought" comes first and explains what you are about to do.
- "tool_calls" is a list; calls run in order, one after another.
- Every argument value is a string. Use \n for line breaks inside file content.
- Paths are relative to the current working directory reported with every message.
- You will receive the tool results in the next message.
- When the task is finished, call "taskdone" with a short summary as "message".
- If you need information only the user has, call "askuser" with a "question".
"#;

/// The root configuration structure.
///
/// Maps directly to `~/.taskclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model to request from the provider
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Base URL of an OpenAI-compatible endpoint (Ollama by default)
    #[serde(default = "default_provider_url")]
    pub provider_url: String,

    /// API key, if the endpoint needs one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Show the model's thought while it streams
    #[serde(default = "default_true")]
    pub display_thought: bool,

    /// Show the raw tool-call list while it streams
    #[serde(default = "default_true")]
    pub display_toolcall: bool,

    /// Tee the console transcript into a timestamped log file
    #[serde(default)]
    pub generate_log: bool,

    /// Directory for transcript log files
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Root of the agent's workspace; the session starts here
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,

    /// Optional file replacing the built-in system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_file: Option<String>,

    /// Follow-up input that ends the session
    #[serde(default = "default_termination_keyword")]
    pub termination_keyword: String,

    /// Optional cap on model turns per task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,

    /// Optional cap on tokens generated per reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Timeout for `executeterminal`
    #[serde(default = "default_terminal_timeout_secs")]
    pub terminal_timeout_secs: u64,

    /// Maximum characters returned by `gettextfromwebpage`
    #[serde(default = "default_web_max_chars")]
    pub web_max_chars: usize,
}

fn default_model_name() -> String {
    "qwen3:14b".into()
}
fn default_provider_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}
fn default_log_dir() -> String {
    ".".into()
}
fn default_workspace_dir() -> String {
    "environment".into()
}
fn default_termination_keyword() -> String {
    "end".into()
}
fn default_terminal_timeout_secs() -> u64 {
    120
}
fn default_web_max_chars() -> usize {
    8000
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model_name", &self.model_name)
            .field("provider_url", &self.provider_url)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("display_thought", &self.display_thought)
            .field("display_toolcall", &self.display_toolcall)
            .field("generate_log", &self.generate_log)
            .field("log_dir", &self.log_dir)
            .field("workspace_dir", &self.workspace_dir)
            .field("instructions_file", &self.instructions_file)
            .field("termination_keyword", &self.termination_keyword)
            .field("max_turns", &self.max_turns)
            .field("max_tokens", &self.max_tokens)
            .field("terminal_timeout_secs", &self.terminal_timeout_secs)
            .field("web_max_chars", &self.web_max_chars)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default location, then apply environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` with `TASKCLAW_*` environment overrides applied
    /// before validation.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    fn load_with(path: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?.with_overrides(var);
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(model) = var("TASKCLAW_MODEL") {
            self.model_name = model;
        }
        if let Some(url) = var("TASKCLAW_PROVIDER_URL") {
            self.provider_url = url;
        }
        if let Some(key) = var("TASKCLAW_API_KEY") {
            self.api_key = Some(key);
        }
        self
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".taskclaw")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.model_name.trim().is_empty() {
            return Err(ConfigError::ValidationError("model_name must not be empty".into()));
        }

        if self.termination_keyword.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "termination_keyword must not be empty".into(),
            ));
        }

        if self.max_turns == Some(0) {
            return Err(ConfigError::ValidationError("max_turns must be at least 1".into()));
        }

        if self.max_tokens == Some(0) {
            return Err(ConfigError::ValidationError("max_tokens must be at least 1".into()));
        }

        Ok(())
    }

    /// The system instructions sent as the first message of every session.
    pub fn instructions(&self) -> Result<String, ConfigError> {
        match &self.instructions_file {
            Some(file) => {
                let path = PathBuf::from(file);
                std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
                    path,
                    reason: e.to_string(),
                })
            }
            None => Ok(DEFAULT_INSTRUCTIONS.to_string()),
        }
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            provider_url: default_provider_url(),
            api_key: None,
            temperature: default_temperature(),
            display_thought: true,
            display_toolcall: true,
            generate_log: false,
            log_dir: default_log_dir(),
            workspace_dir: default_workspace_dir(),
            instructions_file: None,
            termination_keyword: default_termination_keyword(),
            max_turns: None,
            max_tokens: None,
            terminal_timeout_secs: default_terminal_timeout_secs(),
            web_max_chars: default_web_max_chars(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workspace_dir, "environment");
        assert_eq!(config.termination_keyword, "end");
        assert!(config.display_thought);
        assert!(!config.generate_log);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model_name, config.model_name);
        assert_eq!(parsed.provider_url, config.provider_url);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_turns_rejected() {
        let config = AppConfig {
            max_turns: Some(0),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_are_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model_name = \"llama3.1:8b\"\n").unwrap();

        let config = AppConfig::load_with(&path, |key| {
            (key == "TASKCLAW_PROVIDER_URL").then(|| "http://gpu-box:8000/v1".to_string())
        })
        .unwrap();
        assert_eq!(config.provider_url, "http://gpu-box:8000/v1");
        assert_eq!(config.model_name, "llama3.1:8b");

        let result = AppConfig::load_with(&path, |key| {
            (key == "TASKCLAW_MODEL").then(String::new)
        });
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model_name, "qwen3:14b");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "model_name = \"llama3.1:8b\"\ndisplay_thought = false\nmax_turns = 12\nmax_tokens = 2048\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model_name, "llama3.1:8b");
        assert!(!config.display_thought);
        assert!(config.display_toolcall);
        assert_eq!(config.max_turns, Some(12));
        assert_eq!(config.max_tokens, Some(2048));
        assert_eq!(config.terminal_timeout_secs, 120);
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model_name = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn instructions_default_and_override() {
        let config = AppConfig::default();
        assert!(config.instructions().unwrap().contains("\"tool_calls\""));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instructions.md");
        std::fs::write(&path, "custom rules").unwrap();
        let config = AppConfig {
            instructions_file: Some(path.to_string_lossy().into_owned()),
            ..AppConfig::default()
        };
        assert_eq!(config.instructions().unwrap(), "custom rules");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("qwen3:14b"));
        assert!(toml_str.contains("environment"));
    }
}
