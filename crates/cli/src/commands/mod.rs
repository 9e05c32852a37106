pub mod init;
pub mod run;
pub mod tools;

use std::path::{Path, PathBuf};
use std::time::Duration;
use taskclaw_config::{AppConfig, ConfigError};
use taskclaw_tools::ToolSettings;

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}

pub fn tool_settings(config: &AppConfig) -> ToolSettings {
    ToolSettings {
        workspace_root: PathBuf::from(&config.workspace_dir),
        terminal_timeout: Duration::from_secs(config.terminal_timeout_secs),
        web_max_chars: config.web_max_chars,
        ..ToolSettings::default()
    }
}
