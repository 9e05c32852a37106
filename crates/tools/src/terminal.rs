//! Terminal tool: run a shell command in the working directory.

use async_trait::async_trait;
use std::time::Duration;
use taskclaw_core::error::ToolError;
use taskclaw_core::tool::{Tool, ToolArgs, ToolExecutionContext, required_arg};
use tokio::process::Command;
use tracing::{debug, warn};

pub struct ExecuteTerminalTool {
    timeout: Duration,
}

impl ExecuteTerminalTool {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Tool for ExecuteTerminalTool {
    fn name(&self) -> &str {
        "executeterminal"
    }

    fn description(&self) -> &str {
        "Run a shell command in the current working directory and return its output."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["command"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let command = required_arg(args, self.name(), "command")?;
        debug!(command = %command, cwd = %context.current_working_directory, "Executing terminal command");

        let mut process = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        process
            .current_dir(&context.current_working_directory)
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, process.output()).await {
            Err(_) => {
                warn!(command = %command, "Terminal command timed out");
                return Err(ToolError::Timeout {
                    tool_name: self.name().into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            Ok(result) => result.map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut text = if stdout.trim().is_empty() {
            "Command success!".to_string()
        } else {
            stdout.into_owned()
        };
        text.push_str(&stderr);

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            text.push_str(&format!("\n[exit code: {code}]"));
        }
        Ok(text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn call(command: &str) -> ToolArgs {
        ToolArgs::from([("command".to_string(), command.to_string())])
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let mut ctx = ToolExecutionContext::new(dir.path().to_string_lossy());

        let out = ExecuteTerminalTool::new(Duration::from_secs(10))
            .execute(&call("ls"), &mut ctx)
            .await
            .unwrap();
        assert!(out.contains("marker.txt"));
    }

    #[tokio::test]
    async fn empty_output_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ToolExecutionContext::new(dir.path().to_string_lossy());

        let out = ExecuteTerminalTool::new(Duration::from_secs(10))
            .execute(&call("true"), &mut ctx)
            .await
            .unwrap();
        assert_eq!(out, "Command success!");
    }

    #[tokio::test]
    async fn stderr_and_exit_code_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ToolExecutionContext::new(dir.path().to_string_lossy());

        let out = ExecuteTerminalTool::new(Duration::from_secs(10))
            .execute(&call("echo oops >&2; exit 3"), &mut ctx)
            .await
            .unwrap();
        assert!(out.starts_with("Command success!oops"));
        assert!(out.ends_with("[exit code: 3]"));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ToolExecutionContext::new(dir.path().to_string_lossy());

        let err = ExecuteTerminalTool::new(Duration::from_millis(200))
            .execute(&call("sleep 5"), &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }
}
