//! Console channel: stdin for input, colored stdout for agent events.
//!
//! Optionally tees everything shown (and every answer typed) into a
//! transcript file.

use async_trait::async_trait;
use crossterm::queue;
use crossterm::style::{Color, PrintStyledContent, Stylize};
use std::fs::File;
use std::io::{self as stdio, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use taskclaw_core::channel::UserInput;
use taskclaw_core::error::ChannelError;
use taskclaw_core::event::{AgentEvent, EventSink};
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

/// Text shown for an event, and its color. `None` means nothing is shown.
pub fn render(event: &AgentEvent) -> Option<(String, Color)> {
    match event {
        AgentEvent::TurnStarted { .. } | AgentEvent::TaskCompleted => None,
        AgentEvent::ThoughtDelta { content } => Some((content.clone(), Color::Green)),
        AgentEvent::ThoughtFinished => Some(("\n".into(), Color::Reset)),
        AgentEvent::ToolCallText { content } => Some((content.clone(), Color::DarkGrey)),
        AgentEvent::ToolOutput { content } => {
            Some((format!("\n[Tool result]\n{}\n", content.trim_end()), Color::DarkCyan))
        }
        AgentEvent::AgentMessage { content } => {
            Some((format!("\n[Agent]: {content}\n"), Color::Yellow))
        }
        AgentEvent::Question { content } => {
            Some((format!("\n[Agent Asks]: {content}\n"), Color::Cyan))
        }
        AgentEvent::Notice { content } => Some((format!("\n{content}\n"), Color::Magenta)),
    }
}

/// Transcript file name for a session started now.
pub fn transcript_file_name() -> String {
    format!("{}-log.txt", chrono::Local::now().format("%Y-%m-%d_%H-%M"))
}

pub struct ConsoleChannel {
    lines: tokio::sync::Mutex<Lines<BufReader<Stdin>>>,
    transcript: Option<(PathBuf, Mutex<File>)>,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self {
            lines: tokio::sync::Mutex::new(BufReader::new(io::stdin()).lines()),
            transcript: None,
        }
    }

    /// Also write the session to a new transcript file in `dir`.
    pub fn with_transcript(mut self, dir: &Path) -> Result<Self, ChannelError> {
        std::fs::create_dir_all(dir).map_err(|e| ChannelError::Io(e.to_string()))?;
        let path = dir.join(transcript_file_name());
        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ChannelError::Io(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Writing session transcript");
        self.transcript = Some((path, Mutex::new(file)));
        Ok(self)
    }

    pub fn transcript_path(&self) -> Option<&Path> {
        self.transcript.as_ref().map(|(path, _)| path.as_path())
    }

    fn record(&self, text: &str) {
        let Some((_, file)) = &self.transcript else {
            return;
        };
        if let Ok(mut file) = file.lock()
            && let Err(e) = file.write_all(text.as_bytes())
        {
            warn!(error = %e, "Failed to write transcript");
        }
    }

    fn show(&self, text: &str, color: Color) {
        let mut stdout = stdio::stdout().lock();
        let written = queue!(stdout, PrintStyledContent(text.with(color))).and_then(|()| stdout.flush());
        if let Err(e) = written {
            warn!(error = %e, "Failed to write to the console");
        }
        self.record(text);
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ConsoleChannel {
    fn emit(&self, event: AgentEvent) {
        if let Some((text, color)) = render(&event) {
            self.show(&text, color);
        }
    }
}

#[async_trait]
impl UserInput for ConsoleChannel {
    async fn read_line(&self, prompt: &str) -> Result<Option<String>, ChannelError> {
        self.show(&format!("{prompt} "), Color::Magenta);

        let line = self
            .lines
            .lock()
            .await
            .next_line()
            .await
            .map_err(|e| ChannelError::Io(e.to_string()))?;

        if let Some(line) = &line {
            self.record(&format!("{line}\n"));
        }
        Ok(line)
    }
}
