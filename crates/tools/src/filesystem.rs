//! Filesystem tools. Names resolve against the session's working directory
//! and must stay inside the workspace root.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use taskclaw_core::error::ToolError;
use taskclaw_core::tool::{Tool, ToolArgs, ToolExecutionContext, required_arg};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::pdf;

fn io_failure(tool: &str, e: std::io::Error) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool.into(),
        reason: e.to_string(),
    }
}

/// Undo the escapes models tend to leave in file content.
pub fn unescape(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// The directory tree every filesystem tool is confined to.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize(&root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lexical check; symlinks are not followed.
    fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && !matches!(path.components().next(), Some(Component::ParentDir))
    }

    /// Resolve `name` against the working directory. `Err` holds the
    /// refusal reported back to the model.
    fn resolve(&self, context: &ToolExecutionContext, name: &str) -> Result<PathBuf, String> {
        let path = normalize(&context.resolve(name));
        if self.contains(&path) {
            Ok(path)
        } else {
            warn!(path = name, root = %self.root.display(), "Refusing path outside the workspace");
            Err(format!(
                "Cannot access \"{name}\": it is outside the workspace root \"{}\"",
                self.root.display()
            ))
        }
    }
}

/// Moves the working directory inside the workspace.
pub struct ChangeDirectoryTool {
    workspace: Workspace,
}

impl ChangeDirectoryTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ChangeDirectoryTool {
    fn name(&self) -> &str {
        "changedirectory"
    }

    fn description(&self) -> &str {
        "Change the current working directory. \"/\" returns to the workspace root, \"..\" goes up one level."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["dirname"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let dirname = required_arg(args, self.name(), "dirname")?.trim();

        let root = self.workspace.root();
        if dirname == "/" {
            context.current_working_directory = root.to_string_lossy().into_owned();
            return Ok(format!(
                "Successfully changed to folder \"{}\"",
                context.current_working_directory
            ));
        }

        let current = normalize(Path::new(&context.current_working_directory));
        let target = normalize(&current.join(dirname));
        if !self.workspace.contains(&target) {
            return Ok(format!(
                "Cannot leave the workspace root \"{}\"",
                root.display()
            ));
        }
        if target == current {
            return Ok(format!("Already in folder \"{}\"", current.display()));
        }
        if !tokio::fs::metadata(&target).await.is_ok_and(|m| m.is_dir()) {
            return Ok(format!("Directory \"{dirname}\" does not exist"));
        }

        debug!(to = %target.display(), "Changing directory");
        context.current_working_directory = target.to_string_lossy().into_owned();
        Ok(format!("Successfully changed to folder \"{dirname}\""))
    }
}

pub struct CreateDirectoryTool {
    workspace: Workspace,
}

impl CreateDirectoryTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "createdirectory"
    }

    fn description(&self) -> &str {
        "Create a directory in the current working directory."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["dirname"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let dirname = required_arg(args, self.name(), "dirname")?;
        let path = match self.workspace.resolve(context, dirname) {
            Ok(path) => path,
            Err(refusal) => return Ok(refusal),
        };

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(format!("Directory already exists with name: \"{dirname}\""));
        }
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| io_failure(self.name(), e))?;
        Ok(format!("Directory created at: \"{}\".", path.display()))
    }
}

/// Creates a new file; never overwrites.
pub struct CreateFileTool {
    workspace: Workspace,
}

impl CreateFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "createfile"
    }

    fn description(&self) -> &str {
        "Create a new file with the given content. Fails if the file already exists."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["filename", "content"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let filename = required_arg(args, self.name(), "filename")?;
        let content = required_arg(args, self.name(), "content")?;
        let path = match self.workspace.resolve(context, filename) {
            Ok(path) => path,
            Err(refusal) => return Ok(refusal),
        };

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(format!(
                    "A file with that name already exists in the workspace: {filename}"
                ));
            }
            Err(e) => return Err(io_failure(self.name(), e)),
        };
        file.write_all(unescape(content).as_bytes())
            .await
            .map_err(|e| io_failure(self.name(), e))?;
        file.flush().await.map_err(|e| io_failure(self.name(), e))?;

        Ok(format!(
            "File has been created: \"{filename}\" and content written into it"
        ))
    }
}

/// Creates or overwrites a file.
pub struct WriteFileTool {
    workspace: Workspace,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "writefile"
    }

    fn description(&self) -> &str {
        "Write content to a file, replacing it if it exists."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["filename", "content"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let filename = required_arg(args, self.name(), "filename")?;
        let content = required_arg(args, self.name(), "content")?;
        let path = match self.workspace.resolve(context, filename) {
            Ok(path) => path,
            Err(refusal) => return Ok(refusal),
        };

        tokio::fs::write(&path, unescape(content))
            .await
            .map_err(|e| io_failure(self.name(), e))?;
        Ok(format!("File has been written: \"{filename}\""))
    }
}

pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "readfile"
    }

    fn description(&self) -> &str {
        "Read a text or PDF file from the current working directory."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["filename"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let filename = required_arg(args, self.name(), "filename")?;
        let path = match self.workspace.resolve(context, filename) {
            Ok(path) => path,
            Err(refusal) => return Ok(refusal),
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(format!("The file does not exist: \"{}\"", path.display()));
            }
            Err(e) => return Err(io_failure(self.name(), e)),
        };

        let text = if is_pdf(&path) {
            pdf::extract_text(&bytes).map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("could not read PDF text: {e}"),
            })?
        } else {
            String::from_utf8_lossy(&bytes).into_owned()
        };
        Ok(format!("{filename} content:\n```\n{}\n```", text.trim_end()))
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Renders markdown into a new PDF file.
pub struct CreatePdfFileTool {
    workspace: Workspace,
}

impl CreatePdfFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for CreatePdfFileTool {
    fn name(&self) -> &str {
        "createpdffile"
    }

    fn description(&self) -> &str {
        "Create a PDF document from markdown (headings, paragraphs, bullet lists, code blocks). Fails if the file already exists."
    }

    fn arguments(&self) -> &'static [&'static str] {
        &["filename", "markdown_content"]
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let filename = required_arg(args, self.name(), "filename")?;
        let markdown = required_arg(args, self.name(), "markdown_content")?;
        let path = match self.workspace.resolve(context, filename) {
            Ok(path) => path,
            Err(refusal) => return Ok(refusal),
        };
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(format!("A file with that name already exists in the workspace: {filename}"));
        }

        let bytes = pdf::render_markdown(&unescape(markdown)).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: format!("could not render PDF: {e}"),
        })?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| io_failure(self.name(), e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "PDF written");
        Ok(format!(
            "File has been created: \"{}\" and content written into it",
            path.display()
        ))
    }
}

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "listdirectory"
    }

    fn description(&self) -> &str {
        "List the directories and files in the current working directory."
    }

    async fn execute(
        &self,
        _args: &ToolArgs,
        context: &mut ToolExecutionContext,
    ) -> Result<String, ToolError> {
        let cwd = &context.current_working_directory;
        let mut entries = match tokio::fs::read_dir(cwd).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(format!("Current directory does not exist: {cwd}"));
            }
            Err(e) => return Err(io_failure(self.name(), e)),
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_failure(self.name(), e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => dirs.push(name),
                _ => files.push(name),
            }
        }
        dirs.sort();
        files.sort();

        let mut listing = format!("Current directory: {cwd}\n");
        for dir in dirs {
            listing.push_str(&format!("[DIR] {dir}\n"));
        }
        for file in files {
            listing.push_str(&format!("[FILE] {file}\n"));
        }
        Ok(listing)
    }
}
