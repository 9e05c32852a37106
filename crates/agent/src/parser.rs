//! Parsing of the tool-call list out of a completed reply.
//!
//! The parser never fails outright. Anything it cannot make sense of comes
//! back as a single [`ParsedCommand`] carrying an error message, which the
//! loop hands back to the model so it can correct itself.

use serde_json::Value;
use taskclaw_core::tool::ToolArgs;

/// One tool invocation requested by the model, or a parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub tool: String,
    pub args: ToolArgs,
    pub error: Option<String>,
}

impl ParsedCommand {
    pub fn call(tool: impl Into<String>, args: ToolArgs) -> Self {
        Self {
            tool: tool.into(),
            args,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            tool: String::new(),
            args: ToolArgs::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Extracts the ordered tool-call list from a reply.
pub struct ToolCallParser;

impl ToolCallParser {
    /// Parse `text` into commands.
    ///
    /// Returns exactly one error command when the text is malformed, and an
    /// empty list when the model asked for no tools.
    pub fn parse(text: &str) -> Vec<ParsedCommand> {
        match Self::try_parse(text) {
            Ok(commands) => commands,
            Err(message) => vec![ParsedCommand::error(message)],
        }
    }

    fn try_parse(text: &str) -> Result<Vec<ParsedCommand>, String> {
        let text = strip_code_fence(text);
        let Some(start) = text.find(['{', '[']) else {
            return Err(
                "No tool calls found. Reply with a JSON object containing \"thought\" and \"tool_calls\"."
                    .into(),
            );
        };

        let candidate = &text[start..];
        let end = structure_end(candidate)?;
        let value: Value = serde_json::from_str(&candidate[..end])
            .map_err(|e| format!("Malformed tool call JSON: {e}"))?;

        let list = match &value {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("tool_calls") {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => {
                    return Err("Response is missing the \"tool_calls\" list.".into());
                }
                Some(_) => return Err("\"tool_calls\" must be a list.".into()),
            },
            _ => return Err("Tool calls must be a JSON object or list.".into()),
        };

        list.iter()
            .enumerate()
            .map(|(i, item)| parse_call(i + 1, item))
            .collect()
    }
}

fn parse_call(position: usize, item: &Value) -> Result<ParsedCommand, String> {
    let Value::Object(map) = item else {
        return Err(format!("Tool call #{position} is not an object."));
    };

    let tool = map
        .get("tool")
        .or_else(|| map.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if tool.is_empty() {
        return Err(format!("Tool call #{position} is missing a tool name."));
    }

    let mut args = ToolArgs::new();
    match map.get("args").or_else(|| map.get("arguments")) {
        None | Some(Value::Null) => {}
        Some(Value::Object(values)) => {
            for (key, value) in values {
                args.insert(key.clone(), value_text(value));
            }
        }
        Some(_) => return Err(format!("Arguments of tool call #{position} ({tool}) must be an object.")),
    }

    Ok(ParsedCommand::call(tool, args))
}

/// String values verbatim; anything else as compact JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = body.split_once('\n').map_or("", |(_, rest)| rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Byte offset just past the structure that opens at `text[0]`.
///
/// Brackets inside JSON strings are ignored.
fn structure_end(text: &str) -> Result<usize, String> {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' | ']' => {
                let expected = if c == '}' { '{' } else { '[' };
                if stack.pop() != Some(expected) {
                    return Err(format!("Malformed tool call list: unexpected '{c}'."));
                }
                if stack.is_empty() {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
    }

    let unclosed_lists = stack.iter().filter(|c| **c == '[').count();
    if unclosed_lists > 0 {
        Err(format!(
            "Malformed tool call list: unbalanced list markers ({unclosed_lists} '[' never closed)."
        ))
    } else {
        Err("Malformed tool call list: unbalanced braces.".into())
    }
}
