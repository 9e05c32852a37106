//! Incremental interpreter for a streamed model reply.
//!
//! A reply looks like `{"thought": "...", "tool_calls": [ ... ]}` but arrives
//! in chunks of arbitrary size. The interpreter classifies text as it comes
//! in, without re-scanning what it has already classified:
//!
//! ```text
//! SeekingThought ──"thought": "──▶ InThought ──",──▶ InToolCalls ──]──▶ Closed
//!        │                                              ▲
//!        └──────────── `[` before any thought ──────────┘
//! ```
//!
//! While in the thought, string escapes are decoded for display and an
//! escape (or closing quote) cut off by a chunk boundary is held back until
//! the next chunk resolves it. The tool-call region is passed through raw
//! until its outermost list closes.

use taskclaw_core::event::{AgentEvent, EventSink};

/// Key that introduces the thought value.
pub const THOUGHT_KEY: &str = "\"thought\"";

/// Which regions of the stream are surfaced to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMask {
    pub thought: bool,
    pub tool_calls: bool,
}

impl DisplayMask {
    pub const ALL: Self = Self {
        thought: true,
        tool_calls: true,
    };
    pub const NONE: Self = Self {
        thought: false,
        tool_calls: false,
    };
}

impl Default for DisplayMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Where the interpreter currently is within the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SeekingThought,
    InThought,
    InToolCalls,
    Closed,
}

/// Result of trying to decode a (possibly partial) escape sequence.
#[derive(Debug, PartialEq, Eq)]
enum Escape {
    Incomplete,
    Char(char),
    Literal,
}

fn decode_escape(pending: &str) -> Escape {
    let mut chars = pending.chars().skip(1);
    let Some(kind) = chars.next() else {
        return Escape::Incomplete;
    };
    match kind {
        'n' => Escape::Char('\n'),
        't' => Escape::Char('\t'),
        'r' => Escape::Char('\r'),
        '"' => Escape::Char('"'),
        '\\' => Escape::Char('\\'),
        '/' => Escape::Char('/'),
        'b' => Escape::Char('\u{8}'),
        'f' => Escape::Char('\u{c}'),
        'u' => {
            let digits: String = chars.by_ref().take(4).collect();
            let unit = match hex_unit(&digits) {
                Ok(unit) => unit,
                Err(partial) => return partial,
            };
            if !(0xD800..0xDC00).contains(&unit) {
                return char::from_u32(unit).map_or(Escape::Literal, Escape::Char);
            }

            // High surrogate: the low half follows as another `\uXXXX`.
            let rest: String = chars.collect();
            let Some(low_digits) = rest.strip_prefix("\\u") else {
                return if "\\u".starts_with(rest.as_str()) {
                    Escape::Incomplete
                } else {
                    Escape::Literal
                };
            };
            match hex_unit(low_digits) {
                Ok(low) if (0xDC00..0xE000).contains(&low) => {
                    char::from_u32(0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00))
                        .map_or(Escape::Literal, Escape::Char)
                }
                Ok(_) => Escape::Literal,
                Err(partial) => partial,
            }
        }
        _ => Escape::Literal,
    }
}

/// Four hex digits as a UTF-16 code unit.
fn hex_unit(digits: &str) -> Result<u32, Escape> {
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Escape::Literal);
    }
    if digits.len() < 4 {
        return Err(Escape::Incomplete);
    }
    u32::from_str_radix(digits, 16).map_err(|_| Escape::Literal)
}

/// A complete `\uXXXX` high surrogate whose low half cannot follow `next`.
fn is_lone_high_surrogate(pending: &str, next: char) -> bool {
    let expects = match pending.len() {
        6 => '\\',
        7 if pending.ends_with('\\') => 'u',
        _ => return false,
    };
    next != expects
        && pending.starts_with("\\u")
        && hex_unit(&pending[2..6]).is_ok_and(|unit| (0xD800..0xDC00).contains(&unit))
}

/// Match `: "` (with optional whitespace) at the start of `s`.
///
/// `None` means more input is needed; `Some(Err(()))` means the key is not
/// followed by a string value.
fn match_value_start(s: &str) -> Option<Result<usize, ()>> {
    let mut seen_colon = false;
    for (i, c) in s.char_indices() {
        match c {
            c if c.is_whitespace() => {}
            ':' if !seen_colon => seen_colon = true,
            '"' if seen_colon => return Some(Ok(i + 1)),
            _ => return Some(Err(())),
        }
    }
    None
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Consumes one turn's chunks and classifies them.
#[derive(Debug)]
pub struct StreamInterpreter {
    mask: DisplayMask,
    /// Everything received so far; append-only.
    buffer: String,
    phase: Phase,
    /// Bytes of `buffer` already classified (and, where visible, emitted).
    cursor: usize,
    /// Escape sequence that cannot be decoded yet.
    pending: String,
    /// Decoded thought text so far.
    thought: String,
    depth: usize,
    saw_open: bool,
    in_string: bool,
    string_escape: bool,
}

impl StreamInterpreter {
    pub fn new(mask: DisplayMask) -> Self {
        Self {
            mask,
            buffer: String::new(),
            phase: Phase::SeekingThought,
            cursor: 0,
            pending: String::new(),
            thought: String::new(),
            depth: 0,
            saw_open: false,
            in_string: false,
            string_escape: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The decoded thought seen so far.
    pub fn thought(&self) -> &str {
        &self.thought
    }

    /// The accumulated response so far.
    pub fn response(&self) -> &str {
        &self.buffer
    }

    /// Append one chunk and emit whatever became displayable.
    pub fn push(&mut self, chunk: &str, sink: &dyn EventSink) {
        self.buffer.push_str(chunk);
        loop {
            let advanced = match self.phase {
                Phase::SeekingThought => self.seek_thought(),
                Phase::InThought => self.scan_thought(sink),
                Phase::InToolCalls => {
                    self.scan_tool_calls(sink);
                    false
                }
                Phase::Closed => false,
            };
            if !advanced {
                break;
            }
        }
    }

    /// End of the turn: flush held-back thought text and hand back the
    /// whole response.
    pub fn finish(mut self, sink: &dyn EventSink) -> String {
        if self.phase == Phase::InThought {
            let mut tail = std::mem::take(&mut self.pending);
            let rest = &self.buffer[self.cursor..];
            // A held-back quote with nothing after it closed the thought.
            let closed = rest.starts_with('"') && rest[1..].trim().is_empty();
            if !closed {
                tail.push_str(rest);
            }
            if !tail.is_empty() {
                self.thought.push_str(&tail);
                if self.mask.thought {
                    sink.emit(AgentEvent::ThoughtDelta { content: tail });
                }
            }
            if closed && self.mask.thought {
                sink.emit(AgentEvent::ThoughtFinished);
            }
        }
        self.buffer
    }

    /// Returns true when the phase changed or the cursor moved past a
    /// `"thought"` key that was not followed by a string.
    fn seek_thought(&mut self) -> bool {
        let hay = &self.buffer[self.cursor..];
        let key = hay.find(THOUGHT_KEY);
        let open = hay.find('[');

        match (key, open) {
            (Some(k), o) if o.is_none_or(|o| k < o) => {
                let after = self.cursor + k + THOUGHT_KEY.len();
                match match_value_start(&self.buffer[after..]) {
                    Some(Ok(n)) => {
                        self.cursor = after + n;
                        self.phase = Phase::InThought;
                        true
                    }
                    Some(Err(())) => {
                        self.cursor = after;
                        true
                    }
                    None => {
                        self.cursor += k;
                        false
                    }
                }
            }
            (_, Some(o)) => {
                // No thought before the list: the reply is tool calls only.
                self.cursor += o;
                self.phase = Phase::InToolCalls;
                true
            }
            _ => {
                // Keep a tail that could be the start of a split key.
                let keep_from = self.buffer.len().saturating_sub(THOUGHT_KEY.len() - 1);
                self.cursor = floor_char_boundary(&self.buffer, keep_from).max(self.cursor);
                false
            }
        }
    }

    /// Returns true when the thought's end marker was consumed.
    fn scan_thought(&mut self, sink: &dyn EventSink) -> bool {
        let start = self.cursor;
        let rest = &self.buffer[start..];
        let mut out = String::new();
        let mut consumed = 0;
        let mut finished = false;

        for (i, c) in rest.char_indices() {
            if is_lone_high_surrogate(&self.pending, c) {
                out.push_str(&self.pending[..6]);
                self.pending.drain(..6);
            }
            if !self.pending.is_empty() {
                self.pending.push(c);
                match decode_escape(&self.pending) {
                    Escape::Incomplete => {}
                    Escape::Char(d) => {
                        out.push(d);
                        self.pending.clear();
                    }
                    Escape::Literal => {
                        out.push_str(&self.pending);
                        self.pending.clear();
                    }
                }
                consumed = i + c.len_utf8();
                continue;
            }
            match c {
                '\\' => {
                    self.pending.push(c);
                    consumed = i + 1;
                }
                '"' => {
                    let tail = &rest[i + 1..];
                    let trimmed = tail.trim_start();
                    if trimmed.is_empty() {
                        // Can't tell yet whether this quote ends the thought.
                        break;
                    }
                    if trimmed.starts_with(',') || trimmed.starts_with('}') {
                        let gap = tail.len() - trimmed.len();
                        let marker = if trimmed.starts_with(',') { 1 } else { 0 };
                        consumed = i + 1 + gap + marker;
                        finished = true;
                        break;
                    }
                    out.push('"');
                    consumed = i + 1;
                }
                _ => {
                    out.push(c);
                    consumed = i + c.len_utf8();
                }
            }
        }

        self.cursor = start + consumed;
        if !out.is_empty() {
            self.thought.push_str(&out);
            if self.mask.thought {
                sink.emit(AgentEvent::ThoughtDelta { content: out });
            }
        }

        if finished {
            if self.mask.thought {
                sink.emit(AgentEvent::ThoughtFinished);
            }
            self.phase = Phase::InToolCalls;
        }
        finished
    }

    fn scan_tool_calls(&mut self, sink: &dyn EventSink) {
        let start = self.cursor;
        let rest = &self.buffer[start..];
        let mut end = rest.len();
        let mut closed = false;

        for (i, c) in rest.char_indices() {
            if self.in_string {
                if self.string_escape {
                    self.string_escape = false;
                } else if c == '\\' {
                    self.string_escape = true;
                } else if c == '"' {
                    self.in_string = false;
                }
                continue;
            }
            match c {
                '"' => self.in_string = true,
                '[' => {
                    self.depth += 1;
                    self.saw_open = true;
                }
                ']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.saw_open && self.depth == 0 {
                        end = i + 1;
                        closed = true;
                        break;
                    }
                }
                _ => {}
            }
        }

        if end > 0 && self.mask.tool_calls {
            sink.emit(AgentEvent::ToolCallText {
                content: rest[..end].to_string(),
            });
        }
        self.cursor = start + end;
        if closed {
            self.phase = Phase::Closed;
        }
    }
}
