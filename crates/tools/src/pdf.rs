//! Markdown to PDF rendering and PDF text extraction.
//!
//! Rendering is plain: headings, paragraphs, bullet lists and
//! fenced code, laid out with the standard PDF base fonts on A4 pages.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
    Mono,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Mono => "F3",
        }
    }

    /// Rough advance width of one character, in thousandths of the size.
    fn char_width(self) -> i64 {
        match self {
            Font::Regular => 520,
            Font::Bold => 580,
            Font::Mono => 600,
        }
    }
}

/// One laid-out line of text.
#[derive(Debug, Clone, PartialEq)]
struct Line {
    text: String,
    font: Font,
    size: i64,
    /// Vertical space the line takes, including the gap above it.
    leading: i64,
}

/// Break markdown into styled lines that fit the page width.
fn layout(markdown: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut in_code = false;

    for raw in markdown.lines() {
        let trimmed = raw.trim_end();
        if trimmed.trim_start().starts_with("```") {
            in_code = !in_code;
            continue;
        }
        if in_code {
            push_wrapped(&mut lines, trimmed, Font::Mono, 10, 13);
            continue;
        }

        let text = trimmed.trim_start();
        if text.is_empty() {
            lines.push(Line {
                text: String::new(),
                font: Font::Regular,
                size: 11,
                leading: 8,
            });
            continue;
        }

        let level = text.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&level) && text[level..].starts_with(' ') {
            let (size, leading) = match level {
                1 => (20, 30),
                2 => (16, 24),
                _ => (13, 20),
            };
            push_wrapped(&mut lines, &strip_inline(&text[level + 1..]), Font::Bold, size, leading);
        } else if let Some(item) = text.strip_prefix("- ").or_else(|| text.strip_prefix("* ")) {
            push_wrapped(
                &mut lines,
                &format!("\u{2022} {}", strip_inline(item)),
                Font::Regular,
                11,
                15,
            );
        } else {
            push_wrapped(&mut lines, &strip_inline(text), Font::Regular, 11, 15);
        }
    }
    lines
}

fn strip_inline(text: &str) -> String {
    text.replace("**", "").replace("__", "").replace('`', "")
}

fn push_wrapped(lines: &mut Vec<Line>, text: &str, font: Font, size: i64, leading: i64) {
    let max_chars = (((PAGE_WIDTH - 2 * MARGIN) * 1000) / (font.char_width() * size)).max(1) as usize;
    let mut current = String::new();

    let mut flush = |current: &mut String| {
        lines.push(Line {
            text: std::mem::take(current),
            font,
            size,
            leading,
        });
    };

    for word in text.split(' ') {
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            flush(&mut current);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        // Hard-break words longer than a whole line.
        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > max_chars {
            let head: String = chars.drain(..max_chars).collect();
            current.push_str(&head);
            flush(&mut current);
        }
        current.extend(chars);
    }
    flush(&mut current);
}

/// Encode for the WinAnsi encoding of the base fonts; anything else becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\u{20}'..='\u{7e}' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '\u{20ac}' => 0x80,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201c}' => 0x93,
            '\u{201d}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\t' => b' ',
            _ => b'?',
        })
        .collect()
}

fn base_font(doc: &mut Document, name: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => name,
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Render markdown into the bytes of a PDF document.
pub fn render_markdown(markdown: &str) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = base_font(&mut doc, "Helvetica");
    let bold = base_font(&mut doc, "Helvetica-Bold");
    let mono = base_font(&mut doc, "Courier");
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
            "F3" => mono,
        },
    });

    let mut pages: Vec<Vec<Operation>> = Vec::new();
    let mut operations = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;
    for line in layout(markdown) {
        if y - line.leading < MARGIN {
            pages.push(std::mem::take(&mut operations));
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= line.leading;
        if line.text.is_empty() {
            continue;
        }
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(line.font.resource().as_bytes().to_vec()), Object::Integer(line.size)],
            ),
            Operation::new("Td", vec![Object::Integer(MARGIN), Object::Integer(y)]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(&line.text))]),
            Operation::new("ET", vec![]),
        ]);
    }
    pages.push(operations);

    let mut kids = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations }.encode()?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Text of every page, in page order.
pub fn extract_text(bytes: &[u8]) -> Result<String, lopdf::Error> {
    let doc = Document::load_mem(bytes)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages)
}
