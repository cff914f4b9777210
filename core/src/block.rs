//! Rendered code blocks
//!
//! A [`RenderedBlock`] is the statically rendered source container a widget
//! mounts on. It is a list of segments: code text, and UI-only decorations
//! that are visible but never copied. Blocks come from plain snippet files or
//! from fenced code blocks in Markdown/MDX documents.

use serde::{Deserialize, Serialize};

/// Trailing notation that marks a line as a decoration
pub const IGNORE_MARKER: &str = "// [!code ignore]";

/// Fence languages that produce runnable widgets
pub const RUNNABLE_LANGS: &[&str] = &["ts", "typescript", "js", "javascript"];

/* ===================== Segments ===================== */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "lowercase")]
pub enum Segment {
    Code(String),
    /// UI-only content (`copy_ignore`)
    Decoration(String),
}

impl Segment {
    pub fn text(&self) -> &str {
        match self {
            Segment::Code(text) | Segment::Decoration(text) => text,
        }
    }

    pub fn is_decoration(&self) -> bool {
        matches!(self, Segment::Decoration(_))
    }
}

/// Statically rendered source of one widget
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedBlock {
    segments: Vec<Segment>,
}

impl RenderedBlock {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// A block with a single code segment
    pub fn from_code(code: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Code(code.into())],
        }
    }

    /// Render annotated source
    ///
    /// Lines ending in [`IGNORE_MARKER`] become decorations with the marker
    /// removed; consecutive code lines share one segment.
    pub fn parse(source: &str) -> Self {
        let mut segments: Vec<Segment> = Vec::new();

        for line in source.split_inclusive('\n') {
            let (body, newline) = match line.strip_suffix('\n') {
                Some(body) => (body.strip_suffix('\r').unwrap_or(body), &line[body.len()..]),
                None => (line, ""),
            };

            match body.trim_end().strip_suffix(IGNORE_MARKER) {
                Some(visible) => {
                    segments.push(Segment::Decoration(format!("{}{}", visible.trim_end(), newline)));
                }
                None => match segments.last_mut() {
                    Some(Segment::Code(code)) => code.push_str(line),
                    _ => segments.push(Segment::Code(line.to_string())),
                },
            }
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Everything the container shows, decorations included
    pub fn text_content(&self) -> String {
        self.segments.iter().map(Segment::text).collect()
    }

    /// The text a copy action delivers
    pub fn copy_text(&self) -> String {
        self.segments
            .iter()
            .filter(|segment| !segment.is_decoration())
            .map(Segment::text)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|segment| segment.text().is_empty())
    }
}

/* ===================== Presentation ===================== */

/// Cosmetic widget settings; never consulted by the run pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationMeta {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub allow_copy: bool,
    pub keep_background: bool,
}

impl Default for PresentationMeta {
    fn default() -> Self {
        Self {
            title: None,
            icon: None,
            allow_copy: true,
            keep_background: false,
        }
    }
}

impl PresentationMeta {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/* ===================== Markdown fences ===================== */

/// A fenced code block found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFence {
    pub lang: String,
    pub meta: PresentationMeta,
    pub body: String,
    /// 1-based line of the opening fence
    pub line: usize,
}

impl CodeFence {
    pub fn is_runnable(&self) -> bool {
        RUNNABLE_LANGS.contains(&self.lang.as_str())
    }

    pub fn block(&self) -> RenderedBlock {
        RenderedBlock::parse(&self.body)
    }
}

struct OpenFence {
    marker: char,
    width: usize,
    indent: usize,
    info: String,
    line: usize,
    body: String,
}

/// Every fenced code block in a Markdown/MDX document, in order
///
/// A fence is a run of at least three backticks or tildes with up to three
/// leading spaces. An unterminated fence runs to the end of the document.
pub fn extract_fences(document: &str) -> Vec<CodeFence> {
    let mut fences = Vec::new();
    let mut open: Option<OpenFence> = None;

    for (index, line) in document.lines().enumerate() {
        let indent = line.len() - line.trim_start_matches(' ').len();
        let trimmed = &line[indent..];

        let closes = open
            .as_ref()
            .is_some_and(|fence| indent <= 3 && is_closing_fence(trimmed, fence.marker, fence.width));
        if closes {
            if let Some(done) = open.take() {
                fences.push(finish_fence(done));
            }
            continue;
        }

        match open.as_mut() {
            Some(fence) => {
                let strip = indent.min(fence.indent);
                fence.body.push_str(&line[strip..]);
                fence.body.push('\n');
            }
            None => {
                if indent > 3 {
                    continue;
                }
                let Some(marker) = trimmed.chars().next().filter(|c| *c == '`' || *c == '~') else {
                    continue;
                };
                let width = trimmed.chars().take_while(|c| *c == marker).count();
                let info = trimmed[width..].trim();
                // backtick fences cannot carry backticks in the info string
                if width < 3 || (marker == '`' && info.contains('`')) {
                    continue;
                }
                open = Some(OpenFence {
                    marker,
                    width,
                    indent,
                    info: info.to_string(),
                    line: index + 1,
                    body: String::new(),
                });
            }
        }
    }

    if let Some(unterminated) = open {
        fences.push(finish_fence(unterminated));
    }
    fences
}

/// Only the fences that should mount a playground widget
pub fn runnable_fences(document: &str) -> Vec<CodeFence> {
    extract_fences(document)
        .into_iter()
        .filter(CodeFence::is_runnable)
        .collect()
}

fn is_closing_fence(trimmed: &str, marker: char, width: usize) -> bool {
    let run = trimmed.chars().take_while(|c| *c == marker).count();
    run >= width && trimmed[run..].trim().is_empty()
}

fn finish_fence(fence: OpenFence) -> CodeFence {
    let (lang, rest) = match fence.info.split_once(char::is_whitespace) {
        Some((lang, rest)) => (lang.to_string(), rest),
        None => (fence.info.clone(), ""),
    };

    let mut meta = PresentationMeta::default();
    for (key, value) in meta_attributes(rest) {
        match key.as_str() {
            "title" => meta.title = Some(value),
            "icon" => meta.icon = Some(value),
            "allowCopy" => meta.allow_copy = value != "false",
            "keepBackground" => meta.keep_background = value != "false",
            _ => {}
        }
    }

    CodeFence {
        lang: lang.to_ascii_lowercase(),
        meta,
        body: fence.body,
        line: fence.line,
    }
}

/// `key="value"`, `key='value'`, `key=value` and bare `key` (= "true")
fn meta_attributes(meta: &str) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    let mut rest = meta.trim_start();

    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let key = rest[..key_end].to_string();
        rest = &rest[key_end..];

        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'');
                match quote {
                    Some(quote) => {
                        let inner = &after[1..];
                        let end = inner.find(quote).unwrap_or(inner.len());
                        rest = inner.get(end + 1..).unwrap_or("");
                        inner[..end].to_string()
                    }
                    None => {
                        let end = after.find(char::is_whitespace).unwrap_or(after.len());
                        rest = &after[end..];
                        after[..end].to_string()
                    }
                }
            }
            None => "true".to_string(),
        };

        if !key.is_empty() {
            attributes.push((key, value));
        }
        rest = rest.trim_start();
    }

    attributes
}
