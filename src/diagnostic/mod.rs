pub mod ansi;
pub mod json;

use std::rc::Rc;

use crate::ast::{SourceMap, Span};

/// Script text and its line index, built once and shared by every
/// diagnostic raised against it.
#[derive(Debug)]
pub struct SourceFile {
    pub text: String,
    pub map: SourceMap,
}

impl SourceFile {
    pub fn new(text: impl Into<String>) -> Rc<Self> {
        let text = text.into();
        let map = SourceMap::new(&text);
        Rc::new(SourceFile { text, map })
    }

    pub fn line_text(&self, line: usize) -> &str {
        self.map.line_text(&self.text, line)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub row: u32,
    pub col: u32,
    /// Filled in from the source when only a position is known.
    pub span: Option<Span>,
    pub message: String,
    pub is_primary: bool,
}

/// A renderable error from any stage, with the source it refers to.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// `LexError`, `ParserError`, `CompileError` or a runtime fault kind.
    pub kind: &'static str,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub source: Option<Rc<SourceFile>>,
}

impl Diagnostic {
    pub fn error(kind: &'static str, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            source: None,
        }
    }

    pub fn with_span(mut self, span: Span, row: u32, col: u32, label: impl Into<String>) -> Self {
        self.labels.push(Label { row, col, span: Some(span), message: label.into(), is_primary: true });
        self
    }

    pub fn with_position(mut self, row: u32, col: u32, label: impl Into<String>) -> Self {
        self.labels.push(Label { row, col, span: None, message: label.into(), is_primary: true });
        self
    }

    pub fn with_secondary_position(mut self, row: u32, col: u32, label: impl Into<String>) -> Self {
        self.labels.push(Label { row, col, span: None, message: label.into(), is_primary: false });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Attach the source text, resolving position-only labels to spans.
    pub fn with_source(self, source: impl Into<String>) -> Self {
        self.with_shared_source(SourceFile::new(source))
    }

    pub fn with_shared_source(mut self, file: Rc<SourceFile>) -> Self {
        for label in self.labels.iter_mut().filter(|l| l.span.is_none() && l.row > 0) {
            let start = file.map.offset(label.row as usize, label.col as usize, &file.text);
            let rest = file.text.get(start..).unwrap_or("");
            label.span = Some(Span { start, end: start + token_len(rest) });
        }
        self.source = Some(file);
        self
    }

    pub fn primary(&self) -> Option<&Label> {
        self.labels.iter().find(|l| l.is_primary)
    }
}

/// Length of the token starting `rest`, at least one byte.
fn token_len(rest: &str) -> usize {
    if let Some(body) = rest.strip_prefix('"') {
        return body.find('"').map(|i| i + 2).unwrap_or(1);
    }
    let word = rest
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    word.max(1)
}

// ---- From impls for each stage's error type ----

impl From<&crate::lexer::LexError> for Diagnostic {
    fn from(e: &crate::lexer::LexError) -> Self {
        Diagnostic::error("LexError", e.to_string()).with_span(e.span, e.row, e.col, "here")
    }
}

impl From<&crate::parser::ParseError> for Diagnostic {
    fn from(e: &crate::parser::ParseError) -> Self {
        Diagnostic::error("ParserError", &e.message).with_span(e.span, e.row, e.col, "here")
    }
}

impl From<&crate::compiler::CompileError> for Diagnostic {
    fn from(e: &crate::compiler::CompileError) -> Self {
        use crate::compiler::CompileError;
        let (row, col) = e.position();
        let d = Diagnostic::error("CompileError", e.to_string()).with_position(row, col, "here");
        match e {
            CompileError::Redeclaration { previous_row, previous_col, .. } if *previous_row > 0 => {
                d.with_secondary_position(*previous_row, *previous_col, "first declared here")
            }
            CompileError::SelfInitialization { name, .. } => {
                d.with_note(format!("'{name}' is visible but has no value until its initializer finishes"))
            }
            _ => d,
        }
    }
}

impl From<&crate::vm::RuntimeError> for Diagnostic {
    fn from(e: &crate::vm::RuntimeError) -> Self {
        let d = Diagnostic::error(e.kind(), e.to_string());
        match e.position() {
            Some((row, col)) if row > 0 => d.with_position(row, col, "here"),
            _ => d,
        }
    }
}
