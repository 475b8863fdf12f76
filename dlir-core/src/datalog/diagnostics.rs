//! Error diagnostics for Datalog programs
//!
//! Turns a [`DlirError`] into a readable report:
//! - Source location (line and column)
//! - The offending source line with a caret underline
//! - A help line for the error class

use crate::error::DlirError;
use std::fmt;

/// Source location in input text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    /// Starting byte offset
    pub start: usize,
    /// Ending byte offset (exclusive)
    pub end: usize,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed, in characters)
    pub column: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, line: usize, column: usize) -> Self {
        Span {
            start,
            end,
            line,
            column,
        }
    }

    /// Locate `len` bytes starting at byte `offset` of `source`
    pub fn locate(source: &str, offset: usize, len: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Span::new(offset, offset + len, line, column)
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no input
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A diagnostic message with context
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary error message
    pub message: String,
    /// Optional source location
    pub span: Option<Span>,
    /// Optional help text
    pub help: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            span: None,
            help: None,
        }
    }

    /// Add a source span
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Add help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Build the diagnostic for an engine error
    pub fn from_error(error: &DlirError) -> Self {
        let diagnostic = Diagnostic::error(error.to_string());
        let diagnostic = match error.span() {
            Some(span) => diagnostic.with_span(span),
            None => diagnostic,
        };

        match error {
            DlirError::SyntaxError { .. } => diagnostic
                .with_help("clauses have the form `head.` or `head :- premise, ..., premise.`"),
            DlirError::ArityMismatchError { .. } => diagnostic
                .with_help("a predicate keeps the argument count of its first appearance"),
            DlirError::UnsafeRuleError { .. } => diagnostic.with_help(
                "variables must appear in at least one positive (non-negated) body atom",
            ),
            DlirError::NonStratifiableError { .. } => diagnostic
                .with_help("predicates cannot recursively depend on their own negation"),
            DlirError::BudgetExceeded(_) => {
                diagnostic.with_help("raise the limit in the engine configuration")
            }
            _ => diagnostic,
        }
    }

    /// Format the diagnostic with optional source code
    pub fn format(&self, source: Option<&str>) -> String {
        let mut output = format!("error: {}\n", self.message);

        if let Some(ref span) = self.span {
            output.push_str(&format!("  --> {}\n", span));

            if let Some(context) = source.and_then(|src| extract_source_context(src, span)) {
                output.push_str(&format!("   |\n{}", context));
            }
        }

        if let Some(ref help) = self.help {
            output.push_str(&format!("  = help: {}\n", help));
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(None))
    }
}

/// Extract source code context around a span
fn extract_source_context(source: &str, span: &Span) -> Option<String> {
    let line = source.lines().nth(span.line.checked_sub(1)?)?;

    let mut output = format!("{:>4} | {}\n", span.line, line);

    let col_start = span.column.saturating_sub(1);
    let remaining = line.chars().count().saturating_sub(col_start);
    let width = span.len().min(remaining).max(1);
    output.push_str(&format!(
        "     | {}{}\n",
        " ".repeat(col_start),
        "^".repeat(width)
    ));

    Some(output)
}
