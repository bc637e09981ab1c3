use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

/// What went wrong, for callers that need to tell failures apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input ended with this block still open (the outermost one).
    IncompleteBlock { name: String },
    /// A close tag did not match the innermost open block, or no block was open.
    IncorrectEnding {
        expected: Option<String>,
        found: String,
    },
    /// A tag whose identifier or attributes do not follow the component grammar.
    MalformedComponent { component: String },
}

/// Parse errors with source location information.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub span: Range<usize>,
    pub file_id: usize,
    pub severity: Severity,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Range<usize>, file_id: usize) -> Self {
        let message = match &kind {
            ParseErrorKind::IncompleteBlock { name } => {
                format!("incomplete block: `{}` is never closed", name)
            }
            ParseErrorKind::IncorrectEnding {
                expected: Some(expected),
                found,
            } => format!(
                "incorrect ending: expected `{{{{/{}}}}}`, found `{{{{/{}}}}}`",
                expected, found
            ),
            ParseErrorKind::IncorrectEnding {
                expected: None,
                found,
            } => format!("incorrect ending: `{{{{/{}}}}}` closes no open block", found),
            ParseErrorKind::MalformedComponent { component } => {
                format!("malformed component `{}`", component)
            }
        };
        ParseError {
            kind,
            message,
            span,
            file_id,
            severity: Severity::Error,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(self.severity)
            .with_message(&self.message)
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}
