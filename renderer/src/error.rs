use codespan_reporting::diagnostic::Diagnostic;
use curly::parser::ParseError;
use curly::validator::InvalidReference;

/// An error raised by presenter code. The renderer passes it through untouched.
pub type PresenterError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A presenter method failed.
    #[error(transparent)]
    Presenter(#[from] PresenterError),
    /// No presenter is registered for a context namespace.
    #[error("no presenter found for context `{0}`")]
    UnknownPresenter(String),
    /// The presenter was asked for a method it does not have.
    #[error("presenter has no method `{0}`")]
    UnknownMethod(String),
    /// A method tried to yield, but was called without a block.
    #[error("method `{0}` yielded, but no block was given")]
    MissingBlock(String),
}

impl RenderError {
    pub fn presenter(error: impl Into<PresenterError>) -> Self {
        RenderError::Presenter(error.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// `compile` was given no presenter capabilities.
    #[error("cannot compile a template without presenter capabilities")]
    MissingPresenter,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    InvalidReference(#[from] InvalidReference),
}

impl CompileError {
    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        match self {
            CompileError::MissingPresenter => Diagnostic::error().with_message(self.to_string()),
            CompileError::Parse(error) => error.to_diagnostic(),
            CompileError::InvalidReference(error) => error.to_diagnostic(file_id),
        }
    }
}
