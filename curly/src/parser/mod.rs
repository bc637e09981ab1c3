pub mod error;
mod structural;

pub use error::{ParseError, ParseErrorKind};

use crate::Template;
use crate::lexer::{self, Token};

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: impl Into<String>, file_id: usize) -> Self {
        Parser {
            source: source.into(),
            file_id,
        }
    }

    /// Tokenize and parse the source into a complete Template.
    pub fn parse(&self) -> Result<Template, ParseError> {
        parse_tokens(lexer::tokenize(&self.source), self.file_id)
    }
}

/// Parse an already tokenized template.
pub fn parse_tokens(tokens: Vec<Token>, file_id: usize) -> Result<Template, ParseError> {
    let nodes = structural::parse_nodes(tokens, file_id)?;
    Ok(Template {
        nodes,
        source_id: file_id,
    })
}
