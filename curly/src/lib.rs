pub mod lexer;
pub mod node;
pub mod parser;
pub mod validator;

use crate::node::Node;

/// A parsed Curly template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Top-level nodes in document order.
    pub nodes: Vec<Node>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}
