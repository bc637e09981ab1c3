pub mod reference;

use std::ops::Range;

pub use reference::{KeywordValue, Reference};

/// A node of the parsed template tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Template text, emitted verbatim.
    Literal(String),
    /// `{{name}}`: the method's result, escaped unless marked safe.
    Reference(Reference),
    /// `{{#name}}…{{/name}}` or `{{^name}}…{{/name}}`.
    Block(Block),
    /// `{{@name}}…{{/name}}`: the body renders against another presenter.
    Context(Context),
}

/// A conditional or higher-order block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub reference: Reference,
    pub inverted: bool,
    pub body: Vec<Node>,
    /// From the opening tag to the end of the closing tag.
    pub span: Range<usize>,
}

impl Block {
    /// Predicate blocks and inverse blocks test truthiness; the rest hand the
    /// body to the presenter as a continuation.
    pub fn is_conditional(&self) -> bool {
        self.inverted || self.reference.is_predicate()
    }
}

/// A block that switches the active presenter for its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub reference: Reference,
    pub body: Vec<Node>,
    pub span: Range<usize>,
}

impl Context {
    pub fn name(&self) -> &str {
        &self.reference.name
    }
}
