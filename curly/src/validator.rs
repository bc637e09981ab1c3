use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use tracing::debug;

use crate::Template;
use crate::node::reference::base_name;
use crate::node::{Node, Reference};

/// The set of names a presenter lets templates reference.
///
/// Validation only ever asks these questions; it never runs presenter code.
pub trait Capabilities {
    /// Every referenceable method name, without the predicate `?`.
    fn available_methods(&self) -> Vec<String>;

    /// Whether `name` may be referenced.
    fn method_available(&self, name: &str) -> bool {
        self.available_methods().iter().any(|method| method == name)
    }

    /// Whether `name` takes a block, as block and context components require.
    fn accepts_block(&self, _name: &str) -> bool {
        true
    }

    /// Capabilities of the presenter a `{{@name}}` context switches to, if known.
    fn context_capabilities(&self, _name: &str) -> Option<&dyn Capabilities> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Not in the capability set.
    Unknown,
    /// Used as a block or context, but the method takes no block.
    NotABlock,
}

/// A reference the capability set does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: `{name}`")]
pub struct InvalidReference {
    pub name: String,
    pub reason: InvalidReason,
    pub span: Range<usize>,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Unknown => write!(f, "invalid reference"),
            InvalidReason::NotABlock => write!(f, "not a block component"),
        }
    }
}

impl InvalidReference {
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        Diagnostic::error()
            .with_message(self.to_string())
            .with_labels(vec![Label::primary(file_id, self.span.clone())])
    }
}

/// Check every reference in `template` against `capabilities`.
///
/// Returns all invalid references in document order; empty means valid.
pub fn validate(template: &Template, capabilities: &dyn Capabilities) -> Vec<InvalidReference> {
    let mut invalid = Vec::new();
    walk(&template.nodes, capabilities, &mut invalid);
    debug!(invalid = invalid.len(), "validated template");
    invalid
}

pub fn is_valid(template: &Template, capabilities: &dyn Capabilities) -> bool {
    validate(template, capabilities).is_empty()
}

fn walk(nodes: &[Node], capabilities: &dyn Capabilities, invalid: &mut Vec<InvalidReference>) {
    for node in nodes {
        match node {
            Node::Literal(_) => {}
            Node::Reference(reference) => check(reference, false, capabilities, invalid),
            Node::Block(block) => {
                check(&block.reference, !block.is_conditional(), capabilities, invalid);
                walk(&block.body, capabilities, invalid);
            }
            Node::Context(context) => {
                check(&context.reference, true, capabilities, invalid);
                // The body belongs to another presenter; only check it when
                // the caller knows that presenter's capabilities.
                if let Some(nested) = capabilities.context_capabilities(context.reference.base_name()) {
                    walk(&context.body, nested, invalid);
                }
            }
        }
    }
}

fn check(
    reference: &Reference,
    needs_block: bool,
    capabilities: &dyn Capabilities,
    invalid: &mut Vec<InvalidReference>,
) {
    let name = reference.base_name();
    if !capabilities.method_available(name) {
        invalid.push(InvalidReference {
            name: name.to_string(),
            reason: InvalidReason::Unknown,
            span: reference.span.clone(),
        });
    } else if needs_block && !capabilities.accepts_block(name) {
        invalid.push(InvalidReference {
            name: name.to_string(),
            reason: InvalidReason::NotABlock,
            span: reference.span.clone(),
        });
    }

    for value in reference.keyword_references() {
        let name = base_name(value);
        if !capabilities.method_available(name) {
            invalid.push(InvalidReference {
                name: name.to_string(),
                reason: InvalidReason::Unknown,
                span: reference.span.clone(),
            });
        }
    }
}
