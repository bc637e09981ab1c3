use std::collections::BTreeMap;
use std::ops::Range;

use tracing::trace;

use crate::lexer::{AttributeValue, ComponentPath, Tag, TagKind, Token, is_reference_name};
use crate::node::{Block, Context, KeywordValue, Node, Reference};
use crate::parser::error::{ParseError, ParseErrorKind};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the node tree from a token stream in a single pass.
pub fn parse_nodes(tokens: Vec<Token>, file_id: usize) -> Result<Vec<Node>, ParseError> {
    let mut state = ParseState::new(file_id);
    for token in tokens {
        state.process(token)?;
    }
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState {
    file_id: usize,
    /// Stack of blocks being built. Innermost = current scope.
    block_stack: Vec<OpenBlock>,
    /// Completed top-level nodes.
    top_nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
enum OpenKind {
    Block { inverted: bool },
    Context,
}

struct OpenBlock {
    /// The identifier as written; the close tag must repeat it exactly.
    identifier: String,
    kind: OpenKind,
    namespaces: Vec<String>,
    reference: Reference,
    children: Vec<Node>,
    /// Span of the opening tag.
    tag_span: Range<usize>,
}

impl OpenBlock {
    /// Wrap the collected children, then wrap that in one context per
    /// shorthand namespace segment.
    fn into_node(self, span_end: usize) -> Node {
        let span = self.tag_span.start..span_end;
        let inner = match self.kind {
            OpenKind::Block { inverted } => Node::Block(Block {
                reference: self.reference,
                inverted,
                body: self.children,
                span: span.clone(),
            }),
            OpenKind::Context => Node::Context(Context {
                reference: self.reference,
                body: self.children,
                span: span.clone(),
            }),
        };
        wrap_in_contexts(&self.namespaces, inner, &span)
    }
}

impl ParseState {
    fn new(file_id: usize) -> Self {
        ParseState {
            file_id,
            block_stack: Vec::new(),
            top_nodes: Vec::new(),
        }
    }

    fn current_children(&mut self) -> &mut Vec<Node> {
        match self.block_stack.last_mut() {
            Some(open) => &mut open.children,
            None => &mut self.top_nodes,
        }
    }

    fn process(&mut self, token: Token) -> Result<(), ParseError> {
        match token {
            Token::Literal(text, _) => self.current_children().push(Node::Literal(text)),
            Token::Comment(..) => {}
            Token::Open(tag) => self.open(tag)?,
            Token::Close(identifier, span) => self.close(identifier, span)?,
        }
        Ok(())
    }

    fn open(&mut self, tag: Tag) -> Result<(), ParseError> {
        let Some(mut path) = tag.path.clone() else {
            return Err(self.malformed(&tag, "expected a component name"));
        };
        let reference = self.build_reference(&tag, &path)?;
        let shorthand = path.is_shorthand();
        path.namespaces = self.unopened_namespaces(&path.namespaces);

        let kind = match tag.kind {
            TagKind::Plain => {
                let node = self_closing(reference, shorthand, &path.namespaces, &tag.span);
                trace!(identifier = %tag.identifier, "reference");
                self.current_children().push(node);
                return Ok(());
            }
            TagKind::Block => OpenKind::Block { inverted: false },
            TagKind::Inverse => OpenKind::Block { inverted: true },
            TagKind::Context => {
                if reference.is_predicate() {
                    return Err(self.malformed(&tag, "a context block cannot be a predicate"));
                }
                OpenKind::Context
            }
        };

        trace!(identifier = %tag.identifier, ?kind, depth = self.block_stack.len(), "open block");
        self.block_stack.push(OpenBlock {
            identifier: tag.identifier,
            kind,
            namespaces: path.namespaces,
            reference,
            children: Vec::new(),
            tag_span: tag.span,
        });
        Ok(())
    }

    /// Names of the contexts open at this point, outermost first.
    fn open_contexts(&self) -> Vec<&str> {
        let mut contexts = Vec::new();
        for open in &self.block_stack {
            contexts.extend(open.namespaces.iter().map(String::as_str));
            if let OpenKind::Context = open.kind {
                contexts.push(open.reference.name.as_str());
            }
        }
        contexts
    }

    /// Drop the leading shorthand segments that repeat the innermost open
    /// contexts: `{{item:value}}` inside an `item` context stays in it.
    fn unopened_namespaces(&self, namespaces: &[String]) -> Vec<String> {
        let open = self.open_contexts();
        let shared = (0..=namespaces.len().min(open.len()))
            .rev()
            .find(|&n| {
                namespaces[..n]
                    .iter()
                    .map(String::as_str)
                    .eq(open[open.len() - n..].iter().copied())
            })
            .unwrap_or(0);
        namespaces[shared..].to_vec()
    }

    fn close(&mut self, identifier: String, span: Range<usize>) -> Result<(), ParseError> {
        let Some(open) = self.block_stack.pop() else {
            return Err(ParseError::new(
                ParseErrorKind::IncorrectEnding {
                    expected: None,
                    found: identifier,
                },
                span,
                self.file_id,
            ));
        };

        if open.identifier != identifier {
            return Err(ParseError::new(
                ParseErrorKind::IncorrectEnding {
                    expected: Some(open.identifier.clone()),
                    found: identifier,
                },
                span,
                self.file_id,
            )
            .with_note(format!(
                "the innermost open block is `{}`, opened at byte {}",
                open.identifier, open.tag_span.start
            )));
        }

        trace!(identifier = %open.identifier, "close block");
        let node = open.into_node(span.end);
        self.current_children().push(node);
        Ok(())
    }

    fn build_reference(&self, tag: &Tag, path: &ComponentPath) -> Result<Reference, ParseError> {
        let mut kwargs = BTreeMap::new();
        for attribute in &tag.attributes {
            let value = match &attribute.value {
                AttributeValue::Quoted(text) => KeywordValue::Literal(text.clone()),
                AttributeValue::Bare(name) if is_reference_name(name) => {
                    KeywordValue::Reference(name.clone())
                }
                AttributeValue::Bare(name) => {
                    return Err(self.malformed(
                        tag,
                        format!("keyword value `{}` must be a plain name or a quoted string", name),
                    ));
                }
                AttributeValue::Malformed(text) => {
                    return Err(self.malformed(
                        tag,
                        format!("expected `key=value`, found `{}`", text),
                    ));
                }
            };
            if !is_reference_name(&attribute.key) || attribute.key.ends_with('?') {
                return Err(self.malformed(
                    tag,
                    format!("invalid keyword name `{}`", attribute.key),
                ));
            }
            kwargs.insert(attribute.key.clone(), value);
        }

        Ok(Reference {
            name: path.name.clone(),
            param: path.param.clone(),
            kwargs,
            span: tag.span.clone(),
        })
    }

    fn malformed(&self, tag: &Tag, note: impl Into<String>) -> ParseError {
        ParseError::new(
            ParseErrorKind::MalformedComponent {
                component: format!("{}{}", tag.kind.sigil(), tag.identifier),
            },
            tag.span.clone(),
            self.file_id,
        )
        .with_note(note)
    }

    fn finalize(self) -> Result<Vec<Node>, ParseError> {
        if let Some(outermost) = self.block_stack.first() {
            let innermost = self.block_stack.last().map(|b| b.identifier.as_str());
            let mut error = ParseError::new(
                ParseErrorKind::IncompleteBlock {
                    name: outermost.identifier.clone(),
                },
                outermost.tag_span.clone(),
                self.file_id,
            );
            if let Some(innermost) = innermost.filter(|name| *name != outermost.identifier) {
                error = error.with_note(format!("`{}` is also still open", innermost));
            }
            return Err(error);
        }
        Ok(self.top_nodes)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `{{name}}`, or the auto-closing shorthand `{{a:b:name}}` whose final
/// predicate segment becomes an empty conditional block.
fn self_closing(reference: Reference, shorthand: bool, namespaces: &[String], span: &Range<usize>) -> Node {
    if !shorthand {
        return Node::Reference(reference);
    }
    let terminal = if reference.is_predicate() {
        Node::Block(Block {
            reference,
            inverted: false,
            body: Vec::new(),
            span: span.clone(),
        })
    } else {
        Node::Reference(reference)
    };
    wrap_in_contexts(namespaces, terminal, span)
}

/// Right-nest `node` inside one context per namespace, outermost first.
fn wrap_in_contexts(namespaces: &[String], node: Node, span: &Range<usize>) -> Node {
    namespaces.iter().rev().fold(node, |body, namespace| {
        Node::Context(Context {
            reference: Reference::bare(namespace.clone(), span.clone()),
            body: vec![body],
            span: span.clone(),
        })
    })
}
