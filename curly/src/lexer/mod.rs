mod component;

use std::ops::Range;

pub use component::{Attribute, AttributeValue, ComponentPath, is_reference_name};

use tracing::trace;

/// How a tag opens, decided by its leading sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `{{name}}` or the auto-closing shorthand `{{a:b:name}}`.
    Plain,
    /// `{{#name}}`
    Block,
    /// `{{^name}}`
    Inverse,
    /// `{{@name}}`
    Context,
}

impl TagKind {
    pub fn sigil(self) -> &'static str {
        match self {
            TagKind::Plain => "",
            TagKind::Block => "#",
            TagKind::Inverse => "^",
            TagKind::Context => "@",
        }
    }
}

/// An opening or self-closing tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// The identifier exactly as written, e.g. `hello.world?` or `tree:branch`.
    /// Close tags are matched against this text.
    pub identifier: String,
    pub kind: TagKind,
    /// The scanned identifier; `None` if it does not follow the component grammar.
    pub path: Option<ComponentPath>,
    pub attributes: Vec<Attribute>,
    /// Byte span of the whole tag, delimiters included.
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String, Range<usize>),
    Open(Tag),
    /// `{{/identifier}}`
    Close(String, Range<usize>),
    /// `{{! text }}`. Only produced by [`scan`].
    Comment(String, Range<usize>),
}

impl Token {
    pub fn span(&self) -> &Range<usize> {
        match self {
            Token::Literal(_, span) => span,
            Token::Open(tag) => &tag.span,
            Token::Close(_, span) => span,
            Token::Comment(_, span) => span,
        }
    }
}

/// Tokenize template source for the parser. Comments are dropped.
pub fn tokenize(source: &str) -> Vec<Token> {
    scan(source)
        .into_iter()
        .filter(|token| !matches!(token, Token::Comment(..)))
        .collect()
}

/// Tokenize template source, keeping comments.
///
/// Never fails: an unterminated `{{`, or a sigil-less tag whose body is not a
/// component identifier followed by `key=value` pairs, is kept as literal text.
pub fn scan(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;
    // The `}}` found for a rejected body also ends every `{{` opened before it.
    let mut pending_close: Option<usize> = None;

    while let Some(offset) = source[cursor..].find("{{") {
        let open = cursor + offset;
        let close = match pending_close.filter(|&close| open + 2 <= close) {
            Some(close) => close,
            None => match source[open + 2..].find("}}") {
                Some(close_offset) => open + 2 + close_offset,
                None => break,
            },
        };
        let end = close + 2;

        match classify(&source[open + 2..close], open..end) {
            Some(token) => {
                trace!(?token, "scanned tag");
                push_literal(&mut tokens, source, literal_start..open);
                tokens.push(token);
                literal_start = end;
                cursor = end;
                pending_close = None;
            }
            // Not a tag; a later `{{` inside this body may still open one.
            None => {
                cursor = open + 2;
                pending_close = Some(close);
            }
        }
    }

    push_literal(&mut tokens, source, literal_start..source.len());
    tokens
}

fn push_literal(tokens: &mut Vec<Token>, source: &str, span: Range<usize>) {
    if span.start < span.end {
        tokens.push(Token::Literal(source[span.clone()].to_string(), span));
    }
}

fn classify(body: &str, span: Range<usize>) -> Option<Token> {
    let body = body.trim();
    let (kind, rest) = match body.chars().next()? {
        '!' => return Some(Token::Comment(body[1..].trim().to_string(), span)),
        '/' => return Some(Token::Close(body[1..].trim().to_string(), span)),
        '#' => (TagKind::Block, &body[1..]),
        '^' => (TagKind::Inverse, &body[1..]),
        '@' => (TagKind::Context, &body[1..]),
        _ => (TagKind::Plain, body),
    };

    let rest = rest.trim_start();
    let (identifier, attributes) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, ""),
    };

    let path = ComponentPath::scan(identifier);
    if kind == TagKind::Plain && path.is_none() {
        return None;
    }

    let attributes = component::scan_attributes(attributes);
    let malformed = attributes
        .iter()
        .any(|attribute| matches!(attribute.value, AttributeValue::Malformed(_)));
    if kind == TagKind::Plain && malformed {
        return None;
    }

    Some(Token::Open(Tag {
        identifier: identifier.to_string(),
        kind,
        path,
        attributes,
        span,
    }))
}
