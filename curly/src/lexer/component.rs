/// The structured form of a component identifier such as `hello.world?` or
/// `tree:branch:leaf`.
///
/// Grammar: `segment (':' segment)* ('.' param)?`, where a segment is an
/// identifier and only the final segment may end in `?`. A `?` closing the
/// parameter belongs to the name: `hello.world?` is the predicate `hello?`
/// called with `world`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentPath {
    /// Leading `:`-separated segments, outermost first.
    pub namespaces: Vec<String>,
    /// The final segment, including a trailing `?` for predicates.
    pub name: String,
    /// The positional parameter following the first `.`.
    pub param: Option<String>,
}

impl ComponentPath {
    /// Scan an identifier, returning `None` if it does not follow the grammar.
    pub fn scan(identifier: &str) -> Option<ComponentPath> {
        let (chain, param) = match identifier.split_once('.') {
            Some((chain, param)) => (chain, Some(param)),
            None => (identifier, None),
        };

        let mut namespaces: Vec<String> = Vec::new();
        let mut segments = chain.split(':').peekable();
        let mut name = String::new();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                if !is_identifier(segment) {
                    return None;
                }
                namespaces.push(segment.to_string());
            } else {
                if !is_name(segment) {
                    return None;
                }
                name = segment.to_string();
            }
        }

        let param = match param {
            None => None,
            Some(param) => {
                let (param, predicate) = match param.strip_suffix('?') {
                    Some(stripped) => (stripped, true),
                    None => (param, false),
                };
                if param.is_empty() || param.chars().any(char::is_whitespace) {
                    return None;
                }
                if predicate {
                    if name.ends_with('?') {
                        return None;
                    }
                    name.push('?');
                }
                Some(param.to_string())
            }
        };

        Some(ComponentPath {
            namespaces,
            name,
            param,
        })
    }

    pub fn is_shorthand(&self) -> bool {
        !self.namespaces.is_empty()
    }
}

/// True if `text` is a bare reference name: one segment, optionally ending in `?`.
pub fn is_reference_name(text: &str) -> bool {
    is_name(text)
}

fn is_name(segment: &str) -> bool {
    is_identifier(segment.strip_suffix('?').unwrap_or(segment))
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A `key=value` attribute following the identifier in a tag body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// `key=name`: a reference resolved on the presenter.
    Bare(String),
    /// `key="text"` or `key='text'`: passed through as text.
    Quoted(String),
    /// Anything else (no `=`, unterminated quote). Kept verbatim so the
    /// parser can report it.
    Malformed(String),
}

/// Split the attribute portion of a tag body into attributes.
pub fn scan_attributes(source: &str) -> Vec<Attribute> {
    let mut attributes = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i] != '=' && !chars[i].is_whitespace() {
            i += 1;
        }
        let key: String = chars[start..i].iter().collect();

        if i >= chars.len() || chars[i] != '=' {
            attributes.push(Attribute {
                key: key.clone(),
                value: AttributeValue::Malformed(key),
            });
            continue;
        }
        i += 1; // skip '='

        let value = match chars.get(i) {
            Some(&quote) if quote == '"' || quote == '\'' => {
                i += 1;
                let value_start = i;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                let text: String = chars[value_start..i].iter().collect();
                if i < chars.len() {
                    i += 1; // skip closing quote
                    AttributeValue::Quoted(text)
                } else {
                    AttributeValue::Malformed(format!("{}={}{}", key, quote, text))
                }
            }
            _ => {
                let value_start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                AttributeValue::Bare(chars[value_start..i].iter().collect())
            }
        };

        attributes.push(Attribute { key, value });
    }

    attributes
}
