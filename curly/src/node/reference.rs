use std::collections::BTreeMap;
use std::ops::Range;

/// A reference to a presenter method: `{{name.param key=value}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Method name as written, including a trailing `?` for predicates.
    pub name: String,
    /// Positional parameter (the dotted suffix).
    pub param: Option<String>,
    pub kwargs: BTreeMap<String, KeywordValue>,
    pub span: Range<usize>,
}

/// The value of a keyword argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordValue {
    /// `key=name`: resolved on the presenter before the call.
    Reference(String),
    /// `key="text"`
    Literal(String),
}

impl Reference {
    /// A reference with no parameters, as produced for shorthand namespace segments.
    pub fn bare(name: impl Into<String>, span: Range<usize>) -> Self {
        Reference {
            name: name.into(),
            param: None,
            kwargs: BTreeMap::new(),
            span,
        }
    }

    /// The capability name: `name` without the predicate `?`.
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    pub fn is_predicate(&self) -> bool {
        self.name.ends_with('?')
    }

    /// Names of keyword values that are themselves references.
    pub fn keyword_references(&self) -> impl Iterator<Item = &str> {
        self.kwargs.values().filter_map(|value| match value {
            KeywordValue::Reference(name) => Some(name.as_str()),
            KeywordValue::Literal(_) => None,
        })
    }
}

/// Strip the predicate marker from a method name.
pub fn base_name(name: &str) -> &str {
    name.strip_suffix('?').unwrap_or(name)
}
