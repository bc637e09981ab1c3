use std::fmt;

/// Text tagged with whether it is already safe to emit as HTML.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Text {
    pub content: String,
    /// Pre-escaped: emitted verbatim instead of being escaped.
    pub safe: bool,
}

impl Text {
    /// Untrusted text; escaped on output.
    pub fn plain(content: impl Into<String>) -> Self {
        Text {
            content: content.into(),
            safe: false,
        }
    }

    /// Text marked as already escaped.
    pub fn safe(content: impl Into<String>) -> Self {
        Text {
            content: content.into(),
            safe: true,
        }
    }

    /// The content as it should appear in output.
    pub fn into_escaped(self) -> String {
        if self.safe {
            self.content
        } else {
            escape_html(&self.content)
        }
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

/// Escape the characters that are significant in HTML text and attributes.
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// A value returned by (or passed to) a presenter method.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(Text),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    pub fn is_falsy(&self) -> bool {
        matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Coerce to text. Only text values can carry the safe marker.
    pub fn into_text(self) -> Text {
        match self {
            Value::Text(text) => text,
            other => Text::plain(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            // Whole floats keep their `.0`.
            Value::Float(n) => write!(f, "{:?}", n),
            Value::Text(text) => write!(f, "{}", text),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(Text::plain(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Text::plain(s))
    }
}

impl From<Text> for Value {
    fn from(text: Text) -> Self {
        Value::Text(text)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Nil, Into::into)
    }
}
