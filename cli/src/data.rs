//! Presenters described as TOML data, for rendering templates from the
//! command line and in `.test.curly` files.
//!
//! ```toml
//! title = "Hello"
//! admin = true
//! greeting = { safe = "<b>hi</b>" }
//! echo = { param = true }
//! hello = { equals = "world" }
//! hey = { kwarg = "ya" }
//! letters = { yields = ["a", "b"] }
//! letter = { yielded = true }
//! form = { wrap = { before = "<form>", after = "</form>", datum = "yo" } }
//!
//! [contexts.form]
//! field = { datum = true }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use renderer::{Call, Capabilities, Presenter, PresenterResolver, RenderError, Text, Value};
use serde::Deserialize;
use tracing::debug;

/// One presenter: its methods, and the presenters its context methods
/// switch to.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresenterSpec {
    #[serde(default)]
    pub contexts: BTreeMap<String, PresenterSpec>,
    #[serde(flatten)]
    pub methods: BTreeMap<String, MethodSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MethodSpec {
    Behaviour(Behaviour),
    /// A scalar returned as is.
    Constant(toml::Value),
}

/// `param`, `datum` and `yielded` take a flag; `false` makes the method
/// return nil.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behaviour {
    /// Pre-escaped text.
    Safe(String),
    /// Echo the positional parameter.
    Param(bool),
    /// Predicate: the positional parameter equals this value.
    Equals(String),
    /// Return the named keyword argument.
    Kwarg(String),
    /// Return the datum the enclosing context bound.
    Datum(bool),
    /// Return the first value yielded to the enclosing block.
    Yielded(bool),
    /// Call the block once per listed datum.
    Yields(Vec<toml::Value>),
    /// `before`, the block's output, then `after`.
    Wrap(Wrap),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Wrap {
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    /// Passed to the block.
    #[serde(default)]
    pub datum: Option<toml::Value>,
}

impl PresenterSpec {
    pub fn load(path: &Path) -> Result<Self, String> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        toml::from_str(&source).map_err(|e| format!("TOML parse error: {}", e))
    }

    /// Look up a method by its base name; keys may be written with a trailing `?`.
    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods
            .get(name)
            .or_else(|| self.methods.get(&format!("{}?", name)))
    }

    /// The presenter a context chain switches to, starting from this one.
    pub fn context(&self, namespace: &[String]) -> Option<&PresenterSpec> {
        namespace
            .iter()
            .try_fold(self, |spec, name| spec.contexts.get(name))
    }
}

impl Capabilities for PresenterSpec {
    fn available_methods(&self) -> Vec<String> {
        self.methods
            .keys()
            .map(|key| key.strip_suffix('?').unwrap_or(key).to_string())
            .collect()
    }

    fn method_available(&self, name: &str) -> bool {
        self.method(name).is_some()
    }

    fn accepts_block(&self, name: &str) -> bool {
        matches!(
            self.method(name),
            Some(MethodSpec::Behaviour(Behaviour::Yields(_) | Behaviour::Wrap(_)))
        )
    }

    fn context_capabilities(&self, name: &str) -> Option<&dyn Capabilities> {
        self.contexts
            .get(name)
            .map(|spec| spec as &dyn Capabilities)
    }
}

pub fn value_from_toml(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::from(s.as_str()),
        toml::Value::Integer(n) => Value::Integer(*n),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Boolean(*b),
        other => Value::from(other.to_string()),
    }
}

/// A [`PresenterSpec`] bound to the datum its context yielded.
pub struct DataPresenter<'s> {
    spec: &'s PresenterSpec,
    datum: Value,
}

impl<'s> DataPresenter<'s> {
    pub fn new(spec: &'s PresenterSpec, datum: Value) -> Self {
        DataPresenter { spec, datum }
    }

    pub fn root(spec: &'s PresenterSpec) -> Self {
        DataPresenter::new(spec, Value::Nil)
    }
}

impl Presenter for DataPresenter<'_> {
    fn call(&self, mut call: Call<'_, '_>) -> Result<Value, RenderError> {
        let name = call.name();
        let Some(method) = self.spec.method(name) else {
            return Err(RenderError::UnknownMethod(name.to_string()));
        };

        let behaviour = match method {
            MethodSpec::Constant(value) => return Ok(value_from_toml(value)),
            MethodSpec::Behaviour(behaviour) => behaviour,
        };

        let value = match behaviour {
            Behaviour::Safe(text) => Text::safe(text.as_str()).into(),
            Behaviour::Param(false) | Behaviour::Datum(false) | Behaviour::Yielded(false) => {
                Value::Nil
            }
            Behaviour::Param(true) => call.param().into(),
            Behaviour::Equals(expected) => (call.param() == expected.as_str()).into(),
            Behaviour::Kwarg(key) => call.kwarg(key).cloned().unwrap_or(Value::Nil),
            Behaviour::Datum(true) => self.datum.clone(),
            Behaviour::Yielded(true) => call.yielded().first().cloned().unwrap_or(Value::Nil),
            Behaviour::Yields(data) => {
                for datum in data {
                    call.yield_to(&[value_from_toml(datum)])?;
                }
                Value::Nil
            }
            Behaviour::Wrap(wrap) => {
                let datum = wrap.datum.as_ref().map(value_from_toml).unwrap_or(Value::Nil);
                let body = call.yield_to(&[datum])?;
                Text::safe(format!("{}{}{}", wrap.before, body.into_escaped(), wrap.after)).into()
            }
        };
        Ok(value)
    }
}

/// Resolves context presenters by walking `contexts` tables from the root.
pub struct DataResolver<'s> {
    root: &'s PresenterSpec,
}

impl<'s> DataResolver<'s> {
    pub fn new(root: &'s PresenterSpec) -> Self {
        DataResolver { root }
    }
}

impl PresenterResolver for DataResolver<'_> {
    fn resolve(&self, namespace: &[String], datum: Value) -> Option<Box<dyn Presenter + '_>> {
        let spec = self.root.context(namespace)?;
        debug!(namespace = %namespace.join("::"), "resolved data presenter");
        Some(Box::new(DataPresenter::new(spec, datum)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::NoContexts;

    fn spec(source: &str) -> PresenterSpec {
        toml::from_str(source).expect("invalid presenter TOML")
    }

    fn render(template: &str, spec: &PresenterSpec) -> String {
        renderer::compile(template, Some(spec as &dyn Capabilities))
            .expect("compile failed")
            .render(&DataPresenter::root(spec), &DataResolver::new(spec))
            .expect("render failed")
    }

    #[test]
    fn constants_and_behaviours() {
        let spec = spec(
            r#"
            title = "<Hi>"
            count = 3
            bold = { safe = "<b>x</b>" }
            echo = { param = true }
            "hello?" = { equals = "world" }
            hey = { kwarg = "ya" }
            "#,
        );
        assert_eq!(render("{{title}} {{count}}", &spec), "&lt;Hi&gt; 3");
        assert_eq!(render("{{bold}}", &spec), "<b>x</b>");
        assert_eq!(render("{{echo.a.b}}", &spec), "a.b");
        assert_eq!(render("{{#hello.world?}}yes{{/hello.world?}}", &spec), "yes");
        assert_eq!(render("{{^hello.moon?}}no{{/hello.moon?}}", &spec), "no");
        assert_eq!(render("{{hey ya=\"test\"}}", &spec), "test");
    }

    #[test]
    fn yields_and_wraps() {
        let spec = spec(
            r#"
            letters = { yields = ["a", "b"] }
            letter = { yielded = true }
            none = { yields = [] }
            form = { wrap = { before = "<form>", after = "</form>", datum = "yo" } }

            [contexts.letters]
            letter = { datum = true }

            [contexts.form]
            field = { datum = true }
            "#,
        );
        assert_eq!(render("{{@letters}}[{{letter}}]{{/letters}}", &spec), "[a][b]");
        assert_eq!(render("{{#none}}x{{/none}}", &spec), "");
        assert_eq!(render("{{#letters}}<{{letter}}>{{/letters}}", &spec), "<a><b>");
        assert_eq!(render("{{@form}}{{field}}{{/form}}", &spec), "<form>yo</form>");
    }

    #[test]
    fn disabled_flags_return_nil() {
        let spec = spec(
            r#"
            echo = { param = false }
            letters = { yields = ["a"] }
            letter = { yielded = false }

            [contexts.letters]
            letter = { datum = false }
            "#,
        );
        assert_eq!(render("[{{echo.hi}}]", &spec), "[]");
        assert_eq!(render("{{#letters}}[{{letter}}]{{/letters}}", &spec), "[]");
        assert_eq!(render("{{@letters}}[{{letter}}]{{/letters}}", &spec), "[]");
        assert_eq!(render("{{^echo.hi}}off{{/echo.hi}}", &spec), "off");
    }

    #[test]
    fn capabilities_follow_the_table() {
        let spec = spec(
            r#"
            title = "x"
            "ok?" = true
            [contexts.form]
            field = "f"
            "#,
        );
        let mut methods = spec.available_methods();
        methods.sort();
        assert_eq!(methods, vec!["ok", "title"]);
        assert!(spec.method_available("ok"));
        assert!(!spec.accepts_block("title"));
        assert!(spec.context_capabilities("form").is_some());
        assert!(spec.context(&["form".to_string()]).is_some());
        assert!(spec.context(&["missing".to_string()]).is_none());
    }

    #[test]
    fn unknown_method_fails_render() {
        let spec = spec("title = \"x\"");
        let error = renderer::compile("{{other}}", Some(&spec as &dyn Capabilities))
            .map(|_| ())
            .unwrap_err();
        assert!(error.to_string().contains("other"));

        let template = renderer::compile("{{title}}", Some(&spec as &dyn Capabilities)).unwrap();
        let empty = PresenterSpec::default();
        let error = template
            .render(&DataPresenter::root(&empty), &NoContexts)
            .unwrap_err();
        assert!(matches!(error, RenderError::UnknownMethod(name) if name == "title"));
    }

    #[test]
    fn demo_page_renders() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos");
        let spec = PresenterSpec::load(&demos.join("page.toml")).unwrap();
        let source = std::fs::read_to_string(demos.join("page.curly")).unwrap();
        let output = render(&source, &spec);
        assert!(output.contains("<h1>Tools &amp; &lt;Things&gt;</h1>"));
        assert!(output.contains("<p>Welcome back, sam.</p>"));
        assert!(output.contains("<p>No notices.</p>"));
        assert!(output.contains("  <li>hammer</li>\n  <li>saw</li>\n</ul>"));
        assert!(output.contains(r#"<form><input type="text" value="YO"></form>"#));
    }
}
