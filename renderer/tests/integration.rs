use renderer::{
    Call, Capabilities, CompileError, InvalidReason, NoContexts, Presenter, RenderError, Text, Value,
};

struct Basic {
    dirty: Value,
}

impl Default for Basic {
    fn default() -> Self {
        Basic { dirty: Value::Nil }
    }
}

impl Capabilities for Basic {
    fn available_methods(&self) -> Vec<String> {
        [
            "foo",
            "parameterized",
            "high_yield",
            "yield_value",
            "dirty",
            "false",
            "true",
            "hello",
            "hey",
            "test",
            "letters",
            "letter",
            "never",
            "bold",
            "boom",
            "describe",
            "twice",
        ]
        .iter()
        .map(|name| name.to_string())
        .collect()
    }
}

impl Presenter for Basic {
    fn call(&self, mut call: Call<'_, '_>) -> Result<Value, RenderError> {
        let value = match call.name() {
            "foo" => "FOO".into(),
            "parameterized" => call.param().into(),
            "high_yield" => format!("{}, friend!", call.yield_to(&[])?).into(),
            "yield_value" => format!("{}, please?", call.yield_to(&[Value::from("foo")])?).into(),
            "dirty" => self.dirty.clone(),
            "false" => false.into(),
            "true" => true.into(),
            "hello" => (call.param() == "world").into(),
            "hey" => call.kwarg("ya").cloned().unwrap_or(Value::Nil),
            "test" => "test".into(),
            "letters" => {
                for letter in ["a", "b", "c"] {
                    call.yield_to(&[Value::from(letter)])?;
                }
                Value::Nil
            }
            "letter" => call.yielded().first().cloned().unwrap_or(Value::Nil),
            "never" => Value::Nil,
            "bold" => {
                let body = call.yield_to(&[])?;
                Text::safe(format!("<b>{}</b>", body.into_escaped())).into()
            }
            "boom" => return Err(RenderError::presenter("kaboom")),
            "describe" => format!(
                "{} {} {}",
                call.has_param(),
                call.kwargs().len(),
                call.has_block()
            )
            .into(),
            "twice" => {
                let Some(block) = call.block() else {
                    return Ok(Value::Nil);
                };
                let first = block.call(&[])?;
                let second = block.call(&[])?;
                Text::safe(first.content + &second.content).into()
            }
            other => return Err(RenderError::UnknownMethod(other.to_string())),
        };
        Ok(value)
    }
}

fn compile(source: &str, presenter: &Basic) -> Result<renderer::CompiledTemplate, CompileError> {
    let capabilities: &dyn Capabilities = presenter;
    renderer::compile(source, Some(capabilities))
}

fn evaluate_with(source: &str, presenter: &Basic) -> String {
    compile(source, presenter)
        .expect("compile failed")
        .render(presenter, &NoContexts)
        .expect("render failed")
}

fn evaluate(source: &str) -> String {
    evaluate_with(source, &Basic::default())
}

fn evaluate_with_block(source: &str, block: impl FnMut(&[Value]) -> Result<Text, RenderError>) -> String {
    let presenter = Basic::default();
    compile(source, &presenter)
        .expect("compile failed")
        .render_with_block(&presenter, &NoContexts, block)
        .expect("render failed")
}

// --- Compile ---

#[test]
fn references_call_presenter_methods() {
    assert_eq!(evaluate("{{foo}}"), "FOO");
}

#[test]
fn dotted_suffix_is_passed_as_param() {
    assert_eq!(evaluate("{{parameterized.foo.bar}}"), "foo.bar");
}

#[test]
fn missing_param_is_empty_string() {
    assert_eq!(evaluate("{{parameterized}}"), "");
}

#[test]
fn compile_requires_capabilities() {
    assert!(matches!(
        renderer::compile("foo", None),
        Err(CompileError::MissingPresenter)
    ));
}

#[test]
fn unknown_reference_fails_compile() {
    let error = compile("{{bar}}", &Basic::default()).unwrap_err();
    let CompileError::InvalidReference(invalid) = &error else {
        panic!("expected an invalid reference, got {:?}", error);
    };
    assert_eq!(invalid.name, "bar");
    assert_eq!(invalid.reason, InvalidReason::Unknown);
    assert_eq!(invalid.span, 0..7);
}

#[test]
fn parse_errors_fail_compile() {
    let presenter = Basic::default();
    assert!(matches!(
        compile("test{{#false?}}bar{{/true?}}", &presenter),
        Err(CompileError::Parse(_))
    ));
    assert!(matches!(
        compile("test{{#false?}}bar", &presenter),
        Err(CompileError::Parse(_))
    ));
}

#[test]
fn is_valid_reports_without_failing() {
    let presenter = Basic::default();
    let capabilities: &dyn Capabilities = &presenter;
    assert!(renderer::is_valid("Hello, {{foo}}!", Some(capabilities)));
    assert!(renderer::is_valid("Hello {{#true?}}world{{/true?}}", Some(capabilities)));
    assert!(!renderer::is_valid("Hello, {{i_am_missing}}", Some(capabilities)));
    assert!(!renderer::is_valid("Hello {{#true?}}world", Some(capabilities)));
    assert!(!renderer::is_valid("Hello", None));
}

// --- Yields ---

#[test]
fn yields_propagate_to_caller() {
    assert_eq!(
        evaluate_with_block("{{high_yield}}", |_| Ok(Text::plain("$$$"))),
        "$$$, friend!"
    );
}

#[test]
fn yield_arguments_reach_caller() {
    assert_eq!(
        evaluate_with_block("{{yield_value}}", |args| {
            Ok(Text::plain(args[0].to_string().to_uppercase()))
        }),
        "FOO, please?"
    );
}

#[test]
fn outer_block_is_forwarded_into_blocks() {
    assert_eq!(
        evaluate_with_block("{{#true?}}{{high_yield}}{{/true?}}", |_| Ok(Text::plain("$$$"))),
        "$$$, friend!"
    );
}

#[test]
fn yielding_without_block_fails() {
    let presenter = Basic::default();
    let error = compile("{{high_yield}}", &presenter)
        .unwrap()
        .render(&presenter, &NoContexts)
        .unwrap_err();
    assert!(matches!(error, RenderError::MissingBlock(name) if name == "high_yield"));
}

#[test]
fn block_output_concatenates_invocations() {
    assert_eq!(evaluate("{{#letters}}<{{letter}}>{{/letters}}"), "<a><b><c>");
}

#[test]
fn block_never_invoked_renders_nothing() {
    assert_eq!(evaluate("[{{#never}}body{{/never}}]"), "[]");
}

#[test]
fn block_return_value_replaces_body() {
    assert_eq!(evaluate("{{#bold}}{{foo}} & co{{/bold}}"), "<b>FOO & co</b>");
}

#[test]
fn presenter_errors_pass_through() {
    let presenter = Basic::default();
    let error = compile("before {{boom}}", &presenter)
        .unwrap()
        .render(&presenter, &NoContexts)
        .unwrap_err();
    assert!(matches!(error, RenderError::Presenter(_)));
    assert_eq!(error.to_string(), "kaboom");
}

// --- Escaping ---

#[test]
fn unsafe_values_are_escaped() {
    let presenter = Basic {
        dirty: Value::from("<p>dirty</p>"),
    };
    assert_eq!(evaluate_with("{{dirty}}", &presenter), "&lt;p&gt;dirty&lt;/p&gt;");
}

#[test]
fn safe_values_are_verbatim() {
    let presenter = Basic {
        dirty: Text::safe("<p>dirty</p>").into(),
    };
    assert_eq!(evaluate_with("{{dirty}}", &presenter), "<p>dirty</p>");
}

#[test]
fn template_text_is_not_escaped() {
    assert_eq!(evaluate("<div>"), "<div>");
    assert_eq!(evaluate("#{foo}"), "#{foo}");
}

#[test]
fn values_render_as_text() {
    let presenter = Basic {
        dirty: Value::Integer(42),
    };
    assert_eq!(evaluate_with("{{dirty}}", &presenter), "42");
    assert_eq!(evaluate("[{{dirty}}]"), "[]");
}

#[test]
fn floats_keep_their_fraction() {
    for (float, expected) in [(1.0, "1.0"), (2.5, "2.5"), (-3.0, "-3.0")] {
        let presenter = Basic {
            dirty: Value::Float(float),
        };
        assert_eq!(evaluate_with("{{dirty}}", &presenter), expected);
    }
}

#[test]
fn comments_are_removed() {
    assert_eq!(evaluate("HELO{{! I'm a comment, yo }}WORLD"), "HELOWORLD");
}

// --- Conditionals ---

#[test]
fn conditional_blocks() {
    assert_eq!(evaluate("test{{#false?}}bar{{/false?}}"), "test");
    assert_eq!(evaluate("test{{#true?}}bar{{/true?}}"), "testbar");
    assert_eq!(evaluate("test{{^true?}}bar{{/true?}}"), "test");
    assert_eq!(evaluate("test{{^false?}}bar{{/false?}}"), "testbar");
}

#[test]
fn conditional_params() {
    assert_eq!(
        evaluate("{{#hello.world?}}foo{{/hello.world?}}{{#hello.foo?}}bar{{/hello.foo?}}"),
        "foo"
    );
}

// --- Keywords ---

#[test]
fn keyword_arguments() {
    assert_eq!(evaluate("{{hey ya=\"test\"}}"), "test");
    assert_eq!(evaluate("{{hey ya=foo}}"), "FOO");
    assert_eq!(evaluate("{{hey ya=test}}"), "test");
}

#[test]
fn rendering_is_repeatable() {
    let presenter = Basic::default();
    let template = compile("{{#letters}}{{letter}}{{/letters}} {{foo}}", &presenter).unwrap();
    let first = template.render(&presenter, &NoContexts).unwrap();
    let second = template.render(&presenter, &NoContexts).unwrap();
    assert_eq!(first, "abc FOO");
    assert_eq!(first, second);
}

#[test]
fn presenters_see_call_shape() {
    assert_eq!(evaluate("{{describe.x a=\"1\" b=foo}}"), "true 2 false");
    assert_eq!(evaluate("{{describe}}"), "false 0 false");
    assert_eq!(evaluate("{{#describe}}ignored{{/describe}}"), "false 0 true");
}

#[test]
fn presenters_may_drive_the_block_directly() {
    assert_eq!(evaluate("{{#twice}}<{{foo}}>{{/twice}}"), "<FOO><FOO>");
}

#[test]
fn compiled_template_exposes_nodes() {
    let template = compile("a{{foo}}b", &Basic::default()).unwrap();
    assert_eq!(template.template().nodes.len(), 3);
}
