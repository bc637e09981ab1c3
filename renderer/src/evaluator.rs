use std::collections::BTreeMap;

use curly::node::reference::base_name;
use curly::node::{Block, Context, KeywordValue, Node, Reference};
use tracing::{debug, trace};

use crate::error::RenderError;
use crate::presenter::{Call, Continuation, Presenter, PresenterResolver};
use crate::value::{Text, Value};

/// The presenter a subtree renders against.
pub(crate) struct Frame<'p> {
    pub presenter: &'p dyn Presenter,
    /// Names of the enclosing context blocks, outermost first.
    pub namespace: Vec<String>,
    /// Arguments the enclosing block's continuation was invoked with.
    pub yielded: Vec<Value>,
}

impl<'p> Frame<'p> {
    pub fn root(presenter: &'p dyn Presenter) -> Self {
        Frame {
            presenter,
            namespace: Vec::new(),
            yielded: Vec::new(),
        }
    }
}

pub(crate) struct Evaluator<'r> {
    resolver: &'r dyn PresenterResolver,
}

impl<'r> Evaluator<'r> {
    pub fn new(resolver: &'r dyn PresenterResolver) -> Self {
        Evaluator { resolver }
    }

    /// Render `nodes` in order, appending to `out`. `outer` is the block the
    /// caller rendered the template with; it is forwarded to every plain
    /// reference.
    pub fn render_nodes(
        &self,
        nodes: &[Node],
        frame: &Frame<'_>,
        mut outer: Option<&mut Continuation<'_>>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        for node in nodes {
            self.render_node(node, frame, outer.as_deref_mut(), out)?;
        }
        Ok(())
    }

    fn render_node(
        &self,
        node: &Node,
        frame: &Frame<'_>,
        outer: Option<&mut Continuation<'_>>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        match node {
            // --- Template text ---
            Node::Literal(text) => out.push_str(text),

            // --- References ---
            Node::Reference(reference) => {
                let value = self.invoke(reference, frame, outer)?;
                out.push_str(&value.into_text().into_escaped());
            }

            // --- Conditionals ---
            Node::Block(block) if block.is_conditional() => {
                let value = self.invoke(&block.reference, frame, None)?;
                trace!(name = %block.reference.name, truthy = value.is_truthy(), inverted = block.inverted, "conditional");
                if value.is_truthy() != block.inverted {
                    self.render_nodes(&block.body, frame, outer, out)?;
                }
            }

            // --- Higher-order blocks ---
            Node::Block(block) => self.render_block(block, frame, outer, out)?,

            // --- Presenter switch ---
            Node::Context(context) => self.render_context(context, frame, outer, out)?,
        }
        Ok(())
    }

    /// Call the block's method with a continuation rendering the body
    /// against the same presenter.
    fn render_block(
        &self,
        block: &Block,
        frame: &Frame<'_>,
        mut outer: Option<&mut Continuation<'_>>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let mut captured = String::new();
        let returned = {
            let mut continuation = Continuation::new(|args: &[Value]| {
                let inner = Frame {
                    presenter: frame.presenter,
                    namespace: frame.namespace.clone(),
                    yielded: args.to_vec(),
                };
                let mut rendered = String::new();
                self.render_nodes(&block.body, &inner, outer.as_deref_mut(), &mut rendered)?;
                captured.push_str(&rendered);
                Ok(Text::safe(rendered))
            });
            self.invoke(&block.reference, frame, Some(&mut continuation))?
        };
        out.push_str(&block_output(returned, captured));
        Ok(())
    }

    /// Call the context method with a continuation that renders the body
    /// against the presenter resolved for the yielded datum.
    fn render_context(
        &self,
        context: &Context,
        frame: &Frame<'_>,
        mut outer: Option<&mut Continuation<'_>>,
        out: &mut String,
    ) -> Result<(), RenderError> {
        let mut namespace = frame.namespace.clone();
        namespace.push(context.reference.base_name().to_string());

        let mut captured = String::new();
        let returned = {
            let mut continuation = Continuation::new(|args: &[Value]| {
                let datum = args.first().cloned().unwrap_or(Value::Nil);
                let presenter = self
                    .resolver
                    .resolve(&namespace, datum)
                    .ok_or_else(|| RenderError::UnknownPresenter(namespace.join("::")))?;
                debug!(namespace = %namespace.join("::"), "switched presenter");

                let inner = Frame {
                    presenter: presenter.as_ref(),
                    namespace: namespace.clone(),
                    yielded: args.to_vec(),
                };
                let mut rendered = String::new();
                self.render_nodes(&context.body, &inner, outer.as_deref_mut(), &mut rendered)?;
                captured.push_str(&rendered);
                Ok(Text::safe(rendered))
            });
            self.invoke(&context.reference, frame, Some(&mut continuation))?
        };
        out.push_str(&block_output(returned, captured));
        Ok(())
    }

    fn invoke(
        &self,
        reference: &Reference,
        frame: &Frame<'_>,
        block: Option<&mut Continuation<'_>>,
    ) -> Result<Value, RenderError> {
        let kwargs = self.keyword_arguments(reference, frame)?;
        trace!(name = %reference.name, param = ?reference.param, "call");
        frame.presenter.call(Call::new(
            reference.base_name(),
            reference.param.as_deref(),
            kwargs,
            &frame.yielded,
            block,
        ))
    }

    /// Resolve keyword values: references are called on the current
    /// presenter, quoted values pass through as text.
    fn keyword_arguments(
        &self,
        reference: &Reference,
        frame: &Frame<'_>,
    ) -> Result<BTreeMap<String, Value>, RenderError> {
        let mut kwargs = BTreeMap::new();
        for (key, value) in &reference.kwargs {
            let value = match value {
                KeywordValue::Literal(text) => Value::from(text.as_str()),
                KeywordValue::Reference(name) => frame.presenter.call(Call::new(
                    base_name(name),
                    None,
                    BTreeMap::new(),
                    &frame.yielded,
                    None,
                ))?,
            };
            kwargs.insert(key.clone(), value);
        }
        Ok(kwargs)
    }
}

/// A block's output is the method's return value, or everything its
/// continuation rendered if the method returned nil.
fn block_output(returned: Value, captured: String) -> String {
    match returned {
        Value::Nil => captured,
        value => value.into_text().into_escaped(),
    }
}
