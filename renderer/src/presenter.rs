use std::collections::BTreeMap;
use std::fmt;

use crate::error::RenderError;
use crate::value::{Text, Value};

/// An object supplying the data and behaviour a template references.
///
/// The renderer calls [`Presenter::call`] once per reference, in document
/// order. Names arrive without the predicate `?`.
pub trait Presenter {
    fn call(&self, call: Call<'_, '_>) -> Result<Value, RenderError>;
}

/// Finds the presenter a context block switches to.
pub trait PresenterResolver {
    /// `namespace` holds every enclosing context name plus the new one,
    /// outermost first. `datum` is the value the context method yielded.
    fn resolve(&self, namespace: &[String], datum: Value) -> Option<Box<dyn Presenter + '_>>;
}

/// A resolver for templates without context blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContexts;

impl PresenterResolver for NoContexts {
    fn resolve(&self, _namespace: &[String], _datum: Value) -> Option<Box<dyn Presenter + '_>> {
        None
    }
}

type BlockBody<'a> = dyn FnMut(&[Value]) -> Result<Text, RenderError> + 'a;

/// A block body handed to a presenter method.
///
/// Each call renders the body once with the given arguments and returns
/// the (already escaped) output.
pub struct Continuation<'a> {
    body: Box<BlockBody<'a>>,
}

impl<'a> Continuation<'a> {
    pub fn new(body: impl FnMut(&[Value]) -> Result<Text, RenderError> + 'a) -> Self {
        Continuation {
            body: Box::new(body),
        }
    }

    pub fn call(&mut self, args: &[Value]) -> Result<Text, RenderError> {
        (self.body)(args)
    }
}

impl fmt::Debug for Continuation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation").finish_non_exhaustive()
    }
}

/// Everything a presenter method receives for one reference.
#[derive(Debug)]
pub struct Call<'a, 'b> {
    name: &'a str,
    param: Option<&'a str>,
    kwargs: BTreeMap<String, Value>,
    yielded: &'a [Value],
    block: Option<&'a mut Continuation<'b>>,
}

impl<'a, 'b> Call<'a, 'b> {
    pub(crate) fn new(
        name: &'a str,
        param: Option<&'a str>,
        kwargs: BTreeMap<String, Value>,
        yielded: &'a [Value],
        block: Option<&'a mut Continuation<'b>>,
    ) -> Self {
        Call {
            name,
            param,
            kwargs,
            yielded,
            block,
        }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The positional parameter, or `""` when the reference had none.
    pub fn param(&self) -> &'a str {
        self.param.unwrap_or("")
    }

    pub fn has_param(&self) -> bool {
        self.param.is_some()
    }

    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    /// Values yielded to the innermost enclosing block body.
    pub fn yielded(&self) -> &'a [Value] {
        self.yielded
    }

    pub fn has_block(&self) -> bool {
        self.block.is_some()
    }

    pub fn block(&mut self) -> Option<&mut Continuation<'b>> {
        self.block.as_deref_mut()
    }

    /// Invoke the block with `args`, failing if the call carries none.
    pub fn yield_to(&mut self, args: &[Value]) -> Result<Text, RenderError> {
        let name = self.name;
        match self.block.as_deref_mut() {
            Some(block) => block.call(args),
            None => Err(RenderError::MissingBlock(name.to_string())),
        }
    }
}
