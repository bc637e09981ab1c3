use curly::Template;
use curly::parser::Parser;
use curly::validator::{self, Capabilities};
use tracing::debug;

use crate::error::{CompileError, RenderError};
use crate::evaluator::{Evaluator, Frame};
use crate::presenter::{Continuation, Presenter, PresenterResolver};
use crate::value::{Text, Value};

/// A parsed and validated template, ready to render.
///
/// Immutable; one compiled template may be rendered concurrently against
/// different presenters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    template: Template,
}

impl CompiledTemplate {
    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn render(
        &self,
        presenter: &dyn Presenter,
        resolver: &dyn PresenterResolver,
    ) -> Result<String, RenderError> {
        render(&self.template, presenter, resolver, None)
    }

    /// Render with an outer block, which presenter methods reached by plain
    /// references may yield to.
    pub fn render_with_block(
        &self,
        presenter: &dyn Presenter,
        resolver: &dyn PresenterResolver,
        block: impl FnMut(&[Value]) -> Result<Text, RenderError>,
    ) -> Result<String, RenderError> {
        let mut outer = Continuation::new(block);
        render(&self.template, presenter, resolver, Some(&mut outer))
    }
}

/// Compile template source against a presenter's capabilities.
pub fn compile(
    source: &str,
    capabilities: Option<&dyn Capabilities>,
) -> Result<CompiledTemplate, CompileError> {
    compile_with_id(source, 0, capabilities)
}

/// Like [`compile`], tagging errors with a codespan file ID.
pub fn compile_with_id(
    source: &str,
    file_id: usize,
    capabilities: Option<&dyn Capabilities>,
) -> Result<CompiledTemplate, CompileError> {
    let capabilities = capabilities.ok_or(CompileError::MissingPresenter)?;
    let template = Parser::new(source, file_id).parse()?;
    if let Some(invalid) = validator::validate(&template, capabilities).into_iter().next() {
        return Err(invalid.into());
    }
    debug!(nodes = template.nodes.len(), "compiled template");
    Ok(CompiledTemplate { template })
}

/// Whether `source` would compile. Never fails.
pub fn is_valid(source: &str, capabilities: Option<&dyn Capabilities>) -> bool {
    compile(source, capabilities).is_ok()
}

/// Render a parsed template against `presenter`.
pub fn render(
    template: &Template,
    presenter: &dyn Presenter,
    resolver: &dyn PresenterResolver,
    outer: Option<&mut Continuation<'_>>,
) -> Result<String, RenderError> {
    let mut out = String::new();
    Evaluator::new(resolver).render_nodes(&template.nodes, &Frame::root(presenter), outer, &mut out)?;
    Ok(out)
}
