pub mod compiler;
pub mod error;
mod evaluator;
pub mod presenter;
pub mod value;

pub use compiler::{CompiledTemplate, compile, compile_with_id, is_valid, render};
pub use curly::validator::{Capabilities, InvalidReason, InvalidReference};
pub use error::{CompileError, PresenterError, RenderError};
pub use presenter::{Call, Continuation, NoContexts, Presenter, PresenterResolver};
pub use value::{Text, Value, escape_html};
