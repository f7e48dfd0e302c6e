//! Contract expression compiler.
//!
//! Takes the contract strings of a domain model through every stage up to
//! evaluation:
//!
//! ```text
//! Model ──Extractor──> ExtractedExpression ──DefinitionBuilder──> Registry
//!                                                                   │
//!                          Evaluator <──TypedNode── rebuild (TypeChecker)
//! ```
//!
//! ## Modules
//!
//! - [`extract`]: walks the model and yields one raw expression per clause
//! - [`build`]: parses, names, classifies and registers expressions
//! - [`adapters`]: registry views for the type checker and the evaluator
//! - [`pipeline`]: [`Pipeline`] for standalone expressions and
//!   [`RegistryPipeline`] for a whole model
//! - [`eval`]: the evaluator interface and its inputs
//! - [`config`]: [`PipelineConfig`], loadable from TOML
//! - [`error`]: build, evaluation and pipeline errors
//!
//! The text parser and the evaluator are supplied by the caller through
//! [`ExpressionParser`] and [`Evaluator`].

pub mod adapters;
pub mod build;
pub mod config;
pub mod error;
pub mod eval;
pub mod extract;
pub mod pipeline;

pub use crate::adapters::{DependencyRecorder, RuntimeAdapter, TypeCheckerAdapter};
pub use crate::build::{
    classify_guarantee, contains_any_primed, definition_name, DefinitionBuilder, ExpressionParser,
};
pub use crate::config::{ConfigError, PipelineConfig};
pub use crate::error::{BuildError, EvalError, ParseError, PipelineError};
pub use crate::eval::{Bindings, EvalContext, Evaluator, RelationContext, Value};
pub use crate::extract::{ExpressionSource, ExtractedExpression, Extractor};
pub use crate::pipeline::{CompiledExpression, LoadReport, Pipeline, RegistryPipeline};
pub use clause_registry::GuaranteeKind;
