use clause_common::{DefinitionKey, Span};
use clause_registry::{RebuildError, RegistryError};
use clause_typeck::TypeError;

use crate::extract::ExpressionSource;

/// Returned by an [`ExpressionParser`](crate::build::ExpressionParser).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
            span: None,
        }
    }

    pub fn at(message: impl Into<String>, span: Span) -> Self {
        ParseError {
            message: message.into(),
            span: Some(span),
        }
    }
}

/// Turning one extracted expression into a registered definition failed.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("{origin} #{index}{}: parse error: {error}", owner_suffix(.owner))]
    Parse {
        origin: ExpressionSource,
        owner: String,
        index: usize,
        #[source]
        error: ParseError,
    },
    /// A precondition, postcondition or guard condition with no owner key.
    #[error("{origin} #{index}{} has no owning scope", owner_suffix(.owner))]
    MissingScope {
        origin: ExpressionSource,
        owner: String,
        index: usize,
    },
    #[error("{origin} #{index}{}: {error}", owner_suffix(.owner))]
    Registration {
        origin: ExpressionSource,
        owner: String,
        index: usize,
        #[source]
        error: RegistryError,
    },
}

fn owner_suffix(owner: &str) -> String {
    if owner.is_empty() {
        String::new()
    } else {
        format!(" of `{}`", owner)
    }
}

/// Errors from the evaluator.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("evaluation failed: {message}")]
pub struct EvalError {
    pub message: String,
    pub span: Option<Span>,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        EvalError {
            message: message.into(),
            span: None,
        }
    }

    pub fn at(message: impl Into<String>, span: Span) -> Self {
        EvalError {
            message: message.into(),
            span: Some(span),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Rebuild(#[from] RebuildError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    /// Evaluating a definition that has not been type-checked.
    #[error("definition `{0}` has not been type-checked")]
    NotTyped(DefinitionKey),
}
