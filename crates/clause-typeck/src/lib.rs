//! Clause type checker: Hindley-Milner type inference for contract
//! expressions.
//!
//! This crate assigns a type to every node of a contract expression,
//! detects type errors, and reports which registry definitions an
//! expression calls. It supports:
//!
//! - Hindley-Milner type inference with let-polymorphism
//! - Unification with occurs check
//! - Structural records and the `Any` escape type
//! - Polymorphic builtins and polymorphic registry definitions
//!
//! # Architecture
//!
//! - [`ty`]: Core type representation (Ty, TyVar, Scheme)
//! - [`unify`]: Unification engine with occurs check and level-based generalization
//! - [`env`]: Parent-linked type environment
//! - [`builtins`]: Built-in function signatures
//! - [`typed`]: The typed expression tree handed to the evaluator
//! - [`error`]: Type error types with provenance tracking
//! - [`infer`]: Algorithm J inference engine
//! - [`diagnostics`]: ariadne rendering of type errors
//!
//! The checker never sees registry internals. Call resolution goes through
//! [`RegistryInterface`] and dependency edges through [`DependencyTracker`],
//! both implemented by the compiler crate.

pub mod builtins;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod infer;
pub mod ty;
pub mod typed;
pub mod unify;

use clause_common::ast::CallTarget;
use clause_common::{DefinitionKey, ScopeContext, ScopeError};

pub use crate::error::{ConstraintOrigin, TypeError};
pub use crate::infer::{CheckSession, CheckedDefinition, TypeChecker};
pub use crate::ty::{Scheme, Ty, TyVar};
pub use crate::typed::{Callee, TypedKind, TypedNode};

/// A registry call resolved to its definition.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedCall {
    pub key: DefinitionKey,
    /// The callee's closed signature, or `None` if it has not been
    /// type-checked.
    pub signature: Option<Scheme>,
}

/// Resolves registry calls on behalf of the type checker.
pub trait RegistryInterface {
    /// Resolve `target` as written at `scope`.
    fn resolve_call(
        &self,
        target: &CallTarget,
        scope: &ScopeContext,
    ) -> Result<ResolvedCall, ScopeError>;
}

/// Receives the dependency edges discovered while checking one definition.
pub trait DependencyTracker {
    fn record_dependency(&self, callee: &DefinitionKey);
}

/// A registry with no definitions, for checking standalone expressions.
/// Every well-formed registry call fails with `UnknownDefinition`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRegistry;

impl RegistryInterface for NoRegistry {
    fn resolve_call(
        &self,
        target: &CallTarget,
        scope: &ScopeContext,
    ) -> Result<ResolvedCall, ScopeError> {
        let key = scope.resolve_call(target)?;
        Err(ScopeError::UnknownDefinition(key))
    }
}
