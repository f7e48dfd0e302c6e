//! Bridges between the registry and its two consumers.
//!
//! The type checker and the evaluator never see [`Registry`] directly:
//! the checker resolves calls through [`TypeCheckerAdapter`] and reports
//! edges through [`DependencyRecorder`]; the evaluator resolves calls
//! through [`RuntimeAdapter`].

use std::sync::Arc;

use clause_common::ast::CallTarget;
use clause_common::{DefinitionKey, ScopeContext, ScopeError};
use clause_registry::{Definition, Registry, RegistryError};
use clause_typeck::{DependencyTracker, RegistryInterface, ResolvedCall, TypedNode};

/// Resolves calls for the type checker, exposing each callee's closed
/// signature.
#[derive(Clone, Copy)]
pub struct TypeCheckerAdapter<'r> {
    registry: &'r Registry,
}

impl<'r> TypeCheckerAdapter<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        TypeCheckerAdapter { registry }
    }
}

impl RegistryInterface for TypeCheckerAdapter<'_> {
    fn resolve_call(
        &self,
        target: &CallTarget,
        scope: &ScopeContext,
    ) -> Result<ResolvedCall, ScopeError> {
        let key = scope.resolve_call(target)?;
        match self.registry.with_definition(&key, Definition::signature) {
            Some(signature) => Ok(ResolvedCall { key, signature }),
            None => Err(ScopeError::UnknownDefinition(key)),
        }
    }
}

/// Records the edges found while checking one definition.
pub struct DependencyRecorder<'r> {
    registry: &'r Registry,
    current: DefinitionKey,
}

impl<'r> DependencyRecorder<'r> {
    /// Start recording for `current`, dropping the edges it had before.
    pub fn begin(registry: &'r Registry, current: DefinitionKey) -> Self {
        registry.clear_dependencies(&current);
        DependencyRecorder { registry, current }
    }

    pub fn current(&self) -> &DefinitionKey {
        &self.current
    }
}

impl DependencyTracker for DependencyRecorder<'_> {
    fn record_dependency(&self, callee: &DefinitionKey) {
        self.registry.add_dependency(&self.current, callee);
    }
}

/// Resolves calls for the evaluator at run time.
#[derive(Clone, Copy)]
pub struct RuntimeAdapter<'r> {
    registry: &'r Registry,
}

impl<'r> RuntimeAdapter<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        RuntimeAdapter { registry }
    }

    /// Resolve `call` as written at `scope` and fetch its definition.
    pub fn get_definition_for_call(
        &self,
        call: &CallTarget,
        scope: &ScopeContext,
    ) -> Result<(DefinitionKey, Definition), RegistryError> {
        let key = scope.resolve_call(call)?;
        let def = self.get_definition(&key)?;
        Ok((key, def))
    }

    pub fn get_definition(&self, key: &DefinitionKey) -> Result<Definition, RegistryError> {
        self.registry
            .get(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))
    }

    /// The typed body of `key`, if it is registered and checked.
    pub fn typed_body(&self, key: &DefinitionKey) -> Option<Arc<TypedNode>> {
        self.registry
            .with_definition(key, |d| d.typed_body.clone())
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clause_common::ast::Expr;
    use clause_typeck::TypeChecker;

    fn registry_with_checked_max() -> (Registry, DefinitionKey) {
        let reg = Registry::new();
        let body = Expr::if_then_else(
            Expr::binary(
                clause_common::ast::BinaryOp::Gt,
                Expr::ident("a"),
                Expr::ident("b"),
            ),
            Expr::ident("a"),
            Expr::ident("b"),
        );
        let params = vec!["a".to_string(), "b".to_string()];
        let key = reg
            .register_global_function("Max", body.clone(), params.clone())
            .unwrap();
        let scope = ScopeContext::global();
        let checked = TypeChecker::new()
            .check(
                &body,
                &params,
                &clause_typeck::CheckSession::standalone(&scope),
            )
            .unwrap();
        reg.set_typed_body(&key, 1, checked).unwrap();
        (reg, key)
    }

    #[test]
    fn checker_adapter_exposes_signature() {
        let (reg, key) = registry_with_checked_max();
        let resolved = TypeCheckerAdapter::new(&reg)
            .resolve_call(&CallTarget::global("Max"), &ScopeContext::domain("Sales"))
            .unwrap();
        assert_eq!(resolved.key, key);
        assert_eq!(
            resolved.signature.unwrap().to_string(),
            "(Number, Number) -> Number"
        );
    }

    #[test]
    fn checker_adapter_reports_unknown_keys() {
        let reg = Registry::new();
        let err = TypeCheckerAdapter::new(&reg)
            .resolve_call(&CallTarget::global("Nope"), &ScopeContext::global())
            .unwrap_err();
        assert_eq!(err, ScopeError::UnknownDefinition(DefinitionKey::global("Nope")));
    }

    #[test]
    fn recorder_replaces_previous_edges() {
        let reg = Registry::new();
        let a = reg.register_global_function("A", Expr::bool(true), vec![]).unwrap();
        let b = reg.register_global_function("B", Expr::bool(true), vec![]).unwrap();
        let c = reg.register_global_function("C", Expr::bool(true), vec![]).unwrap();
        reg.add_dependency(&a, &b);

        let recorder = DependencyRecorder::begin(&reg, a.clone());
        recorder.record_dependency(&c);
        assert_eq!(reg.get(&a).unwrap().depends_on, vec![c]);
        assert!(reg.get(&b).unwrap().depended_by.is_empty());
    }

    #[test]
    fn runtime_adapter_resolves_relative_calls() {
        let reg = Registry::new();
        let key = reg
            .register_class_function("D", "S", "Order", "Validate", Expr::bool(true), vec![])
            .unwrap();
        let runtime = RuntimeAdapter::new(&reg);

        let (resolved, def) = runtime
            .get_definition_for_call(
                &CallTarget::class(["Order"], "Validate"),
                &ScopeContext::subdomain("D", "S"),
            )
            .unwrap();
        assert_eq!(resolved, key);
        assert_eq!(def.local_name, "Validate");
        assert!(runtime.typed_body(&key).is_none());

        let err = runtime
            .get_definition_for_call(
                &CallTarget::class(Vec::<String>::new(), "Validate"),
                &ScopeContext::subdomain("D", "S"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Scope(ScopeError::QualifierDepthMismatch { .. })
        ));
    }
}
