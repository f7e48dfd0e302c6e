//! Scoped definition storage.
//!
//! Definitions are stored under their fully-qualified key, with a second
//! index from local name to key for `_Name` lookups. Both maps, the
//! dependency lists inside each definition and the registry version live
//! behind one `RwLock`.
//!
//! ## Semantics
//!
//! - A key can only be registered once; re-registering is an error.
//! - `update` replaces a body and forgets its type information; dependents
//!   are not touched until they are invalidated.
//! - Dependency edges are recorded best-effort: an edge naming an unknown
//!   key is silently dropped.

use std::sync::Arc;

use clause_common::ast::{CallTarget, Expr};
use clause_common::{DefinitionKey, ScopePath};
use clause_typeck::CheckedDefinition;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::definition::{Definition, DefinitionKind, DefinitionSource, Parameter};
use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// RegistryState
// ---------------------------------------------------------------------------

/// Everything guarded by the registry lock.
#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) definitions: FxHashMap<DefinitionKey, Definition>,
    /// Local name (without underscore) -> key, for global functions.
    pub(crate) globals: FxHashMap<String, DefinitionKey>,
    pub(crate) version: u64,
}

impl RegistryState {
    fn insert(&mut self, def: Definition) -> Result<DefinitionKey, RegistryError> {
        if self.definitions.contains_key(&def.key) {
            return Err(RegistryError::Duplicate(def.key));
        }
        let key = def.key.clone();
        if def.kind == DefinitionKind::GlobalFunction {
            self.globals.insert(def.local_name.clone(), key.clone());
        }
        self.definitions.insert(key.clone(), def);
        self.version += 1;
        debug!(key = %key, "definition registered");
        Ok(key)
    }

    pub(crate) fn get_mut(&mut self, key: &DefinitionKey) -> Result<&mut Definition, RegistryError> {
        self.definitions
            .get_mut(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))
    }

    /// Record `from -> to`. Returns whether a new edge was added.
    pub(crate) fn add_edge(&mut self, from: &DefinitionKey, to: &DefinitionKey) -> bool {
        if !self.definitions.contains_key(from) || !self.definitions.contains_key(to) {
            return false;
        }
        let mut added = false;
        if let Some(def) = self.definitions.get_mut(from) {
            if !def.depends_on.contains(to) {
                def.depends_on.push(to.clone());
                added = true;
            }
        }
        if let Some(def) = self.definitions.get_mut(to) {
            if !def.depended_by.contains(from) {
                def.depended_by.push(from.clone());
            }
        }
        if added {
            trace!(from = %from, to = %to, "dependency recorded");
        }
        added
    }

    /// Remove every outgoing edge of `key`.
    pub(crate) fn clear_edges(&mut self, key: &DefinitionKey) {
        let old = match self.definitions.get_mut(key) {
            Some(def) => std::mem::take(&mut def.depends_on),
            None => return,
        };
        for dep in old {
            if let Some(def) = self.definitions.get_mut(&dep) {
                def.depended_by.retain(|k| k != key);
            }
        }
    }

    /// Add an edge for every call in `key`'s body that resolves to a
    /// registered definition from the definition's own scope. Returns the
    /// number of edges added.
    pub(crate) fn discover_edges(&mut self, key: &DefinitionKey) -> usize {
        let targets: Vec<DefinitionKey> = match self.definitions.get(key) {
            Some(def) => {
                let scope = def.scope_context();
                let mut targets = Vec::new();
                def.body.walk_calls(&mut |call| {
                    if matches!(call.target, CallTarget::Builtin { .. }) {
                        return;
                    }
                    if let Ok(target) = scope.resolve_call(&call.target) {
                        targets.push(target);
                    }
                });
                targets
            }
            None => return 0,
        };
        let mut added = 0;
        for target in &targets {
            if self.add_edge(key, target) {
                added += 1;
            }
        }
        added
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Shared store of every compiled definition.
///
/// Cheap operations take the lock for their own duration only. Callers
/// share a registry by reference or inside an `Arc`.
#[derive(Debug, Default)]
pub struct Registry {
    pub(crate) state: RwLock<RegistryState>,
}

fn validate_name(name: &str) -> Result<(), RegistryError> {
    if name.is_empty() || name.contains(clause_common::scope::SEPARATOR) {
        return Err(RegistryError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Register `Domain!Subdomain!Class!Name`.
    pub fn register_class_function(
        &self,
        domain: &str,
        subdomain: &str,
        class: &str,
        name: &str,
        body: Expr,
        parameters: Vec<String>,
    ) -> Result<DefinitionKey, RegistryError> {
        let scope = ScopePath::new(domain, subdomain, class)?;
        self.register_in_scope(&scope, name, body, parameters)
    }

    /// Register a class function under an already-validated scope.
    pub fn register_in_scope(
        &self,
        scope: &ScopePath,
        name: &str,
        body: Expr,
        parameters: Vec<String>,
    ) -> Result<DefinitionKey, RegistryError> {
        validate_name(name)?;
        let key = DefinitionKey::class(scope, name);
        let def = Definition::new(
            key,
            DefinitionKind::ClassFunction,
            Some(scope.clone()),
            name.to_string(),
            body,
            parameters,
        );
        self.state.write().insert(def)
    }

    /// Register `_Name`. A leading underscore on `name` is accepted.
    pub fn register_global_function(
        &self,
        name: &str,
        body: Expr,
        parameters: Vec<String>,
    ) -> Result<DefinitionKey, RegistryError> {
        let key = DefinitionKey::global(name);
        validate_name(key.local_name())?;
        let local = key.local_name().to_string();
        let def = Definition::new(
            key,
            DefinitionKind::GlobalFunction,
            None,
            local,
            body,
            parameters,
        );
        self.state.write().insert(def)
    }

    /// Store where a definition came from.
    pub fn attach_source(
        &self,
        key: &DefinitionKey,
        source: DefinitionSource,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        state.get_mut(key)?.source = Some(source);
        Ok(())
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    pub fn get(&self, key: &DefinitionKey) -> Option<Definition> {
        self.state.read().definitions.get(key).cloned()
    }

    /// Look up a global function by local name, with or without `_`.
    pub fn get_global(&self, local_name: &str) -> Option<Definition> {
        let name = local_name
            .strip_prefix(clause_common::scope::GLOBAL_PREFIX)
            .unwrap_or(local_name);
        let state = self.state.read();
        let key = state.globals.get(name)?;
        state.definitions.get(key).cloned()
    }

    /// Run `f` against a definition without cloning it.
    pub fn with_definition<R>(
        &self,
        key: &DefinitionKey,
        f: impl FnOnce(&Definition) -> R,
    ) -> Option<R> {
        self.state.read().definitions.get(key).map(f)
    }

    pub fn contains(&self, key: &DefinitionKey) -> bool {
        self.state.read().definitions.contains_key(key)
    }

    // ── Mutation ────────────────────────────────────────────────────────

    /// Replace a definition's body and parameters. Returns the new
    /// definition version.
    pub fn update(
        &self,
        key: &DefinitionKey,
        body: Expr,
        parameters: Vec<String>,
    ) -> Result<u64, RegistryError> {
        let mut state = self.state.write();
        let def = state.get_mut(key)?;
        def.body = Arc::new(body);
        def.parameters = parameters.into_iter().map(Parameter::new).collect();
        def.clear_typed();
        def.version += 1;
        let version = def.version;
        state.version += 1;
        debug!(key = %key, version, "definition updated");
        Ok(version)
    }

    /// Remove a definition and every edge touching it. The removed
    /// definition is returned so callers can invalidate its dependents.
    pub fn delete(&self, key: &DefinitionKey) -> Result<Definition, RegistryError> {
        let mut state = self.state.write();
        state.clear_edges(key);
        let def = state
            .definitions
            .remove(key)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;
        if def.kind == DefinitionKind::GlobalFunction {
            state.globals.remove(&def.local_name);
        }
        for dependent in &def.depended_by {
            if let Some(d) = state.definitions.get_mut(dependent) {
                d.depends_on.retain(|k| k != key);
            }
        }
        state.version += 1;
        debug!(key = %key, "definition deleted");
        Ok(def)
    }

    /// Record that `from` calls `to`. Idempotent; a no-op if either key is
    /// not registered.
    pub fn add_dependency(&self, from: &DefinitionKey, to: &DefinitionKey) {
        self.state.write().add_edge(from, to);
    }

    /// Drop every dependency of `key`, and `key` from each former
    /// dependency's dependents.
    pub fn clear_dependencies(&self, key: &DefinitionKey) {
        self.state.write().clear_edges(key);
    }

    /// Store the result of type-checking `key` at `version`.
    ///
    /// Fails with `VersionConflict` if the definition was updated or
    /// invalidated after the caller read it.
    pub fn set_typed_body(
        &self,
        key: &DefinitionKey,
        version: u64,
        checked: CheckedDefinition,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write();
        let def = state.get_mut(key)?;
        if def.version != version {
            return Err(RegistryError::VersionConflict {
                key: key.clone(),
                expected: version,
                actual: def.version,
            });
        }
        def.apply_checked(checked);
        Ok(())
    }

    /// Add the edges a definition's calls imply syntactically. Returns the
    /// number of new edges.
    pub fn discover_dependencies(&self, key: &DefinitionKey) -> usize {
        self.state.write().discover_edges(key)
    }

    // ── Introspection ───────────────────────────────────────────────────

    /// Monotonic counter bumped by every structural change.
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Every key, sorted.
    pub fn keys(&self) -> Vec<DefinitionKey> {
        let mut keys: Vec<DefinitionKey> = self.state.read().definitions.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.state.read().definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().definitions.is_empty()
    }

    /// Number of definitions that currently have a typed body.
    pub fn typed_count(&self) -> usize {
        self.state
            .read()
            .definitions
            .values()
            .filter(|d| d.is_typed())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clause_common::ScopeError;

    fn body() -> Expr {
        Expr::bool(true)
    }

    fn key(s: &str) -> DefinitionKey {
        DefinitionKey::global(s)
    }

    #[test]
    fn register_and_get() {
        let reg = Registry::new();
        let k = reg
            .register_class_function("Sales", "Orders", "Order", "Submit_Requires0", body(), vec![])
            .unwrap();
        assert_eq!(k.as_str(), "Sales!Orders!Order!Submit_Requires0");
        let def = reg.get(&k).unwrap();
        assert_eq!(def.version, 1);
        assert_eq!(def.kind, DefinitionKind::ClassFunction);
        assert!(!def.is_typed());
        assert_eq!(reg.version(), 1);
    }

    #[test]
    fn duplicate_registration_fails() {
        let reg = Registry::new();
        reg.register_global_function("Max", body(), vec![]).unwrap();
        let err = reg.register_global_function("_Max", body(), vec![]).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate(key("_Max")));
    }

    #[test]
    fn partial_scope_is_rejected() {
        let reg = Registry::new();
        let err = reg
            .register_class_function("Sales", "", "Order", "F", body(), vec![])
            .unwrap_err();
        assert!(matches!(err, RegistryError::Scope(ScopeError::MalformedScope(_))));
        assert!(reg.is_empty());
    }

    #[test]
    fn names_with_separator_are_rejected() {
        let reg = Registry::new();
        let err = reg.register_global_function("A!B", body(), vec![]).unwrap_err();
        assert_eq!(err, RegistryError::InvalidName("A!B".into()));
    }

    #[test]
    fn global_lookup_by_local_name() {
        let reg = Registry::new();
        reg.register_global_function("Max", body(), vec!["a".into()]).unwrap();
        assert!(reg.get_global("Max").is_some());
        assert!(reg.get_global("_Max").is_some());
        assert!(reg.get_global("Min").is_none());
    }

    #[test]
    fn update_bumps_versions_and_clears_types() {
        let reg = Registry::new();
        let k = reg.register_global_function("F", body(), vec![]).unwrap();
        let checked = clause_typeck::TypeChecker::new()
            .check_standalone(&body())
            .unwrap();
        reg.set_typed_body(&k, 1, checked).unwrap();
        assert_eq!(reg.typed_count(), 1);

        let v = reg.update(&k, Expr::number(1.0), vec!["x".into()]).unwrap();
        assert_eq!(v, 2);
        let def = reg.get(&k).unwrap();
        assert!(!def.is_typed());
        assert!(def.return_type.is_none());
        assert_eq!(def.parameter_names(), vec!["x"]);
        assert_eq!(reg.version(), 2);

        let missing = reg.update(&key("_Nope"), body(), vec![]).unwrap_err();
        assert_eq!(missing, RegistryError::NotFound(key("_Nope")));
    }

    #[test]
    fn stale_typed_body_is_rejected() {
        let reg = Registry::new();
        let k = reg.register_global_function("F", body(), vec![]).unwrap();
        reg.update(&k, body(), vec![]).unwrap();
        let checked = clause_typeck::TypeChecker::new()
            .check_standalone(&body())
            .unwrap();
        let err = reg.set_typed_body(&k, 1, checked).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn dependencies_are_idempotent_and_best_effort() {
        let reg = Registry::new();
        let a = reg.register_global_function("A", body(), vec![]).unwrap();
        let b = reg.register_global_function("B", body(), vec![]).unwrap();

        reg.add_dependency(&a, &b);
        reg.add_dependency(&a, &b);
        reg.add_dependency(&a, &key("_Ghost"));
        assert_eq!(reg.get(&a).unwrap().depends_on, vec![b.clone()]);
        assert_eq!(reg.get(&b).unwrap().depended_by, vec![a.clone()]);

        reg.clear_dependencies(&a);
        assert!(reg.get(&a).unwrap().depends_on.is_empty());
        assert!(reg.get(&b).unwrap().depended_by.is_empty());
    }

    #[test]
    fn delete_removes_edges_and_global_index() {
        let reg = Registry::new();
        let a = reg.register_global_function("A", body(), vec![]).unwrap();
        let b = reg.register_global_function("B", body(), vec![]).unwrap();
        reg.add_dependency(&a, &b);

        let removed = reg.delete(&b).unwrap();
        assert_eq!(removed.depended_by, vec![a.clone()]);
        assert!(reg.get_global("B").is_none());
        assert!(reg.get(&a).unwrap().depends_on.is_empty());
        assert_eq!(reg.delete(&b).unwrap_err(), RegistryError::NotFound(b));
    }

    #[test]
    fn discover_resolves_calls_from_own_scope() {
        let reg = Registry::new();
        let helper = reg
            .register_class_function("D", "S", "C", "Helper", body(), vec![])
            .unwrap();
        let global = reg.register_global_function("G", body(), vec![]).unwrap();
        let caller_body = Expr::binary(
            clause_common::ast::BinaryOp::And,
            Expr::call(CallTarget::class(Vec::<String>::new(), "Helper"), vec![]),
            Expr::binary(
                clause_common::ast::BinaryOp::And,
                Expr::call(CallTarget::global("G"), vec![]),
                Expr::call(CallTarget::builtin("TLC", "PrintT"), vec![Expr::bool(true)]),
            ),
        );
        let caller = reg
            .register_class_function("D", "S", "C", "Caller", caller_body, vec![])
            .unwrap();

        assert_eq!(reg.discover_dependencies(&caller), 2);
        assert_eq!(reg.discover_dependencies(&caller), 0);
        assert_eq!(reg.get(&caller).unwrap().depends_on, vec![helper, global]);
    }
}
