//! Invalidation and rebuild.
//!
//! Invalidating a definition forgets its type information and that of
//! every transitive dependent. A rebuild then re-checks definitions in
//! dependency order through a caller-supplied callback. Every definition is
//! attempted even after earlier failures; the failures are returned
//! together.

use std::collections::VecDeque;

use clause_common::DefinitionKey;
use clause_typeck::TypeError;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::definition::Definition;
use crate::error::{DefinitionError, RebuildError, RegistryError};
use crate::graph::topological_order;
use crate::registry::{Registry, RegistryState};

/// Definitions marked dirty, each with the registry version at which it
/// was invalidated. Keys are unique and in discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvalidationSet {
    entries: Vec<(DefinitionKey, u64)>,
}

impl InvalidationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DefinitionKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn entries(&self) -> &[(DefinitionKey, u64)] {
        &self.entries
    }

    pub fn contains(&self, key: &DefinitionKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// The registry version at which `key` was invalidated.
    pub fn version_of(&self, key: &DefinitionKey) -> Option<u64> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, key: DefinitionKey, version: u64) {
        if !self.contains(&key) {
            self.entries.push((key, version));
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RebuildStrategy {
    /// Re-check only the invalidated definitions.
    Incremental,
    /// Forget every typed body and dependency edge, then re-check
    /// everything.
    Full,
}

impl RegistryState {
    /// Invalidate `root` and every transitive dependent not already in
    /// `set`.
    fn invalidate_from(&mut self, root: &DefinitionKey, set: &mut InvalidationSet) {
        let version = self.version;
        let mut visited: FxHashSet<DefinitionKey> = set.keys().cloned().collect();
        let mut queue = VecDeque::new();
        if visited.insert(root.clone()) {
            queue.push_back(root.clone());
        }

        while let Some(key) = queue.pop_front() {
            let Some(def) = self.definitions.get_mut(&key) else {
                continue;
            };
            def.clear_typed();
            def.version += 1;
            for dependent in &def.depended_by {
                if visited.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
            set.push(key, version);
        }
    }
}

impl Registry {
    /// Mark `key` and everything that transitively depends on it as
    /// needing a type-check.
    pub fn invalidate_definition(
        &self,
        key: &DefinitionKey,
    ) -> Result<InvalidationSet, RegistryError> {
        self.invalidate_many(std::slice::from_ref(key))
    }

    /// Invalidate several roots at once. Fails without invalidating
    /// anything if a key is not registered.
    pub fn invalidate_many(
        &self,
        keys: &[DefinitionKey],
    ) -> Result<InvalidationSet, RegistryError> {
        let mut state = self.state.write();
        if let Some(missing) = keys.iter().find(|k| !state.definitions.contains_key(*k)) {
            return Err(RegistryError::NotFound(missing.clone()));
        }
        state.version += 1;
        let mut set = InvalidationSet::new();
        for key in keys {
            state.invalidate_from(key, &mut set);
        }
        debug!(
            roots = keys.len(),
            invalidated = set.len(),
            version = state.version,
            "definitions invalidated"
        );
        Ok(set)
    }

    /// Re-check definitions in dependency order.
    ///
    /// `Incremental` re-checks the keys of `invalidated`; `Full` ignores it
    /// and re-checks every definition after clearing all typed bodies and
    /// edges. Before sorting, each definition to be checked gets the edges
    /// its calls imply syntactically, so callees come first even when no
    /// edges have been recorded yet.
    ///
    /// `check` receives a snapshot of each definition after its outgoing
    /// edges were cleared. It is expected to record the edges it finds and
    /// to store its result with [`Registry::set_typed_body`]. The registry
    /// lock is not held while it runs.
    ///
    /// Returns the order definitions were checked in, or every failure.
    pub fn rebuild<F>(
        &self,
        strategy: RebuildStrategy,
        invalidated: &InvalidationSet,
        mut check: F,
    ) -> Result<Vec<DefinitionKey>, RebuildError>
    where
        F: FnMut(&Definition) -> Result<(), TypeError>,
    {
        let plan = {
            let mut state = self.state.write();
            let keys: Vec<DefinitionKey> = match strategy {
                RebuildStrategy::Incremental => invalidated
                    .keys()
                    .filter(|k| state.definitions.contains_key(*k))
                    .cloned()
                    .collect(),
                RebuildStrategy::Full => {
                    state.version += 1;
                    for def in state.definitions.values_mut() {
                        def.clear_typed();
                        def.depends_on.clear();
                        def.depended_by.clear();
                    }
                    let mut keys: Vec<DefinitionKey> = state.definitions.keys().cloned().collect();
                    keys.sort();
                    keys
                }
            };
            for key in &keys {
                state.clear_edges(key);
            }
            for key in &keys {
                state.discover_edges(key);
            }
            topological_order(&state.definitions, &keys)
        };

        if !plan.cyclic.is_empty() {
            warn!(
                keys = ?plan.cyclic.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
                "dependency cycle; these definitions cannot be type-checked"
            );
        }
        debug!(?strategy, count = plan.order.len(), "rebuild started");

        let mut errors = Vec::new();
        let mut checked = Vec::with_capacity(plan.order.len());
        for key in plan.order {
            let snapshot = {
                let mut state = self.state.write();
                state.clear_edges(&key);
                state.definitions.get(&key).cloned()
            };
            // Deleted by another holder of the registry mid-rebuild.
            let Some(def) = snapshot else {
                continue;
            };
            match check(&def) {
                Ok(()) => {
                    debug!(key = %key, "definition checked");
                }
                Err(error) => {
                    warn!(key = %key, %error, "definition failed to type-check");
                    errors.push(DefinitionError {
                        key: key.clone(),
                        error,
                    });
                }
            }
            checked.push(key);
        }

        if errors.is_empty() {
            Ok(checked)
        } else {
            Err(RebuildError { errors })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clause_common::ast::{CallTarget, Expr};

    fn call(name: &str) -> Expr {
        Expr::call(CallTarget::global(name), vec![])
    }

    fn key(name: &str) -> DefinitionKey {
        DefinitionKey::global(name)
    }

    #[test]
    fn invalidation_follows_dependents_transitively() {
        let reg = Registry::new();
        for name in ["A", "B", "C", "D"] {
            reg.register_global_function(name, Expr::bool(true), vec![]).unwrap();
        }
        // A -> B -> C; D is unrelated.
        reg.add_dependency(&key("A"), &key("B"));
        reg.add_dependency(&key("B"), &key("C"));

        let set = reg.invalidate_definition(&key("C")).unwrap();
        let keys: Vec<&str> = set.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["_C", "_B", "_A"]);
        assert!(!set.contains(&key("D")));
        assert_eq!(reg.get(&key("C")).unwrap().version, 2);
        assert_eq!(reg.get(&key("D")).unwrap().version, 1);
    }

    #[test]
    fn invalidation_is_cycle_safe() {
        let reg = Registry::new();
        reg.register_global_function("A", call("B"), vec![]).unwrap();
        reg.register_global_function("B", call("A"), vec![]).unwrap();
        reg.add_dependency(&key("A"), &key("B"));
        reg.add_dependency(&key("B"), &key("A"));

        let set = reg.invalidate_definition(&key("A")).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn invalidating_an_unknown_key_changes_nothing() {
        let reg = Registry::new();
        reg.register_global_function("A", Expr::bool(true), vec![]).unwrap();
        let before = reg.version();
        let err = reg.invalidate_many(&[key("A"), key("Ghost")]).unwrap_err();
        assert_eq!(err, RegistryError::NotFound(key("Ghost")));
        assert_eq!(reg.version(), before);
        assert_eq!(reg.get(&key("A")).unwrap().version, 1);
    }

    #[test]
    fn rebuild_orders_callees_first_without_recorded_edges() {
        let reg = Registry::new();
        reg.register_global_function("Top", call("Mid"), vec![]).unwrap();
        reg.register_global_function("Mid", call("Base"), vec![]).unwrap();
        reg.register_global_function("Base", Expr::number(1.0), vec![]).unwrap();

        let mut seen = Vec::new();
        let order = reg
            .rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
                seen.push(def.local_name.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec!["Base", "Mid", "Top"]);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn rebuild_collects_every_failure() {
        let reg = Registry::new();
        for name in ["A", "B", "C"] {
            reg.register_global_function(name, Expr::bool(true), vec![]).unwrap();
        }
        let mut attempted = Vec::new();
        let err = reg
            .rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
                attempted.push(def.local_name.clone());
                if def.local_name == "B" {
                    Ok(())
                } else {
                    Err(TypeError::UnboundVariable {
                        name: "x".into(),
                        span: Default::default(),
                    })
                }
            })
            .unwrap_err();
        assert_eq!(attempted, vec!["A", "B", "C"]);
        let failed: Vec<&str> = err.keys().map(|k| k.as_str()).collect();
        assert_eq!(failed, vec!["_A", "_C"]);
        assert!(err.get(&key("B")).is_none());
    }

    #[test]
    fn incremental_rebuild_only_touches_invalidated_keys() {
        let reg = Registry::new();
        reg.register_global_function("A", call("B"), vec![]).unwrap();
        reg.register_global_function("B", Expr::bool(true), vec![]).unwrap();
        reg.register_global_function("Other", Expr::bool(true), vec![]).unwrap();
        reg.add_dependency(&key("A"), &key("B"));

        let set = reg.invalidate_definition(&key("B")).unwrap();
        let mut seen = Vec::new();
        reg.rebuild(RebuildStrategy::Incremental, &set, |def| {
            seen.push(def.local_name.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec!["B", "A"]);
    }

    #[test]
    fn snapshot_has_no_outgoing_edges() {
        let reg = Registry::new();
        reg.register_global_function("A", call("B"), vec![]).unwrap();
        reg.register_global_function("B", Expr::bool(true), vec![]).unwrap();
        reg.rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
            assert!(def.depends_on.is_empty());
            Ok(())
        })
        .unwrap();
    }
}
