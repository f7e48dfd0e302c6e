//! End-to-end invalidation and rebuild tests.
//!
//! Definitions are type-checked for real: the rebuild callback runs the
//! type checker with a small adapter over the registry, records the edges
//! it finds, and stores the result with `set_typed_body`.

use clause_common::ast::{BinaryOp, CallTarget, Expr};
use clause_common::{DefinitionKey, ScopeContext, ScopeError};
use clause_registry::{
    Definition, InvalidationSet, RebuildStrategy, Registry, RegistryError,
};
use clause_typeck::{
    CheckSession, DependencyTracker, RegistryInterface, ResolvedCall, Ty, TypeChecker,
    TypeError,
};

// ── Helpers ────────────────────────────────────────────────────────────

struct Lookup<'r>(&'r Registry);

impl RegistryInterface for Lookup<'_> {
    fn resolve_call(
        &self,
        target: &CallTarget,
        scope: &ScopeContext,
    ) -> Result<ResolvedCall, ScopeError> {
        let key = scope.resolve_call(target)?;
        match self.0.with_definition(&key, |d| d.signature()) {
            Some(signature) => Ok(ResolvedCall { key, signature }),
            None => Err(ScopeError::UnknownDefinition(key)),
        }
    }
}

struct Edges<'r> {
    registry: &'r Registry,
    from: &'r DefinitionKey,
}

impl DependencyTracker for Edges<'_> {
    fn record_dependency(&self, callee: &DefinitionKey) {
        self.registry.add_dependency(self.from, callee);
    }
}

fn check(registry: &Registry, checker: &TypeChecker, def: &Definition) -> Result<(), TypeError> {
    let scope = def.scope_context();
    let lookup = Lookup(registry);
    let edges = Edges {
        registry,
        from: &def.key,
    };
    let session = CheckSession {
        registry: &lookup,
        scope: &scope,
        tracker: Some(&edges),
        self_name: Some("self"),
    };
    let checked = checker.check(&def.body, &def.parameter_names(), &session)?;
    registry
        .set_typed_body(&def.key, def.version, checked)
        .unwrap();
    Ok(())
}

fn global(name: &str) -> DefinitionKey {
    DefinitionKey::global(name)
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(CallTarget::global(name), args)
}

fn names(keys: &[DefinitionKey]) -> Vec<&str> {
    keys.iter().map(|k| k.as_str()).collect()
}

/// `_B(x) == x + 1` and `_A == _B(2) > 1`.
fn two_level_registry() -> Registry {
    let reg = Registry::new();
    reg.register_global_function(
        "B",
        Expr::binary(BinaryOp::Add, Expr::ident("x"), Expr::number(1.0)),
        vec!["x".into()],
    )
    .unwrap();
    reg.register_global_function(
        "A",
        Expr::binary(
            BinaryOp::Gt,
            call("B", vec![Expr::number(2.0)]),
            Expr::number(1.0),
        ),
        vec![],
    )
    .unwrap();
    reg
}

// ── Full rebuild ───────────────────────────────────────────────────────

#[test]
fn full_rebuild_checks_callees_first() {
    let reg = two_level_registry();
    let checker = TypeChecker::new();

    let order = reg
        .rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
            check(&reg, &checker, def)
        })
        .unwrap();

    assert_eq!(names(&order), vec!["_B", "_A"]);
    assert_eq!(reg.typed_count(), 2);
    let a = reg.get(&global("A")).unwrap();
    assert_eq!(a.return_type, Some(Ty::Boolean));
    assert_eq!(a.depends_on, vec![global("B")]);
    assert_eq!(
        reg.get(&global("B")).unwrap().signature().unwrap().to_string(),
        "(Number) -> Number"
    );
}

#[test]
fn full_rebuild_is_repeatable() {
    let reg = two_level_registry();
    let checker = TypeChecker::new();
    for _ in 0..2 {
        reg.rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
            check(&reg, &checker, def)
        })
        .unwrap();
    }
    assert_eq!(reg.typed_count(), 2);
    assert_eq!(reg.get(&global("B")).unwrap().depended_by, vec![global("A")]);
}

// ── Invalidation + incremental rebuild ─────────────────────────────────

#[test]
fn invalidating_a_callee_invalidates_its_caller() {
    let reg = two_level_registry();
    let checker = TypeChecker::new();
    reg.rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
        check(&reg, &checker, def)
    })
    .unwrap();

    let set = reg.invalidate_definition(&global("B")).unwrap();
    assert_eq!(set.len(), 2);
    assert!(set.contains(&global("A")));
    assert!(set.contains(&global("B")));
    assert_eq!(reg.typed_count(), 0);

    let order = reg
        .rebuild(RebuildStrategy::Incremental, &set, |def| {
            check(&reg, &checker, def)
        })
        .unwrap();
    assert_eq!(names(&order), vec!["_B", "_A"]);
    assert_eq!(reg.typed_count(), 2);
}

#[test]
fn invalidation_is_transitive() {
    let reg = Registry::new();
    reg.register_global_function("C", Expr::number(1.0), vec![]).unwrap();
    reg.register_global_function("B", call("C", vec![]), vec![]).unwrap();
    reg.register_global_function("A", call("B", vec![]), vec![]).unwrap();
    reg.register_global_function("Lone", Expr::bool(true), vec![]).unwrap();
    let checker = TypeChecker::new();
    reg.rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
        check(&reg, &checker, def)
    })
    .unwrap();

    let set = reg.invalidate_definition(&global("C")).unwrap();
    let keys: Vec<&str> = set.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["_C", "_B", "_A"]);
    assert!(reg.get(&global("Lone")).unwrap().is_typed());

    let mut seen = Vec::new();
    reg.rebuild(RebuildStrategy::Incremental, &set, |def| {
        seen.push(def.key.to_string());
        check(&reg, &checker, def)
    })
    .unwrap();
    assert_eq!(seen, vec!["_C", "_B", "_A"]);
}

#[test]
fn incompatible_update_fails_the_caller_only() {
    let reg = two_level_registry();
    let checker = TypeChecker::new();
    reg.rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
        check(&reg, &checker, def)
    })
    .unwrap();

    // _B now takes a String.
    reg.update(
        &global("B"),
        Expr::binary(BinaryOp::Eq, Expr::ident("x"), Expr::string("a")),
        vec!["x".into()],
    )
    .unwrap();
    let set = reg.invalidate_definition(&global("B")).unwrap();
    let err = reg
        .rebuild(RebuildStrategy::Incremental, &set, |def| {
            check(&reg, &checker, def)
        })
        .unwrap_err();

    assert_eq!(names(&err.keys().cloned().collect::<Vec<_>>()), vec!["_A"]);
    assert!(matches!(
        err.get(&global("A")),
        Some(TypeError::Mismatch { .. })
    ));
    assert!(reg.get(&global("B")).unwrap().is_typed());
    assert!(!reg.get(&global("A")).unwrap().is_typed());
}

#[test]
fn stale_result_is_rejected_after_invalidation() {
    let reg = two_level_registry();
    let checker = TypeChecker::new();
    let snapshot = reg.get(&global("B")).unwrap();
    reg.invalidate_definition(&global("B")).unwrap();

    let checked = checker
        .check(
            &snapshot.body,
            &snapshot.parameter_names(),
            &CheckSession::standalone(&ScopeContext::global()),
        )
        .unwrap();
    let err = reg
        .set_typed_body(&snapshot.key, snapshot.version, checked)
        .unwrap_err();
    assert!(matches!(err, RegistryError::VersionConflict { .. }));
}

// ── Cycles ─────────────────────────────────────────────────────────────

#[test]
fn mutual_recursion_fails_with_unchecked_callee() {
    let reg = Registry::new();
    reg.register_global_function("Even", call("Odd", vec![]), vec![]).unwrap();
    reg.register_global_function("Odd", call("Even", vec![]), vec![]).unwrap();
    reg.register_global_function("Fine", Expr::bool(true), vec![]).unwrap();
    let checker = TypeChecker::new();

    let mut seen = Vec::new();
    let err = reg
        .rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
            seen.push(def.key.to_string());
            check(&reg, &checker, def)
        })
        .unwrap_err();

    assert_eq!(seen, vec!["_Fine", "_Even", "_Odd"]);
    assert_eq!(err.errors.len(), 2);
    for key in ["Even", "Odd"] {
        assert!(matches!(
            err.get(&global(key)),
            Some(TypeError::UncheckedCallee { .. })
        ));
    }
    assert!(reg.get(&global("Fine")).unwrap().is_typed());
    // The failed checks still recorded their edges.
    assert_eq!(reg.get(&global("Even")).unwrap().depends_on, vec![global("Odd")]);
}

#[test]
fn self_recursion_fails_with_unchecked_callee() {
    let reg = Registry::new();
    reg.register_global_function(
        "Loop",
        call("Loop", vec![Expr::ident("n")]),
        vec!["n".into()],
    )
    .unwrap();
    let checker = TypeChecker::new();
    let err = reg
        .rebuild(RebuildStrategy::Full, &InvalidationSet::new(), |def| {
            check(&reg, &checker, def)
        })
        .unwrap_err();
    assert!(err.to_string().contains("_Loop"));
}
