//! Built-in function signatures.
//!
//! Builtins are called as `_Module!Name(...)` and are stored in the root
//! environment under that same spelling. Each signature is a closed
//! polymorphic scheme over the canonical variables `?0`, `?1`, so every use
//! site instantiates it independently.

use crate::env::TypeEnv;
use crate::ty::{Scheme, Ty, TyVar};

/// Environment name of the generic `DOMAIN f` operator.
pub const DOMAIN: &str = "DOMAIN";

/// Environment key for a `_Module!Name` builtin call.
pub fn builtin_key(module: &str, name: &str) -> String {
    format!("_{}!{}", module, name)
}

fn a() -> Ty {
    Ty::Var(TyVar(0))
}

fn b() -> Ty {
    Ty::Var(TyVar(1))
}

fn fun(params: Vec<Ty>, ret: Ty) -> Scheme {
    Scheme::closed(Ty::fun(params, ret))
}

/// Every builtin as `(environment key, scheme)`.
pub fn builtin_signatures() -> Vec<(String, Scheme)> {
    let seq = || Ty::tuple(a());
    let bag = || Ty::bag(a());

    let table: Vec<(&str, &str, Scheme)> = vec![
        // ── Sequences ───────────────────────────────────────────────
        ("Seq", "Head", fun(vec![seq()], a())),
        ("Seq", "Tail", fun(vec![seq()], seq())),
        ("Seq", "Append", fun(vec![seq(), a()], seq())),
        ("Seq", "Len", fun(vec![seq()], Ty::Number)),
        (
            "Seq",
            "SubSeq",
            fun(vec![seq(), Ty::Number, Ty::Number], seq()),
        ),
        ("Seq", "Concat", fun(vec![seq(), seq()], seq())),
        (
            "Seq",
            "SelectSeq",
            fun(vec![seq(), Ty::fun(vec![a()], Ty::Boolean)], seq()),
        ),
        // ── Bags ────────────────────────────────────────────────────
        ("Bags", "SetToBag", fun(vec![Ty::set(a())], bag())),
        ("Bags", "BagToSet", fun(vec![bag()], Ty::set(a()))),
        ("Bags", "BagIn", fun(vec![a(), bag()], Ty::Boolean)),
        ("Bags", "CopiesIn", fun(vec![a(), bag()], Ty::Number)),
        ("Bags", "BagCardinality", fun(vec![bag()], Ty::Number)),
        ("Bags", "EmptyBag", fun(vec![], bag())),
        // ── Finite sets ─────────────────────────────────────────────
        (
            "FiniteSets",
            "Cardinality",
            fun(vec![Ty::set(a())], Ty::Number),
        ),
        (
            "FiniteSets",
            "IsFiniteSet",
            fun(vec![Ty::set(a())], Ty::Boolean),
        ),
        ("FiniteSets", "Choose", fun(vec![Ty::set(a())], a())),
        // ── Printing and assertions ─────────────────────────────────
        ("TLC", "Print", fun(vec![a(), b()], b())),
        ("TLC", "PrintT", fun(vec![a()], Ty::Boolean)),
        (
            "TLC",
            "Assert",
            fun(vec![Ty::Boolean, Ty::String], Ty::Boolean),
        ),
        ("TLC", "ToString", fun(vec![a()], Ty::String)),
        // ── Math ────────────────────────────────────────────────────
        (
            "Math",
            "Min",
            fun(vec![Ty::Number, Ty::Number], Ty::Number),
        ),
        (
            "Math",
            "Max",
            fun(vec![Ty::Number, Ty::Number], Ty::Number),
        ),
        ("Math", "Abs", fun(vec![Ty::Number], Ty::Number)),
        // ── Strings ─────────────────────────────────────────────────
        ("Strings", "Len", fun(vec![Ty::String], Ty::Number)),
        (
            "Strings",
            "SubString",
            fun(vec![Ty::String, Ty::Number, Ty::Number], Ty::String),
        ),
    ];

    let mut out: Vec<(String, Scheme)> = table
        .into_iter()
        .map(|(module, name, scheme)| (builtin_key(module, name), scheme))
        .collect();
    // DOMAIN f: the domain of a function or record, as a set of keys.
    out.push((DOMAIN.to_string(), fun(vec![a()], Ty::set(b()))));
    out
}

/// Seed every builtin into `env`.
pub fn register_builtins(env: &mut TypeEnv<'_>) {
    for (name, scheme) in builtin_signatures() {
        env.insert(name, scheme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_closed_schemes() {
        for (name, scheme) in builtin_signatures() {
            assert_eq!(
                scheme.vars,
                scheme.ty.free_vars(),
                "{} must quantify all of its variables",
                name
            );
            assert!(matches!(scheme.ty, Ty::Fun(..)), "{} is not a function", name);
        }
    }

    #[test]
    fn register_seeds_environment() {
        let mut env = TypeEnv::new();
        register_builtins(&mut env);

        let head = env.lookup("_Seq!Head").unwrap();
        insta::assert_snapshot!(head.to_string(), @"forall ?0. (Tuple[?0]) -> ?0");
        let select = env.lookup("_Seq!SelectSeq").unwrap();
        insta::assert_snapshot!(
            select.to_string(),
            @"forall ?0. (Tuple[?0], (?0) -> Boolean) -> Tuple[?0]"
        );
        assert!(env.lookup(DOMAIN).is_some());
        assert!(env.lookup("_Seq!Nope").is_none());
    }

    #[test]
    fn same_name_in_different_modules() {
        let mut env = TypeEnv::new();
        register_builtins(&mut env);
        let seq_len = env.lookup("_Seq!Len").unwrap();
        let str_len = env.lookup("_Strings!Len").unwrap();
        assert_ne!(seq_len, str_len);
    }
}
