//! Type representation for contract expressions.
//!
//! Defines the closed `Ty` sum, type variables (`TyVar`), and polymorphic
//! type schemes (`Scheme`). These form the algebra the unifier works over.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

/// A type variable, identified by a `u32` index into the unification table.
///
/// Type variables are created during inference and unified with concrete types
/// or other variables. The `ena` crate handles the union-find mechanics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TyVar(pub u32);

/// A type of the expression language.
///
/// `Tuple` is the homogeneous sequence type: `<<1, 2, 3>>` is `Tuple[Number]`.
/// `Record` is structural: two records unify only when their field-name sets
/// are identical.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    /// A type variable (unresolved during inference).
    Var(TyVar),
    Boolean,
    Number,
    String,
    Set(Box<Ty>),
    Tuple(Box<Ty>),
    Bag(Box<Ty>),
    Record(BTreeMap<String, Ty>),
    /// A function type: `(param_types) -> return_type`.
    Fun(Vec<Ty>, Box<Ty>),
    /// Unifies with everything without binding anything.
    Any,
}

impl Ty {
    pub fn set(elem: Ty) -> Ty {
        Ty::Set(Box::new(elem))
    }

    pub fn tuple(elem: Ty) -> Ty {
        Ty::Tuple(Box::new(elem))
    }

    pub fn bag(elem: Ty) -> Ty {
        Ty::Bag(Box::new(elem))
    }

    pub fn record<I, S>(fields: I) -> Ty
    where
        I: IntoIterator<Item = (S, Ty)>,
        S: Into<String>,
    {
        Ty::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Create a function type.
    pub fn fun(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fun(params, Box::new(ret))
    }

    /// Whether the type mentions no type variables.
    pub fn is_ground(&self) -> bool {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars.is_empty()
    }

    /// Type variables in order of first appearance, without duplicates.
    pub fn free_vars(&self) -> Vec<TyVar> {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, out: &mut Vec<TyVar>) {
        match self {
            Ty::Var(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Ty::Boolean | Ty::Number | Ty::String | Ty::Any => {}
            Ty::Set(inner) | Ty::Tuple(inner) | Ty::Bag(inner) => inner.collect_vars(out),
            Ty::Record(fields) => {
                for ty in fields.values() {
                    ty.collect_vars(out);
                }
            }
            Ty::Fun(params, ret) => {
                for p in params {
                    p.collect_vars(out);
                }
                ret.collect_vars(out);
            }
        }
    }

    /// Replace variables according to `map`; unmapped variables are kept.
    pub fn rename_vars(&self, map: &FxHashMap<TyVar, TyVar>) -> Ty {
        match self {
            Ty::Var(v) => Ty::Var(map.get(v).copied().unwrap_or(*v)),
            Ty::Boolean | Ty::Number | Ty::String | Ty::Any => self.clone(),
            Ty::Set(inner) => Ty::set(inner.rename_vars(map)),
            Ty::Tuple(inner) => Ty::tuple(inner.rename_vars(map)),
            Ty::Bag(inner) => Ty::bag(inner.rename_vars(map)),
            Ty::Record(fields) => Ty::Record(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.rename_vars(map)))
                    .collect(),
            ),
            Ty::Fun(params, ret) => Ty::fun(
                params.iter().map(|p| p.rename_vars(map)).collect(),
                ret.rename_vars(map),
            ),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Ty]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Var(v) => write!(f, "?{}", v.0),
            Ty::Boolean => write!(f, "Boolean"),
            Ty::Number => write!(f, "Number"),
            Ty::String => write!(f, "String"),
            Ty::Set(inner) => write!(f, "Set[{}]", inner),
            Ty::Tuple(inner) => write!(f, "Tuple[{}]", inner),
            Ty::Bag(inner) => write!(f, "Bag[{}]", inner),
            Ty::Record(fields) => {
                write!(f, "[")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "]")
            }
            Ty::Fun(params, ret) => {
                write!(f, "(")?;
                write_list(f, params)?;
                write!(f, ") -> {}", ret)
            }
            Ty::Any => write!(f, "Any"),
        }
    }
}

/// A polymorphic type scheme: a type with universally quantified variables.
///
/// For example, sequence head is `forall a. (Tuple[a]) -> a`, represented as
/// `Scheme { vars: [a], ty: Fun([Tuple(Var(a))], Var(a)) }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scheme {
    /// The quantified (generic) type variables.
    pub vars: Vec<TyVar>,
    /// The underlying type (may reference vars).
    pub ty: Ty,
}

impl Scheme {
    /// Create a monomorphic scheme (no quantified variables).
    pub fn mono(ty: Ty) -> Self {
        Scheme {
            vars: Vec::new(),
            ty,
        }
    }

    /// Quantify over every variable in `ty`.
    ///
    /// Only valid for types whose variables belong to no live inference
    /// context, such as builtin signatures and canonicalized definition
    /// signatures.
    pub fn closed(ty: Ty) -> Self {
        Scheme {
            vars: ty.free_vars(),
            ty,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.vars.is_empty() {
            write!(f, "forall")?;
            for v in &self.vars {
                write!(f, " ?{}", v.0)?;
            }
            write!(f, ". ")?;
        }
        write!(f, "{}", self.ty)
    }
}

/// Renumbers type variables from zero in order of first appearance, so
/// types produced by different inference contexts print and compare the
/// same way.
#[derive(Debug, Default)]
pub struct Canonicalizer {
    map: FxHashMap<TyVar, TyVar>,
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canonicalize(&mut self, ty: &Ty) -> Ty {
        for v in ty.free_vars() {
            let next = TyVar(self.map.len() as u32);
            self.map.entry(v).or_insert(next);
        }
        ty.rename_vars(&self.map)
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Ty>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Ty {}
