//! Unification engine for Hindley-Milner type inference.
//!
//! Implements the core unification algorithm using `ena`'s union-find table.
//! Supports occurs check (infinite type detection), level-based generalization,
//! and scheme instantiation.
//!
//! An `InferCtx` is created per check and dropped afterwards, so the running
//! substitution never outlives one inference pass.

use ena::unify::InPlaceUnificationTable;
use rustc_hash::FxHashMap;

use crate::error::{ConstraintOrigin, TypeError};
use crate::ty::{Scheme, Ty, TyVar};

/// The inference context: owns the unification table and level state.
pub struct InferCtx {
    /// The union-find unification table (ena).
    table: InPlaceUnificationTable<TyVar>,
    /// Current let-nesting level for generalization.
    current_level: u32,
    /// Level at which each type variable was created. Indexed by `TyVar.0`.
    var_levels: Vec<u32>,
    /// Number of variable bindings made so far.
    bindings: usize,
}

impl InferCtx {
    /// Create a new, empty inference context.
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
            current_level: 0,
            var_levels: Vec::new(),
            bindings: 0,
        }
    }

    // ── Type Variable Creation ──────────────────────────────────────────

    /// Create a fresh type variable at the current level.
    pub fn fresh_var(&mut self) -> Ty {
        let var = self.table.new_key(None);
        while self.var_levels.len() <= var.0 as usize {
            self.var_levels.push(0);
        }
        self.var_levels[var.0 as usize] = self.current_level;
        Ty::Var(var)
    }

    /// How many variable bindings unification has made. Unifying two types
    /// that are already equal never increases this.
    pub fn binding_count(&self) -> usize {
        self.bindings
    }

    // ── Resolution ──────────────────────────────────────────────────────

    /// Resolve a type by following union-find indirection.
    ///
    /// Bound variables are chased through every link of the chain until a
    /// non-variable or an unbound variable is reached, and compound types
    /// are resolved component-wise.
    pub fn resolve(&mut self, ty: Ty) -> Ty {
        match ty {
            Ty::Var(v) => match self.table.probe_value(v) {
                Some(inner) => self.resolve(inner),
                // Normalize to the root key so that variables in the same
                // equivalence class resolve to the same representative.
                None => Ty::Var(self.table.find(v)),
            },
            Ty::Set(inner) => Ty::set(self.resolve(*inner)),
            Ty::Tuple(inner) => Ty::tuple(self.resolve(*inner)),
            Ty::Bag(inner) => Ty::bag(self.resolve(*inner)),
            Ty::Record(fields) => Ty::Record(
                fields
                    .into_iter()
                    .map(|(name, ty)| (name, self.resolve(ty)))
                    .collect(),
            ),
            Ty::Fun(params, ret) => {
                let params = params.into_iter().map(|p| self.resolve(p)).collect();
                let ret = self.resolve(*ret);
                Ty::fun(params, ret)
            }
            other => other,
        }
    }

    // ── Occurs Check ────────────────────────────────────────────────────

    /// Check if a type variable occurs anywhere within a type, directly or
    /// through bound variables.
    pub fn occurs_in(&mut self, var: TyVar, ty: &Ty) -> bool {
        match ty {
            Ty::Var(v) => {
                if self.table.find(*v) == self.table.find(var) {
                    return true;
                }
                match self.table.probe_value(*v) {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Ty::Boolean | Ty::Number | Ty::String | Ty::Any => false,
            Ty::Set(inner) | Ty::Tuple(inner) | Ty::Bag(inner) => self.occurs_in(var, inner),
            Ty::Record(fields) => fields.values().any(|t| self.occurs_in(var, t)),
            Ty::Fun(params, ret) => {
                params.iter().any(|p| self.occurs_in(var, p)) || self.occurs_in(var, ret)
            }
        }
    }

    // ── Unification ─────────────────────────────────────────────────────

    /// Unify two types, making them equal.
    ///
    /// Both types are first resolved through the union-find table, then
    /// structurally compared.
    pub fn unify(&mut self, a: Ty, b: Ty, origin: ConstraintOrigin) -> Result<(), TypeError> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        match (a, b) {
            (Ty::Any, _) | (_, Ty::Any) => Ok(()),

            (Ty::Var(v1), Ty::Var(v2)) if v1 == v2 => Ok(()),

            (Ty::Var(v1), Ty::Var(v2)) => {
                let level = self.level_of(v1).min(self.level_of(v2));
                if self.table.unify_var_var(v1, v2).is_err() {
                    return Err(TypeError::Mismatch {
                        expected: Ty::Var(v1),
                        found: Ty::Var(v2),
                        origin,
                    });
                }
                let root = self.table.find(v1);
                self.set_level(root, level);
                self.bindings += 1;
                Ok(())
            }

            (Ty::Var(v), ty) | (ty, Ty::Var(v)) => {
                if self.occurs_in(v, &ty) {
                    return Err(TypeError::InfiniteType { var: v, ty, origin });
                }
                // Variables inside `ty` now escape to `v`'s level.
                let level = self.level_of(v);
                self.lower_levels(&ty, level);
                if let Err((expected, found)) = self.table.unify_var_value(v, Some(ty)) {
                    return Err(TypeError::Mismatch {
                        expected,
                        found,
                        origin,
                    });
                }
                self.bindings += 1;
                Ok(())
            }

            (Ty::Boolean, Ty::Boolean) | (Ty::Number, Ty::Number) | (Ty::String, Ty::String) => {
                Ok(())
            }

            (Ty::Set(x), Ty::Set(y)) | (Ty::Tuple(x), Ty::Tuple(y)) | (Ty::Bag(x), Ty::Bag(y)) => {
                self.unify(*x, *y, origin)
            }

            (Ty::Record(f1), Ty::Record(f2)) => {
                if !f1.keys().eq(f2.keys()) {
                    return Err(TypeError::RecordFieldMismatch {
                        expected: f1.keys().cloned().collect(),
                        found: f2.keys().cloned().collect(),
                        origin,
                    });
                }
                for ((_, a), (_, b)) in f1.into_iter().zip(f2) {
                    self.unify(a, b, origin.clone())?;
                }
                Ok(())
            }

            (Ty::Fun(p1, r1), Ty::Fun(p2, r2)) => {
                if p1.len() != p2.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: p1.len(),
                        found: p2.len(),
                        origin,
                    });
                }
                for (a, b) in p1.into_iter().zip(p2) {
                    self.unify(a, b, origin.clone())?;
                }
                self.unify(*r1, *r2, origin)
            }

            (expected, found) => Err(TypeError::Mismatch {
                expected,
                found,
                origin,
            }),
        }
    }

    // ── Level Management ────────────────────────────────────────────────

    /// Enter a new let-binding level (increases nesting depth).
    pub fn enter_level(&mut self) {
        self.current_level += 1;
    }

    /// Leave the current let-binding level (decreases nesting depth).
    pub fn leave_level(&mut self) {
        debug_assert!(self.current_level > 0, "cannot leave level 0");
        self.current_level = self.current_level.saturating_sub(1);
    }

    /// Current nesting level.
    pub fn current_level(&self) -> u32 {
        self.current_level
    }

    fn level_of(&mut self, var: TyVar) -> u32 {
        let root = self.table.find(var);
        self.var_levels
            .get(root.0 as usize)
            .copied()
            .unwrap_or(0)
    }

    fn set_level(&mut self, var: TyVar, level: u32) {
        if let Some(slot) = self.var_levels.get_mut(var.0 as usize) {
            *slot = level;
        }
    }

    fn lower_levels(&mut self, ty: &Ty, level: u32) {
        for v in ty.free_vars() {
            let root = self.table.find(v);
            if self.level_of(root) > level {
                self.set_level(root, level);
            }
        }
    }

    // ── Generalization ──────────────────────────────────────────────────

    /// Generalize a type into a polymorphic scheme.
    ///
    /// Quantifies every unbound variable in `ty` whose level is strictly
    /// greater than `current_level`: those were introduced inside the
    /// binding being generalized and escape nowhere else.
    pub fn generalize(&mut self, ty: Ty) -> Scheme {
        let resolved = self.resolve(ty);
        let current = self.current_level;
        let vars = resolved
            .free_vars()
            .into_iter()
            .filter(|v| self.level_of(*v) > current)
            .collect();
        Scheme {
            vars,
            ty: resolved,
        }
    }

    // ── Instantiation ───────────────────────────────────────────────────

    /// Instantiate a polymorphic scheme with fresh type variables.
    pub fn instantiate(&mut self, scheme: &Scheme) -> Ty {
        if scheme.vars.is_empty() {
            return scheme.ty.clone();
        }

        let substitution: FxHashMap<TyVar, Ty> = scheme
            .vars
            .iter()
            .map(|v| (*v, self.fresh_var()))
            .collect();

        self.apply_substitution(&scheme.ty, &substitution)
    }

    /// Apply a substitution map to a type.
    fn apply_substitution(&mut self, ty: &Ty, subst: &FxHashMap<TyVar, Ty>) -> Ty {
        match ty {
            Ty::Var(v) => match subst.get(v) {
                Some(replacement) => replacement.clone(),
                None => match self.table.probe_value(*v) {
                    Some(inner) => self.apply_substitution(&inner, subst),
                    None => ty.clone(),
                },
            },
            Ty::Boolean | Ty::Number | Ty::String | Ty::Any => ty.clone(),
            Ty::Set(inner) => Ty::set(self.apply_substitution(inner, subst)),
            Ty::Tuple(inner) => Ty::tuple(self.apply_substitution(inner, subst)),
            Ty::Bag(inner) => Ty::bag(self.apply_substitution(inner, subst)),
            Ty::Record(fields) => Ty::Record(
                fields
                    .iter()
                    .map(|(name, t)| (name.clone(), self.apply_substitution(t, subst)))
                    .collect(),
            ),
            Ty::Fun(params, ret) => {
                let params = params
                    .iter()
                    .map(|p| self.apply_substitution(p, subst))
                    .collect();
                let ret = self.apply_substitution(ret, subst);
                Ty::fun(params, ret)
            }
        }
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
