//! Algorithm J inference engine for contract expressions.
//!
//! Walks the expression AST, generates type constraints, and solves them via
//! unification. Implements Hindley-Milner type inference with:
//! - Let-polymorphism (generalize + instantiate)
//! - Occurs check (rejects infinite types)
//! - Level-based generalization (Remy's algorithm)
//! - Error provenance via ConstraintOrigin
//! - Registry calls resolved through [`RegistryInterface`], with dependency
//!   edges reported to an optional [`DependencyTracker`]
//!
//! All mutable inference state (the unification table, the scope, the
//! tracker) lives in a `Checker` created for one `check` call, so a single
//! `TypeChecker` can be shared freely.

use clause_common::ast::{
    BinaryOp, Binder, Call, CallTarget, CaseArm, Expr, ExprKind, UnaryOp,
};
use clause_common::{ScopeContext, Span};
use tracing::debug;

use crate::builtins;
use crate::env::TypeEnv;
use crate::error::{ConstraintOrigin, TypeError};
use crate::ty::{Canonicalizer, Scheme, Ty};
use crate::typed::{Callee, TypedBinder, TypedKind, TypedNode};
use crate::unify::InferCtx;
use crate::{DependencyTracker, NoRegistry, RegistryInterface};

static NO_REGISTRY: NoRegistry = NoRegistry;

/// Everything a single check needs from its surroundings.
#[derive(Clone, Copy)]
pub struct CheckSession<'a> {
    /// Resolves registry calls.
    pub registry: &'a dyn RegistryInterface,
    /// Scope the expression is written in.
    pub scope: &'a ScopeContext,
    /// Receives one edge per resolved registry call, if present.
    pub tracker: Option<&'a dyn DependencyTracker>,
    /// Identifier bound to `Any` for class-scoped expressions.
    pub self_name: Option<&'a str>,
}

impl<'a> CheckSession<'a> {
    /// A session with no registry and no tracker.
    pub fn standalone(scope: &'a ScopeContext) -> Self {
        CheckSession {
            registry: &NO_REGISTRY,
            scope,
            tracker: None,
            self_name: None,
        }
    }
}

/// The result of checking one expression body.
///
/// All types are fully resolved and their variables renumbered from `?0`.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckedDefinition {
    pub typed_body: TypedNode,
    pub parameters: Vec<Ty>,
    pub return_type: Ty,
}

impl CheckedDefinition {
    /// The closed signature callers instantiate: `(params) -> return`.
    pub fn signature(&self) -> Scheme {
        Scheme::closed(Ty::fun(self.parameters.clone(), self.return_type.clone()))
    }
}

/// Holds the root environment with every builtin.
pub struct TypeChecker {
    root: TypeEnv<'static>,
}

impl TypeChecker {
    pub fn new() -> Self {
        let mut root = TypeEnv::new();
        builtins::register_builtins(&mut root);
        TypeChecker { root }
    }

    /// Type-check `body` with `params` in scope.
    pub fn check(
        &self,
        body: &Expr,
        params: &[String],
        session: &CheckSession<'_>,
    ) -> Result<CheckedDefinition, TypeError> {
        let mut checker = Checker {
            ctx: InferCtx::new(),
            session,
        };

        let mut env = self.root.child();
        if let Some(name) = session.self_name {
            env.insert(name, Scheme::mono(Ty::Any));
        }
        let mut param_tys = Vec::with_capacity(params.len());
        for name in params {
            let ty = checker.ctx.fresh_var();
            env.insert(name.as_str(), Scheme::mono(ty.clone()));
            param_tys.push(ty);
        }

        let mut typed_body = checker.infer(body, &env)?;

        let mut canon = Canonicalizer::new();
        let ctx = &mut checker.ctx;
        let parameters: Vec<Ty> = param_tys
            .into_iter()
            .map(|ty| {
                let resolved = ctx.resolve(ty);
                canon.canonicalize(&resolved)
            })
            .collect();
        typed_body.map_types(&mut |ty: &Ty| {
            let resolved = ctx.resolve(ty.clone());
            canon.canonicalize(&resolved)
        });
        let return_type = typed_body.ty.clone();

        debug!(
            scope = %session.scope,
            ty = %Ty::fun(parameters.clone(), return_type.clone()),
            "expression checked"
        );

        Ok(CheckedDefinition {
            typed_body,
            parameters,
            return_type,
        })
    }

    /// Type-check a closed expression at global scope with no registry.
    pub fn check_standalone(&self, body: &Expr) -> Result<CheckedDefinition, TypeError> {
        let scope = ScopeContext::global();
        self.check(body, &[], &CheckSession::standalone(&scope))
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-check inference state.
struct Checker<'s> {
    ctx: InferCtx,
    session: &'s CheckSession<'s>,
}

fn node(kind: TypedKind, ty: Ty, span: Span) -> TypedNode {
    TypedNode { kind, ty, span }
}

impl Checker<'_> {
    // ── Expression Inference ────────────────────────────────────────────

    fn infer(&mut self, expr: &Expr, env: &TypeEnv<'_>) -> Result<TypedNode, TypeError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Bool(b) => Ok(node(TypedKind::Bool(*b), Ty::Boolean, span)),
            ExprKind::Number(n) => Ok(node(TypedKind::Number(*n), Ty::Number, span)),
            ExprKind::String(s) => Ok(node(TypedKind::String(s.clone()), Ty::String, span)),
            ExprKind::Identifier(name) => {
                let ty = match env.lookup(name) {
                    Some(scheme) => self.ctx.instantiate(scheme),
                    None => {
                        return Err(TypeError::UnboundVariable {
                            name: name.clone(),
                            span,
                        })
                    }
                };
                Ok(node(TypedKind::Identifier(name.clone()), ty, span))
            }
            ExprKind::Primed(inner) => {
                let inner = self.infer(inner, env)?;
                let ty = inner.ty.clone();
                Ok(node(TypedKind::Primed(Box::new(inner)), ty, span))
            }
            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(*op, lhs, rhs, span, env),
            ExprKind::Unary { op, operand } => self.infer_unary(*op, operand, span, env),
            ExprKind::SetLiteral(elems) => {
                let (elems, elem_ty) = self.infer_elements(elems, span, env)?;
                Ok(node(TypedKind::SetLiteral(elems), Ty::set(elem_ty), span))
            }
            ExprKind::TupleLiteral(elems) => {
                let (elems, elem_ty) = self.infer_elements(elems, span, env)?;
                Ok(node(TypedKind::TupleLiteral(elems), Ty::tuple(elem_ty), span))
            }
            ExprKind::BagLiteral(elems) => {
                let (elems, elem_ty) = self.infer_elements(elems, span, env)?;
                Ok(node(TypedKind::BagLiteral(elems), Ty::bag(elem_ty), span))
            }
            ExprKind::RecordLiteral(fields) => {
                let mut typed = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    typed.push((name.clone(), self.infer(value, env)?));
                }
                let ty = Ty::record(typed.iter().map(|(n, v)| (n.clone(), v.ty.clone())));
                Ok(node(TypedKind::RecordLiteral(typed), ty, span))
            }
            ExprKind::FieldAccess { base, field } => self.infer_field_access(base, field, span, env),
            ExprKind::TupleIndex { base, index } => {
                let base = self.infer(base, env)?;
                let index = self.infer(index, env)?;
                let origin = ConstraintOrigin::Index { span };
                self.ctx.unify(index.ty.clone(), Ty::Number, origin.clone())?;
                let elem = self.ctx.fresh_var();
                self.ctx.unify(base.ty.clone(), Ty::tuple(elem.clone()), origin)?;
                let kind = TypedKind::TupleIndex {
                    base: Box::new(base),
                    index: Box::new(index),
                };
                Ok(node(kind, elem, span))
            }
            ExprKind::Quantifier { kind, binder, body } => {
                let (binder, env) = self.infer_binder(binder, env)?;
                let body = self.infer_condition(body, &env)?;
                let kind = TypedKind::Quantifier {
                    kind: *kind,
                    binder,
                    body: Box::new(body),
                };
                Ok(node(kind, Ty::Boolean, span))
            }
            ExprKind::Choose { binder, predicate } => {
                let (binder, env) = self.infer_binder(binder, env)?;
                let predicate = self.infer_condition(predicate, &env)?;
                let ty = binder.ty.clone();
                let kind = TypedKind::Choose {
                    binder,
                    predicate: Box::new(predicate),
                };
                Ok(node(kind, ty, span))
            }
            ExprKind::SetFilter { binder, predicate } => {
                let (binder, env) = self.infer_binder(binder, env)?;
                let predicate = self.infer_condition(predicate, &env)?;
                let ty = Ty::set(binder.ty.clone());
                let kind = TypedKind::SetFilter {
                    binder,
                    predicate: Box::new(predicate),
                };
                Ok(node(kind, ty, span))
            }
            ExprKind::SetMap { body, binder } => {
                let (binder, env) = self.infer_binder(binder, env)?;
                let body = self.infer(body, &env)?;
                let ty = Ty::set(body.ty.clone());
                let kind = TypedKind::SetMap {
                    body: Box::new(body),
                    binder,
                };
                Ok(node(kind, ty, span))
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.infer_condition(cond, env)?;
                let then_branch = self.infer(then_branch, env)?;
                let else_branch = self.infer(else_branch, env)?;
                let origin = ConstraintOrigin::IfBranches {
                    if_span: span,
                    then_span: then_branch.span,
                    else_span: else_branch.span,
                };
                self.ctx
                    .unify(then_branch.ty.clone(), else_branch.ty.clone(), origin)?;
                let ty = then_branch.ty.clone();
                let kind = TypedKind::If {
                    cond: Box::new(cond),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                };
                Ok(node(kind, ty, span))
            }
            ExprKind::Case { arms, other } => self.infer_case(arms, other.as_deref(), span, env),
            ExprKind::Let { name, value, body } => {
                self.ctx.enter_level();
                let value = self.infer(value, env)?;
                self.ctx.leave_level();
                let scheme = self.ctx.generalize(value.ty.clone());

                let mut inner = env.child();
                inner.insert(name.as_str(), scheme);
                let body = self.infer(body, &inner)?;
                let ty = body.ty.clone();
                let kind = TypedKind::Let {
                    name: name.clone(),
                    value: Box::new(value),
                    body: Box::new(body),
                };
                Ok(node(kind, ty, span))
            }
            ExprKind::Lambda { params, body } => {
                let mut inner = env.child();
                let mut param_tys = Vec::with_capacity(params.len());
                for name in params {
                    let ty = self.ctx.fresh_var();
                    inner.insert(name.as_str(), Scheme::mono(ty.clone()));
                    param_tys.push(ty);
                }
                let body = self.infer(body, &inner)?;
                let ty = Ty::fun(param_tys, body.ty.clone());
                let kind = TypedKind::Lambda {
                    params: params.clone(),
                    body: Box::new(body),
                };
                Ok(node(kind, ty, span))
            }
            ExprKind::Call(call) => self.infer_call(call, span, env),
        }
    }

    /// Infer `expr` and require it to be Boolean.
    fn infer_condition(&mut self, expr: &Expr, env: &TypeEnv<'_>) -> Result<TypedNode, TypeError> {
        let typed = self.infer(expr, env)?;
        self.ctx.unify(
            Ty::Boolean,
            typed.ty.clone(),
            ConstraintOrigin::Condition { span: expr.span },
        )?;
        Ok(typed)
    }

    fn infer_elements(
        &mut self,
        elems: &[Expr],
        literal_span: Span,
        env: &TypeEnv<'_>,
    ) -> Result<(Vec<TypedNode>, Ty), TypeError> {
        let elem_ty = self.ctx.fresh_var();
        let mut typed = Vec::with_capacity(elems.len());
        for elem in elems {
            let t = self.infer(elem, env)?;
            let origin = ConstraintOrigin::Element {
                literal_span,
                elem_span: elem.span,
            };
            self.ctx.unify(elem_ty.clone(), t.ty.clone(), origin)?;
            typed.push(t);
        }
        Ok((typed, elem_ty))
    }

    /// Infer a binder's domain as `Set[a]` and return a child environment
    /// with the bound name at type `a`.
    fn infer_binder<'e>(
        &mut self,
        binder: &Binder,
        env: &'e TypeEnv<'e>,
    ) -> Result<(TypedBinder, TypeEnv<'e>), TypeError> {
        let domain = self.infer(&binder.domain, env)?;
        let elem = self.ctx.fresh_var();
        self.ctx.unify(
            Ty::set(elem.clone()),
            domain.ty.clone(),
            ConstraintOrigin::BinderDomain {
                span: binder.domain.span,
            },
        )?;
        let mut inner = env.child();
        inner.insert(binder.name.as_str(), Scheme::mono(elem.clone()));
        let typed = TypedBinder {
            name: binder.name.clone(),
            ty: elem,
            domain: Box::new(domain),
        };
        Ok((typed, inner))
    }

    // ── Operators ───────────────────────────────────────────────────────

    fn infer_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
        env: &TypeEnv<'_>,
    ) -> Result<TypedNode, TypeError> {
        let lhs = self.infer(lhs, env)?;
        let rhs = self.infer(rhs, env)?;
        let origin = ConstraintOrigin::BinOp { op_span: span };
        let (l, r) = (lhs.ty.clone(), rhs.ty.clone());

        let ty = match op {
            BinaryOp::And | BinaryOp::Or | BinaryOp::Implies | BinaryOp::Equiv => {
                self.ctx.unify(Ty::Boolean, l, origin.clone())?;
                self.ctx.unify(Ty::Boolean, r, origin)?;
                Ty::Boolean
            }
            BinaryOp::Eq | BinaryOp::NotEq => {
                self.ctx.unify(l, r, origin)?;
                Ty::Boolean
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                self.ctx.unify(Ty::Number, l, origin.clone())?;
                self.ctx.unify(Ty::Number, r, origin)?;
                Ty::Boolean
            }
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Pow => {
                self.ctx.unify(Ty::Number, l, origin.clone())?;
                self.ctx.unify(Ty::Number, r, origin)?;
                Ty::Number
            }
            BinaryOp::In | BinaryOp::NotIn => {
                self.ctx.unify(Ty::set(l), r, origin)?;
                Ty::Boolean
            }
            BinaryOp::Union | BinaryOp::Intersect | BinaryOp::Difference => {
                let set = Ty::set(self.ctx.fresh_var());
                self.ctx.unify(set.clone(), l, origin.clone())?;
                self.ctx.unify(set.clone(), r, origin)?;
                set
            }
            BinaryOp::SubsetEq => {
                let set = Ty::set(self.ctx.fresh_var());
                self.ctx.unify(set.clone(), l, origin.clone())?;
                self.ctx.unify(set, r, origin)?;
                Ty::Boolean
            }
            BinaryOp::Concat => {
                let seq = Ty::tuple(self.ctx.fresh_var());
                self.ctx.unify(seq.clone(), l, origin.clone())?;
                self.ctx.unify(seq.clone(), r, origin)?;
                seq
            }
            BinaryOp::Range => {
                self.ctx.unify(Ty::Number, l, origin.clone())?;
                self.ctx.unify(Ty::Number, r, origin)?;
                Ty::set(Ty::Number)
            }
        };

        let kind = TypedKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
        Ok(node(kind, ty, span))
    }

    fn infer_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        span: Span,
        env: &TypeEnv<'_>,
    ) -> Result<TypedNode, TypeError> {
        let operand = self.infer(operand, env)?;
        let origin = ConstraintOrigin::UnaryOp { op_span: span };
        let t = operand.ty.clone();

        let ty = match op {
            UnaryOp::Not => {
                self.ctx.unify(Ty::Boolean, t, origin)?;
                Ty::Boolean
            }
            UnaryOp::Neg => {
                self.ctx.unify(Ty::Number, t, origin)?;
                Ty::Number
            }
            UnaryOp::Domain => {
                let scheme = env.lookup(builtins::DOMAIN).ok_or_else(|| {
                    TypeError::UnknownBuiltin {
                        name: builtins::DOMAIN.to_string(),
                        span,
                    }
                })?;
                let ret = self.ctx.fresh_var();
                let expected = Ty::fun(vec![t], ret.clone());
                let sig = self.ctx.instantiate(scheme);
                self.ctx.unify(sig, expected, origin)?;
                ret
            }
            UnaryOp::BigUnion => {
                let elem = self.ctx.fresh_var();
                self.ctx.unify(Ty::set(Ty::set(elem.clone())), t, origin)?;
                Ty::set(elem)
            }
            UnaryOp::Powerset => {
                let set = Ty::set(self.ctx.fresh_var());
                self.ctx.unify(set.clone(), t, origin)?;
                Ty::set(set)
            }
        };

        let kind = TypedKind::Unary {
            op,
            operand: Box::new(operand),
        };
        Ok(node(kind, ty, span))
    }

    // ── Field Access ────────────────────────────────────────────────────

    /// Field access on a known record must name one of its fields. A base
    /// of unknown shape (an unbound variable or `Any`, such as `self`)
    /// yields `Any`: records are structural and closed, so the full field
    /// set cannot be guessed from one access.
    fn infer_field_access(
        &mut self,
        base: &Expr,
        field: &str,
        span: Span,
        env: &TypeEnv<'_>,
    ) -> Result<TypedNode, TypeError> {
        let base = self.infer(base, env)?;
        let ty = match self.ctx.resolve(base.ty.clone()) {
            Ty::Record(fields) => match fields.get(field) {
                Some(ty) => ty.clone(),
                None => {
                    return Err(TypeError::NoSuchField {
                        ty: Ty::Record(fields),
                        field: field.to_string(),
                        span,
                    })
                }
            },
            Ty::Var(_) | Ty::Any => Ty::Any,
            other => {
                return Err(TypeError::NoSuchField {
                    ty: other,
                    field: field.to_string(),
                    span,
                })
            }
        };
        let kind = TypedKind::FieldAccess {
            base: Box::new(base),
            field: field.to_string(),
        };
        Ok(node(kind, ty, span))
    }

    // ── Case ────────────────────────────────────────────────────────────

    fn infer_case(
        &mut self,
        arms: &[CaseArm],
        other: Option<&Expr>,
        span: Span,
        env: &TypeEnv<'_>,
    ) -> Result<TypedNode, TypeError> {
        let result = self.ctx.fresh_var();
        let mut typed_arms = Vec::with_capacity(arms.len());
        for arm in arms {
            let cond = self.infer_condition(&arm.condition, env)?;
            let body = self.infer(&arm.body, env)?;
            let origin = ConstraintOrigin::CaseBranch {
                case_span: span,
                arm_span: body.span,
            };
            self.ctx.unify(result.clone(), body.ty.clone(), origin)?;
            typed_arms.push((cond, body));
        }
        let other = match other {
            Some(default) => {
                let body = self.infer(default, env)?;
                let origin = ConstraintOrigin::CaseBranch {
                    case_span: span,
                    arm_span: body.span,
                };
                self.ctx.unify(result.clone(), body.ty.clone(), origin)?;
                Some(Box::new(body))
            }
            None => None,
        };
        let kind = TypedKind::Case {
            arms: typed_arms,
            other,
        };
        Ok(node(kind, result, span))
    }

    // ── Calls ───────────────────────────────────────────────────────────

    fn infer_call(
        &mut self,
        call: &Call,
        span: Span,
        env: &TypeEnv<'_>,
    ) -> Result<TypedNode, TypeError> {
        let (callee, scheme) = match &call.target {
            CallTarget::Builtin { module, name } => {
                let key = builtins::builtin_key(module, name);
                let scheme = env
                    .lookup(&key)
                    .cloned()
                    .ok_or_else(|| TypeError::UnknownBuiltin {
                        name: key.clone(),
                        span,
                    })?;
                (Callee::Builtin(key), scheme)
            }
            CallTarget::Global { .. } | CallTarget::Class { .. } => {
                let resolved = self
                    .session
                    .registry
                    .resolve_call(&call.target, self.session.scope)
                    .map_err(|error| TypeError::Resolution {
                        call: call.target.clone(),
                        error,
                        span,
                    })?;
                if let Some(tracker) = self.session.tracker {
                    tracker.record_dependency(&resolved.key);
                }
                let scheme = resolved.signature.ok_or_else(|| TypeError::UncheckedCallee {
                    key: resolved.key.clone(),
                    span,
                })?;
                (Callee::Definition(resolved.key), scheme)
            }
        };

        let (params, ret) = match self.ctx.instantiate(&scheme) {
            Ty::Fun(params, ret) => (params, *ret),
            // A non-function signature is a zero-argument definition.
            other => (Vec::new(), other),
        };
        if params.len() != call.args.len() {
            return Err(TypeError::ArityMismatch {
                expected: params.len(),
                found: call.args.len(),
                origin: ConstraintOrigin::FnArg {
                    call_site: span,
                    param_idx: 0,
                },
            });
        }

        let mut args = Vec::with_capacity(call.args.len());
        for (idx, (arg, param)) in call.args.iter().zip(params).enumerate() {
            let typed = self.infer(arg, env)?;
            let origin = ConstraintOrigin::FnArg {
                call_site: arg.span,
                param_idx: idx,
            };
            self.ctx.unify(param, typed.ty.clone(), origin)?;
            args.push(typed);
        }

        Ok(node(TypedKind::Call { callee, args }, ret, span))
    }
}
