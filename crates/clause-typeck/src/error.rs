//! Type error types with provenance tracking.
//!
//! Every unification failure carries a `ConstraintOrigin` that records which
//! node generated the constraint, so diagnostics can point at the offending
//! sub-expression of a contract.

use clause_common::ast::CallTarget;
use clause_common::{DefinitionKey, ScopeError, Span};

use crate::ty::{Ty, TyVar};

/// The origin of a type constraint: where in the expression did we decide
/// these two types should be equal?
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintOrigin {
    /// From a call argument: `f(x)` where x's type must match the parameter.
    FnArg { call_site: Span, param_idx: usize },
    /// From a binary operator: `a + b`.
    BinOp { op_span: Span },
    /// From a unary operator: `~a`, `DOMAIN f`.
    UnaryOp { op_span: Span },
    /// From IF/THEN/ELSE: both branches must have the same type.
    IfBranches {
        if_span: Span,
        then_span: Span,
        else_span: Span,
    },
    /// From a CASE arm or the OTHER branch.
    CaseBranch { case_span: Span, arm_span: Span },
    /// A condition, predicate or quantifier body that must be Boolean.
    Condition { span: Span },
    /// An element of a set/tuple/bag literal.
    Element { literal_span: Span, elem_span: Span },
    /// The domain of a quantifier, filter, map or CHOOSE must be a set.
    BinderDomain { span: Span },
    /// Indexing `base[index]`.
    Index { span: Span },
    /// Synthetic origin for constraints with no source node.
    Builtin,
}

impl ConstraintOrigin {
    /// The primary span of the constraint, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            ConstraintOrigin::FnArg { call_site, .. } => Some(*call_site),
            ConstraintOrigin::BinOp { op_span } | ConstraintOrigin::UnaryOp { op_span } => {
                Some(*op_span)
            }
            ConstraintOrigin::IfBranches { if_span, .. } => Some(*if_span),
            ConstraintOrigin::CaseBranch { arm_span, .. } => Some(*arm_span),
            ConstraintOrigin::Condition { span }
            | ConstraintOrigin::BinderDomain { span }
            | ConstraintOrigin::Index { span } => Some(*span),
            ConstraintOrigin::Element { elem_span, .. } => Some(*elem_span),
            ConstraintOrigin::Builtin => None,
        }
    }
}

/// A type error encountered during type checking.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TypeError {
    /// Two types that should be equal are not.
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    Mismatch {
        expected: Ty,
        found: Ty,
        origin: ConstraintOrigin,
    },
    /// A type variable appears in its own definition (infinite type).
    ///
    /// Example: unifying `a` with `Set[a]`.
    #[error("infinite type: `?{}` occurs in `{ty}`", .var.0)]
    InfiniteType {
        var: TyVar,
        ty: Ty,
        origin: ConstraintOrigin,
    },
    /// Function types or calls with different parameter counts.
    #[error("arity mismatch: expected {expected} arguments, found {found}")]
    ArityMismatch {
        expected: usize,
        found: usize,
        origin: ConstraintOrigin,
    },
    /// Two record types with different field-name sets.
    #[error(
        "record mismatch: expected fields [{}], found [{}]",
        .expected.join(", "),
        .found.join(", ")
    )]
    RecordFieldMismatch {
        expected: Vec<String>,
        found: Vec<String>,
        origin: ConstraintOrigin,
    },
    /// An identifier that is not in the type environment.
    #[error("unbound variable `{name}`")]
    UnboundVariable { name: String, span: Span },
    /// A field access on a type with no such field.
    #[error("type `{ty}` has no field `{field}`")]
    NoSuchField { ty: Ty, field: String, span: Span },
    /// A `_Module!Name` call to a builtin that does not exist.
    #[error("unknown builtin `{name}`")]
    UnknownBuiltin { name: String, span: Span },
    /// A registry call that could not be resolved to a definition.
    #[error("cannot resolve `{call}`: {error}")]
    Resolution {
        call: CallTarget,
        error: ScopeError,
        span: Span,
    },
    /// A call to a definition that has no typed body yet: it failed to
    /// check, or it sits on a dependency cycle with the caller.
    #[error("`{key}` has not been type-checked")]
    UncheckedCallee { key: DefinitionKey, span: Span },
}

impl TypeError {
    /// The span of the offending node, if known.
    pub fn span(&self) -> Option<Span> {
        match self {
            TypeError::Mismatch { origin, .. }
            | TypeError::InfiniteType { origin, .. }
            | TypeError::ArityMismatch { origin, .. }
            | TypeError::RecordFieldMismatch { origin, .. } => origin.span(),
            TypeError::UnboundVariable { span, .. }
            | TypeError::NoSuchField { span, .. }
            | TypeError::UnknownBuiltin { span, .. }
            | TypeError::Resolution { span, .. }
            | TypeError::UncheckedCallee { span, .. } => Some(*span),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = TypeError::Mismatch {
            expected: Ty::Number,
            found: Ty::String,
            origin: ConstraintOrigin::Builtin,
        };
        assert_eq!(err.to_string(), "type mismatch: expected `Number`, found `String`");

        let err = TypeError::InfiniteType {
            var: TyVar(4),
            ty: Ty::set(Ty::Var(TyVar(4))),
            origin: ConstraintOrigin::Builtin,
        };
        assert_eq!(err.to_string(), "infinite type: `?4` occurs in `Set[?4]`");

        let err = TypeError::RecordFieldMismatch {
            expected: vec!["a".into(), "b".into()],
            found: vec!["a".into()],
            origin: ConstraintOrigin::Builtin,
        };
        assert_eq!(err.to_string(), "record mismatch: expected fields [a, b], found [a]");
    }

    #[test]
    fn span_comes_from_origin() {
        let err = TypeError::ArityMismatch {
            expected: 2,
            found: 1,
            origin: ConstraintOrigin::FnArg {
                call_site: Span::new(3, 9),
                param_idx: 0,
            },
        };
        assert_eq!(err.span(), Some(Span::new(3, 9)));
        let err = TypeError::Mismatch {
            expected: Ty::Number,
            found: Ty::Boolean,
            origin: ConstraintOrigin::Builtin,
        };
        assert_eq!(err.span(), None);
    }
}
