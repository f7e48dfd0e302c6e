//! Turns extracted expressions into registered definitions.
//!
//! For each [`ExtractedExpression`] the builder parses the text, derives a
//! deterministic definition name, registers the body in the right scope and
//! attaches the raw source. Postconditions are also classified as either a
//! primed assignment or a plain post-state assertion.
//!
//! | Source        | Name                    | Scope                     |
//! |---------------|-------------------------|---------------------------|
//! | invariant     | `Invariant<i>`          | global                    |
//! | helper        | declared name           | global                    |
//! | precondition  | `<owner>_Requires<i>`   | owner's Domain!Sub!Class  |
//! | postcondition | `<owner>_Guarantees<i>` | owner's Domain!Sub!Class  |
//! | guard         | `<owner>_Guard<i>`      | owner's Domain!Sub!Class  |

use clause_common::ast::{BinaryOp, Expr, ExprKind};
use clause_common::scope::SEPARATOR;
use clause_common::{DefinitionKey, ScopeError, ScopePath};
use clause_registry::{DefinitionSource, GuaranteeKind, Registry, RegistryError};
use tracing::debug;

use crate::error::{BuildError, ParseError};
use crate::extract::{ExpressionSource, ExtractedExpression};

/// The external text parser.
pub trait ExpressionParser {
    fn parse_expression(&self, text: &str) -> Result<Expr, ParseError>;
}

impl<F> ExpressionParser for F
where
    F: Fn(&str) -> Result<Expr, ParseError>,
{
    fn parse_expression(&self, text: &str) -> Result<Expr, ParseError> {
        self(text)
    }
}

/// The name a definition is registered under.
pub fn definition_name(expr: &ExtractedExpression) -> String {
    match expr.source {
        ExpressionSource::Invariant => format!("Invariant{}", expr.index),
        ExpressionSource::GlobalFunction => expr.name.clone(),
        ExpressionSource::Requires => format!("{}_Requires{}", expr.name, expr.index),
        ExpressionSource::Guarantees => format!("{}_Guarantees{}", expr.name, expr.index),
        ExpressionSource::Guard => format!("{}_Guard{}", expr.name, expr.index),
    }
}

/// Split an owner key `Domain!Subdomain!Class!Owner` into its class scope.
fn owner_scope(scope_key: &str) -> Result<ScopePath, ScopeError> {
    let (class_path, _owner) = scope_key
        .rsplit_once(SEPARATOR)
        .ok_or_else(|| ScopeError::MalformedScope(scope_key.to_string()))?;
    ScopePath::parse(class_path).map_err(|_| ScopeError::MalformedScope(scope_key.to_string()))
}

pub struct DefinitionBuilder<'r> {
    registry: &'r Registry,
}

impl<'r> DefinitionBuilder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        DefinitionBuilder { registry }
    }

    /// Parse, name and register one expression.
    pub fn build(
        &self,
        expr: ExtractedExpression,
        parser: &dyn ExpressionParser,
    ) -> Result<DefinitionKey, BuildError> {
        let owner = expr.scope_key.clone().unwrap_or_else(|| expr.name.clone());
        let registration = |error: RegistryError| BuildError::Registration {
            origin: expr.source,
            owner: owner.clone(),
            index: expr.index,
            error,
        };

        let body = parser
            .parse_expression(&expr.text)
            .map_err(|error| BuildError::Parse {
                origin: expr.source,
                owner: owner.clone(),
                index: expr.index,
                error,
            })?;

        let guarantee = (expr.source == ExpressionSource::Guarantees).then(|| classify_guarantee(&body));
        let name = definition_name(&expr);

        let key = if expr.source.is_class_scoped() {
            let scope_key = expr.scope_key.as_deref().ok_or_else(|| BuildError::MissingScope {
                origin: expr.source,
                owner: owner.clone(),
                index: expr.index,
            })?;
            let scope = owner_scope(scope_key).map_err(|e| registration(e.into()))?;
            self.registry
                .register_in_scope(&scope, &name, body, expr.parameters.clone())
                .map_err(registration)?
        } else {
            self.registry
                .register_global_function(&name, body, expr.parameters.clone())
                .map_err(registration)?
        };

        let source = DefinitionSource {
            text: expr.text.clone(),
            origin: expr.describe(),
            index: expr.index,
            guarantee,
        };
        self.registry
            .attach_source(&key, source)
            .map_err(registration)?;

        debug!(key = %key, origin = %expr.source, ?guarantee, "definition built");
        Ok(key)
    }

    /// Build every expression, continuing past failures.
    pub fn build_all(
        &self,
        exprs: impl IntoIterator<Item = ExtractedExpression>,
        parser: &dyn ExpressionParser,
    ) -> (Vec<DefinitionKey>, Vec<BuildError>) {
        let mut keys = Vec::new();
        let mut errors = Vec::new();
        for expr in exprs {
            match self.build(expr, parser) {
                Ok(key) => keys.push(key),
                Err(err) => errors.push(err),
            }
        }
        (keys, errors)
    }
}

// ── Guarantee classification ───────────────────────────────────────────

/// `PrimedAssignment` iff `expr` is `lhs = rhs` and `lhs` is primed,
/// looking only through field access and indexing. Everything else is a
/// `PostCondition`.
pub fn classify_guarantee(expr: &Expr) -> GuaranteeKind {
    match &expr.kind {
        ExprKind::Binary {
            op: BinaryOp::Eq,
            lhs,
            ..
        } if lhs_is_primed(lhs) => GuaranteeKind::PrimedAssignment,
        _ => GuaranteeKind::PostCondition,
    }
}

fn lhs_is_primed(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Primed(_) => true,
        ExprKind::FieldAccess { base, .. } | ExprKind::TupleIndex { base, .. } => lhs_is_primed(base),
        _ => false,
    }
}

/// Whether any node of `expr` is primed.
pub fn contains_any_primed(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Primed(_) => true,
        ExprKind::Bool(_) | ExprKind::Number(_) | ExprKind::String(_) | ExprKind::Identifier(_) => {
            false
        }
        ExprKind::Binary { lhs, rhs, .. } => contains_any_primed(lhs) || contains_any_primed(rhs),
        ExprKind::Unary { operand, .. } => contains_any_primed(operand),
        ExprKind::SetLiteral(elems) | ExprKind::TupleLiteral(elems) | ExprKind::BagLiteral(elems) => {
            elems.iter().any(contains_any_primed)
        }
        ExprKind::RecordLiteral(fields) => fields.iter().any(|(_, v)| contains_any_primed(v)),
        ExprKind::FieldAccess { base, .. } => contains_any_primed(base),
        ExprKind::TupleIndex { base, index } => {
            contains_any_primed(base) || contains_any_primed(index)
        }
        ExprKind::Quantifier { binder, body, .. } => {
            contains_any_primed(&binder.domain) || contains_any_primed(body)
        }
        ExprKind::Choose { binder, predicate } | ExprKind::SetFilter { binder, predicate } => {
            contains_any_primed(&binder.domain) || contains_any_primed(predicate)
        }
        ExprKind::SetMap { body, binder } => {
            contains_any_primed(&binder.domain) || contains_any_primed(body)
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            contains_any_primed(cond)
                || contains_any_primed(then_branch)
                || contains_any_primed(else_branch)
        }
        ExprKind::Case { arms, other } => {
            arms.iter()
                .any(|arm| contains_any_primed(&arm.condition) || contains_any_primed(&arm.body))
                || other.as_deref().is_some_and(contains_any_primed)
        }
        ExprKind::Let { value, body, .. } => contains_any_primed(value) || contains_any_primed(body),
        ExprKind::Lambda { body, .. } => contains_any_primed(body),
        ExprKind::Call(call) => call.args.iter().any(contains_any_primed),
    }
}
