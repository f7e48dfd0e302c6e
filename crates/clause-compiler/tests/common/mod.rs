//! Test doubles for the external parser and evaluator.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use clause_common::ast::{BinaryOp, Expr};
use clause_compiler::{
    Bindings, EvalContext, EvalError, Evaluator, ExpressionParser, GuaranteeKind, ParseError,
    Value,
};
use clause_typeck::{Callee, TypedKind, TypedNode};

// ── Parser ─────────────────────────────────────────────────────────────

/// Maps exact source text to a pre-built tree.
#[derive(Default)]
pub struct FixtureParser {
    exprs: HashMap<String, Expr>,
}

impl FixtureParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, text: &str, expr: Expr) -> Self {
        self.exprs.insert(text.to_string(), expr);
        self
    }
}

impl ExpressionParser for FixtureParser {
    fn parse_expression(&self, text: &str) -> Result<Expr, ParseError> {
        self.exprs
            .get(text)
            .cloned()
            .ok_or_else(|| ParseError::new(format!("unexpected input `{}`", text)))
    }
}

// ── Evaluator ──────────────────────────────────────────────────────────

/// Numbers, booleans, strings, records, `IF` and calls. Pre- and
/// post-state are the same record.
#[derive(Default)]
pub struct MiniEvaluator {
    /// Guarantee kind of every evaluation entered through the pipeline.
    pub seen_guarantees: RefCell<Vec<Option<GuaranteeKind>>>,
}

impl MiniEvaluator {
    fn eval_node(&self, node: &TypedNode, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match &node.kind {
            TypedKind::Bool(b) => Ok(Value::Bool(*b)),
            TypedKind::Number(n) => Ok(Value::Number(*n)),
            TypedKind::String(s) => Ok(Value::String(s.clone())),
            TypedKind::Identifier(name) => ctx
                .lookup(name)
                .cloned()
                .ok_or_else(|| EvalError::at(format!("`{}` is not bound", name), node.span)),
            TypedKind::Primed(inner) => self.eval_node(inner, ctx),
            TypedKind::FieldAccess { base, field } => {
                let base = self.eval_node(base, ctx)?;
                base.field(field)
                    .cloned()
                    .ok_or_else(|| EvalError::at(format!("no field `{}`", field), node.span))
            }
            TypedKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.bool(cond, ctx)? {
                    self.eval_node(then_branch, ctx)
                } else {
                    self.eval_node(else_branch, ctx)
                }
            }
            TypedKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, ctx),
            TypedKind::Call { callee, args } => {
                let args = args
                    .iter()
                    .map(|a| self.eval_node(a, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(callee, args, ctx)
            }
            other => Err(EvalError::at(
                format!("unsupported node {:?}", other),
                node.span,
            )),
        }
    }

    fn bool(&self, node: &TypedNode, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
        self.eval_node(node, ctx)?
            .as_bool()
            .ok_or_else(|| EvalError::at("expected a boolean", node.span))
    }

    fn number(&self, node: &TypedNode, ctx: &EvalContext<'_>) -> Result<f64, EvalError> {
        self.eval_node(node, ctx)?
            .as_number()
            .ok_or_else(|| EvalError::at("expected a number", node.span))
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs: &TypedNode,
        rhs: &TypedNode,
        ctx: &EvalContext<'_>,
    ) -> Result<Value, EvalError> {
        let value = match op {
            BinaryOp::And => Value::Bool(self.bool(lhs, ctx)? && self.bool(rhs, ctx)?),
            BinaryOp::Or => Value::Bool(self.bool(lhs, ctx)? || self.bool(rhs, ctx)?),
            BinaryOp::Eq => Value::Bool(self.eval_node(lhs, ctx)? == self.eval_node(rhs, ctx)?),
            BinaryOp::Gt => Value::Bool(self.number(lhs, ctx)? > self.number(rhs, ctx)?),
            BinaryOp::Lt => Value::Bool(self.number(lhs, ctx)? < self.number(rhs, ctx)?),
            BinaryOp::Add => Value::Number(self.number(lhs, ctx)? + self.number(rhs, ctx)?),
            BinaryOp::Mul => Value::Number(self.number(lhs, ctx)? * self.number(rhs, ctx)?),
            other => return Err(EvalError::new(format!("unsupported operator {}", other))),
        };
        Ok(value)
    }

    fn call(&self, callee: &Callee, args: Vec<Value>, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match callee {
            Callee::Builtin(name) => match (name.as_str(), args.as_slice()) {
                ("_Math!Max", [Value::Number(a), Value::Number(b)]) => Ok(Value::Number(a.max(*b))),
                ("_Math!Abs", [Value::Number(a)]) => Ok(Value::Number(a.abs())),
                _ => Err(EvalError::new(format!("unsupported builtin {}", name))),
            },
            Callee::Definition(key) => {
                let runtime = ctx
                    .runtime
                    .ok_or_else(|| EvalError::new("no registry to call into"))?;
                let def = runtime
                    .get_definition(key)
                    .map_err(|e| EvalError::new(e.to_string()))?;
                let body = def
                    .typed_body
                    .clone()
                    .ok_or_else(|| EvalError::new(format!("`{}` is not checked", key)))?;
                let mut bindings = Bindings::new();
                if let Some(record) = ctx.bindings.self_record() {
                    bindings = bindings.with_self(record.clone());
                }
                for (name, value) in def.parameter_names().into_iter().zip(args) {
                    bindings.bind(name, value);
                }
                let inner = EvalContext {
                    bindings: &bindings,
                    scope: def.scope_context(),
                    self_name: ctx.self_name,
                    relation: ctx.relation,
                    guarantee: def.guarantee(),
                    runtime: ctx.runtime,
                };
                self.eval_node(&body, &inner)
            }
        }
    }
}

impl Evaluator for MiniEvaluator {
    fn eval(&self, node: &TypedNode, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        self.seen_guarantees.borrow_mut().push(ctx.guarantee);
        self.eval_node(node, ctx)
    }
}

// ── Tree helpers ───────────────────────────────────────────────────────

pub fn self_field(field: &str) -> Expr {
    Expr::field(Expr::ident("self"), field)
}

pub fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(op, lhs, rhs)
}

pub fn params(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
