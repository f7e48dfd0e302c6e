//! The typed expression tree.
//!
//! A `TypedNode` mirrors the untyped [`Expr`](clause_common::ast::Expr)
//! shape one-to-one, with a fully resolved type attached to every node and
//! calls annotated with what they resolved to. The evaluator consumes this
//! tree; it is never fed back into inference.

use clause_common::ast::{BinaryOp, QuantifierKind, UnaryOp};
use clause_common::{DefinitionKey, Span};

use crate::ty::Ty;

#[derive(Clone, Debug, PartialEq)]
pub struct TypedNode {
    pub kind: TypedKind,
    pub ty: Ty,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypedKind {
    Bool(bool),
    Number(f64),
    String(String),
    Identifier(String),
    Primed(Box<TypedNode>),
    Binary {
        op: BinaryOp,
        lhs: Box<TypedNode>,
        rhs: Box<TypedNode>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<TypedNode>,
    },
    SetLiteral(Vec<TypedNode>),
    TupleLiteral(Vec<TypedNode>),
    BagLiteral(Vec<TypedNode>),
    RecordLiteral(Vec<(String, TypedNode)>),
    FieldAccess {
        base: Box<TypedNode>,
        field: String,
    },
    TupleIndex {
        base: Box<TypedNode>,
        index: Box<TypedNode>,
    },
    Quantifier {
        kind: QuantifierKind,
        binder: TypedBinder,
        body: Box<TypedNode>,
    },
    Choose {
        binder: TypedBinder,
        predicate: Box<TypedNode>,
    },
    SetFilter {
        binder: TypedBinder,
        predicate: Box<TypedNode>,
    },
    SetMap {
        body: Box<TypedNode>,
        binder: TypedBinder,
    },
    If {
        cond: Box<TypedNode>,
        then_branch: Box<TypedNode>,
        else_branch: Box<TypedNode>,
    },
    Case {
        arms: Vec<(TypedNode, TypedNode)>,
        other: Option<Box<TypedNode>>,
    },
    Let {
        name: String,
        value: Box<TypedNode>,
        body: Box<TypedNode>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<TypedNode>,
    },
    Call {
        callee: Callee,
        args: Vec<TypedNode>,
    },
}

/// A bound variable with its element type and the typed domain it ranges
/// over.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedBinder {
    pub name: String,
    pub ty: Ty,
    pub domain: Box<TypedNode>,
}

/// What a call resolved to during checking.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Callee {
    /// A registry definition, by fully-qualified key.
    Definition(DefinitionKey),
    /// A builtin, by its `_Module!Name` spelling.
    Builtin(String),
}

impl TypedNode {
    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&TypedNode> {
        match &self.kind {
            TypedKind::Bool(_)
            | TypedKind::Number(_)
            | TypedKind::String(_)
            | TypedKind::Identifier(_) => Vec::new(),
            TypedKind::Primed(inner) => vec![inner.as_ref()],
            TypedKind::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            TypedKind::Unary { operand, .. } => vec![operand.as_ref()],
            TypedKind::SetLiteral(elems)
            | TypedKind::TupleLiteral(elems)
            | TypedKind::BagLiteral(elems) => elems.iter().collect(),
            TypedKind::RecordLiteral(fields) => fields.iter().map(|(_, e)| e).collect(),
            TypedKind::FieldAccess { base, .. } => vec![base.as_ref()],
            TypedKind::TupleIndex { base, index } => vec![base.as_ref(), index.as_ref()],
            TypedKind::Quantifier { binder, body, .. } => {
                vec![binder.domain.as_ref(), body.as_ref()]
            }
            TypedKind::Choose { binder, predicate } | TypedKind::SetFilter { binder, predicate } => {
                vec![binder.domain.as_ref(), predicate.as_ref()]
            }
            TypedKind::SetMap { body, binder } => vec![binder.domain.as_ref(), body.as_ref()],
            TypedKind::If {
                cond,
                then_branch,
                else_branch,
            } => vec![cond.as_ref(), then_branch.as_ref(), else_branch.as_ref()],
            TypedKind::Case { arms, other } => {
                let mut out: Vec<&TypedNode> = Vec::with_capacity(arms.len() * 2 + 1);
                for (cond, body) in arms {
                    out.push(cond);
                    out.push(body);
                }
                if let Some(other) = other {
                    out.push(other.as_ref());
                }
                out
            }
            TypedKind::Let { value, body, .. } => vec![value.as_ref(), body.as_ref()],
            TypedKind::Lambda { body, .. } => vec![body.as_ref()],
            TypedKind::Call { args, .. } => args.iter().collect(),
        }
    }

    /// Every definition this tree calls, in call-site order, deduplicated.
    pub fn called_definitions(&self) -> Vec<&DefinitionKey> {
        let mut out = Vec::new();
        self.collect_calls(&mut out);
        out
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a DefinitionKey>) {
        if let TypedKind::Call {
            callee: Callee::Definition(key),
            ..
        } = &self.kind
        {
            if !out.contains(&key) {
                out.push(key);
            }
        }
        for child in self.children() {
            child.collect_calls(out);
        }
    }

    /// Apply `f` to the type of every node and binder in the tree.
    pub(crate) fn map_types(&mut self, f: &mut impl FnMut(&Ty) -> Ty) {
        self.ty = f(&self.ty);
        match &mut self.kind {
            TypedKind::Quantifier { binder, .. }
            | TypedKind::Choose { binder, .. }
            | TypedKind::SetFilter { binder, .. }
            | TypedKind::SetMap { binder, .. } => {
                binder.ty = f(&binder.ty);
            }
            _ => {}
        }
        for child in self.children_mut() {
            child.map_types(f);
        }
    }

    fn children_mut(&mut self) -> Vec<&mut TypedNode> {
        match &mut self.kind {
            TypedKind::Bool(_)
            | TypedKind::Number(_)
            | TypedKind::String(_)
            | TypedKind::Identifier(_) => Vec::new(),
            TypedKind::Primed(inner) => vec![inner.as_mut()],
            TypedKind::Binary { lhs, rhs, .. } => vec![lhs.as_mut(), rhs.as_mut()],
            TypedKind::Unary { operand, .. } => vec![operand.as_mut()],
            TypedKind::SetLiteral(elems)
            | TypedKind::TupleLiteral(elems)
            | TypedKind::BagLiteral(elems) => elems.iter_mut().collect(),
            TypedKind::RecordLiteral(fields) => fields.iter_mut().map(|(_, e)| e).collect(),
            TypedKind::FieldAccess { base, .. } => vec![base.as_mut()],
            TypedKind::TupleIndex { base, index } => vec![base.as_mut(), index.as_mut()],
            TypedKind::Quantifier { binder, body, .. } => {
                vec![binder.domain.as_mut(), body.as_mut()]
            }
            TypedKind::Choose { binder, predicate } | TypedKind::SetFilter { binder, predicate } => {
                vec![binder.domain.as_mut(), predicate.as_mut()]
            }
            TypedKind::SetMap { body, binder } => vec![binder.domain.as_mut(), body.as_mut()],
            TypedKind::If {
                cond,
                then_branch,
                else_branch,
            } => vec![cond.as_mut(), then_branch.as_mut(), else_branch.as_mut()],
            TypedKind::Case { arms, other } => {
                let mut out: Vec<&mut TypedNode> = Vec::with_capacity(arms.len() * 2 + 1);
                for (cond, body) in arms.iter_mut() {
                    out.push(cond);
                    out.push(body);
                }
                if let Some(other) = other {
                    out.push(other.as_mut());
                }
                out
            }
            TypedKind::Let { value, body, .. } => vec![value.as_mut(), body.as_mut()],
            TypedKind::Lambda { body, .. } => vec![body.as_mut()],
            TypedKind::Call { args, .. } => args.iter_mut().collect(),
        }
    }
}
