//! Expression AST for contract clauses.
//!
//! The tree is produced by an external text parser and consumed, never
//! rewritten, by the type checker and the definition builder. It is a
//! closed sum type: every pass over it matches exhaustively on
//! [`ExprKind`], so adding a node kind forces every pass to be revisited.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::span::Span;

/// An expression node together with its source span.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// The node kinds of the expression language.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// A numeric literal.
    Number(f64),
    /// A string literal.
    String(String),
    /// A bare name: a parameter, a bound variable, or `self`.
    Identifier(String),
    /// `e'`: the value of `e` after the state change.
    Primed(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `{a, b, c}`
    SetLiteral(Vec<Expr>),
    /// `<<a, b, c>>`
    TupleLiteral(Vec<Expr>),
    /// `(+ a, b +)`
    BagLiteral(Vec<Expr>),
    /// `[field |-> value, ...]`
    RecordLiteral(Vec<(String, Expr)>),
    /// `base.field`
    FieldAccess { base: Box<Expr>, field: String },
    /// `base[index]`
    TupleIndex { base: Box<Expr>, index: Box<Expr> },
    /// `\A x \in S : body` / `\E x \in S : body`
    Quantifier {
        kind: QuantifierKind,
        binder: Binder,
        body: Box<Expr>,
    },
    /// `CHOOSE x \in S : predicate`
    Choose { binder: Binder, predicate: Box<Expr> },
    /// `{x \in S : predicate}`
    SetFilter { binder: Binder, predicate: Box<Expr> },
    /// `{body : x \in S}`
    SetMap { body: Box<Expr>, binder: Binder },
    /// `IF cond THEN a ELSE b`
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `CASE c1 -> e1 [] c2 -> e2 [] OTHER -> d`
    Case {
        arms: Vec<CaseArm>,
        other: Option<Box<Expr>>,
    },
    /// `LET name == value IN body`
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    /// `LAMBDA x, y : body`
    Lambda { params: Vec<String>, body: Box<Expr> },
    /// A call to a registry definition or a builtin.
    Call(Call),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    And,
    Or,
    Implies,
    Equiv,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    In,
    NotIn,
    Union,
    Intersect,
    Difference,
    SubsetEq,
    /// Sequence concatenation `\o`.
    Concat,
    /// Integer range `a..b`.
    Range,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::And => "/\\",
            BinaryOp::Or => "\\/",
            BinaryOp::Implies => "=>",
            BinaryOp::Equiv => "<=>",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "/=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "\\div",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::In => "\\in",
            BinaryOp::NotIn => "\\notin",
            BinaryOp::Union => "\\union",
            BinaryOp::Intersect => "\\intersect",
            BinaryOp::Difference => "\\",
            BinaryOp::SubsetEq => "\\subseteq",
            BinaryOp::Concat => "\\o",
            BinaryOp::Range => "..",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    /// `DOMAIN f`
    Domain,
    /// `UNION S`
    BigUnion,
    /// `SUBSET S`
    Powerset,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Not => "~",
            UnaryOp::Neg => "-",
            UnaryOp::Domain => "DOMAIN",
            UnaryOp::BigUnion => "UNION",
            UnaryOp::Powerset => "SUBSET",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantifierKind {
    Forall,
    Exists,
}

/// `name \in domain`, the bound variable of a quantifier, filter, map or
/// CHOOSE.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Binder {
    pub name: String,
    pub domain: Box<Expr>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseArm {
    pub condition: Expr,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub target: CallTarget,
    pub args: Vec<Expr>,
}

/// The callee of a call expression, as written.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallTarget {
    /// `_Name(args)`: a global helper. `name` excludes the underscore.
    Global { name: String },
    /// `_Module!Name(args)`: a builtin-module function.
    Builtin { module: String, name: String },
    /// `Func()`, `Class!Func()`, `Subdomain!Class!Func()` or
    /// `Domain!Subdomain!Class!Func()`: a class function with 0-3
    /// explicit scope qualifiers.
    Class { qualifiers: Vec<String>, name: String },
}

impl CallTarget {
    pub fn global(name: impl Into<String>) -> Self {
        CallTarget::Global { name: name.into() }
    }

    pub fn builtin(module: impl Into<String>, name: impl Into<String>) -> Self {
        CallTarget::Builtin {
            module: module.into(),
            name: name.into(),
        }
    }

    pub fn class<I, S>(qualifiers: I, name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CallTarget::Class {
            qualifiers: qualifiers.into_iter().map(Into::into).collect(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallTarget::Global { name } => write!(f, "_{}", name),
            CallTarget::Builtin { module, name } => write!(f, "_{}!{}", module, name),
            CallTarget::Class { qualifiers, name } => {
                for q in qualifiers {
                    write!(f, "{}!", q)?;
                }
                write!(f, "{}", name)
            }
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    /// Wrap a kind with an empty span. Used when building trees by hand.
    pub fn synthetic(kind: ExprKind) -> Self {
        Expr {
            kind,
            span: Span::default(),
        }
    }

    pub fn bool(value: bool) -> Self {
        Expr::synthetic(ExprKind::Bool(value))
    }

    pub fn number(value: f64) -> Self {
        Expr::synthetic(ExprKind::Number(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::synthetic(ExprKind::String(value.into()))
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expr::synthetic(ExprKind::Identifier(name.into()))
    }

    pub fn primed(inner: Expr) -> Self {
        Expr::synthetic(ExprKind::Primed(Box::new(inner)))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::synthetic(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::synthetic(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn field(base: Expr, field: impl Into<String>) -> Self {
        Expr::synthetic(ExprKind::FieldAccess {
            base: Box::new(base),
            field: field.into(),
        })
    }

    pub fn if_then_else(cond: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        Expr::synthetic(ExprKind::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    pub fn call(target: CallTarget, args: Vec<Expr>) -> Self {
        Expr::synthetic(ExprKind::Call(Call { target, args }))
    }

    /// Replace the span, keeping the kind.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Bool(_)
            | ExprKind::Number(_)
            | ExprKind::String(_)
            | ExprKind::Identifier(_) => Vec::new(),
            ExprKind::Primed(inner) => vec![inner.as_ref()],
            ExprKind::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            ExprKind::Unary { operand, .. } => vec![operand.as_ref()],
            ExprKind::SetLiteral(elems)
            | ExprKind::TupleLiteral(elems)
            | ExprKind::BagLiteral(elems) => elems.iter().collect(),
            ExprKind::RecordLiteral(fields) => fields.iter().map(|(_, e)| e).collect(),
            ExprKind::FieldAccess { base, .. } => vec![base.as_ref()],
            ExprKind::TupleIndex { base, index } => vec![base.as_ref(), index.as_ref()],
            ExprKind::Quantifier { binder, body, .. } => {
                vec![binder.domain.as_ref(), body.as_ref()]
            }
            ExprKind::Choose { binder, predicate } | ExprKind::SetFilter { binder, predicate } => {
                vec![binder.domain.as_ref(), predicate.as_ref()]
            }
            ExprKind::SetMap { body, binder } => vec![binder.domain.as_ref(), body.as_ref()],
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => vec![cond.as_ref(), then_branch.as_ref(), else_branch.as_ref()],
            ExprKind::Case { arms, other } => {
                let mut out: Vec<&Expr> = Vec::with_capacity(arms.len() * 2 + 1);
                for arm in arms {
                    out.push(&arm.condition);
                    out.push(&arm.body);
                }
                if let Some(other) = other {
                    out.push(other.as_ref());
                }
                out
            }
            ExprKind::Let { value, body, .. } => vec![value.as_ref(), body.as_ref()],
            ExprKind::Lambda { body, .. } => vec![body.as_ref()],
            ExprKind::Call(call) => call.args.iter().collect(),
        }
    }

    /// Visit every call site in the tree, outermost first.
    pub fn walk_calls<'a>(&'a self, f: &mut impl FnMut(&'a Call)) {
        if let ExprKind::Call(call) = &self.kind {
            f(call);
        }
        for child in self.children() {
            child.walk_calls(f);
        }
    }
}
