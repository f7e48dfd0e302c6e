//! The interface to the external evaluator.
//!
//! The evaluator walks [`TypedNode`] trees. It gets read-only access to
//! variable bindings, the scope the expression lives in, an optional
//! association-traversal context and a [`RuntimeAdapter`] for resolving
//! calls to other definitions. It never mutates the registry.

use std::collections::BTreeMap;
use std::fmt;

use clause_common::ScopeContext;
use clause_registry::GuaranteeKind;
use clause_typeck::TypedNode;

use crate::adapters::RuntimeAdapter;
use crate::error::EvalError;

/// A runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
    Set(Vec<Value>),
    Tuple(Vec<Value>),
    Bag(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    pub fn record<I, S>(fields: I) -> Value
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.get(name),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
            f.write_str(open)?;
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", v)?;
            }
            f.write_str(close)
        }
        match self {
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Set(items) => list(f, "{", items, "}"),
            Value::Tuple(items) => list(f, "<<", items, ">>"),
            Value::Bag(items) => list(f, "(+ ", items, " +)"),
            Value::Record(fields) => {
                f.write_str("[")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} |-> {}", k, v)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Variable values for one evaluation, plus the `self` record of
/// class-scoped expressions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
    self_record: Option<Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bind(name, value);
        self
    }

    pub fn with_self(mut self, record: Value) -> Self {
        self.self_record = Some(record);
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn self_record(&self) -> Option<&Value> {
        self.self_record.as_ref()
    }

    /// Bound names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.self_record.is_none()
    }
}

/// Which association is being traversed when an expression is evaluated
/// from the far side of a relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationContext {
    pub association: String,
    pub from_class: String,
    pub to_class: String,
}

/// Everything the evaluator may read while evaluating one tree.
pub struct EvalContext<'a> {
    pub bindings: &'a Bindings,
    pub scope: ScopeContext,
    /// Name `self` is spelled as in expressions.
    pub self_name: &'a str,
    pub relation: Option<&'a RelationContext>,
    /// Set when evaluating a postcondition.
    pub guarantee: Option<GuaranteeKind>,
    /// `None` for standalone evaluation with no registry.
    pub runtime: Option<RuntimeAdapter<'a>>,
}

impl<'a> EvalContext<'a> {
    pub fn standalone(bindings: &'a Bindings, self_name: &'a str) -> Self {
        EvalContext {
            bindings,
            scope: ScopeContext::global(),
            self_name,
            relation: None,
            guarantee: None,
            runtime: None,
        }
    }

    /// Look up a variable; `self_name` yields the self record.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        if name == self.self_name {
            self.bindings.self_record()
        } else {
            self.bindings.get(name)
        }
    }
}

/// Evaluates typed trees. Implemented outside this crate.
pub trait Evaluator {
    fn eval(&self, node: &TypedNode, ctx: &EvalContext<'_>) -> Result<Value, EvalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_distinguishes_self() {
        let bindings = Bindings::new()
            .with("amount", Value::Number(5.0))
            .with_self(Value::record([("total", Value::Number(1.0))]));
        let ctx = EvalContext::standalone(&bindings, "self");
        assert_eq!(ctx.lookup("amount"), Some(&Value::Number(5.0)));
        assert_eq!(
            ctx.lookup("self").and_then(|s| s.field("total")),
            Some(&Value::Number(1.0))
        );
        assert!(ctx.lookup("missing").is_none());
    }

    #[test]
    fn value_display() {
        let v = Value::record([
            ("items", Value::Tuple(vec![Value::Number(1.0), Value::Number(2.5)])),
            ("ok", Value::Bool(true)),
            ("tags", Value::Set(vec![Value::String("a".into())])),
        ]);
        insta::assert_snapshot!(v.to_string(), @r#"[items |-> <<1, 2.5>>, ok |-> TRUE, tags |-> {"a"}]"#);
    }
}
