//! The unit of compilation.

use std::sync::Arc;

use clause_common::ast::Expr;
use clause_common::{DefinitionKey, ScopeContext, ScopePath};
use clause_typeck::{CheckedDefinition, Scheme, Ty, TypedNode};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    /// Scoped to a class: `Domain!Subdomain!Class!Name`.
    ClassFunction,
    /// Available everywhere as `_Name`.
    GlobalFunction,
}

/// How a postcondition is applied by the evaluator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GuaranteeKind {
    #[default]
    Unknown,
    /// `x' = value`: assigns the post-state value.
    PrimedAssignment,
    /// Any other postcondition: must hold after the state change.
    PostCondition,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// Filled in by type-checking.
    pub ty: Option<Ty>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            ty: None,
        }
    }
}

/// Where a definition's body came from in the model.
#[derive(Clone, Debug, PartialEq)]
pub struct DefinitionSource {
    /// The raw expression text, for diagnostics.
    pub text: String,
    /// Which model element and list the text came from.
    pub origin: String,
    /// Position within that list.
    pub index: usize,
    /// Set for postconditions only.
    pub guarantee: Option<GuaranteeKind>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Definition {
    pub key: DefinitionKey,
    pub kind: DefinitionKind,
    /// `None` for global functions.
    pub scope: Option<ScopePath>,
    pub local_name: String,
    pub body: Arc<Expr>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<Ty>,
    /// Present iff the definition is type-checked.
    pub typed_body: Option<Arc<TypedNode>>,
    pub version: u64,
    pub depends_on: Vec<DefinitionKey>,
    pub depended_by: Vec<DefinitionKey>,
    pub source: Option<DefinitionSource>,
}

impl Definition {
    pub(crate) fn new(
        key: DefinitionKey,
        kind: DefinitionKind,
        scope: Option<ScopePath>,
        local_name: String,
        body: Expr,
        parameters: Vec<String>,
    ) -> Self {
        Definition {
            key,
            kind,
            scope,
            local_name,
            body: Arc::new(body),
            parameters: parameters.into_iter().map(Parameter::new).collect(),
            return_type: None,
            typed_body: None,
            version: 1,
            depends_on: Vec::new(),
            depended_by: Vec::new(),
            source: None,
        }
    }

    pub fn is_typed(&self) -> bool {
        self.typed_body.is_some()
    }

    /// The scope calls in this definition's body are resolved from.
    pub fn scope_context(&self) -> ScopeContext {
        ScopeContext::for_scope(self.scope.as_ref())
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// The closed signature callers instantiate, once type-checked.
    pub fn signature(&self) -> Option<Scheme> {
        self.typed_body.as_ref()?;
        let ret = self.return_type.clone()?;
        let params = self
            .parameters
            .iter()
            .map(|p| p.ty.clone())
            .collect::<Option<Vec<_>>>()?;
        Some(Scheme::closed(Ty::fun(params, ret)))
    }

    /// The guarantee classification, if this is a postcondition.
    pub fn guarantee(&self) -> Option<GuaranteeKind> {
        self.source.as_ref().and_then(|s| s.guarantee)
    }

    pub(crate) fn apply_checked(&mut self, checked: CheckedDefinition) {
        for (param, ty) in self.parameters.iter_mut().zip(checked.parameters) {
            param.ty = Some(ty);
        }
        self.return_type = Some(checked.return_type);
        self.typed_body = Some(Arc::new(checked.typed_body));
    }

    /// Forget everything type-checking produced.
    pub(crate) fn clear_typed(&mut self) {
        self.typed_body = None;
        self.return_type = None;
        for param in &mut self.parameters {
            param.ty = None;
        }
    }
}
