//! Pulls raw contract strings out of the domain model.
//!
//! Each invariant, helper definition, precondition, postcondition and guard
//! condition becomes one [`ExtractedExpression`]. Nothing is parsed or
//! validated here; the [`DefinitionBuilder`](crate::build::DefinitionBuilder)
//! does both.

use std::fmt;

use clause_common::model::Model;
use clause_common::scope::SEPARATOR;

/// Which part of the model an expression came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExpressionSource {
    /// A model-level invariant.
    Invariant,
    /// A named helper definition.
    GlobalFunction,
    /// An action or query precondition.
    Requires,
    /// An action or query postcondition.
    Guarantees,
    /// A guard condition.
    Guard,
}

impl ExpressionSource {
    /// Whether expressions from this source live in a class scope.
    pub fn is_class_scoped(self) -> bool {
        matches!(
            self,
            ExpressionSource::Requires | ExpressionSource::Guarantees | ExpressionSource::Guard
        )
    }
}

impl fmt::Display for ExpressionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExpressionSource::Invariant => "invariant",
            ExpressionSource::GlobalFunction => "global function",
            ExpressionSource::Requires => "precondition",
            ExpressionSource::Guarantees => "postcondition",
            ExpressionSource::Guard => "guard condition",
        };
        f.write_str(s)
    }
}

/// One raw expression and where it belongs. Consumed once by the builder.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedExpression {
    pub source: ExpressionSource,
    pub text: String,
    /// Key of the owning action, query or guard
    /// (`Domain!Subdomain!Class!Owner`). `None` for global expressions.
    pub scope_key: Option<String>,
    /// The owner's name, or the helper's declared name. Empty for
    /// invariants.
    pub name: String,
    pub parameters: Vec<String>,
    /// Position within the owning list.
    pub index: usize,
}

impl ExtractedExpression {
    pub fn invariant(text: impl Into<String>, index: usize) -> Self {
        ExtractedExpression {
            source: ExpressionSource::Invariant,
            text: text.into(),
            scope_key: None,
            name: String::new(),
            parameters: Vec::new(),
            index,
        }
    }

    pub fn global_function(
        name: impl Into<String>,
        parameters: Vec<String>,
        text: impl Into<String>,
        index: usize,
    ) -> Self {
        ExtractedExpression {
            source: ExpressionSource::GlobalFunction,
            text: text.into(),
            scope_key: None,
            name: name.into(),
            parameters,
            index,
        }
    }

    /// A precondition, postcondition or guard condition of `owner`.
    pub fn scoped(
        source: ExpressionSource,
        scope_key: impl Into<String>,
        name: impl Into<String>,
        parameters: Vec<String>,
        text: impl Into<String>,
        index: usize,
    ) -> Self {
        ExtractedExpression {
            source,
            text: text.into(),
            scope_key: Some(scope_key.into()),
            name: name.into(),
            parameters,
            index,
        }
    }

    /// Human-readable location for error messages, e.g.
    /// `postcondition #1 of Sales!Orders!Order!Submit`.
    pub fn describe(&self) -> String {
        match (&self.scope_key, self.source) {
            (Some(key), _) => format!("{} #{} of {}", self.source, self.index, key),
            (None, ExpressionSource::Invariant) => format!("invariant #{}", self.index),
            (None, _) => format!("{} `{}`", self.source, self.name),
        }
    }
}

/// Walks a [`Model`] in declaration order.
#[derive(Clone, Copy, Debug, Default)]
pub struct Extractor;

fn owner_key(domain: &str, subdomain: &str, class: &str, owner: &str) -> String {
    format!(
        "{}{sep}{}{sep}{}{sep}{}",
        domain,
        subdomain,
        class,
        owner,
        sep = SEPARATOR
    )
}

impl Extractor {
    pub fn new() -> Self {
        Extractor
    }

    /// Every expression of the model: invariants, then helper definitions,
    /// then per class its actions, queries and guards.
    pub fn extract(&self, model: &Model) -> Vec<ExtractedExpression> {
        let mut out = Vec::new();

        for (index, text) in model.invariants.iter().enumerate() {
            out.push(ExtractedExpression::invariant(text.clone(), index));
        }
        for (index, func) in model.global_functions.iter().enumerate() {
            out.push(ExtractedExpression::global_function(
                func.name.clone(),
                func.parameters.clone(),
                func.body.clone(),
                index,
            ));
        }

        for domain in &model.domains {
            for (subdomain, class) in domain.classes() {
                let key = |owner: &str| owner_key(&domain.name, &subdomain.name, &class.name, owner);

                let operations = class
                    .actions
                    .iter()
                    .map(|a| (&a.name, &a.parameters, &a.requires, &a.guarantees))
                    .chain(
                        class
                            .queries
                            .iter()
                            .map(|q| (&q.name, &q.parameters, &q.requires, &q.guarantees)),
                    );
                for (name, params, requires, guarantees) in operations {
                    let scope_key = key(name);
                    for (source, list) in [
                        (ExpressionSource::Requires, requires),
                        (ExpressionSource::Guarantees, guarantees),
                    ] {
                        for (index, text) in list.iter().enumerate() {
                            out.push(ExtractedExpression::scoped(
                                source,
                                scope_key.clone(),
                                name.clone(),
                                params.clone(),
                                text.clone(),
                                index,
                            ));
                        }
                    }
                }

                for guard in &class.guards {
                    let scope_key = key(&guard.name);
                    for (index, text) in guard.conditions.iter().enumerate() {
                        out.push(ExtractedExpression::scoped(
                            ExpressionSource::Guard,
                            scope_key.clone(),
                            guard.name.clone(),
                            Vec::new(),
                            text.clone(),
                            index,
                        ));
                    }
                }
            }
        }

        out
    }
}
