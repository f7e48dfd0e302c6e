//! Read-only view of the domain model.
//!
//! Only the parts the expression compiler walks are represented: the
//! domain/subdomain/class hierarchy, each class's actions, queries and
//! guards with their contract strings, model-level invariants and global
//! helper definitions. Attributes, associations and state machines belong
//! to the model's own crate and are not needed here.

use serde::{Deserialize, Serialize};

use crate::scope::{ScopeError, ScopePath};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub invariants: Vec<String>,
    #[serde(default)]
    pub global_functions: Vec<GlobalFunction>,
    #[serde(default)]
    pub domains: Vec<Domain>,
}

/// A named helper definition available everywhere as `_Name(...)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalFunction {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub body: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    #[serde(default)]
    pub subdomains: Vec<Subdomain>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Subdomain {
    pub name: String,
    #[serde(default)]
    pub classes: Vec<Class>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub queries: Vec<Query>,
    #[serde(default)]
    pub guards: Vec<Guard>,
}

/// A state-changing operation with preconditions and postconditions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub guarantees: Vec<String>,
}

/// A read-only operation; contracts have the same shape as an action's.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub guarantees: Vec<String>,
}

/// A named transition guard.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl Domain {
    /// Iterate every class together with its scope path.
    pub fn classes(&self) -> impl Iterator<Item = (&Subdomain, &Class)> {
        self.subdomains
            .iter()
            .flat_map(|sub| sub.classes.iter().map(move |class| (sub, class)))
    }
}

impl Class {
    /// The `Domain!Subdomain!Class` key of this class.
    pub fn scope_in(&self, domain: &Domain, subdomain: &Subdomain) -> Result<ScopePath, ScopeError> {
        ScopePath::new(&domain.name, &subdomain.name, &self.name)
    }
}
