//! Scopes, definition keys and call resolution.
//!
//! A definition lives either in the global scope (`_Name`) or in a class
//! scope (`Domain!Subdomain!Class!Name`). Calls are written relative to the
//! scope they appear in; [`ScopeContext::resolve_call`] expands them to a
//! fully-qualified [`DefinitionKey`].
//!
//! Resolution is a pure function of the current scope depth and the number
//! of qualifiers written in the call:
//!
//! | Syntax                              | Qualifiers | Required depth |
//! |-------------------------------------|------------|----------------|
//! | `_Name(args)`                       | global     | any            |
//! | `Func(args)`                        | 0          | Class          |
//! | `Class!Func(args)`                  | 1          | Subdomain      |
//! | `Subdomain!Class!Func(args)`        | 2          | Domain         |
//! | `Domain!Subdomain!Class!Func(args)` | 3          | Global         |
//!
//! There is no fallback search: a qualifier count that does not match the
//! current depth is an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::CallTarget;

/// Separator between key components.
pub const SEPARATOR: char = '!';

/// Prefix marking a global definition key.
pub const GLOBAL_PREFIX: char = '_';

/// Errors from scope construction and call resolution.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// A scope path with some but not all of domain/subdomain/class.
    #[error("malformed scope `{0}`: expected Domain!Subdomain!Class")]
    MalformedScope(String),
    /// `_Module!Name` calls are dispatched to builtin modules, not the registry.
    #[error("`{0}` is a builtin-module call, not a registry call")]
    NotARegistryCall(String),
    /// More than three qualifiers in front of the function name.
    #[error("`{call}` has {qualifiers} scope qualifiers; at most 3 are allowed")]
    TooManyQualifiers { call: String, qualifiers: usize },
    /// The qualifier count requires a different depth than the current one.
    #[error(
        "`{call}` has {qualifiers} scope qualifier(s) and must be written at {required} scope, \
         but the current scope is {actual}"
    )]
    QualifierDepthMismatch {
        call: String,
        qualifiers: usize,
        required: ScopeLevel,
        actual: ScopeLevel,
    },
    /// The call resolved to a key that is not registered.
    #[error("no definition registered under `{0}`")]
    UnknownDefinition(DefinitionKey),
}

/// Resolution depth. The numeric value is the number of fixed components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScopeLevel {
    Global = 0,
    Domain = 1,
    Subdomain = 2,
    Class = 3,
}

impl ScopeLevel {
    fn from_depth(depth: usize) -> Option<ScopeLevel> {
        match depth {
            0 => Some(ScopeLevel::Global),
            1 => Some(ScopeLevel::Domain),
            2 => Some(ScopeLevel::Subdomain),
            3 => Some(ScopeLevel::Class),
            _ => None,
        }
    }

    pub fn depth(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScopeLevel::Global => "global",
            ScopeLevel::Domain => "domain",
            ScopeLevel::Subdomain => "subdomain",
            ScopeLevel::Class => "class",
        };
        f.write_str(s)
    }
}

/// A complete class scope: `Domain!Subdomain!Class`.
///
/// Partial scopes cannot be constructed; the global scope is represented by
/// the absence of a `ScopePath` (`Option<ScopePath>`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopePath {
    domain: String,
    subdomain: String,
    class: String,
}

impl ScopePath {
    /// Build a scope from its three components. Every component must be
    /// non-empty and free of the `!` separator.
    pub fn new(
        domain: impl Into<String>,
        subdomain: impl Into<String>,
        class: impl Into<String>,
    ) -> Result<Self, ScopeError> {
        let path = ScopePath {
            domain: domain.into(),
            subdomain: subdomain.into(),
            class: class.into(),
        };
        let valid = [&path.domain, &path.subdomain, &path.class]
            .iter()
            .all(|c| !c.is_empty() && !c.contains(SEPARATOR));
        if valid {
            Ok(path)
        } else {
            Err(ScopeError::MalformedScope(path.to_string()))
        }
    }

    /// Parse `Domain!Subdomain!Class`. Anything other than exactly three
    /// non-empty components is rejected.
    pub fn parse(text: &str) -> Result<Self, ScopeError> {
        let parts: Vec<&str> = text.split(SEPARATOR).collect();
        match parts.as_slice() {
            [domain, subdomain, class] => ScopePath::new(*domain, *subdomain, *class)
                .map_err(|_| ScopeError::MalformedScope(text.to_string())),
            _ => Err(ScopeError::MalformedScope(text.to_string())),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn subdomain(&self) -> &str {
        &self.subdomain
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.domain,
            self.subdomain,
            self.class,
            sep = SEPARATOR
        )
    }
}

/// Fully-qualified name of a definition: `_Name` or
/// `Domain!Subdomain!Class!Name`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DefinitionKey(String);

impl DefinitionKey {
    /// Key of a global definition. A leading underscore on `name` is
    /// accepted and not doubled.
    pub fn global(name: &str) -> Self {
        let name = name.strip_prefix(GLOBAL_PREFIX).unwrap_or(name);
        DefinitionKey(format!("{}{}", GLOBAL_PREFIX, name))
    }

    /// Key of a class-scoped definition.
    pub fn class(scope: &ScopePath, name: &str) -> Self {
        DefinitionKey(format!("{}{}{}", scope, SEPARATOR, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_global(&self) -> bool {
        self.0.starts_with(GLOBAL_PREFIX)
    }

    /// The last component: the definition's name without its scope (and
    /// without the global underscore).
    pub fn local_name(&self) -> &str {
        if self.is_global() {
            &self.0[1..]
        } else {
            self.0.rsplit(SEPARATOR).next().unwrap_or(&self.0)
        }
    }

    /// The class scope of a class-scoped key; `None` for globals.
    pub fn scope(&self) -> Option<ScopePath> {
        if self.is_global() {
            return None;
        }
        let (scope, _) = self.0.rsplit_once(SEPARATOR)?;
        ScopePath::parse(scope).ok()
    }
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DefinitionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The scope a call is written in: the resolution depth plus whichever
/// components are already fixed at that depth.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScopeContext {
    components: Vec<String>,
}

impl ScopeContext {
    pub fn global() -> Self {
        ScopeContext::default()
    }

    pub fn domain(domain: impl Into<String>) -> Self {
        ScopeContext {
            components: vec![domain.into()],
        }
    }

    pub fn subdomain(domain: impl Into<String>, subdomain: impl Into<String>) -> Self {
        ScopeContext {
            components: vec![domain.into(), subdomain.into()],
        }
    }

    pub fn class(
        domain: impl Into<String>,
        subdomain: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        ScopeContext {
            components: vec![domain.into(), subdomain.into(), class.into()],
        }
    }

    /// The class context of a scope path, or the global context for `None`.
    pub fn for_scope(scope: Option<&ScopePath>) -> Self {
        match scope {
            Some(path) => ScopeContext::class(path.domain(), path.subdomain(), path.class()),
            None => ScopeContext::global(),
        }
    }

    pub fn level(&self) -> ScopeLevel {
        // Constructors never fix more than three components.
        ScopeLevel::from_depth(self.components.len()).unwrap_or(ScopeLevel::Class)
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.components.first().map(String::as_str)
    }

    pub fn subdomain_name(&self) -> Option<&str> {
        self.components.get(1).map(String::as_str)
    }

    pub fn class_name(&self) -> Option<&str> {
        self.components.get(2).map(String::as_str)
    }

    /// Expand a call to the key it refers to from this scope.
    ///
    /// Does not check that the key is registered; callers that own a
    /// registry report [`ScopeError::UnknownDefinition`] separately.
    pub fn resolve_call(&self, target: &CallTarget) -> Result<DefinitionKey, ScopeError> {
        match target {
            CallTarget::Global { name } => Ok(DefinitionKey::global(name)),
            CallTarget::Builtin { .. } => Err(ScopeError::NotARegistryCall(target.to_string())),
            CallTarget::Class { qualifiers, name } => {
                let count = qualifiers.len();
                let required = ScopeLevel::Class
                    .depth()
                    .checked_sub(count)
                    .and_then(ScopeLevel::from_depth)
                    .ok_or_else(|| ScopeError::TooManyQualifiers {
                        call: target.to_string(),
                        qualifiers: count,
                    })?;
                let actual = self.level();
                if required != actual {
                    return Err(ScopeError::QualifierDepthMismatch {
                        call: target.to_string(),
                        qualifiers: count,
                        required,
                        actual,
                    });
                }

                let mut parts: Vec<&str> = Vec::with_capacity(4);
                parts.extend(self.components.iter().map(String::as_str));
                parts.extend(qualifiers.iter().map(String::as_str));
                parts.push(name);
                Ok(DefinitionKey(parts.join("!")))
            }
        }
    }
}

impl fmt::Display for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            f.write_str("<global>")
        } else {
            f.write_str(&self.components.join("!"))
        }
    }
}
