//! Shared types for the clause compiler.
//!
//! - [`ast`]: the expression tree produced by the external parser
//! - [`span`]: byte spans into expression source text
//! - [`scope`]: scope paths, definition keys and call resolution
//! - [`model`]: read-only view of the domain model contracts come from

pub mod ast;
pub mod model;
pub mod scope;
pub mod span;

pub use scope::{DefinitionKey, ScopeContext, ScopeError, ScopeLevel, ScopePath};
pub use span::Span;
