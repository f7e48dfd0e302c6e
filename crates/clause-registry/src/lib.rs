//! Scoped definition registry.
//!
//! Every compiled contract expression becomes a [`Definition`] stored under
//! a fully-qualified [`DefinitionKey`](clause_common::DefinitionKey). The
//! registry tracks which definitions call which, so that changing one
//! definition invalidates exactly the definitions that depend on it.
//!
//! ## Modules
//!
//! - [`definition`]: the stored unit of compilation
//! - [`registry`]: registration, lookup, update and dependency edges
//! - [`graph`]: dependency ordering (Kahn's algorithm)
//! - [`rebuild`]: invalidation and ordered re-checking
//! - [`error`]: registry and rebuild errors
//!
//! ## Concurrency
//!
//! All state sits behind one `parking_lot::RwLock`. Lookups take a read
//! lock; mutations take a write lock for the duration of the operation
//! only. A rebuild never holds the lock while its callback runs, so the
//! callback may query and mutate the registry.

pub mod definition;
pub mod error;
pub mod graph;
pub mod rebuild;
pub mod registry;

pub use crate::definition::{Definition, DefinitionKind, DefinitionSource, GuaranteeKind, Parameter};
pub use crate::error::{DefinitionError, RebuildError, RegistryError};
pub use crate::graph::{topological_order, TopoOrder};
pub use crate::rebuild::{InvalidationSet, RebuildStrategy};
pub use crate::registry::Registry;
