//! Dependency ordering of definitions.
//!
//! Orders a subset of the registry so that every definition comes after
//! the definitions it depends on. Edges leaving the subset are ignored:
//! those dependencies are not being rebuilt. Cycles do not abort the sort;
//! their members are appended at the end and fail when type-checked.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use clause_common::DefinitionKey;
use rustc_hash::FxHashMap;

use crate::definition::Definition;

/// The result of ordering a set of definitions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopoOrder {
    /// Every requested key exactly once, dependencies first.
    pub order: Vec<DefinitionKey>,
    /// Keys that sit on or behind a cycle, in alphabetical order. These are
    /// the tail of `order`.
    pub cyclic: Vec<DefinitionKey>,
}

/// Topological sort of `subset` using Kahn's algorithm.
///
/// Ties are broken alphabetically by key so the order is deterministic.
/// Keys in `subset` that are not registered are skipped.
pub fn topological_order(
    definitions: &FxHashMap<DefinitionKey, Definition>,
    subset: &[DefinitionKey],
) -> TopoOrder {
    let nodes: BTreeSet<&DefinitionKey> = subset
        .iter()
        .filter(|k| definitions.contains_key(*k))
        .collect();

    // in_degree[k] = number of k's dependencies inside the subset not yet
    // emitted. A self-edge counts, so self-recursive keys never become ready.
    let mut in_degree: BTreeMap<&DefinitionKey, usize> = nodes
        .iter()
        .map(|&k| {
            let deps = definitions[k]
                .depends_on
                .iter()
                .filter(|d| nodes.contains(d))
                .count();
            (k, deps)
        })
        .collect();

    // BTreeMap iteration is sorted, so the seed is already alphabetical.
    let ready: Vec<&DefinitionKey> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&k, _)| k)
        .collect();
    let mut queue: VecDeque<&DefinitionKey> = VecDeque::from(ready);
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(key) = queue.pop_front() {
        order.push(key.clone());
        let mut newly_ready = Vec::new();
        for dependent in &definitions[key].depended_by {
            if let Some(deg) = in_degree.get_mut(dependent) {
                if *deg > 0 {
                    *deg -= 1;
                    if *deg == 0 {
                        newly_ready.push(dependent);
                    }
                }
            }
        }
        newly_ready.sort();
        queue.extend(newly_ready);
    }

    let cyclic: Vec<DefinitionKey> = in_degree
        .into_iter()
        .filter(|(_, deg)| *deg > 0)
        .map(|(k, _)| k.clone())
        .collect();
    order.extend(cyclic.iter().cloned());

    TopoOrder { order, cyclic }
}
