//! Graph ordering

use super::ProjectGraph;
use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};

/// Order targets so every target comes after all of its dependencies (Kahn's algorithm).
///
/// Fails with [`Error::DependencyCycle`] naming a target on a cycle.
pub fn topological_order(graph: &ProjectGraph) -> Result<Vec<&str>> {
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for target in graph.targets() {
        pending.insert(target.name.as_str(), target.dependencies.len());
        for dep in &target.dependencies {
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(target.name.as_str());
        }
    }

    // Seed in declared order for a deterministic result
    let mut ready: VecDeque<&str> = graph
        .targets()
        .filter(|t| t.dependencies.is_empty())
        .map(|t| t.name.as_str())
        .collect();
    let mut order = Vec::with_capacity(pending.len());

    while let Some(name) = ready.pop_front() {
        order.push(name);
        for &dependent in dependents.get(name).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(dependent);
                }
            }
        }
    }

    if order.len() < pending.len() {
        let stuck = graph
            .targets()
            .find(|t| pending.get(t.name.as_str()).copied().unwrap_or(0) > 0)
            .map(|t| t.name.clone())
            .unwrap_or_default();
        return Err(Error::DependencyCycle { target: stuck });
    }

    Ok(order)
}
