//! AF-005: Dependency graph construction and deterministic ordering.
//!
//! Edges come from each resource's extracted references, restricted to names
//! that are themselves resources. Cycles are found with a depth-first walk
//! that tracks the active path. The order is Kahn's algorithm with a min-heap
//! on declaration index, so output follows declaration order except where a
//! dependency forces otherwise.

use super::error::{Error, Result};
use super::types::{DependencyEdge, DiscoveredResource, ResolvedGraph};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::debug;

/// Resolve a creation order for `resources`.
pub fn resolve(resources: &[DiscoveredResource]) -> Result<ResolvedGraph> {
    check_unique_names(resources)?;

    let index: HashMap<&str, usize> = resources
        .iter()
        .enumerate()
        .map(|(i, r)| (r.name.as_str(), i))
        .collect();
    let adjacency = build_adjacency(resources, &index);

    if let Some(cycle) = find_cycle(&adjacency) {
        return Err(Error::Dependency {
            members: cycle
                .into_iter()
                .map(|i| resources[i].name.clone())
                .collect(),
        });
    }

    let order: Vec<String> = topological_order(&adjacency)
        .into_iter()
        .map(|i| resources[i].name.clone())
        .collect();

    let edges = adjacency
        .iter()
        .enumerate()
        .flat_map(|(from, targets)| {
            targets.iter().map(move |&to| DependencyEdge {
                from: resources[from].name.clone(),
                to: resources[to].name.clone(),
            })
        })
        .collect::<Vec<_>>();

    debug!(resources = order.len(), edges = edges.len(), "resolved order");
    Ok(ResolvedGraph { order, edges })
}

/// Reject two resources sharing a name.
pub fn check_unique_names(resources: &[DiscoveredResource]) -> Result<()> {
    let mut seen: HashMap<&str, &DiscoveredResource> = HashMap::new();
    for resource in resources {
        if let Some(first) = seen.insert(resource.name.as_str(), resource) {
            return Err(Error::DuplicateName {
                name: resource.name.clone(),
                first: first.location.clone(),
                second: resource.location.clone(),
            });
        }
    }
    Ok(())
}

/// Per-resource edge targets (declaration indices), deduplicated, in
/// first-mention order. Self-references are kept.
fn build_adjacency(
    resources: &[DiscoveredResource],
    index: &HashMap<&str, usize>,
) -> Vec<Vec<usize>> {
    resources
        .iter()
        .map(|r| {
            let mut targets = Vec::new();
            for dep in &r.dependencies {
                if let Some(&to) = index.get(dep.as_str()) {
                    if !targets.contains(&to) {
                        targets.push(to);
                    }
                }
            }
            targets
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Return the members of the first cycle found, in path order.
///
/// Depth-first with an explicit stack, so long chains cannot overflow.
pub(crate) fn find_cycle(adjacency: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut marks = vec![Mark::Unvisited; adjacency.len()];
    // (node, next edge to follow); the nodes are the current path
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for root in 0..adjacency.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::OnPath;
        stack.push((root, 0));
        while let Some(top) = stack.last_mut() {
            let (node, edge) = *top;
            let Some(&next) = adjacency[node].get(edge) else {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;
            match marks[next] {
                Mark::OnPath => {
                    let from = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    return Some(stack[from..].iter().map(|&(n, _)| n).collect());
                }
                Mark::Unvisited => {
                    marks[next] = Mark::OnPath;
                    stack.push((next, 0));
                }
                Mark::Done => {}
            }
        }
    }
    None
}

/// Kahn's algorithm over an acyclic adjacency; ready nodes leave in
/// declaration order.
fn topological_order(adjacency: &[Vec<usize>]) -> Vec<usize> {
    let mut in_degree: Vec<usize> = adjacency.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); adjacency.len()];
    for (from, targets) in adjacency.iter().enumerate() {
        for &to in targets {
            dependents[to].push(from);
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(adjacency.len());
    while let Some(Reverse(current)) = ready.pop() {
        order.push(current);
        for &dependent in &dependents[current] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }
    order
}
