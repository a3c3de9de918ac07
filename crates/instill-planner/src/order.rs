use std::collections::{BTreeMap, BTreeSet};

use crate::{PlanOperation, PlanUnit};

/// Reorders the additions of a change-set so that a unit comes after
/// everything it requires. Removals keep their original relative order
/// and trail the additions. `satisfies` decides whether a candidate unit
/// satisfies a requirement expression.
///
/// A requirement contributes an ordering edge only when exactly one
/// candidate satisfies it: ambiguous matches usually indicate a platform
/// fragment rather than a real prerequisite, and a unit satisfying its
/// own requirement is never an edge. If the candidate graph contains a
/// cycle the sorted prefix is abandoned and every addition falls back to
/// its original position; the upstream planner is expected to have
/// guaranteed acyclicity, so this is purely defensive.
pub fn order_plan<F>(operations: Vec<PlanOperation>, satisfies: F) -> Vec<PlanOperation>
where
    F: Fn(&str, &PlanUnit) -> bool,
{
    let mut additions = Vec::new();
    let mut removals = Vec::new();
    for operation in operations {
        if operation.is_removal() {
            removals.push(operation);
        } else {
            additions.push(operation);
        }
    }

    let sorted = sort_additions(&additions, &satisfies);

    let mut ordered = match sorted {
        Some(order) => order
            .into_iter()
            .map(|index| additions[index].clone())
            .collect(),
        None => additions,
    };
    ordered.extend(removals);
    ordered
}

/// Kahn's algorithm over candidate indices. Returns `None` on a cycle.
fn sort_additions<F>(additions: &[PlanOperation], satisfies: &F) -> Option<Vec<usize>>
where
    F: Fn(&str, &PlanUnit) -> bool,
{
    let mut incoming: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    let mut outgoing: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for index in 0..additions.len() {
        incoming.insert(index, BTreeSet::new());
        outgoing.insert(index, BTreeSet::new());
    }

    for (dependent, operation) in additions.iter().enumerate() {
        for requirement in &operation.plan_unit().requirements {
            let matches: Vec<usize> = additions
                .iter()
                .enumerate()
                .filter(|(_, candidate)| satisfies(requirement, candidate.plan_unit()))
                .map(|(index, _)| index)
                .collect();
            // Exactly one candidate match, and never a self-reference.
            if let [requires] = matches.as_slice() {
                if *requires != dependent {
                    incoming.entry(dependent).or_default().insert(*requires);
                    outgoing.entry(*requires).or_default().insert(dependent);
                }
            }
        }
    }

    let mut ready: BTreeSet<usize> = incoming
        .iter()
        .filter_map(|(index, edges)| edges.is_empty().then_some(*index))
        .collect();
    let mut sorted = Vec::with_capacity(additions.len());

    while let Some(next) = ready.pop_first() {
        sorted.push(next);
        if let Some(dependents) = outgoing.get(&next) {
            for dependent in dependents.clone() {
                if let Some(edges) = incoming.get_mut(&dependent) {
                    edges.remove(&next);
                    if edges.is_empty() {
                        ready.insert(dependent);
                    }
                }
            }
        }
    }

    if sorted.len() == additions.len() {
        Some(sorted)
    } else {
        None
    }
}
