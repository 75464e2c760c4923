//! Identity-keyed ownership graph. Nodes are identities and edges are
//! identity pairs, so the graph serializes directly and carries no live
//! references.

use helm_preview_core::ResourceIdentity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How an edge was established.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// From owner-reference metadata.
    Declared,
    /// From best-effort label/selector matching.
    Inferred,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnershipEdge {
    pub owner: ResourceIdentity,
    pub dependent: ResourceIdentity,
    pub relation: Relation,
}

/// Acyclic after resolution; edges point owner <- dependent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnershipGraph {
    pub nodes: Vec<ResourceIdentity>,
    pub edges: Vec<OwnershipEdge>,
}

/// Find one cycle in the dependent -> owner direction, returning its edges.
/// Deterministic: nodes and adjacency are visited in sorted order.
pub(crate) fn find_cycle(
    nodes: &BTreeSet<ResourceIdentity>,
    edges: &[OwnershipEdge],
) -> Option<Vec<OwnershipEdge>> {
    let mut adjacency: BTreeMap<&ResourceIdentity, Vec<&OwnershipEdge>> = BTreeMap::new();
    for edge in edges {
        adjacency.entry(&edge.dependent).or_default().push(edge);
    }
    for targets in adjacency.values_mut() {
        targets.sort_by(|a, b| a.owner.cmp(&b.owner));
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }
    let mut color: BTreeMap<&ResourceIdentity, Color> =
        nodes.iter().map(|n| (n, Color::White)).collect();

    fn visit<'a>(
        node: &'a ResourceIdentity,
        adjacency: &BTreeMap<&'a ResourceIdentity, Vec<&'a OwnershipEdge>>,
        color: &mut BTreeMap<&'a ResourceIdentity, Color>,
        stack: &mut Vec<&'a OwnershipEdge>,
    ) -> Option<Vec<OwnershipEdge>> {
        color.insert(node, Color::Gray);
        for edge in adjacency.get(node).map(Vec::as_slice).unwrap_or_default() {
            match color.get(&edge.owner).copied().unwrap_or(Color::White) {
                Color::Gray => {
                    // Back edge: the cycle is the stack suffix from the owner
                    // back to here, plus this edge.
                    let start = stack
                        .iter()
                        .position(|e| e.dependent == edge.owner)
                        .unwrap_or(0);
                    let mut cycle: Vec<OwnershipEdge> =
                        stack[start..].iter().map(|e| (*e).clone()).collect();
                    cycle.push((*edge).clone());
                    return Some(cycle);
                }
                Color::White => {
                    stack.push(edge);
                    if let Some(cycle) = visit(&edge.owner, adjacency, color, stack) {
                        return Some(cycle);
                    }
                    stack.pop();
                }
                Color::Black => {}
            }
        }
        color.insert(node, Color::Black);
        None
    }

    for node in nodes {
        if color.get(node).copied() == Some(Color::White) {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(node, &adjacency, &mut color, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}
