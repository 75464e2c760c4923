//! Ownership resolution: builds an identity-keyed ownership graph from owner
//! references (declared) and selector/label matching (inferred), breaks any
//! cycles deterministically, and computes owner chains so changes deep in a
//! dependent resource roll up to the top-level owning object.

mod graph;

pub use graph::{OwnershipEdge, OwnershipGraph, Relation};

use helm_preview_core::{Manager, ResourceDiff, ResourceDocument, ResourceIdentity};
use std::collections::{BTreeMap, BTreeSet};

/// Result of resolving ownership for one release.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub graph: OwnershipGraph,
    pub warnings: Vec<String>,
    managers: BTreeMap<ResourceIdentity, Manager>,
}

impl Resolution {
    /// Ordered ancestor identities for `id`, nearest owner first.
    ///
    /// Declared edges are preferred over inferred ones; among several owners
    /// the smallest identity wins, so chains are deterministic.
    pub fn chain_for(&self, id: &ResourceIdentity) -> Vec<ResourceIdentity> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = id.clone();
        while let Some(owner) = self.best_owner(&current) {
            if !seen.insert(owner.clone()) {
                break;
            }
            chain.push(owner.clone());
            current = owner;
        }
        chain
    }

    /// The presentation root for `id`: the last ancestor, or `id` itself.
    pub fn root_for(&self, id: &ResourceIdentity) -> ResourceIdentity {
        self.chain_for(id).pop().unwrap_or_else(|| id.clone())
    }

    /// Enrich diffs in place with owner chains and detected managers.
    pub fn annotate(&self, diffs: &mut [ResourceDiff]) {
        for diff in diffs {
            diff.owner_chain = self.chain_for(&diff.identity);
            diff.manager = self.managers.get(&diff.identity).copied();
        }
    }

    fn best_owner(&self, id: &ResourceIdentity) -> Option<ResourceIdentity> {
        self.graph
            .edges
            .iter()
            .filter(|e| &e.dependent == id)
            .min_by(|a, b| a.relation.cmp(&b.relation).then(a.owner.cmp(&b.owner)))
            .map(|e| e.owner.clone())
    }
}

/// Build and resolve the ownership graph for a set of normalized documents
/// (one per identity, preferring the Proposed side).
pub fn resolve(docs: &[&ResourceDocument]) -> Resolution {
    let mut nodes: BTreeSet<ResourceIdentity> = BTreeSet::new();
    let mut edges: BTreeSet<OwnershipEdge> = BTreeSet::new();

    // Index for matching owner references, which carry no namespace: an
    // owner is assumed namespace-local unless only one candidate exists.
    let mut by_kind_name: BTreeMap<(&str, &str), Vec<&ResourceIdentity>> = BTreeMap::new();
    for doc in docs {
        nodes.insert(doc.identity.clone());
        by_kind_name
            .entry((doc.identity.kind.as_str(), doc.identity.name.as_str()))
            .or_default()
            .push(&doc.identity);
    }

    for doc in docs {
        for owner_ref in &doc.ownership.owner_refs {
            let candidates = by_kind_name
                .get(&(owner_ref.kind.as_str(), owner_ref.name.as_str()))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let owner = candidates
                .iter()
                .find(|c| c.namespace == doc.identity.namespace)
                .or_else(|| candidates.first());
            if let Some(owner) = owner {
                if **owner != doc.identity {
                    edges.insert(OwnershipEdge {
                        owner: (*owner).clone(),
                        dependent: doc.identity.clone(),
                        relation: Relation::Declared,
                    });
                }
            }
        }
    }

    // Inferred: a Service fronts the workload whose pod-template labels its
    // selector matches; the workload is the owner so Service changes roll up
    // to the object operators actually deploy.
    for service in docs.iter().filter(|d| d.identity.kind == "Service") {
        let selector = &service.ownership.selector;
        if selector.is_empty() {
            continue;
        }
        for workload in docs {
            if workload.identity == service.identity
                || workload.identity.namespace != service.identity.namespace
                || workload.ownership.template_labels.is_empty()
            {
                continue;
            }
            let matches = selector
                .iter()
                .all(|(k, v)| workload.ownership.template_labels.get(k) == Some(v));
            if matches {
                edges.insert(OwnershipEdge {
                    owner: workload.identity.clone(),
                    dependent: service.identity.clone(),
                    relation: Relation::Inferred,
                });
            }
        }
    }

    let mut edges: Vec<OwnershipEdge> = edges.into_iter().collect();
    let mut warnings = Vec::new();
    while let Some(cycle) = graph::find_cycle(&nodes, &edges) {
        let dropped = cycle
            .iter()
            .max_by(|a, b| a.owner.cmp(&b.owner))
            .cloned()
            .unwrap_or_else(|| unreachable!("cycle has at least one edge"));
        tracing::warn!(
            owner = %dropped.owner,
            dependent = %dropped.dependent,
            "breaking ownership cycle"
        );
        warnings.push(format!(
            "ownership cycle detected; dropped edge {} -> {}",
            dropped.dependent, dropped.owner
        ));
        edges.retain(|e| *e != dropped);
    }

    let managers = docs
        .iter()
        .map(|d| (d.identity.clone(), d.ownership.manager()))
        .collect();

    Resolution {
        graph: OwnershipGraph {
            nodes: nodes.into_iter().collect(),
            edges,
        },
        warnings,
        managers,
    }
}
