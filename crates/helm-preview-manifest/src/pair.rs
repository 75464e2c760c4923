//! Identity-based pairing of Live and Proposed resource sets.

use crate::RawResource;
use helm_preview_core::ResourceIdentity;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairStatus {
    Added,
    Removed,
    Changed,
    Unchanged,
}

/// A matched pair of raw resources. One side may be absent.
#[derive(Debug, Clone)]
pub struct ResourcePair {
    pub identity: ResourceIdentity,
    pub live: Option<RawResource>,
    pub proposed: Option<RawResource>,
    pub status: PairStatus,
}

/// Match Live and Proposed resources by identity.
///
/// Order follows the Live set, with Proposed-only resources appended in their
/// original order. `Changed` here means "bodies differ before normalization";
/// the diff engine decides whether any change survives normalization.
pub fn pair_resources(live: Vec<RawResource>, proposed: Vec<RawResource>) -> Vec<ResourcePair> {
    let mut order: Vec<ResourceIdentity> = Vec::new();
    let mut live_map: BTreeMap<ResourceIdentity, RawResource> = BTreeMap::new();
    for res in live {
        if !live_map.contains_key(&res.identity) {
            order.push(res.identity.clone());
        }
        live_map.insert(res.identity.clone(), res);
    }

    let mut proposed_map: BTreeMap<ResourceIdentity, RawResource> = BTreeMap::new();
    for res in proposed {
        if !live_map.contains_key(&res.identity) && !proposed_map.contains_key(&res.identity) {
            order.push(res.identity.clone());
        }
        proposed_map.insert(res.identity.clone(), res);
    }

    order
        .into_iter()
        .map(|identity| {
            let live = live_map.remove(&identity);
            let proposed = proposed_map.remove(&identity);
            let status = match (&live, &proposed) {
                (None, Some(_)) => PairStatus::Added,
                (Some(_), None) => PairStatus::Removed,
                (Some(l), Some(p)) if l.body == p.body => PairStatus::Unchanged,
                (Some(_), Some(_)) => PairStatus::Changed,
                (None, None) => unreachable!("identity came from one of the two sets"),
            };
            ResourcePair {
                identity,
                live,
                proposed,
                status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_multi_doc;
    use helm_preview_core::Origin;
    use indoc::indoc;

    fn resources(yaml: &str, origin: Origin) -> Vec<RawResource> {
        let (res, errors) = parse_multi_doc(yaml, origin, "default");
        assert!(errors.is_empty(), "{errors:?}");
        res
    }

    #[test]
    fn pairs_by_identity() {
        let live = resources(
            indoc! {"
                apiVersion: v1
                kind: ConfigMap
                metadata:
                  name: kept
                data:
                  k: v
                ---
                apiVersion: v1
                kind: Secret
                metadata:
                  name: dropped
            "},
            Origin::Live,
        );
        let proposed = resources(
            indoc! {"
                apiVersion: v1
                kind: ConfigMap
                metadata:
                  name: kept
                data:
                  k: v2
                ---
                apiVersion: v1
                kind: ConfigMap
                metadata:
                  name: brand-new
            "},
            Origin::Proposed,
        );

        let pairs = pair_resources(live, proposed);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].status, PairStatus::Changed);
        assert_eq!(pairs[1].status, PairStatus::Removed);
        assert_eq!(pairs[1].identity.kind, "Secret");
        assert_eq!(pairs[2].status, PairStatus::Added);
        assert_eq!(pairs[2].identity.name, "brand-new");
    }

    #[test]
    fn identical_bodies_are_unchanged() {
        let doc = indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: same
            data:
              k: v
        "};
        let pairs = pair_resources(
            resources(doc, Origin::Live),
            resources(doc, Origin::Proposed),
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].status, PairStatus::Unchanged);
    }
}
