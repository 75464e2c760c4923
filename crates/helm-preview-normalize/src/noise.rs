//! Applying noise rules (strip/mask) to a value tree.

use crate::mask_value;
use helm_preview_core::{NoiseAction, NoiseRule};
use serde_json::Value;

/// Apply one noise rule to a document body. Rules address mapping keys only;
/// list elements are never pattern targets (matching the original dot-path
/// semantics). `Ignore` rules are handled by the diff engine, not here.
pub fn apply_rule(body: &mut Value, rule: &NoiseRule) {
    match rule.action {
        NoiseAction::Strip => walk(body, rule, 0, &mut |map, key| {
            map.remove(&key);
        }),
        NoiseAction::Mask => walk(body, rule, 0, &mut |map, key| {
            if let Some(value) = map.get(&key) {
                let masked = mask_value(value);
                map.insert(key, masked);
            }
        }),
        NoiseAction::Ignore => {}
    }
}

fn walk(
    value: &mut Value,
    rule: &NoiseRule,
    level: usize,
    leaf_op: &mut dyn FnMut(&mut serde_json::Map<String, Value>, String),
) {
    let Some(map) = value.as_object_mut() else {
        return;
    };
    let last = level + 1 == rule.path.len();
    let matching: Vec<String> = map
        .keys()
        .filter(|k| rule.path.segment_matches(level, k) == Some(true))
        .cloned()
        .collect();
    for key in matching {
        if last {
            leaf_op(map, key);
        } else if let Some(child) = map.get_mut(&key) {
            walk(child, rule, level + 1, leaf_op);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helm_preview_core::NoiseRule;
    use serde_json::json;

    #[test]
    fn strips_leaf_globs() {
        let mut body = json!({
            "metadata": {
                "annotations": {
                    "meta.helm.sh/release-name": "r",
                    "meta.helm.sh/release-namespace": "ns",
                    "other": "kept"
                }
            }
        });
        let rule = NoiseRule::strip(r"metadata.annotations.meta\.helm\.sh/*").unwrap();
        apply_rule(&mut body, &rule);
        let annotations = body["metadata"]["annotations"].as_object().unwrap();
        assert_eq!(annotations.len(), 1);
        assert!(annotations.contains_key("other"));
    }

    #[test]
    fn masks_values_in_place() {
        let mut body = json!({"data": {"a": "c2VjcmV0", "b": "dG9w"}});
        let rule = NoiseRule::mask("data.*").unwrap();
        apply_rule(&mut body, &rule);
        let a = body["data"]["a"].as_str().unwrap();
        let b = body["data"]["b"].as_str().unwrap();
        assert!(a.starts_with("*** sha256:"), "{a}");
        assert!(b.starts_with("*** sha256:"), "{b}");
        // different contents keep distinguishable placeholders
        assert_ne!(a, b);
    }

    #[test]
    fn masking_is_idempotent() {
        let mut body = json!({"data": {"a": "c2VjcmV0"}});
        let rule = NoiseRule::mask("data.*").unwrap();
        apply_rule(&mut body, &rule);
        let once = body.clone();
        apply_rule(&mut body, &rule);
        assert_eq!(body, once);
    }

    #[test]
    fn equal_values_mask_identically() {
        let mut live = json!({"data": {"password": "aHVudGVyMg=="}});
        let mut proposed = json!({"data": {"password": "aHVudGVyMg=="}});
        let rule = NoiseRule::mask("data.*").unwrap();
        apply_rule(&mut live, &rule);
        apply_rule(&mut proposed, &rule);
        assert_eq!(live, proposed);
    }

    #[test]
    fn absent_paths_are_no_ops() {
        let mut body = json!({"spec": {"replicas": 1}});
        let rule = NoiseRule::strip("metadata.uid").unwrap();
        apply_rule(&mut body, &rule);
        assert_eq!(body, json!({"spec": {"replicas": 1}}));
    }
}
